// certmon - Certificate expiry monitor
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::Result;
use certmon::Args;
use certmon::cluster::InMemoryCluster;
use certmon::monitor::alerts::{LogNotifier, Notifier, SmtpNotifier};
use certmon::monitor::config::Settings;
use certmon::monitor::daemon::seed_cluster;
use certmon::monitor::{MonitorDaemon, Reconciler};
use certmon::utils::clock::SystemClock;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();

    // Initialize logging - respect RUST_LOG environment variable
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set subscriber: {}", e))?;

    // Handle --print-config-example (write example config and exit)
    if let Some(config_path) = &args.print_config_example {
        Settings::example().save_to_file(config_path)?;
        println!("Example configuration saved to: {}", config_path.display());
        return Ok(());
    }

    let settings = match &args.monitoring.config {
        Some(path) => Settings::from_file(path)?,
        None => {
            warn!("No configuration file given, running with defaults and no monitors");
            Settings::default()
        }
    };

    // Handle --test-smtp
    if args.monitoring.test_smtp {
        let notifier = SmtpNotifier::new(settings.smtp.clone())?;
        notifier.test_connection().await?;
        println!("SMTP connection to {}:{} OK", settings.smtp.host, settings.smtp.port);
        return Ok(());
    }

    let cluster = Arc::new(InMemoryCluster::new());
    let mut monitors = seed_cluster(&cluster, &settings).await?;
    if !args.monitoring.monitors.is_empty() {
        monitors.retain(|name| args.monitoring.monitors.contains(name));
    }

    let notifier: Arc<dyn Notifier> = if settings.smtp.enabled {
        Arc::new(SmtpNotifier::new(settings.smtp.clone())?)
    } else {
        info!("SMTP disabled, notifications are only logged");
        Arc::new(LogNotifier)
    };

    let reconciler = Reconciler::from_settings(&settings, cluster, notifier, Arc::new(SystemClock))?;
    let daemon = MonitorDaemon::new(Arc::new(reconciler), monitors)
        .with_tick(Duration::from_secs(args.monitoring.tick_seconds.max(1)));

    if args.monitoring.once {
        let mut failed = 0;
        for (name, result) in daemon.run_once().await {
            match result {
                Ok(Some(report)) => {
                    println!(
                        "{}: total={} valid={} expiring={} expired={} skipped={} notified={}",
                        name,
                        report.totals.total,
                        report.totals.valid,
                        report.totals.expiring,
                        report.totals.expired,
                        report.skipped,
                        report.notified.len()
                    );
                    for cert in &report.status.monitored_certificates {
                        println!("  {:<9} {} {}", cert.status.as_str(), cert.expiry, cert.name);
                    }
                }
                Ok(None) => println!("{}: not found", name),
                Err(e) => {
                    println!("{}: failed: {}", name, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} monitor cycle(s) failed", failed);
        }
        return Ok(());
    }

    daemon.start().await?;
    Ok(())
}
