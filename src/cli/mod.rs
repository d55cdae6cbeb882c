// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Parser;
use std::path::PathBuf;

mod monitoring_args;

pub use monitoring_args::MonitoringArgs;

/// certmon - Certificate expiry monitor
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, long_about = None)]
#[command(name = "certmon")]
#[command(about = "Watches TLS certificates and alerts before they expire", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub monitoring: MonitoringArgs,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Write an example configuration file and exit
    #[arg(long = "print-config-example", value_name = "FILE")]
    pub print_config_example: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_daemon_flags() {
        let args = Args::parse_from([
            "certmon",
            "--config",
            "/etc/certmon.toml",
            "--once",
            "--monitor",
            "prod",
            "--monitor",
            "staging",
            "-d",
        ]);

        assert_eq!(
            args.monitoring.config.as_deref(),
            Some(std::path::Path::new("/etc/certmon.toml"))
        );
        assert!(args.monitoring.once);
        assert_eq!(args.monitoring.monitors, vec!["prod", "staging"]);
        assert!(args.debug);
        assert_eq!(args.monitoring.tick_seconds, 10);
    }

    #[test]
    fn test_print_config_example_flag() {
        let args = Args::parse_from(["certmon", "--print-config-example", "certmon.toml"]);
        assert_eq!(
            args.print_config_example,
            Some(PathBuf::from("certmon.toml"))
        );
        assert!(!args.monitoring.once);
    }
}
