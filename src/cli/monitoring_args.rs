// Monitoring daemon arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Monitoring daemon options
#[derive(Args, Debug, Clone, Default)]
pub struct MonitoringArgs {
    /// Configuration file (TOML format)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run a single cycle for every monitor and exit
    #[arg(long = "once")]
    pub once: bool,

    /// Only drive the named monitor (repeatable)
    #[arg(long = "monitor", value_name = "NAME")]
    pub monitors: Vec<String>,

    /// Check the SMTP connection and exit
    #[arg(long = "test-smtp")]
    pub test_smtp: bool,

    /// Seconds between scheduling checks
    #[arg(long = "tick", value_name = "SECONDS", default_value_t = 10)]
    pub tick_seconds: u64,
}
