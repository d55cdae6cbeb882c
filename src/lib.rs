// certmon - Certificate expiry monitor
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! certmon discovers TLS certificates held in cluster secrets, served by
//! external endpoints and stored on node filesystems, classifies them by
//! remaining validity and emails operators before they expire.

pub mod certificates;
pub mod cli;
pub mod cluster;
pub mod error;
pub mod monitor;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use crate::cli::Args;
pub use crate::error::{ClusterError, MonitorError};
pub use crate::monitor::{MonitorDaemon, Reconciler};

/// Result type for glue code (configuration loading, process setup)
pub type Result<T> = anyhow::Result<T>;

/// Error type for glue code
pub use anyhow::Error;
