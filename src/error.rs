// Error types for certmon
//
// Per-item failures (Decode, Parse, Fetch) are isolated by the reconciler and
// never fail a cycle. Discovery and Persist abort the cycle. Notify is logged
// and leaves the identity eligible for the next cycle.

use crate::monitor::types::SourceKind;
use thiserror::Error;

/// Errors produced by the monitoring engine
#[derive(Debug, Error)]
pub enum MonitorError {
    /// No PEM block found, or the block is not a certificate
    #[error("PEM decode error: {details}")]
    Decode { details: String },

    /// The block decoded but is not well-formed X.509
    #[error("Certificate parsing error: {details}")]
    Parse { details: String },

    /// A single candidate could not be fetched (unreadable secret, unreachable endpoint, unreadable file)
    #[error("Failed to fetch {identity}: {details}")]
    Fetch { identity: String, details: String },

    /// A whole source could not be enumerated
    #[error("Discovery failed for {kind} source: {details}")]
    Discovery { kind: SourceKind, details: String },

    /// Notification delivery failed
    #[error("Notification failed for {recipient}: {details}")]
    Notify { recipient: String, details: String },

    /// Snapshot write kept conflicting, or the store rejected it
    #[error("Failed to persist status after {attempts} attempt(s): {details}")]
    Persist { attempts: usize, details: String },

    /// Cluster API error outside of the persist step
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl MonitorError {
    pub fn decode(details: impl Into<String>) -> Self {
        Self::Decode {
            details: details.into(),
        }
    }

    pub fn parse(details: impl Into<String>) -> Self {
        Self::Parse {
            details: details.into(),
        }
    }

    pub fn fetch(identity: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Fetch {
            identity: identity.into(),
            details: details.into(),
        }
    }

    pub fn discovery(kind: SourceKind, details: impl Into<String>) -> Self {
        Self::Discovery {
            kind,
            details: details.into(),
        }
    }

    pub fn notify(recipient: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Notify {
            recipient: recipient.into(),
            details: details.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures that only affect one certificate
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            MonitorError::Decode { .. } | MonitorError::Parse { .. } | MonitorError::Fetch { .. }
        )
    }
}

/// Errors returned by a [`crate::cluster::ClusterClient`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// Requested object does not exist
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// Optimistic-concurrency check failed
    #[error("Conflict updating {name}: expected version {expected}, found {actual}")]
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },

    /// Any other API failure
    #[error("API error: {0}")]
    Api(String),
}

impl ClusterError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict { .. })
    }
}
