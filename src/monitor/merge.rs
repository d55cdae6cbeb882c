// Snapshot merge
//
// The merge is pure so the persist step can replay it against a freshly
// re-read snapshot after a write conflict.

use crate::monitor::cooldown::carry_forward;
use crate::monitor::types::{
    CertificateObservation, CertificateStatus, MonitorSnapshot, NotificationState, SnapshotEntry,
};
use chrono::{DateTime, Utc};

/// Result of one cycle for a single identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDelta {
    pub observation: CertificateObservation,
    pub status: CertificateStatus,
    /// Set when a notification was delivered this cycle
    pub notified_at: Option<DateTime<Utc>>,
}

impl CycleDelta {
    pub fn name(&self) -> String {
        self.observation.qualified_name()
    }
}

/// Build the next snapshot from `prior` and this cycle's deltas.
///
/// Only identities present in `deltas` survive. A delivered notification sets
/// the state, a valid certificate clears it, anything else keeps the prior state.
pub fn merge(prior: &MonitorSnapshot, deltas: &[CycleDelta]) -> MonitorSnapshot {
    let mut next = MonitorSnapshot::new();

    for delta in deltas {
        let name = delta.name();
        let notification = match delta.notified_at {
            Some(at) => NotificationState::notified(at, delta.status),
            None => carry_forward(prior.notification_state(&name), delta.status),
        };

        next.upsert(SnapshotEntry {
            name,
            source_kind: delta.observation.source_kind,
            namespace: delta.observation.namespace.clone(),
            not_after: delta.observation.not_after,
            notification,
        });
    }

    next
}
