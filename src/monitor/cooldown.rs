// Notification cooldown tracking

use crate::monitor::types::{CertificateStatus, NotificationState};
use chrono::{DateTime, Duration, Utc};

/// Decide whether a notification is due now.
///
/// Valid certificates never notify. A problem certificate that was never
/// notified is due immediately, otherwise once the cooldown has elapsed.
pub fn should_notify(
    state: &NotificationState,
    current_status: CertificateStatus,
    now: DateTime<Utc>,
    cooldown_period: Duration,
) -> bool {
    if current_status == CertificateStatus::Valid {
        return false;
    }

    match state.last_notified_at() {
        None => true,
        Some(last) => match last.checked_add_signed(cooldown_period) {
            Some(due_at) => now >= due_at,
            None => false,
        },
    }
}

/// State to carry into the next snapshot when no notification went out
pub fn carry_forward(state: NotificationState, current_status: CertificateStatus) -> NotificationState {
    if current_status == CertificateStatus::Valid {
        NotificationState::never()
    } else {
        state
    }
}
