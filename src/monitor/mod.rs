// Certificate Monitoring Engine
//
// Discovers certificates, classifies them by remaining validity and drives
// notifications with a per-identity cooldown. One call to
// `Reconciler::reconcile` is one cycle; `MonitorDaemon` schedules cycles.

pub mod alerts;
pub mod classifier;
pub mod config;
pub mod cooldown;
pub mod daemon;
pub mod merge;
pub mod reconciler;
pub mod types;

// Re-export commonly used types
pub use alerts::{LogNotifier, Notification, Notifier, SmtpNotifier};
pub use config::{CooldownPolicy, MonitorSpec, Settings};
pub use daemon::{DaemonStats, MonitorDaemon};
pub use reconciler::{CycleReport, CycleResult, Reconciler};
pub use types::{
    CertificateObservation, CertificateStatus, MonitorSnapshot, MonitorStatus, NotificationState,
    SourceKind,
};
