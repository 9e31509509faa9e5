use crate::artifacts::transfer::SyncReport;

/// Receives a notification after each successful push or pull
///
/// Calls happen once the operation has completed; an observer cannot fail
/// or undo it.
pub trait SyncObserver: Send + Sync {
    fn on_push(&self, report: &SyncReport);

    fn on_pull(&self, report: &SyncReport);
}

/// Observer that logs sync results
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_push(&self, report: &SyncReport) {
        tracing::info!(
            transferred = report.transferred,
            head = ?report.head,
            up_to_date = report.up_to_date,
            "push completed"
        );
    }

    fn on_pull(&self, report: &SyncReport) {
        tracing::info!(
            transferred = report.transferred,
            head = ?report.head,
            up_to_date = report.up_to_date,
            "pull completed"
        );
    }
}
