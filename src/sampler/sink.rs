use crate::NodeMetricsError;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Destination for recoverable sampling failures.
///
/// Implementations must never panic or abort; a failure here only means the
/// affected gauge keeps its previous value.
pub trait ErrorSink: Send + Sync {
    fn handle_error(&self, err: &NodeMetricsError);
}

/// Logs every handled error and keeps a running count.
#[derive(Debug, Default)]
pub struct LogErrorSink {
    handled: AtomicU64,
}

impl LogErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

impl ErrorSink for LogErrorSink {
    fn handle_error(&self, err: &NodeMetricsError) {
        self.handled.fetch_add(1, Ordering::Relaxed);
        error!("{}", err);
    }
}
