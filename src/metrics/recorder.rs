//! Hooks for pod network setup/teardown workflows.
//!
//! These are called synchronously from many concurrent workflows; every
//! update is a single atomic operation on the underlying instrument.

use crate::metrics::registry::NodeMetrics;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Whole microseconds in `elapsed`, truncated.
fn duration_in_microseconds(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodOperation {
    Setup,
    Teardown,
}

impl PodOperation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PodOperation::Setup => "setup",
            PodOperation::Teardown => "teardown",
        }
    }
}

impl std::fmt::Display for PodOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl NodeMetrics {
    pub fn record_setup_error(&self) {
        self.pod_setup_errors.inc();
    }

    pub fn record_teardown_error(&self) {
        self.pod_teardown_errors.inc();
    }

    pub fn record_setup_latency(
        &self,
        namespace: &str,
        name: &str,
        sandbox_id: &str,
        start: Instant,
    ) {
        self.observe_latency(PodOperation::Setup, namespace, name, sandbox_id, start.elapsed());
    }

    pub fn record_teardown_latency(
        &self,
        namespace: &str,
        name: &str,
        sandbox_id: &str,
        start: Instant,
    ) {
        self.observe_latency(PodOperation::Teardown, namespace, name, sandbox_id, start.elapsed());
    }

    fn observe_latency(
        &self,
        operation: PodOperation,
        namespace: &str,
        name: &str,
        sandbox_id: &str,
        elapsed: Duration,
    ) {
        let micros = duration_in_microseconds(elapsed);
        debug!(
            "pod {} latency for {}/{} ({}): {}us",
            operation, namespace, name, sandbox_id, micros
        );

        let summary = match operation {
            PodOperation::Setup => &self.pod_setup_latency,
            PodOperation::Teardown => &self.pod_teardown_latency,
        };
        if let Err(e) = summary.observe(&[namespace, name, sandbox_id], micros) {
            warn!("Dropped pod {} latency observation: {}", operation, e);
        }
    }

    /// Start timing one setup or teardown attempt for a pod sandbox.
    pub fn start_pod_operation(
        &self,
        operation: PodOperation,
        namespace: &str,
        name: &str,
        sandbox_id: &str,
    ) -> PodOperationTimer<'_> {
        PodOperationTimer {
            metrics: self,
            operation,
            namespace: namespace.to_string(),
            name: name.to_string(),
            sandbox_id: sandbox_id.to_string(),
            start: Instant::now(),
        }
    }
}

/// Times a pod network operation and records its outcome on `finish`.
#[must_use = "call finish() to record the operation"]
pub struct PodOperationTimer<'a> {
    metrics: &'a NodeMetrics,
    operation: PodOperation,
    namespace: String,
    name: String,
    sandbox_id: String,
    start: Instant,
}

impl PodOperationTimer<'_> {
    /// Record the latency of the attempt, and an error if it failed.
    pub fn finish<T, E>(self, result: &Result<T, E>) {
        self.metrics.observe_latency(
            self.operation,
            &self.namespace,
            &self.name,
            &self.sandbox_id,
            self.start.elapsed(),
        );

        if result.is_err() {
            match self.operation {
                PodOperation::Setup => self.metrics.record_setup_error(),
                PodOperation::Teardown => self.metrics.record_teardown_error(),
            }
        }
    }
}
