use std::io;
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeMetricsError {
    #[error("failed to dump OVS flows for metrics: {0}")]
    FlowDumpFailed(String),

    #[error("failed to read ARP entries for metrics: {0}")]
    ArpTableUnreadable(#[source] io::Error),

    #[error("failed to read max ARP entries for metrics: {0}")]
    ArpThresholdUnreadable(#[source] io::Error),

    #[error("failed to parse max ARP entries {value:?} for metrics: {source}")]
    ArpThresholdInvalid {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to read pod IPs for metrics: {0}")]
    PodIpDirUnreadable(#[source] io::Error),

    #[error("{source_name} sample timed out after {timeout:?}")]
    SampleTimedOut {
        source_name: &'static str,
        timeout: Duration,
    },

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, NodeMetricsError>;
