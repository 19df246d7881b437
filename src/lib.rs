pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod sampler;

pub use config::SamplerConfig;
pub use error::{NodeMetricsError, Result};
pub use metrics::{NodeMetrics, PodOperation};
pub use sampler::{ErrorSink, FlowSource, SampleOutcome, SampleReport, Sampler};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
