pub mod exporter;
pub mod recorder;
pub mod registry;
pub mod summary;

pub use exporter::{MetricsSnapshot, PrometheusExporter};
pub use recorder::{PodOperation, PodOperationTimer};
pub use registry::{InstrumentKind, InstrumentSpec, NodeMetrics, CATALOG};
