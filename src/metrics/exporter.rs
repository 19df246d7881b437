use crate::metrics::registry::{NodeMetrics, CATALOG};
use crate::{NodeMetricsError, Result};
use prometheus::{Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Point-in-time view of the unlabelled instruments.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub ovs_flows: f64,
    pub arp_cache_entries: f64,
    pub pod_ips: f64,
    pub pod_setup_errors: u64,
    pub pod_teardown_errors: u64,
}

/// Renders the node metrics through the Prometheus text encoder.
pub struct PrometheusExporter {
    metrics: Arc<NodeMetrics>,
    registry: Registry,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<NodeMetrics>, registry: Registry) -> Self {
        Self { metrics, registry }
    }

    /// Register the node metrics with the exporter's registry (idempotent).
    pub fn register(&self) -> Result<()> {
        self.metrics.register(&self.registry)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ovs_flows: self.metrics.ovs_flows(),
            arp_cache_entries: self.metrics.arp_cache_available_entries(),
            pod_ips: self.metrics.pod_ips(),
            pod_setup_errors: self.metrics.pod_setup_errors(),
            pod_teardown_errors: self.metrics.pod_teardown_errors(),
        }
    }

    pub fn format_text(&self) -> Result<String> {
        let families = self.registry.gather();
        debug!("Encoding {} metric families", families.len());

        Ok(TextEncoder::new().encode_to_string(&families)?)
    }

    pub fn format_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| NodeMetricsError::EncodingError(e.to_string()))
    }
}

/// Human-readable listing of the instrument catalog.
pub fn format_catalog() -> String {
    let mut out = String::new();
    for spec in CATALOG.iter() {
        out.push_str(&format!(
            "{:<40} {:<10} {}",
            spec.full_name(),
            spec.kind.as_str(),
            spec.help
        ));
        if !spec.labels.is_empty() {
            out.push_str(&format!(" [{}]", spec.labels.join(", ")));
        }
        out.push('\n');
    }
    out
}

pub fn format_catalog_json() -> Result<String> {
    serde_json::to_string_pretty(&CATALOG).map_err(|e| NodeMetricsError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter() -> PrometheusExporter {
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let exporter = PrometheusExporter::new(metrics, Registry::new());
        exporter.register().unwrap();
        exporter
    }

    #[test]
    fn test_format_text_contains_gauges() {
        let exporter = exporter();
        exporter.metrics.set_pod_ips(3);

        let text = exporter.format_text().unwrap();
        assert!(text.contains("# TYPE openshift_sdn_pod_ips gauge"));
        assert!(text.contains("openshift_sdn_pod_ips 3"));
        assert!(text.contains("openshift_sdn_pod_setup_errors 0"));
    }

    #[test]
    fn test_snapshot_json() {
        let exporter = exporter();
        exporter.metrics.set_ovs_flows(12);
        exporter.metrics.record_teardown_error();

        let json: serde_json::Value =
            serde_json::from_str(&exporter.format_json().unwrap()).unwrap();
        assert_eq!(json["ovs_flows"], 12.0);
        assert_eq!(json["pod_teardown_errors"], 1);
    }

    #[test]
    fn test_catalog_listing() {
        let listing = format_catalog();
        assert_eq!(listing.lines().count(), CATALOG.len());
        assert!(listing.contains("openshift_sdn_pod_setup_latency"));
        assert!(listing.contains("[pod_namespace, pod_name, sandbox_id]"));

        let json: serde_json::Value =
            serde_json::from_str(&format_catalog_json().unwrap()).unwrap();
        assert_eq!(json[0]["key"], "ovs_flows");
        assert_eq!(json[4]["kind"], "summary");
    }
}
