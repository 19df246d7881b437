//! Instrument catalog for the SDN node and its one-shot registration.
//!
//! Metric names and help strings are consumed by existing scrape
//! configurations and dashboards; they must not change.

use crate::metrics::summary::SummaryVec;
use crate::Result;
use prometheus::core::Collector;
use prometheus::{Gauge, IntCounter, Opts, Registry};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const SDN_NAMESPACE: &str = "openshift";
pub const SDN_SUBSYSTEM: &str = "sdn";

pub const OVS_FLOWS_KEY: &str = "ovs_flows";
pub const ARP_CACHE_AVAILABLE_ENTRIES_KEY: &str = "arp_cache_entries";
pub const POD_IPS_KEY: &str = "pod_ips";
pub const POD_SETUP_ERRORS_KEY: &str = "pod_setup_errors";
pub const POD_SETUP_LATENCY_KEY: &str = "pod_setup_latency";
pub const POD_TEARDOWN_ERRORS_KEY: &str = "pod_teardown_errors";
pub const POD_TEARDOWN_LATENCY_KEY: &str = "pod_teardown_latency";

/// Label names shared by the pod setup/teardown latency instruments.
pub const POD_LATENCY_LABELS: [&str; 3] = ["pod_namespace", "pod_name", "sandbox_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Gauge,
    Counter,
    Summary,
}

impl InstrumentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::Counter => "counter",
            InstrumentKind::Summary => "summary",
        }
    }
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSpec {
    pub key: &'static str,
    pub kind: InstrumentKind,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl InstrumentSpec {
    /// Fully qualified name as seen by scrapers, e.g. `openshift_sdn_pod_ips`.
    pub fn full_name(&self) -> String {
        format!("{}_{}_{}", SDN_NAMESPACE, SDN_SUBSYSTEM, self.key)
    }

    fn opts(&self) -> Opts {
        Opts::new(self.key, self.help)
            .namespace(SDN_NAMESPACE)
            .subsystem(SDN_SUBSYSTEM)
    }
}

pub const CATALOG: [InstrumentSpec; 7] = [
    InstrumentSpec {
        key: OVS_FLOWS_KEY,
        kind: InstrumentKind::Gauge,
        help: "Number of Open vSwitch flows",
        labels: &[],
    },
    InstrumentSpec {
        key: ARP_CACHE_AVAILABLE_ENTRIES_KEY,
        kind: InstrumentKind::Gauge,
        help: "Number of available entries in the ARP cache",
        labels: &[],
    },
    InstrumentSpec {
        key: POD_IPS_KEY,
        kind: InstrumentKind::Gauge,
        help: "Number of allocated pod IPs",
        labels: &[],
    },
    InstrumentSpec {
        key: POD_SETUP_ERRORS_KEY,
        kind: InstrumentKind::Counter,
        help: "Number pod setup errors",
        labels: &[],
    },
    InstrumentSpec {
        key: POD_SETUP_LATENCY_KEY,
        kind: InstrumentKind::Summary,
        help: "Latency of pod network setup in microseconds",
        labels: &POD_LATENCY_LABELS,
    },
    InstrumentSpec {
        key: POD_TEARDOWN_ERRORS_KEY,
        kind: InstrumentKind::Counter,
        help: "Number pod teardown errors",
        labels: &[],
    },
    InstrumentSpec {
        key: POD_TEARDOWN_LATENCY_KEY,
        kind: InstrumentKind::Summary,
        help: "Latency of pod network teardown in microseconds",
        labels: &POD_LATENCY_LABELS,
    },
];

/// Every SDN node instrument, owned in one place and shared by `Arc`
/// between the sampler and the pod lifecycle recorders.
pub struct NodeMetrics {
    pub(crate) ovs_flows: Gauge,
    pub(crate) arp_cache_available_entries: Gauge,
    pub(crate) pod_ips: Gauge,
    pub(crate) pod_setup_errors: IntCounter,
    pub(crate) pod_setup_latency: SummaryVec,
    pub(crate) pod_teardown_errors: IntCounter,
    pub(crate) pod_teardown_latency: SummaryVec,
    registered: AtomicBool,
    register_lock: Mutex<()>,
}

impl NodeMetrics {
    pub fn new() -> Result<Self> {
        let [ovs, arp, pod_ips, setup_errors, setup_latency, teardown_errors, teardown_latency] =
            &CATALOG;

        Ok(Self {
            ovs_flows: Gauge::with_opts(ovs.opts())?,
            arp_cache_available_entries: Gauge::with_opts(arp.opts())?,
            pod_ips: Gauge::with_opts(pod_ips.opts())?,
            pod_setup_errors: IntCounter::with_opts(setup_errors.opts())?,
            pod_setup_latency: SummaryVec::new(setup_latency.opts(), setup_latency.labels)?,
            pod_teardown_errors: IntCounter::with_opts(teardown_errors.opts())?,
            pod_teardown_latency: SummaryVec::new(
                teardown_latency.opts(),
                teardown_latency.labels,
            )?,
            registered: AtomicBool::new(false),
            register_lock: Mutex::new(()),
        })
    }

    /// Register all instruments with `registry`.
    ///
    /// Once a registration has succeeded, later calls return `Ok(())` without
    /// touching any registry. Concurrent callers wait for an in-flight attempt.
    /// A failed attempt registers nothing and is not remembered, so the next
    /// call tries again.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        if self.registered.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self
            .register_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.registered.load(Ordering::Acquire) {
            return Ok(());
        }

        self.register_all(registry)?;
        self.registered.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    fn collectors(&self) -> [Box<dyn Collector>; 7] {
        // Instruments are Arc-backed, so these clones share state with the
        // fields above.
        [
            Box::new(self.ovs_flows.clone()),
            Box::new(self.arp_cache_available_entries.clone()),
            Box::new(self.pod_ips.clone()),
            Box::new(self.pod_setup_errors.clone()),
            Box::new(self.pod_setup_latency.clone()),
            Box::new(self.pod_teardown_errors.clone()),
            Box::new(self.pod_teardown_latency.clone()),
        ]
    }

    fn register_all(&self, registry: &Registry) -> Result<()> {
        for (added, collector) in self.collectors().into_iter().enumerate() {
            if let Err(e) = registry.register(collector) {
                warn!(
                    "Registering {} failed: {}; rolling back {} instruments",
                    CATALOG[added].full_name(),
                    e,
                    added
                );
                for registered in self.collectors().into_iter().take(added) {
                    if let Err(e) = registry.unregister(registered) {
                        warn!("Failed to roll back registration: {}", e);
                    }
                }
                return Err(e.into());
            }
        }
        info!("Registered {} SDN node metrics", CATALOG.len());
        Ok(())
    }

    pub fn set_ovs_flows(&self, flows: usize) {
        debug!("ovs_flows = {}", flows);
        self.ovs_flows.set(flows as f64);
    }

    pub fn set_arp_cache_available_entries(&self, available: u64) {
        debug!("arp_cache_entries = {}", available);
        self.arp_cache_available_entries.set(available as f64);
    }

    pub fn set_pod_ips(&self, count: usize) {
        debug!("pod_ips = {}", count);
        self.pod_ips.set(count as f64);
    }

    pub fn ovs_flows(&self) -> f64 {
        self.ovs_flows.get()
    }

    pub fn arp_cache_available_entries(&self) -> f64 {
        self.arp_cache_available_entries.get()
    }

    pub fn pod_ips(&self) -> f64 {
        self.pod_ips.get()
    }

    pub fn pod_setup_errors(&self) -> u64 {
        self.pod_setup_errors.get()
    }

    pub fn pod_teardown_errors(&self) -> u64 {
        self.pod_teardown_errors.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<String> = CATALOG.iter().map(|s| s.full_name()).collect();
        assert_eq!(names.len(), CATALOG.len());
        assert!(names.contains("openshift_sdn_ovs_flows"));
        assert!(names.contains("openshift_sdn_arp_cache_entries"));
        assert!(names.contains("openshift_sdn_pod_teardown_latency"));
    }

    #[test]
    fn test_register_twice_is_noop() {
        let metrics = NodeMetrics::new().unwrap();
        let registry = Registry::new();

        metrics.register(&registry).unwrap();
        metrics.register(&registry).unwrap();

        assert!(metrics.is_registered());
        // A second, direct registration proves the first one really happened.
        let err = registry.register(Box::new(metrics.pod_ips.clone()));
        assert!(matches!(err, Err(prometheus::Error::AlreadyReg)));
    }

    #[test]
    fn test_concurrent_register_registers_once() {
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let registry = Registry::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let metrics = metrics.clone();
                let registry = registry.clone();
                thread::spawn(move || metrics.register(&registry))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        metrics.pod_setup_latency.observe(&["ns", "pod", "sb"], 1.0).unwrap();
        metrics.pod_teardown_latency.observe(&["ns", "pod", "sb"], 1.0).unwrap();

        let families = registry.gather();
        assert_eq!(families.len(), CATALOG.len());
    }

    #[test]
    fn test_failed_registration_rolls_back_and_can_retry() {
        let metrics = NodeMetrics::new().unwrap();
        let taken = Registry::new();
        // Same fully qualified name as the pod IP gauge, third in the catalog.
        let squatter = Gauge::with_opts(
            Opts::new(POD_IPS_KEY, "already taken")
                .namespace(SDN_NAMESPACE)
                .subsystem(SDN_SUBSYSTEM),
        )
        .unwrap();
        taken.register(Box::new(squatter)).unwrap();

        let err = metrics.register(&taken).unwrap_err();
        assert!(err.to_string().contains("Metrics error"), "{}", err);
        assert!(!metrics.is_registered());

        // The two instruments registered before the collision were removed.
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&taken.gather())
            .unwrap();
        assert!(!text.contains("openshift_sdn_ovs_flows"), "{}", text);
        assert!(!text.contains("openshift_sdn_arp_cache_entries"), "{}", text);
        assert!(text.contains("# HELP openshift_sdn_pod_ips already taken\n"));

        // The failure is not latched: each call tries again.
        assert!(metrics.register(&taken).is_err());
        assert!(!metrics.is_registered());

        let clean = Registry::new();
        metrics.register(&clean).unwrap();
        assert!(metrics.is_registered());
        metrics.set_ovs_flows(3);
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&clean.gather())
            .unwrap();
        assert!(text.contains("openshift_sdn_ovs_flows 3"));
    }

    #[test]
    fn test_latency_instruments_are_summaries() {
        let metrics = NodeMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();
        metrics.pod_setup_latency.observe(&["default", "web", "sb-1"], 1500.0).unwrap();

        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap();
        assert!(text.contains("# TYPE openshift_sdn_pod_setup_latency summary\n"));
        assert!(text.contains(
            "openshift_sdn_pod_setup_latency{pod_name=\"web\",pod_namespace=\"default\",sandbox_id=\"sb-1\",quantile=\"0.5\"} 1500\n"
        ));
        assert!(text.contains(
            "# HELP openshift_sdn_pod_setup_latency Latency of pod network setup in microseconds\n"
        ));
    }

    #[test]
    fn test_help_text_is_preserved() {
        let metrics = NodeMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();

        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap();
        assert!(text.contains("# HELP openshift_sdn_pod_setup_errors Number pod setup errors\n"));
        assert!(text.contains("# TYPE openshift_sdn_arp_cache_entries gauge\n"));
        assert!(text.contains("# HELP openshift_sdn_pod_ips Number of allocated pod IPs\n"));
    }

    #[test]
    fn test_gauges_default_to_zero() {
        let metrics = NodeMetrics::new().unwrap();
        assert_eq!(metrics.ovs_flows(), 0.0);
        assert_eq!(metrics.arp_cache_available_entries(), 0.0);
        assert_eq!(metrics.pod_ips(), 0.0);
    }
}
