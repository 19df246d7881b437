//! Periodic sampling of switch, neighbor-cache and pod IP state.
//!
//! Each source is sampled on its own: a failure or timeout in one is handed
//! to the [`ErrorSink`] and never stops the others. Sources that are simply
//! not present on this host are skipped without reporting anything.

pub mod arp;
pub mod ovs;
pub mod pod_ips;
pub mod sink;

pub use ovs::{FlowSource, OvsOfctl};
pub use sink::{ErrorSink, LogErrorSink};

use crate::config::SamplerConfig;
use crate::metrics::NodeMetrics;
use crate::{NodeMetricsError, Result};
use pod_ips::PodIpScan;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What a single sub-sample did to its gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "lowercase")]
pub enum SampleOutcome {
    /// The gauge was set to this value.
    Updated(f64),
    /// The source is not present on this host; the gauge was left alone.
    Skipped,
    /// An error was reported; the gauge keeps its previous value.
    Failed,
}

impl SampleOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, SampleOutcome::Updated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleReport {
    pub ovs_flows: SampleOutcome,
    pub arp_cache_entries: SampleOutcome,
    pub pod_ips: SampleOutcome,
}

pub struct Sampler {
    metrics: Arc<NodeMetrics>,
    flows: Arc<dyn FlowSource>,
    sink: Arc<dyn ErrorSink>,
    arp_table_path: PathBuf,
    gc_thresh_path: PathBuf,
    pod_ip_dir: PathBuf,
    timeout: Duration,
}

impl Sampler {
    pub fn new(
        metrics: Arc<NodeMetrics>,
        flows: Arc<dyn FlowSource>,
        sink: Arc<dyn ErrorSink>,
        config: &SamplerConfig,
    ) -> Self {
        Self {
            metrics,
            flows,
            sink,
            arp_table_path: config.arp_table_path.clone(),
            gc_thresh_path: config.gc_thresh_path.clone(),
            pod_ip_dir: config.pod_ip_dir.clone(),
            timeout: config.sample_timeout(),
        }
    }

    /// Refresh every gauge once. Safe to call on a fixed interval forever.
    pub async fn gather_periodic_metrics(&self) -> SampleReport {
        let (ovs_flows, arp_cache_entries, pod_ips) = futures::join!(
            self.update_ovs_metrics(),
            self.update_arp_metrics(),
            self.update_pod_ip_metrics(),
        );

        let report = SampleReport {
            ovs_flows,
            arp_cache_entries,
            pod_ips,
        };
        debug!("Sample pass finished: {:?}", report);
        report
    }

    pub async fn update_ovs_metrics(&self) -> SampleOutcome {
        match self.bounded("OVS flow", self.flows.dump_flows()).await {
            Ok(flows) => {
                self.metrics.set_ovs_flows(flows.len());
                SampleOutcome::Updated(flows.len() as f64)
            }
            Err(e) => self.report(e),
        }
    }

    pub async fn update_arp_metrics(&self) -> SampleOutcome {
        let read = arp::read_available_entries(&self.arp_table_path, &self.gc_thresh_path);
        match self.bounded("ARP cache", read).await {
            Ok(Some(available)) => {
                self.metrics.set_arp_cache_available_entries(available);
                SampleOutcome::Updated(available as f64)
            }
            Ok(None) => SampleOutcome::Skipped,
            Err(e) => self.report(e),
        }
    }

    pub async fn update_pod_ip_metrics(&self) -> SampleOutcome {
        let scan = self.bounded("pod IP", async {
            Ok::<_, NodeMetricsError>(pod_ips::scan_allocations(&self.pod_ip_dir).await)
        });

        let count = match scan.await {
            Ok(PodIpScan::Counted(count)) => count,
            Ok(PodIpScan::Missing) => return SampleOutcome::Skipped,
            // An unlistable directory counts as an empty one.
            Ok(PodIpScan::Unlistable(e)) => {
                self.sink.handle_error(&e);
                0
            }
            Err(e) => return self.report(e),
        };

        self.metrics.set_pod_ips(count);
        SampleOutcome::Updated(count as f64)
    }

    async fn bounded<T, F>(&self, source_name: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(NodeMetricsError::SampleTimedOut {
                source_name,
                timeout: self.timeout,
            }),
        }
    }

    fn report(&self, err: NodeMetricsError) -> SampleOutcome {
        self.sink.handle_error(&err);
        SampleOutcome::Failed
    }
}
