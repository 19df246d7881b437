use crate::{NodeMetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ARP_TABLE_PATH: &str = "/proc/net/arp";
// gc_thresh2 isn't the hard limit, but it is where neighbor garbage
// collection (and thus trouble) starts.
pub const DEFAULT_GC_THRESH_PATH: &str = "/proc/sys/net/ipv4/neigh/default/gc_thresh2";
pub const DEFAULT_POD_IP_DIR: &str = "/var/lib/cni/networks/openshift-sdn/";
pub const DEFAULT_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_SAMPLE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OvsConfig {
    pub ofctl_path: PathBuf,
    pub bridge: String,
    pub protocol: String,
}

impl Default for OvsConfig {
    fn default() -> Self {
        Self {
            ofctl_path: PathBuf::from("ovs-ofctl"),
            bridge: "br0".to_string(),
            protocol: "OpenFlow13".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    pub arp_table_path: PathBuf,
    pub gc_thresh_path: PathBuf,
    pub pod_ip_dir: PathBuf,
    pub interval_secs: u64,
    pub sample_timeout_secs: u64,
    pub ovs: OvsConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            arp_table_path: PathBuf::from(DEFAULT_ARP_TABLE_PATH),
            gc_thresh_path: PathBuf::from(DEFAULT_GC_THRESH_PATH),
            pod_ip_dir: PathBuf::from(DEFAULT_POD_IP_DIR),
            interval_secs: DEFAULT_INTERVAL_SECS,
            sample_timeout_secs: DEFAULT_SAMPLE_TIMEOUT_SECS,
            ovs: OvsConfig::default(),
        }
    }
}

impl SamplerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading sampler config from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|e| {
            NodeMetricsError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| NodeMetricsError::ConfigError(format!("Invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(NodeMetricsError::ConfigError(
                "interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.sample_timeout_secs == 0 {
            return Err(NodeMetricsError::ConfigError(
                "sample_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.ovs.bridge.is_empty() {
            return Err(NodeMetricsError::ConfigError(
                "ovs.bridge must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_secs)
    }
}
