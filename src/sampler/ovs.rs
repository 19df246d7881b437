use crate::config::OvsConfig;
use crate::{NodeMetricsError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Anything that can enumerate the flow entries of the node's switch.
#[async_trait]
pub trait FlowSource: Send + Sync {
    async fn dump_flows(&self) -> Result<Vec<String>>;
}

/// Flow entries in `ovs-ofctl dump-flows` output; the reply header and
/// blank lines carry no `cookie=` field.
pub fn parse_flow_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("cookie="))
        .map(|line| line.trim().to_string())
        .collect()
}

/// Dumps flows by shelling out to `ovs-ofctl`.
pub struct OvsOfctl {
    ofctl_path: PathBuf,
    bridge: String,
    protocol: String,
}

impl OvsOfctl {
    pub fn new(config: &OvsConfig) -> Self {
        Self {
            ofctl_path: config.ofctl_path.clone(),
            bridge: config.bridge.clone(),
            protocol: config.protocol.clone(),
        }
    }
}

#[async_trait]
impl FlowSource for OvsOfctl {
    async fn dump_flows(&self) -> Result<Vec<String>> {
        debug!(
            "Running {} -O {} dump-flows {}",
            self.ofctl_path.display(),
            self.protocol,
            self.bridge
        );

        let output = Command::new(&self.ofctl_path)
            .arg("-O")
            .arg(&self.protocol)
            .arg("dump-flows")
            .arg(&self.bridge)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                NodeMetricsError::FlowDumpFailed(format!(
                    "failed to run {}: {}",
                    self.ofctl_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(NodeMetricsError::FlowDumpFailed(format!(
                "{} exited with {}: {}",
                self.ofctl_path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_flow_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}
