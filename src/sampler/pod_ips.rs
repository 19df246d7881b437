//! Pod IP allocations recorded by the host-local IPAM plugin.
//!
//! The plugin keeps one file per allocated address, named after the address,
//! next to bookkeeping files such as `lock` and `last_reserved_ip.0`.

use crate::NodeMetricsError;
use std::ffi::OsString;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub enum PodIpScan {
    /// The directory does not exist yet, e.g. no pod has been scheduled.
    Missing,
    /// The directory exists but could not be listed.
    Unlistable(NodeMetricsError),
    Counted(usize),
}

/// Count the names that parse as an IPv4 or IPv6 address.
pub fn count_ip_names<I, S>(names: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    names
        .into_iter()
        .filter(|name| {
            name.as_ref()
                .to_str()
                .is_some_and(|name| name.parse::<IpAddr>().is_ok())
        })
        .count()
}

async fn list_entry_names(dir: &Path) -> io::Result<Vec<OsString>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }
    Ok(names)
}

pub async fn scan_allocations(dir: &Path) -> PodIpScan {
    match list_entry_names(dir).await {
        Ok(names) => {
            let count = count_ip_names(&names);
            debug!(
                "{} of {} entries in {} are pod IPs",
                count,
                names.len(),
                dir.display()
            );
            PodIpScan::Counted(count)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => PodIpScan::Missing,
        Err(e) => PodIpScan::Unlistable(NodeMetricsError::PodIpDirUnreadable(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_count_ip_names() {
        let names = ["10.0.0.1", "10.0.0.2", "lastreserved", "10.0.0.x"];
        assert_eq!(count_ip_names(names), 2);
    }

    #[test]
    fn test_count_ipv6_and_junk() {
        let names = ["fd01::2", "::1", "lock", ".tmp123", "last_reserved_ip.0", ""];
        assert_eq!(count_ip_names(names), 2);
    }

    #[tokio::test]
    async fn test_scan_counts_ip_files() {
        let dir = TempDir::new().unwrap();
        for name in ["10.128.0.5", "10.128.0.6", "fd01::5", "lock", "last_reserved_ip.0"] {
            fs::write(dir.path().join(name), "container-id").unwrap();
        }

        match scan_allocations(dir.path()).await {
            PodIpScan::Counted(count) => assert_eq!(count, 3),
            other => panic!("unexpected scan result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let dir = TempDir::new().unwrap();
        let scan = scan_allocations(&dir.path().join("openshift-sdn")).await;
        assert!(matches!(scan, PodIpScan::Missing));
    }

    #[tokio::test]
    async fn test_scan_file_instead_of_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openshift-sdn");
        fs::write(&path, "").unwrap();

        let scan = scan_allocations(&path).await;
        assert!(matches!(scan, PodIpScan::Unlistable(_)));
    }
}
