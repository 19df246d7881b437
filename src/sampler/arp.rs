//! Kernel neighbor (ARP) cache headroom.
//!
//! `/proc/net/arp` lists one neighbor per line after a header line. The
//! headroom is how many entries can still be added before the kernel starts
//! garbage collecting, i.e. `gc_thresh2 - used`, never below zero.

use crate::{NodeMetricsError, Result};
use std::io;
use std::path::Path;
use tracing::debug;

/// Number of neighbor entries in a `/proc/net/arp` listing.
pub fn count_neighbor_entries(table: &str) -> u64 {
    // Skip the header line
    table.lines().count().saturating_sub(1) as u64
}

pub fn parse_gc_threshold(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|source| NodeMetricsError::ArpThresholdInvalid {
            value: raw.to_string(),
            source,
        })
}

/// Free neighbor-cache slots, clamped at zero.
pub fn available_entries(used: u64, threshold: i64) -> u64 {
    let used = i64::try_from(used).unwrap_or(i64::MAX);
    threshold.saturating_sub(used).max(0) as u64
}

/// Read both kernel sources and compute the available entries.
///
/// Returns `Ok(None)` when the threshold file does not exist, which is the
/// normal state on hosts where the neighbor gc knobs are not exposed.
pub async fn read_available_entries(arp_table: &Path, gc_thresh: &Path) -> Result<Option<u64>> {
    let table = tokio::fs::read_to_string(arp_table)
        .await
        .map_err(NodeMetricsError::ArpTableUnreadable)?;
    let used = count_neighbor_entries(&table);

    let raw = match tokio::fs::read_to_string(gc_thresh).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist, skipping ARP metrics", gc_thresh.display());
            return Ok(None);
        }
        Err(e) => return Err(NodeMetricsError::ArpThresholdUnreadable(e)),
    };
    let threshold = parse_gc_threshold(&raw)?;

    debug!("ARP cache: {} used, gc_thresh2 {}", used, threshold);
    Ok(Some(available_entries(used, threshold)))
}
