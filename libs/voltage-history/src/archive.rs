//! Bounded in-memory online archive
//!
//! An [`OnlineArchive`] keeps the most recent `capacity` value records of
//! one data point in insertion order. When an append pushes it over
//! capacity, records are evicted from the front (oldest first).
//!
//! Callers are expected to append with non-decreasing source timestamps.
//! Out-of-order appends are accepted and logged; range queries over such
//! records have undefined ordering.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::variant::DataValue;

/// Default capacity when an install does not configure `max_online_values`
pub const DEFAULT_MAX_ONLINE_VALUES: usize = 100_000;

#[derive(Debug)]
pub struct OnlineArchive {
    capacity: usize,
    records: VecDeque<Arc<DataValue>>,
    appended: u64,
    evicted: u64,
    out_of_order: u64,
}

/// Statistics about an online archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub len: usize,
    pub capacity: usize,
    pub appended: u64,
    pub evicted: u64,
    pub out_of_order: u64,
}

impl OnlineArchive {
    /// Create an empty archive
    ///
    /// A zero capacity retains nothing. Bindings never get one:
    /// [`HistoricalDataNodeOptions::resolve_capacity`](crate::HistoricalDataNodeOptions::resolve_capacity)
    /// rejects it at install time.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // Don't preallocate the "effectively unbounded" default
            records: VecDeque::with_capacity(capacity.min(1024)),
            appended: 0,
            evicted: 0,
            out_of_order: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, evicting the oldest ones while over capacity
    ///
    /// Returns the number of evicted records.
    pub fn append(&mut self, record: DataValue) -> usize {
        if let Some(last) = self.records.back() {
            if record.source_timestamp < last.source_timestamp {
                self.out_of_order += 1;
                warn!(
                    source_timestamp = %record.source_timestamp,
                    last_timestamp = %last.source_timestamp,
                    "Out-of-order source timestamp appended to online archive"
                );
            }
        }

        self.records.push_back(Arc::new(record));
        self.appended += 1;

        let mut evicted = 0;
        while self.records.len() > self.capacity {
            self.records.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            self.evicted += evicted as u64;
            debug!(
                evicted,
                capacity = self.capacity,
                start = ?self.start_of_online_archive(),
                "Online archive trimmed"
            );
        }

        evicted
    }

    /// Cheap copy of the current record sequence (records are shared)
    pub fn snapshot(&self) -> Vec<Arc<DataValue>> {
        self.records.iter().cloned().collect()
    }

    /// Borrow the ordered records for in-place scanning
    pub fn records(&self) -> &VecDeque<Arc<DataValue>> {
        &self.records
    }

    /// Source timestamp of the oldest retained record, `None` when empty
    pub fn start_of_online_archive(&self) -> Option<DateTime<Utc>> {
        self.records.front().map(|r| r.source_timestamp)
    }

    /// Source timestamp of the newest retained record, `None` when empty
    pub fn end_of_online_archive(&self) -> Option<DateTime<Utc>> {
        self.records.back().map(|r| r.source_timestamp)
    }

    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats {
            len: self.records.len(),
            capacity: self.capacity,
            appended: self.appended,
            evicted: self.evicted,
            out_of_order: self.out_of_order,
        }
    }
}

impl Default for OnlineArchive {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ONLINE_VALUES)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use crate::variant::Variant;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn record(offset_secs: i64) -> DataValue {
        DataValue::new(
            Variant::Double(offset_secs as f64),
            StatusCode::GOOD,
            base() + Duration::seconds(offset_secs),
        )
    }

    #[test]
    fn test_empty_archive() {
        let archive = OnlineArchive::new(10);
        assert!(archive.is_empty());
        assert_eq!(archive.start_of_online_archive(), None);
        assert_eq!(archive.end_of_online_archive(), None);
        assert!(archive.snapshot().is_empty());
    }

    #[test]
    fn test_fifo_eviction_keeps_latest() {
        let mut archive = OnlineArchive::new(3);
        let expected_start = [0, 0, 0, 1, 2];

        for (i, start) in expected_start.iter().enumerate() {
            archive.append(record(i as i64));
            assert!(archive.len() <= 3);
            assert_eq!(
                archive.start_of_online_archive(),
                Some(base() + Duration::seconds(*start))
            );
        }

        let kept: Vec<_> = archive
            .snapshot()
            .iter()
            .map(|r| r.value.as_f64().unwrap())
            .collect();
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_append_reports_evictions() {
        let mut archive = OnlineArchive::new(2);
        assert_eq!(archive.append(record(0)), 0);
        assert_eq!(archive.append(record(1)), 0);
        assert_eq!(archive.append(record(2)), 1);

        let stats = archive.stats();
        assert_eq!(stats.appended, 3);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut archive = OnlineArchive::new(0);
        assert_eq!(archive.append(record(0)), 1);
        assert_eq!(archive.capacity(), 0);
        assert!(archive.is_empty());
        assert_eq!(archive.start_of_online_archive(), None);
    }

    #[test]
    fn test_out_of_order_append_is_accepted() {
        let mut archive = OnlineArchive::new(10);
        archive.append(record(5));
        archive.append(record(1));
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.stats().out_of_order, 1);
    }

    #[test]
    fn test_snapshot_shares_records() {
        let mut archive = OnlineArchive::new(10);
        archive.append(record(0));
        let first = archive.snapshot();
        let second = archive.snapshot();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }
}
