//! History query engine
//!
//! Turns a time window into an ordered selection of archive records and
//! splits that selection into pages.
//!
//! # Window rules
//! - A record is in the window when `start_time <= source_timestamp <= end_time`.
//!   An absent bound leaves that side open.
//! - `start_time > end_time` gives an empty window. Bound records are still
//!   looked up relative to each edge.
//! - With `return_bounds`, the last record before `start_time` and the first
//!   record after `end_time` are added when they exist.
//! - Output is always in archive (chronological) order.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::details::ReadRawModifiedDetails;
use crate::variant::DataValue;

/// Select the records a raw read returns, before pagination
pub fn select_raw(
    records: &VecDeque<Arc<DataValue>>,
    details: &ReadRawModifiedDetails,
) -> Vec<Arc<DataValue>> {
    let len = records.len();
    if len == 0 {
        return Vec::new();
    }

    // lo: first index with ts >= start, hi: first index with ts > end
    let lo = match details.start_time {
        Some(start) => records.partition_point(|r| r.source_timestamp < start),
        None => 0,
    };
    let hi = match details.end_time {
        Some(end) => records.partition_point(|r| r.source_timestamp <= end),
        None => len,
    };

    let lower_bound = if details.return_bounds && lo > 0 {
        Some(lo - 1)
    } else {
        None
    };
    let upper_bound = if details.return_bounds && hi < len {
        Some(hi)
    } else {
        None
    };

    if lo <= hi {
        let mut selected = Vec::with_capacity(hi - lo + 2);
        if let Some(i) = lower_bound {
            selected.push(records[i].clone());
        }
        selected.extend(records.range(lo..hi).cloned());
        if let Some(i) = upper_bound {
            selected.push(records[i].clone());
        }
        return selected;
    }

    // Inverted window: nothing in range, upper bound index <= lower bound index
    let mut bounds: Vec<usize> = upper_bound.into_iter().chain(lower_bound).collect();
    bounds.sort_unstable();
    bounds.dedup();
    bounds.into_iter().map(|i| records[i].clone()).collect()
}

/// One page of a selection plus what is left for continuation
#[derive(Debug, Default)]
pub struct Page {
    pub values: Vec<Arc<DataValue>>,
    pub remaining: Vec<Arc<DataValue>>,
}

impl Page {
    /// True when more values remain than fit in this page
    pub fn is_truncated(&self) -> bool {
        !self.remaining.is_empty()
    }
}

/// Split `values` after `page_size` entries
///
/// An exact fit is not a truncation: `remaining` stays empty.
pub fn split_page(mut values: Vec<Arc<DataValue>>, page_size: Option<usize>) -> Page {
    match page_size {
        Some(size) if values.len() > size => {
            let remaining = values.split_off(size);
            Page { values, remaining }
        },
        _ => Page {
            values,
            remaining: Vec::new(),
        },
    }
}
