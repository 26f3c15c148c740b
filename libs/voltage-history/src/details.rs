//! History read request details and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::continuation::ContinuationPoint;
use crate::status::StatusCode;
use crate::variant::DataValue;

/// Raw (or modified) history read parameters
///
/// `None` for `start_time` / `end_time` leaves that side of the window open.
/// A `num_values_per_node` of 0 means no page limit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRawModifiedDetails {
    #[serde(default)]
    pub is_read_modified: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub num_values_per_node: u32,
    #[serde(default)]
    pub return_bounds: bool,
}

impl ReadRawModifiedDetails {
    pub fn raw(start_time: Option<DateTime<Utc>>, end_time: Option<DateTime<Utc>>) -> Self {
        Self {
            start_time,
            end_time,
            ..Self::default()
        }
    }

    pub fn with_num_values_per_node(mut self, num_values_per_node: u32) -> Self {
        self.num_values_per_node = num_values_per_node;
        self
    }

    pub fn with_return_bounds(mut self, return_bounds: bool) -> Self {
        self.return_bounds = return_bounds;
        self
    }

    pub fn with_read_modified(mut self, is_read_modified: bool) -> Self {
        self.is_read_modified = is_read_modified;
        self
    }

    /// Page size, `None` when unbounded
    pub fn page_size(&self) -> Option<usize> {
        (self.num_values_per_node > 0).then_some(self.num_values_per_node as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    pub data_values: Vec<Arc<DataValue>>,
}

/// Outcome of one history read call for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReadResult {
    pub status_code: StatusCode,
    pub history_data: HistoryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_point: Option<ContinuationPoint>,
}

impl HistoryReadResult {
    pub fn good(data_values: Vec<Arc<DataValue>>) -> Self {
        Self {
            status_code: StatusCode::GOOD,
            history_data: HistoryData { data_values },
            continuation_point: None,
        }
    }

    /// An empty result carrying a failure status
    pub fn failed(status_code: StatusCode) -> Self {
        Self {
            status_code,
            history_data: HistoryData::default(),
            continuation_point: None,
        }
    }

    pub fn with_continuation_point(mut self, continuation_point: ContinuationPoint) -> Self {
        self.continuation_point = Some(continuation_point);
        self
    }

    pub fn data_values(&self) -> &[Arc<DataValue>] {
        &self.history_data.data_values
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_page_size() {
        let details = ReadRawModifiedDetails::raw(None, None);
        assert_eq!(details.page_size(), None);
        assert_eq!(details.with_num_values_per_node(5).page_size(), Some(5));
    }

    #[test]
    fn test_details_deserialize_defaults() {
        let details: ReadRawModifiedDetails =
            serde_json::from_str(r#"{"numValuesPerNode": 10, "returnBounds": true}"#).unwrap();
        assert!(!details.is_read_modified);
        assert!(details.start_time.is_none());
        assert_eq!(details.num_values_per_node, 10);
        assert!(details.return_bounds);
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = HistoryReadResult::failed(StatusCode::BAD_CONTINUATION_POINT_INVALID);
        assert!(result.status_code.is_bad());
        assert!(result.data_values().is_empty());
        assert!(result.continuation_point.is_none());
    }
}
