//! Historical data node: binds a live variable to its online archive
//!
//! The node owns the archive exclusively. Live updates are appended under a
//! write lock, queries scan under a read lock, so a reader never observes a
//! half-evicted archive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::address_space::NodeId;
use crate::archive::{ArchiveStats, OnlineArchive};
use crate::continuation::{BindingId, ContinuationPoint, ContinuationPointRegistry};
use crate::details::{HistoryReadResult, ReadRawModifiedDetails};
use crate::ha_config::{HaConfigurationAttribute, HaConfigurationSource};
use crate::query::{select_raw, split_page};
use crate::status::StatusCode;
use crate::traits::HistoryReader;
use crate::variant::{DataValue, Variant};

pub struct HistoricalDataNode {
    node_id: NodeId,
    binding_id: BindingId,
    archive: RwLock<OnlineArchive>,
    continuation_points: Arc<ContinuationPointRegistry>,
    stepped: bool,
}

impl HistoricalDataNode {
    pub fn new(
        node_id: NodeId,
        max_online_values: usize,
        continuation_points: Arc<ContinuationPointRegistry>,
    ) -> Self {
        let binding_id = BindingId::generate();
        info!(node_id = %node_id, %binding_id, max_online_values, "Historical data node installed");
        Self {
            node_id,
            binding_id,
            archive: RwLock::new(OnlineArchive::new(max_online_values)),
            continuation_points,
            stepped: false,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Owner identity of the continuation points this node issues
    pub fn binding_id(&self) -> BindingId {
        self.binding_id
    }

    /// Record a live value change
    pub fn on_value_update(&self, value: Variant, status: StatusCode, source_timestamp: DateTime<Utc>) {
        self.record(DataValue::new(value, status, source_timestamp));
    }

    /// Append a complete data value to the archive
    pub fn record(&self, data_value: DataValue) {
        let evicted = self.archive.write().append(data_value);
        if evicted > 0 {
            debug!(node_id = %self.node_id, evicted, "Oldest history evicted");
        }
    }

    pub fn start_of_online_archive(&self) -> Option<DateTime<Utc>> {
        self.archive.read().start_of_online_archive()
    }

    pub fn max_online_values(&self) -> usize {
        self.archive.read().capacity()
    }

    pub fn archive_stats(&self) -> ArchiveStats {
        self.archive.read().stats()
    }

    /// Current archive contents, oldest first
    pub fn snapshot(&self) -> Vec<Arc<DataValue>> {
        self.archive.read().snapshot()
    }

    /// Deliver the first page of `values`, parking the rest
    fn deliver(&self, details: &ReadRawModifiedDetails, values: Vec<Arc<DataValue>>) -> HistoryReadResult {
        let page = split_page(values, details.page_size());
        if !page.is_truncated() {
            return HistoryReadResult::good(page.values);
        }

        match self
            .continuation_points
            .store(self.binding_id, &self.node_id, details, page.remaining)
        {
            Ok(token) => HistoryReadResult::good(page.values).with_continuation_point(token),
            Err(status) => HistoryReadResult::failed(status),
        }
    }

    fn read_raw(&self, details: &ReadRawModifiedDetails) -> HistoryReadResult {
        if details.is_read_modified {
            // The online archive keeps no modification records
            return HistoryReadResult::good(Vec::new());
        }

        let selected = {
            let archive = self.archive.read();
            select_raw(archive.records(), details)
        };
        debug!(
            node_id = %self.node_id,
            selected = selected.len(),
            page_size = ?details.page_size(),
            "History read"
        );
        self.deliver(details, selected)
    }

    fn resume(&self, token: &ContinuationPoint) -> HistoryReadResult {
        match self.continuation_points.take(token, self.binding_id) {
            Ok(resumed) => self.deliver(&resumed.details, resumed.remaining),
            Err(status) => HistoryReadResult::failed(status),
        }
    }
}

#[async_trait]
impl HistoryReader for HistoricalDataNode {
    async fn history_read(
        &self,
        details: &ReadRawModifiedDetails,
        _index_range: Option<&str>,
        _data_encoding: Option<&str>,
        continuation_point: Option<&ContinuationPoint>,
    ) -> HistoryReadResult {
        match continuation_point {
            Some(token) => self.resume(token),
            None => self.read_raw(details),
        }
    }

    fn release_continuation_point(&self, continuation_point: &ContinuationPoint) -> bool {
        self.continuation_points.release(continuation_point)
    }
}

impl HaConfigurationSource for HistoricalDataNode {
    fn read_attribute(&self, attribute: HaConfigurationAttribute) -> Variant {
        match attribute {
            HaConfigurationAttribute::StartOfOnlineArchive
            | HaConfigurationAttribute::StartOfArchive => self
                .start_of_online_archive()
                .map(Variant::DateTime)
                .unwrap_or_default(),
            HaConfigurationAttribute::Stepped => Variant::Boolean(self.stepped),
            HaConfigurationAttribute::MaxOnlineValues => {
                Variant::UInt32(u32::try_from(self.max_online_values()).unwrap_or(u32::MAX))
            },
        }
    }
}

impl fmt::Debug for HistoricalDataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoricalDataNode")
            .field("node_id", &self.node_id)
            .field("binding_id", &self.binding_id)
            .field("archive", &self.archive.read().stats())
            .finish()
    }
}

impl Drop for HistoricalDataNode {
    fn drop(&mut self) {
        self.continuation_points.release_binding(self.binding_id);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::config::ContinuationConfig;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        base() + Duration::seconds(secs)
    }

    fn node(capacity: usize) -> HistoricalDataNode {
        let registry = Arc::new(ContinuationPointRegistry::new(ContinuationConfig::default()));
        HistoricalDataNode::new(NodeId::numeric(1, 1000), capacity, registry)
    }

    fn fill(node: &HistoricalDataNode, n: i64) {
        for i in 0..n {
            node.on_value_update(Variant::Double(i as f64), StatusCode::GOOD, at(i));
        }
    }

    #[tokio::test]
    async fn test_read_empty_archive() {
        let node = node(10);
        let details = ReadRawModifiedDetails::raw(None, None).with_return_bounds(true);
        let result = node.history_read(&details, None, None, None).await;
        assert_eq!(result.status_code, StatusCode::GOOD);
        assert!(result.data_values().is_empty());
        assert!(result.continuation_point.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_has_no_continuation() {
        let node = node(10);
        fill(&node, 4);
        let details = ReadRawModifiedDetails::raw(None, None).with_num_values_per_node(4);
        let result = node.history_read(&details, None, None, None).await;
        assert_eq!(result.data_values().len(), 4);
        assert!(result.continuation_point.is_none());
    }

    #[tokio::test]
    async fn test_paged_read_resumes() {
        let node = node(10);
        fill(&node, 5);
        let details = ReadRawModifiedDetails::raw(None, None).with_num_values_per_node(2);

        let first = node.history_read(&details, None, None, None).await;
        assert_eq!(first.data_values().len(), 2);
        let token = first.continuation_point.clone().unwrap();

        // details are ignored when resuming
        let ignored = ReadRawModifiedDetails::raw(Some(at(100)), None);
        let second = node.history_read(&ignored, None, None, Some(&token)).await;
        assert_eq!(second.data_values().len(), 2);
        assert_eq!(second.data_values()[0].source_timestamp, at(2));

        let third = node
            .history_read(&ignored, None, None, second.continuation_point.as_ref())
            .await;
        assert_eq!(third.data_values().len(), 1);
        assert!(third.continuation_point.is_none());

        // first token was consumed
        let reused = node.history_read(&details, None, None, Some(&token)).await;
        assert_eq!(reused.status_code, StatusCode::BAD_CONTINUATION_POINT_INVALID);
        assert!(reused.data_values().is_empty());
    }

    #[tokio::test]
    async fn test_read_modified_is_empty() {
        let node = node(10);
        fill(&node, 3);
        let details = ReadRawModifiedDetails::raw(None, None).with_read_modified(true);
        let result = node.history_read(&details, None, None, None).await;
        assert_eq!(result.status_code, StatusCode::GOOD);
        assert!(result.data_values().is_empty());
    }

    #[tokio::test]
    async fn test_release_continuation_point() {
        let node = node(10);
        fill(&node, 3);
        let details = ReadRawModifiedDetails::raw(None, None).with_num_values_per_node(1);
        let result = node.history_read(&details, None, None, None).await;
        let token = result.continuation_point.unwrap();

        assert!(node.release_continuation_point(&token));
        let resumed = node.history_read(&details, None, None, Some(&token)).await;
        assert!(resumed.status_code.is_bad());
    }

    #[test]
    fn test_ha_configuration_attributes() {
        let node = node(3);
        assert_eq!(
            node.read_attribute(HaConfigurationAttribute::StartOfOnlineArchive),
            Variant::Empty
        );
        assert_eq!(node.read_attribute(HaConfigurationAttribute::Stepped), Variant::Boolean(false));
        assert_eq!(
            node.read_attribute(HaConfigurationAttribute::MaxOnlineValues),
            Variant::UInt32(3)
        );

        fill(&node, 5);
        assert_eq!(
            node.read_attribute_by_name("startOfOnlineArchive").unwrap(),
            Variant::DateTime(at(2))
        );
        assert_eq!(
            node.read_attribute(HaConfigurationAttribute::StartOfArchive),
            Variant::DateTime(at(2))
        );
        assert_eq!(node.browse_name(), "HA Configuration");
    }

    #[test]
    fn test_drop_releases_continuation_points() {
        let registry = Arc::new(ContinuationPointRegistry::new(ContinuationConfig::default()));
        let node = HistoricalDataNode::new(NodeId::numeric(1, 7), 10, registry.clone());
        registry
            .store(
                node.binding_id(),
                node.node_id(),
                &ReadRawModifiedDetails::default(),
                node.snapshot(),
            )
            .unwrap();
        assert_eq!(registry.len(), 1);

        drop(node);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_debug_names_node() {
        let node = node(4);
        fill(&node, 2);
        let text = format!("{:?}", node);
        assert!(text.contains("HistoricalDataNode"));
        assert!(text.contains("Numeric(1000)"));
        assert!(text.contains("len: 2"));
    }

    #[tokio::test]
    async fn test_same_node_id_bindings_do_not_share_tokens() {
        let registry = Arc::new(ContinuationPointRegistry::new(ContinuationConfig::default()));
        let first = HistoricalDataNode::new(NodeId::numeric(1, 7), 10, registry.clone());
        let second = HistoricalDataNode::new(NodeId::numeric(1, 7), 10, registry.clone());
        assert_ne!(first.binding_id(), second.binding_id());
        fill(&second, 3);

        let details = ReadRawModifiedDetails::raw(None, None).with_num_values_per_node(1);
        let issued = second.history_read(&details, None, None, None).await;
        let token = issued.continuation_point.clone().unwrap();

        let stolen = first.history_read(&details, None, None, Some(&token)).await;
        assert_eq!(stolen.status_code, StatusCode::BAD_CONTINUATION_POINT_INVALID);

        drop(first);
        let resumed = second.history_read(&details, None, None, Some(&token)).await;
        assert_eq!(resumed.status_code, StatusCode::GOOD);
        assert_eq!(resumed.data_values()[0].source_timestamp, at(1));
    }
}
