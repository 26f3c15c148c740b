//! Minimal address space hosting historized variables
//!
//! Only the surface the historizing subsystem needs: create variables,
//! install historization on them, push live values, and route history reads.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{HistoricalDataNodeOptions, HistorizingConfig};
use crate::continuation::{ContinuationPoint, ContinuationPointRegistry};
use crate::details::{HistoryReadResult, ReadRawModifiedDetails};
use crate::error::{HistoryError, Result};
use crate::ha_config::{HaConfigurationSource, HA_CONFIGURATION_BROWSE_NAME};
use crate::node::HistoricalDataNode;
use crate::status::StatusCode;
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::traits::HistoryReader;
use crate::variant::{DataType, DataValue, Variant};

/// Namespace index used for allocated node ids
pub const DEFAULT_NAMESPACE: u16 = 1;

const FIRST_ALLOCATED_ID: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={}", self.namespace, v),
            Identifier::String(v) => write!(f, "ns={};s={}", self.namespace, v),
        }
    }
}

/// Parameters for [`AddressSpace::add_variable`]
#[derive(Debug, Clone)]
pub struct VariableDescriptor {
    pub browse_name: String,
    pub data_type: DataType,
    /// Explicit node id; allocated when `None`
    pub node_id: Option<NodeId>,
}

impl VariableDescriptor {
    pub fn new(browse_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            browse_name: browse_name.into(),
            data_type,
            node_id: None,
        }
    }

    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// A data point whose value changes over time
pub struct UaVariable {
    node_id: NodeId,
    browse_name: String,
    data_type: DataType,
    value: RwLock<Option<DataValue>>,
    history: RwLock<Option<Arc<HistoricalDataNode>>>,
    time: Arc<dyn TimeProvider>,
}

impl fmt::Debug for UaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UaVariable")
            .field("node_id", &self.node_id)
            .field("browse_name", &self.browse_name)
            .field("data_type", &self.data_type)
            .field("historizing", &self.is_historizing())
            .finish()
    }
}

impl UaVariable {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn browse_name(&self) -> &str {
        &self.browse_name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_historizing(&self) -> bool {
        self.history.read().is_some()
    }

    /// Current live value, `None` before the first update
    pub fn read_value(&self) -> Option<DataValue> {
        self.value.read().clone()
    }

    pub fn historical_data_node(&self) -> Option<Arc<HistoricalDataNode>> {
        self.history.read().clone()
    }

    /// Read a child of the "HA Configuration" object by name
    pub fn read_ha_attribute(&self, name: &str) -> Result<Variant> {
        let node = self.historical_data_node().ok_or_else(|| {
            HistoryError::NodeNotFound(format!("{}/{}", self.node_id, HA_CONFIGURATION_BROWSE_NAME))
        })?;
        node.read_attribute_by_name(name)
    }

    /// Live update entry point; mirrored into history when installed
    pub fn set_value_from_source(
        &self,
        value: impl Into<Variant>,
        status: StatusCode,
        source_timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let value = value.into();
        if !value.is_empty() && value.data_type() != self.data_type {
            return Err(HistoryError::TypeMismatch {
                expected: self.data_type.to_string(),
                actual: value.data_type().to_string(),
            });
        }

        let data_value =
            DataValue::new(value, status, source_timestamp).with_server_timestamp(self.time.now());

        if let Some(history) = self.historical_data_node() {
            history.record(data_value.clone());
        }
        *self.value.write() = Some(data_value);
        Ok(())
    }

    /// History read on this variable
    ///
    /// Returns `BadHistoryOperationUnsupported` when historization is not
    /// installed.
    pub async fn history_read(
        &self,
        details: &ReadRawModifiedDetails,
        index_range: Option<&str>,
        data_encoding: Option<&str>,
        continuation_point: Option<&ContinuationPoint>,
    ) -> HistoryReadResult {
        let Some(history) = self.historical_data_node() else {
            debug!(node_id = %self.node_id, "History read on non-historizing variable");
            return HistoryReadResult::failed(StatusCode::BAD_HISTORY_OPERATION_UNSUPPORTED);
        };
        history
            .history_read(details, index_range, data_encoding, continuation_point)
            .await
    }
}

pub struct AddressSpace {
    variables: DashMap<NodeId, Arc<UaVariable>>,
    continuation_points: Arc<ContinuationPointRegistry>,
    config: HistorizingConfig,
    time: Arc<dyn TimeProvider>,
    next_id: AtomicU32,
}

impl AddressSpace {
    /// Create an address space, rejecting an invalid configuration
    pub fn new(config: HistorizingConfig) -> Result<Self> {
        Self::with_time_provider(config, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(
        config: HistorizingConfig,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, time))
    }

    fn build(config: HistorizingConfig, time: Arc<dyn TimeProvider>) -> Self {
        let continuation_points = Arc::new(ContinuationPointRegistry::with_time_provider(
            config.continuation.clone(),
            time.clone(),
        ));
        Self {
            variables: DashMap::new(),
            continuation_points,
            config,
            time,
            next_id: AtomicU32::new(FIRST_ALLOCATED_ID),
        }
    }

    pub fn config(&self) -> &HistorizingConfig {
        &self.config
    }

    pub fn continuation_points(&self) -> &Arc<ContinuationPointRegistry> {
        &self.continuation_points
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn add_variable(&self, descriptor: VariableDescriptor) -> Result<Arc<UaVariable>> {
        let node_id = match descriptor.node_id {
            Some(id) => id,
            None => loop {
                let candidate =
                    NodeId::numeric(DEFAULT_NAMESPACE, self.next_id.fetch_add(1, Ordering::Relaxed));
                if !self.variables.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let variable = Arc::new(UaVariable {
            node_id: node_id.clone(),
            browse_name: descriptor.browse_name,
            data_type: descriptor.data_type,
            value: RwLock::new(None),
            history: RwLock::new(None),
            time: self.time.clone(),
        });

        match self.variables.entry(node_id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(HistoryError::DuplicateNode(entry.key().to_string()))
            },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(node_id = %variable.node_id, browse_name = %variable.browse_name, "Variable added");
                entry.insert(variable.clone());
                Ok(variable)
            },
        }
    }

    pub fn find_variable(&self, node_id: &NodeId) -> Option<Arc<UaVariable>> {
        self.variables.get(node_id).map(|v| v.value().clone())
    }

    /// Attach an online archive and its "HA Configuration" to `variable`
    ///
    /// Installing twice on the same variable is an error.
    pub fn install_historical_data_node(
        &self,
        variable: &UaVariable,
        options: Option<HistoricalDataNodeOptions>,
    ) -> Result<Arc<HistoricalDataNode>> {
        let capacity = options
            .unwrap_or_default()
            .resolve_capacity(self.config.max_online_values)?;

        let mut slot = variable.history.write();
        if slot.is_some() {
            return Err(HistoryError::AlreadyInstalled {
                node_id: variable.node_id.to_string(),
            });
        }

        let node = Arc::new(HistoricalDataNode::new(
            variable.node_id.clone(),
            capacity,
            self.continuation_points.clone(),
        ));
        *slot = Some(node.clone());
        Ok(node)
    }

    /// Route a history read to the node it addresses
    pub async fn history_read(
        &self,
        node_id: &NodeId,
        details: &ReadRawModifiedDetails,
        index_range: Option<&str>,
        data_encoding: Option<&str>,
        continuation_point: Option<&ContinuationPoint>,
    ) -> HistoryReadResult {
        let Some(variable) = self.find_variable(node_id) else {
            return HistoryReadResult::failed(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        variable
            .history_read(details, index_range, data_encoding, continuation_point)
            .await
    }

    /// Handle a `releaseContinuationPoints` request
    pub fn release_continuation_point(&self, continuation_point: &ContinuationPoint) -> bool {
        self.continuation_points.release(continuation_point)
    }

    pub fn delete_node(&self, node_id: &NodeId) -> Result<()> {
        let (_, variable) = self
            .variables
            .remove(node_id)
            .ok_or_else(|| HistoryError::NodeNotFound(node_id.to_string()))?;
        if let Some(history) = variable.history.write().take() {
            self.continuation_points.release_binding(history.binding_id());
        }
        debug!(node_id = %node_id, "Variable deleted");
        Ok(())
    }

    /// Tear down every variable and outstanding continuation point
    pub fn dispose(&self) {
        for entry in self.variables.iter() {
            entry.value().history.write().take();
        }
        self.variables.clear();
        self.continuation_points.clear();
        info!("Address space disposed");
    }

    /// Run the continuation point expiry sweep until `shutdown` is notified
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_continuation_sweeper(&self, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let registry = self.continuation_points.clone();
        tokio::spawn(async move { registry.sweep_loop_with_shutdown(shutdown).await })
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::build(HistorizingConfig::default(), Arc::new(SystemTimeProvider))
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("variables", &self.variables.len())
            .field("continuation_points", &self.continuation_points)
            .field("config", &self.config)
            .finish()
    }
}
