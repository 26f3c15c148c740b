//! Continuation point registry
//!
//! When a history read is cut short by `numValuesPerNode`, the values that
//! did not fit are parked here under a random, opaque [`ContinuationPoint`].
//! The client presents the token on its next call to receive the following
//! page. A token is consumed by exactly one follow-up call.
//!
//! Tokens that are never presented again expire after `idle_timeout_ms`.
//! Expired entries are dropped lazily on lookup, when the registry is full,
//! and by [`ContinuationPointRegistry::sweep_loop_with_shutdown`].
//!
//! # Usage
//! ```ignore
//! let registry = Arc::new(ContinuationPointRegistry::new(ContinuationConfig::default()));
//! let shutdown = Arc::new(Notify::new());
//! tokio::spawn({
//!     let registry = registry.clone();
//!     let shutdown = shutdown.clone();
//!     async move { registry.sweep_loop_with_shutdown(shutdown).await }
//! });
//! ```

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address_space::NodeId;
use crate::config::ContinuationConfig;
use crate::details::ReadRawModifiedDetails;
use crate::status::StatusCode;
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::variant::DataValue;

/// Opaque handle to a suspended history read
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContinuationPoint(Bytes);

impl ContinuationPoint {
    fn generate() -> Self {
        Self(Bytes::copy_from_slice(Uuid::new_v4().as_bytes()))
    }

    /// Wrap bytes received from a client
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ContinuationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationPoint({})", hex::encode(&self.0))
    }
}

impl Serialize for ContinuationPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

/// Identity of one historical data node instance
///
/// Continuation points belong to the binding that issued them, not to its
/// `NodeId`: a node id can be reused after deletion, a binding id never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(Uuid);

impl BindingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct PendingRead {
    issuer: BindingId,
    node_id: NodeId,
    details: ReadRawModifiedDetails,
    remaining: Vec<Arc<DataValue>>,
    last_access_ms: i64,
}

/// A suspended read handed back to its issuing node
#[derive(Debug)]
pub struct ResumedRead {
    pub details: ReadRawModifiedDetails,
    pub remaining: Vec<Arc<DataValue>>,
}

/// Counters for monitoring continuation point usage
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub issued: AtomicU64,
    pub resumed: AtomicU64,
    pub released: AtomicU64,
    pub expired: AtomicU64,
    pub rejected: AtomicU64,
}

impl RegistryStats {
    pub fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            resumed: self.resumed.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatsSnapshot {
    pub issued: u64,
    pub resumed: u64,
    pub released: u64,
    pub expired: u64,
    pub rejected: u64,
}

pub struct ContinuationPointRegistry {
    entries: DashMap<ContinuationPoint, PendingRead>,
    config: ContinuationConfig,
    time: Arc<dyn TimeProvider>,
    stats: RegistryStats,
}

impl fmt::Debug for ContinuationPointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationPointRegistry")
            .field("len", &self.entries.len())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

impl ContinuationPointRegistry {
    pub fn new(config: ContinuationConfig) -> Self {
        Self::with_time_provider(config, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(config: ContinuationConfig, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            time,
            stats: RegistryStats::default(),
        }
    }

    pub fn config(&self) -> &ContinuationConfig {
        &self.config
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Number of live (possibly expired but not yet purged) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, last_access_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(last_access_ms) > self.config.idle_timeout_ms as i64
    }

    /// Park the values left over from a truncated read
    ///
    /// Fails with `BadNoContinuationPoints` when the registry is full even
    /// after dropping expired entries.
    pub fn store(
        &self,
        issuer: BindingId,
        node_id: &NodeId,
        details: &ReadRawModifiedDetails,
        remaining: Vec<Arc<DataValue>>,
    ) -> Result<ContinuationPoint, StatusCode> {
        if self.entries.len() >= self.config.max_continuation_points {
            self.purge_expired();
            if self.entries.len() >= self.config.max_continuation_points {
                warn!(
                    node_id = %node_id,
                    max = self.config.max_continuation_points,
                    "No continuation points available"
                );
                return Err(StatusCode::BAD_NO_CONTINUATION_POINTS);
            }
        }

        let token = ContinuationPoint::generate();
        let pending = remaining.len();
        self.entries.insert(
            token.clone(),
            PendingRead {
                issuer,
                node_id: node_id.clone(),
                details: details.clone(),
                remaining,
                last_access_ms: self.time.now_millis(),
            },
        );
        self.stats.issued.fetch_add(1, Ordering::Relaxed);
        debug!(node_id = %node_id, pending, "Continuation point issued");

        Ok(token)
    }

    /// Consume a continuation point issued by `issuer`
    ///
    /// A token belonging to another binding is left untouched and rejected.
    /// Unknown and expired tokens yield `BadContinuationPointInvalid`.
    pub fn take(
        &self,
        token: &ContinuationPoint,
        issuer: BindingId,
    ) -> Result<ResumedRead, StatusCode> {
        let Some((_, pending)) = self.entries.remove_if(token, |_, p| p.issuer == issuer) else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(%issuer, ?token, "Unknown continuation point presented");
            return Err(StatusCode::BAD_CONTINUATION_POINT_INVALID);
        };

        if self.is_expired(pending.last_access_ms, self.time.now_millis()) {
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            warn!(node_id = %pending.node_id, ?token, "Expired continuation point presented");
            return Err(StatusCode::BAD_CONTINUATION_POINT_INVALID);
        }

        self.stats.resumed.fetch_add(1, Ordering::Relaxed);
        Ok(ResumedRead {
            details: pending.details,
            remaining: pending.remaining,
        })
    }

    /// Drop a continuation point without reading it
    pub fn release(&self, token: &ContinuationPoint) -> bool {
        let released = self.entries.remove(token).is_some();
        if released {
            self.stats.released.fetch_add(1, Ordering::Relaxed);
        }
        released
    }

    /// Drop every continuation point issued by `issuer`
    pub fn release_binding(&self, issuer: BindingId) -> usize {
        let mut released = 0usize;
        self.entries.retain(|_, p| {
            let keep = p.issuer != issuer;
            if !keep {
                released += 1;
            }
            keep
        });
        if released > 0 {
            self.stats
                .released
                .fetch_add(released as u64, Ordering::Relaxed);
            debug!(%issuer, released, "Continuation points released for binding");
        }
        released
    }

    /// Remove entries idle longer than the configured timeout
    pub fn purge_expired(&self) -> usize {
        let now_ms = self.time.now_millis();
        let mut purged = 0usize;
        self.entries.retain(|_, p| {
            let keep = !self.is_expired(p.last_access_ms, now_ms);
            if !keep {
                purged += 1;
            }
            keep
        });
        if purged > 0 {
            self.stats
                .expired
                .fetch_add(purged as u64, Ordering::Relaxed);
            debug!(purged, "Expired continuation points purged");
        }
        purged
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Periodic expiry sweep - runs until shutdown is notified
    pub async fn sweep_loop_with_shutdown(&self, shutdown: Arc<Notify>) {
        let interval = Duration::from_millis(self.config.sweep_interval_ms.max(1));
        info!(?interval, "Continuation point sweeper started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(interval) => {
                    self.purge_expired();
                }
            }
        }

        info!("Continuation point sweeper stopped");
    }
}
