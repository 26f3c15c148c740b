//! Trait definitions for history backing stores

use async_trait::async_trait;

use crate::continuation::ContinuationPoint;
use crate::details::{HistoryReadResult, ReadRawModifiedDetails};

/// History read service for one node
///
/// Implementations:
/// - `HistoricalDataNode`: in-memory online archive, completes without
///   suspending
///
/// Disk- or network-backed stores implement the same trait and may await
/// I/O. Failures are reported through `HistoryReadResult::status_code`,
/// never as a Rust error.
#[async_trait]
pub trait HistoryReader: Send + Sync {
    /// Read raw history, or resume a previous read
    ///
    /// When `continuation_point` is present, `details` is ignored in favour
    /// of the suspended read. `index_range` and `data_encoding` address
    /// sub-values and are passed through uninterpreted.
    async fn history_read(
        &self,
        details: &ReadRawModifiedDetails,
        index_range: Option<&str>,
        data_encoding: Option<&str>,
        continuation_point: Option<&ContinuationPoint>,
    ) -> HistoryReadResult;

    /// Drop a continuation point without reading further
    fn release_continuation_point(&self, continuation_point: &ContinuationPoint) -> bool;
}
