//! VoltageEMS Historical Data Access
//!
//! Attaches a bounded in-memory archive to a live data point and answers
//! history-read queries over it.
//!
//! # Key Components
//!
//! - **OnlineArchive**: bounded FIFO buffer of value records for one point
//! - **HistoricalDataNode**: binds a variable's update path to its archive
//!   and exposes the "HA Configuration" attributes
//! - **HistoryReader trait**: async history-read seam for backing stores
//! - **ContinuationPointRegistry**: suspended reads for paginated results
//! - **AddressSpace**: minimal host for historized variables
//!
//! # Example
//! ```
//! use voltage_history::{
//!     AddressSpace, DataType, HistoricalDataNodeOptions, ReadRawModifiedDetails,
//!     StatusCode, VariableDescriptor,
//! };
//!
//! # tokio_test_block(async {
//! let space = AddressSpace::default();
//! let var = space
//!     .add_variable(VariableDescriptor::new("MyVar", DataType::Double))
//!     .unwrap();
//! space
//!     .install_historical_data_node(&var, Some(HistoricalDataNodeOptions::with_max_online_values(3)))
//!     .unwrap();
//!
//! var.set_value_from_source(1.0f64, StatusCode::GOOD, chrono::Utc::now()).unwrap();
//!
//! let result = var
//!     .history_read(&ReadRawModifiedDetails::raw(None, None), None, None, None)
//!     .await;
//! assert_eq!(result.data_values().len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod address_space;
pub mod archive;
pub mod config;
pub mod continuation;
pub mod details;
pub mod error;
pub mod ha_config;
pub mod node;
pub mod query;
pub mod status;
pub mod time;
pub mod traits;
pub mod variant;

// Re-exports
pub use address_space::{AddressSpace, Identifier, NodeId, UaVariable, VariableDescriptor};
pub use archive::{ArchiveStats, OnlineArchive, DEFAULT_MAX_ONLINE_VALUES};
pub use config::{ContinuationConfig, HistoricalDataNodeOptions, HistorizingConfig};
pub use continuation::{
    BindingId, ContinuationPoint, ContinuationPointRegistry, RegistryStats,
    RegistryStatsSnapshot,
};
pub use details::{HistoryData, HistoryReadResult, ReadRawModifiedDetails};
pub use error::{HistoryError, Result};
pub use ha_config::{HaConfigurationAttribute, HaConfigurationSource, HA_CONFIGURATION_BROWSE_NAME};
pub use node::HistoricalDataNode;
pub use status::{StatusCode, StatusSeverity};
pub use time::{FixedTimeProvider, ManualTimeProvider, SystemTimeProvider, TimeProvider};
pub use traits::HistoryReader;
pub use variant::{DataType, DataValue, Variant};

/// Helper functions for common operations
pub mod helpers {
    use super::{AddressSpace, HistorizingConfig, Result};
    use anyhow::Context;
    use std::path::Path;
    use tracing::info;

    /// Load configuration, initialise logging and build an address space
    ///
    /// Logging is only installed if no global subscriber exists yet.
    pub fn bootstrap(config_path: impl AsRef<Path>) -> Result<AddressSpace> {
        let config = HistorizingConfig::load(config_path)?;
        common::logging::init_logging(&config.logging)
            .context("Failed to initialize logging")?;
        info!(
            max_online_values = config.max_online_values,
            idle_timeout_ms = config.continuation.idle_timeout_ms,
            "Historizing subsystem ready"
        );
        AddressSpace::new(config)
    }

    /// Address space with default settings, for unit tests
    pub fn create_test_address_space() -> AddressSpace {
        AddressSpace::default()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bootstrap_reports_logging_failure() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: \"=[invalid\"").unwrap();

        let err = helpers::bootstrap(file.path()).unwrap_err();
        assert!(matches!(err, HistoryError::Other(_)));
        assert!(err.to_string().contains("Failed to initialize logging"));
    }

    #[test]
    fn test_bootstrap_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_online_values: 0").unwrap();

        let err = helpers::bootstrap(file.path()).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidConfig { .. }));
    }
}
