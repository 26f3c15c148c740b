//! End-to-end history reads through the address space

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Arc;
use tracing_test::traced_test;
use voltage_history::{
    AddressSpace, DataType, HistoricalDataNodeOptions, HistoryError, HistoryReader, NodeId,
    ReadRawModifiedDetails, StatusCode, UaVariable, VariableDescriptor, Variant,
};

fn today() -> DateTime<Utc> {
    Utc::now().duration_trunc(Duration::days(1)).unwrap()
}

fn plus(secs: i64) -> DateTime<Utc> {
    today() + Duration::seconds(secs)
}

fn historized(space: &AddressSpace, max_online_values: Option<usize>) -> Arc<UaVariable> {
    let var = space
        .add_variable(VariableDescriptor::new("MyVar", DataType::Double))
        .unwrap();
    space
        .install_historical_data_node(
            &var,
            max_online_values.map(HistoricalDataNodeOptions::with_max_online_values),
        )
        .unwrap();
    var
}

#[tokio::test]
async fn test_window_read_returns_all_values_in_order() {
    let space = AddressSpace::default();
    let var = historized(&space, None);

    for i in 0..=6 {
        var.set_value_from_source(i as f64, StatusCode::GOOD, plus(i))
            .unwrap();
    }

    let details = ReadRawModifiedDetails::raw(Some(plus(-10)), Some(plus(10)))
        .with_num_values_per_node(1000)
        .with_return_bounds(false);
    let result = space
        .history_read(var.node_id(), &details, None, None, None)
        .await;

    assert_eq!(result.status_code, StatusCode::GOOD);
    assert!(result.continuation_point.is_none());
    let values: Vec<f64> = result
        .data_values()
        .iter()
        .map(|dv| dv.value.as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[tokio::test]
async fn test_capacity_three_slides_start_of_online_archive() {
    let space = AddressSpace::default();
    let var = historized(&space, Some(3));

    let expected_start = [0, 0, 0, 1, 2];
    for (i, start) in expected_start.iter().enumerate() {
        var.set_value_from_source(i as f64, StatusCode::GOOD, plus(i as i64))
            .unwrap();
        assert_eq!(
            var.read_ha_attribute("startOfOnlineArchive").unwrap(),
            Variant::DateTime(plus(*start)),
            "after insert {}",
            i
        );
    }

    let details = ReadRawModifiedDetails::raw(Some(plus(-10)), Some(plus(10)));
    let result = var.history_read(&details, None, None, None).await;
    let timestamps: Vec<_> = result
        .data_values()
        .iter()
        .map(|dv| dv.source_timestamp)
        .collect();
    assert_eq!(timestamps, vec![plus(2), plus(3), plus(4)]);
}

#[tokio::test]
async fn test_bounds_outside_window() {
    let space = AddressSpace::default();
    let var = historized(&space, None);
    for i in 0..10 {
        var.set_value_from_source(i as f64, StatusCode::GOOD, plus(i))
            .unwrap();
    }

    let details =
        ReadRawModifiedDetails::raw(Some(plus(3)), Some(plus(5))).with_return_bounds(true);
    let result = var.history_read(&details, None, None, None).await;
    let timestamps: Vec<_> = result
        .data_values()
        .iter()
        .map(|dv| dv.source_timestamp)
        .collect();
    assert_eq!(timestamps, vec![plus(2), plus(3), plus(4), plus(5), plus(6)]);
}

#[tokio::test]
async fn test_non_historizing_variable_is_unsupported() {
    let space = AddressSpace::default();
    let var = space
        .add_variable(VariableDescriptor::new("Plain", DataType::Int32))
        .unwrap();
    var.set_value_from_source(5i32, StatusCode::GOOD, plus(0)).unwrap();

    let result = var
        .history_read(&ReadRawModifiedDetails::default(), None, None, None)
        .await;
    assert_eq!(
        result.status_code,
        StatusCode::BAD_HISTORY_OPERATION_UNSUPPORTED
    );
    assert!(matches!(
        var.read_ha_attribute("startOfOnlineArchive"),
        Err(HistoryError::NodeNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_node_id() {
    let space = AddressSpace::default();
    let result = space
        .history_read(
            &NodeId::string(1, "missing"),
            &ReadRawModifiedDetails::default(),
            None,
            None,
            None,
        )
        .await;
    assert_eq!(result.status_code, StatusCode::BAD_NODE_ID_UNKNOWN);
}

#[tokio::test]
async fn test_bad_status_values_are_archived() {
    let space = AddressSpace::default();
    let var = historized(&space, None);
    var.set_value_from_source(1.0f64, StatusCode::GOOD, plus(0))
        .unwrap();
    var.set_value_from_source(Variant::Empty, StatusCode::BAD_SENSOR_FAILURE, plus(1))
        .unwrap();

    let node = var.historical_data_node().unwrap();
    let result = node
        .history_read(&ReadRawModifiedDetails::default(), None, None, None)
        .await;
    assert_eq!(result.data_values().len(), 2);
    assert_eq!(
        result.data_values()[1].status,
        StatusCode::BAD_SENSOR_FAILURE
    );
    assert!(result.data_values()[1].value.is_empty());
}

#[test]
fn test_type_mismatch_is_rejected_before_archiving() {
    let space = AddressSpace::default();
    let var = historized(&space, None);

    let err = var
        .set_value_from_source("text", StatusCode::GOOD, plus(0))
        .unwrap_err();
    assert!(matches!(err, HistoryError::TypeMismatch { .. }));
    assert!(var.read_value().is_none());
    assert!(var.historical_data_node().unwrap().snapshot().is_empty());
}

#[test]
fn test_second_install_fails() {
    let space = AddressSpace::default();
    let var = historized(&space, None);
    let err = space
        .install_historical_data_node(&var, None)
        .unwrap_err();
    assert!(matches!(err, HistoryError::AlreadyInstalled { .. }));
}

#[test]
#[traced_test]
fn test_out_of_order_insert_is_accepted_with_warning() {
    let space = AddressSpace::default();
    let var = historized(&space, None);
    var.set_value_from_source(1.0f64, StatusCode::GOOD, plus(5))
        .unwrap();
    var.set_value_from_source(2.0f64, StatusCode::GOOD, plus(1))
        .unwrap();

    let node = var.historical_data_node().unwrap();
    assert_eq!(node.snapshot().len(), 2);
    assert_eq!(node.archive_stats().out_of_order, 1);
    assert!(logs_contain("Out-of-order source timestamp"));
}
