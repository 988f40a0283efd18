use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use stripchart_rs::GraphError;
use stripchart_rs::core::{ColumnType, ManualClock, StoreConfig, TimeSeriesStore, Value};

fn timestamps_from_newest(store: &TimeSeriesStore) -> Vec<f64> {
    let Some(cursor) = store.cursor_at_row(0) else {
        return Vec::new();
    };
    store.rows(cursor).map(|(timestamp, _)| timestamp).collect()
}

proptest! {
    #[test]
    fn wraparound_keeps_most_recent_rows_newest_first(capacity in 1usize..48, extra in 1usize..96) {
        let store = TimeSeriesStore::with_capacity(&[ColumnType::Int64], capacity).expect("store");
        let total = capacity + extra;
        for row in 1..=total {
            let cursor = store.append_at(row as f64);
            store.set(cursor, 0, row as i64).expect("set");
        }

        let mut cursor = store.cursor_at_row(0).expect("newest row");
        let mut seen = Vec::new();
        loop {
            let timestamp = store.timestamp(cursor).expect("timestamp");
            let value = store.get(cursor, 0).expect("value");
            prop_assert_eq!(value, Value::Int64(timestamp as i64));
            seen.push(timestamp);
            if !store.cursor_advance(&mut cursor) {
                break;
            }
        }

        let expected = (total - capacity + 1..=total).rev().map(|row| row as f64).collect::<Vec<_>>();
        prop_assert_eq!(seen, expected);
        prop_assert_eq!(store.len(), capacity);
    }
}

#[test]
fn every_column_type_keeps_its_values() {
    let store = TimeSeriesStore::with_capacity(&ColumnType::ALL, 4).expect("store");
    let samples = [
        [
            Value::Int32(i32::MIN),
            Value::UInt32(u32::MAX),
            Value::Int64(i64::MIN),
            Value::UInt64(u64::MAX),
            Value::Float(-3.25),
            Value::Double(f64::MAX),
        ],
        [
            Value::Int32(0),
            Value::UInt32(0),
            Value::Int64(-1),
            Value::UInt64(1),
            Value::Float(f32::MIN_POSITIVE),
            Value::Double(-1.0e-300),
        ],
    ];

    for (index, row) in samples.iter().enumerate() {
        let cursor = store.append_at(10.0 + index as f64);
        let values = row.iter().copied().enumerate().collect::<Vec<_>>();
        store.set_many(cursor, &values).expect("set many");
        for (column, expected) in row.iter().enumerate() {
            assert_eq!(store.get(cursor, column).expect("get"), *expected);
        }
    }

    let oldest = store.cursor_at_row(1).expect("older row");
    assert_eq!(store.get(oldest, 3).expect("get"), Value::UInt64(u64::MAX));
    assert_relative_eq!(store.get_f64(oldest, 4).expect("widen"), -3.25);
}

#[test]
fn range_cursor_includes_both_ends() {
    let store = TimeSeriesStore::with_capacity(&[ColumnType::Double], 16).expect("store");
    for ts in 0..10 {
        let cursor = store.append_at(100.0 + f64::from(ts));
        store.set(cursor, 0, f64::from(ts)).expect("set");
    }

    let cursor = store.cursor_for_range(103.0, 107.0, 0.0).expect("range");
    let timestamps = store.rows(cursor).map(|(ts, _)| ts).collect::<Vec<_>>();
    assert_eq!(timestamps, vec![107.0, 106.0, 105.0, 104.0, 103.0]);

    assert!(store.cursor_for_range(107.0, 103.0, 0.0).is_none());
    assert!(store.cursor_for_range(200.0, 300.0, 0.0).is_none());
    assert!(store.cursor_for_range(0.0, 50.0, 0.0).is_none());
}

#[test]
fn aggregate_interval_does_not_downsample() {
    let store = TimeSeriesStore::with_capacity(&[ColumnType::Double], 32).expect("store");
    for ts in 1..=20 {
        store.append_at(f64::from(ts));
    }
    let cursor = store.cursor_for_range(1.0, 20.0, 5.0).expect("range");
    assert_eq!(store.rows(cursor).count(), 20);
}

#[test]
fn errors_are_reported_to_the_caller() {
    let store = TimeSeriesStore::with_capacity(&[ColumnType::UInt32], 2).expect("store");
    let other = TimeSeriesStore::with_capacity(&[ColumnType::UInt32], 2).expect("store");
    let cursor = store.append_at(1.0);

    assert_eq!(
        store.set(cursor, 4, 1_u32),
        Err(GraphError::ColumnIndexOutOfRange {
            index: 4,
            columns: 1
        })
    );
    assert_eq!(other.get(cursor, 0), Err(GraphError::ForeignCursor));

    store.append_at(2.0);
    store.append_at(3.0);
    assert_eq!(store.get(cursor, 0), Err(GraphError::StaleCursor));
}

#[test]
fn config_builds_store_from_type_names() {
    let config = StoreConfig::new(["double", "uint32"]).with_capacity(8);
    let store = TimeSeriesStore::from_config(&config).expect("store");
    assert_eq!(store.capacity(), 8);
    assert_eq!(store.column_type(1), Some(ColumnType::UInt32));

    let bad = StoreConfig::new(["double", "decimal"]);
    assert_eq!(
        TimeSeriesStore::from_config(&bad).err(),
        Some(GraphError::UnsupportedColumnType("decimal".to_owned()))
    );
}

#[test]
fn append_uses_store_clock() {
    let clock = Arc::new(ManualClock::new(500.0));
    let store = TimeSeriesStore::with_capacity(&[ColumnType::Double], 4)
        .expect("store")
        .with_clock(clock.clone());
    store.append();
    clock.advance(1.5);
    store.append_at(0.0);
    assert_eq!(timestamps_from_newest(&store), vec![501.5, 500.0]);
    assert_relative_eq!(store.begin_time(), 500.0);
    assert_relative_eq!(store.end_time(), 501.5);
}
