use stripchart_rs::GraphError;
use stripchart_rs::api::GraphConfig;
use stripchart_rs::core::{StoreConfig, TimeSeriesStore};
use stripchart_rs::render::{FontDescription, ValueFormat};
use stripchart_rs::task::{ScheduleStrategy, SchedulerConfig};

#[test]
fn defaults_describe_a_one_minute_graph() {
    let config = GraphConfig::default();
    assert_eq!(config.n_seconds, 60.0);
    assert_eq!(config.n_buffered, 1.0);
    assert_eq!(config.frames_per_second, 30);
    assert_eq!(config.x_grid_lines, 5);
    assert_eq!(config.time_span(), 61.0);
    assert_eq!(config.font, FontDescription::default());
    assert!(config.validate().is_ok());
}

#[test]
fn json_document_round_trips_through_helpers() {
    let config = GraphConfig::default()
        .with_seconds(120.0, 2.0)
        .with_value_format(ValueFormat::Percent)
        .with_schedule_strategy(ScheduleStrategy::ThreadPool);
    let json = config.to_json_pretty().expect("serialize");
    assert!(json.contains("\"thread_pool\""));
    assert!(json.contains("\"percent\""));
    assert_eq!(GraphConfig::from_json_str(&json).expect("parse"), config);
}

#[test]
fn malformed_documents_are_rejected() {
    assert!(matches!(
        GraphConfig::from_json_str("{ not json"),
        Err(GraphError::InvalidData(_))
    ));
    assert!(matches!(
        GraphConfig::from_json_str(r#"{ "frames_per_second": 0 }"#),
        Err(GraphError::InvalidConfig(_))
    ));
    assert!(matches!(
        GraphConfig::from_json_str(r#"{ "n_buffered": -1 }"#),
        Err(GraphError::InvalidConfig(_))
    ));
}

#[test]
fn store_and_scheduler_configs_deserialize() {
    let store: StoreConfig =
        serde_json::from_str(r#"{ "columns": ["int32", "double"] }"#).expect("store config");
    assert_eq!(store.capacity, 60);
    let store = TimeSeriesStore::from_config(&store).expect("store");
    assert_eq!(store.n_columns(), 2);

    let scheduler: SchedulerConfig = serde_json::from_str("{}").expect("scheduler config");
    assert_eq!(scheduler.worker_threads, None);
    assert!(scheduler.resolved_worker_threads() >= 1);
}
