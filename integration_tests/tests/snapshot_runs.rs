use chrono::Duration;
use scout_client::exporters::{EventStore, OutputFormat, SnapshotStore};
use scout_client::{SingleInstanceGuard, SnapshotRun};
use scout_common::constants::SNAPSHOT_LOCK_NAME;
use scout_common::{Event, EventKind, ScoutError, SerfState, StateValue};
use tempfile::TempDir;

mod common;
use common::{config, files_in, t0, MetricsServer};

const ALIVE: i64 = 1;
const LEFT: i64 = 3;
const FAILED: i64 = 4;

fn stored_events(dir: &TempDir) -> Vec<Event> {
    EventStore::<Event>::new(dir.path().join("events"))
        .read(2019, 10, OutputFormat::Json)
        .unwrap()
}

#[tokio::test]
async fn test_second_run_reports_transitions_and_missing_entities() {
    let dir = TempDir::new().unwrap();
    let server = MetricsServer::start(&[("sso-1", ALIVE), ("sso-2", FAILED)]).await;
    let config = config(dir.path(), vec![server.source("staging01")]);
    let run = SnapshotRun::from_config(config.clone()).unwrap();

    let first = run.execute(t0()).await.unwrap();
    assert_eq!(first.events_written, 0);
    assert_eq!(first.sources_succeeded, 1);

    let saved = SnapshotStore::new(&config.state_file).load().unwrap().unwrap();
    assert_eq!(saved.timestamp, t0());
    assert_eq!(
        saved.source("staging01").unwrap().get("sso-2"),
        Some(&StateValue::Serf(SerfState::Failed))
    );

    server.set_states(&[("sso-1", LEFT)]);
    let later = t0() + Duration::seconds(60);
    let second = run.execute(later).await.unwrap();
    assert_eq!(second.events_written, 2);
    assert_eq!(
        second.files,
        vec![
            config.output_dir.join("consul-events-2019-10.csv"),
            config.output_dir.join("consul-events-2019-10.json"),
        ]
    );

    let events = stored_events(&dir);
    assert_eq!(events.len(), 2);
    let transition = events
        .iter()
        .find(|e| e.kind == EventKind::StateTransition)
        .unwrap();
    assert_eq!(transition.entity.as_deref(), Some("sso-1"));
    assert_eq!(transition.message, "transition from Alive to Left");
    let missing = events
        .iter()
        .find(|e| e.kind == EventKind::EntityMissing)
        .unwrap();
    assert_eq!(missing.entity.as_deref(), Some("sso-2"));
    assert!(events.iter().all(|e| e.timestamp == later));

    let csv = std::fs::read_to_string(config.output_dir.join("consul-events-2019-10.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);

    let saved = SnapshotStore::new(&config.state_file).load().unwrap().unwrap();
    assert_eq!(saved.timestamp, later);
}

#[tokio::test]
async fn test_stale_former_snapshot_is_flagged_first() {
    let dir = TempDir::new().unwrap();
    let server = MetricsServer::start(&[("sso-1", ALIVE)]).await;
    let run = SnapshotRun::from_config(config(dir.path(), vec![server.source("staging01")])).unwrap();

    run.execute(t0()).await.unwrap();
    server.set_states(&[("sso-1", FAILED)]);
    run.execute(t0() + Duration::minutes(10)).await.unwrap();

    let events = stored_events(&dir);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::StaleSnapshotWarning);
    assert_eq!(events[0].attribute("former_timestamp"), Some("2019-10-02T17:16:07.000"));
    assert_eq!(events[1].kind, EventKind::StateTransition);
}

#[tokio::test]
async fn test_failing_source_is_reported_missing_and_others_survive() {
    let dir = TempDir::new().unwrap();
    let healthy = MetricsServer::start(&[("sso-1", ALIVE)]).await;
    let flaky = MetricsServer::start(&[("web-1", ALIVE)]).await;
    let run = SnapshotRun::from_config(config(
        dir.path(),
        vec![healthy.source("staging01"), flaky.source("staging02")],
    ))
    .unwrap();

    run.execute(t0()).await.unwrap();
    flaky.fail();
    let summary = run.execute(t0() + Duration::seconds(30)).await.unwrap();

    assert_eq!(summary.sources_succeeded, 1);
    assert_eq!(summary.sources_failed, 1);
    let events = stored_events(&dir);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::SourceMissing);
    assert_eq!(events[0].source.as_deref(), Some("staging02"));

    // back again on the next run
    flaky.set_states(&[("web-1", ALIVE)]);
    run.execute(t0() + Duration::seconds(60)).await.unwrap();
    let events = stored_events(&dir);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, EventKind::NewSource);
    assert_eq!(events[1].source.as_deref(), Some("staging02"));
}

#[tokio::test]
async fn test_total_failure_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let server = MetricsServer::start(&[("sso-1", ALIVE)]).await;
    let config = config(dir.path(), vec![server.source("staging01")]);
    let run = SnapshotRun::from_config(config.clone()).unwrap();

    run.execute(t0()).await.unwrap();
    let before = std::fs::read(&config.state_file).unwrap();

    server.fail();
    let err = run.execute(t0() + Duration::seconds(60)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ScoutError>(),
        Some(ScoutError::TotalCollectionFailure { attempted: 1 })
    ));
    assert_eq!(std::fs::read(&config.state_file).unwrap(), before);
    assert!(stored_events(&dir).is_empty());
}

#[tokio::test]
async fn test_held_lock_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let server = MetricsServer::start(&[("sso-1", ALIVE)]).await;
    let config = config(dir.path(), vec![server.source("staging01")]);
    let run = SnapshotRun::from_config(config.clone()).unwrap();
    run.execute(t0()).await.unwrap();
    server.set_states(&[("sso-1", LEFT)]);

    let state_before = std::fs::read(&config.state_file).unwrap();
    let events_before = files_in(&config.output_dir);
    let _held = SingleInstanceGuard::acquire(&config.lock_dir, SNAPSHOT_LOCK_NAME).unwrap();

    let err = run.execute(t0() + Duration::seconds(60)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ScoutError>(),
        Some(ScoutError::LockHeld { .. })
    ));
    assert_eq!(std::fs::read(&config.state_file).unwrap(), state_before);
    assert_eq!(files_in(&config.output_dir), events_before);
}

#[tokio::test]
async fn test_sources_from_prometheus_scrape_config() {
    let dir = TempDir::new().unwrap();
    let server = MetricsServer::start(&[("sso-1", ALIVE)]).await;
    let prometheus = dir.path().join("prometheus.yml");
    std::fs::write(
        &prometheus,
        format!(
            "scrape_configs:\n  - job_name: consul\n    static_configs:\n      - targets: ['{}']\n        labels:\n          tenant: staging03\n",
            server.address
        ),
    )
    .unwrap();
    let mut config = config(dir.path(), vec![]);
    config.prometheus_cfg = Some(prometheus);

    let summary = SnapshotRun::from_config(config.clone())
        .unwrap()
        .execute(t0())
        .await
        .unwrap();

    assert_eq!(summary.sources_succeeded, 1);
    let saved = SnapshotStore::new(&config.state_file).load().unwrap().unwrap();
    assert!(saved.contains_source("staging03"));
}
