//! Persistence bridge: raw samples survive a restart and rebuild the
//! graph window, record and peak

use minepulse::app::App;
use minepulse::storage::{PingStore, sqlite::SqlitePingStore};
use minepulse::time::epoch_millis;
use minepulse::updates::OutboundMessage;
use pretty_assertions::assert_eq;

use crate::helpers::{single_java_config, spawn_status_fixture};

fn sqlite_storage(path: &std::path::Path) -> String {
    format!(
        r#"{{ "backend": "sqlite", "path": "{}" }}"#,
        path.display()
    )
}

#[tokio::test]
async fn cycle_persists_raw_samples() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pings.db");
    let port = spawn_status_fixture(r#"{"players":{"online":11}}"#).await;

    let app = App::new(single_java_config(port, &sqlite_storage(&db_path)))
        .await
        .unwrap();
    app.run_cycle().await.unwrap();
    app.run_cycle().await.unwrap();
    drop(app);

    let store = SqlitePingStore::new(&db_path).await.unwrap();
    let rows = store.load_samples(0, epoch_millis() + 1).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].server_key, "127.0.0.1");
    assert_eq!(rows[0].player_count, Some(11));
}

#[tokio::test]
async fn restart_restores_graph_window_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pings.db");
    let port = spawn_status_fixture(r#"{"players":{"online":1}}"#).await;

    // Seed samples a graph-gap apart, as an uninterrupted process would
    // have written over the last three minutes.
    let store = SqlitePingStore::new(&db_path).await.unwrap();
    let now = epoch_millis();
    for (offset, count) in [(180_000, 5), (120_000, 42), (60_000, 17)] {
        store
            .record_sample("127.0.0.1", now - offset, Some(count))
            .await
            .unwrap();
    }
    store.close().await.unwrap();

    let app = App::new(single_java_config(port, &sqlite_storage(&db_path)))
        .await
        .unwrap();
    app.load_history().await.unwrap();

    let graph: OutboundMessage =
        serde_json::from_str(&app.history_graph_message().await.unwrap()).unwrap();
    let OutboundMessage::HistoryGraph {
        timestamps,
        graph_data,
    } = graph
    else {
        panic!("expected a history graph");
    };
    assert_eq!(timestamps.len(), 3);
    assert_eq!(graph_data[0], vec![Some(5), Some(42), Some(17)]);

    let init: OutboundMessage = serde_json::from_str(&app.init_message().await.unwrap()).unwrap();
    let OutboundMessage::Init { servers, .. } = init else {
        panic!("expected an init snapshot");
    };
    let record = servers[0].record.unwrap();
    assert_eq!(record.player_count, 42);
    assert_eq!(record.timestamp, Some((now - 120_000) / 1_000));

    // earliest window maximum
    let peak = servers[0].graph_peak.unwrap();
    assert_eq!(peak.player_count, 42);
}

#[tokio::test]
async fn persistence_write_failure_is_fatal_to_the_driver() {
    use std::sync::Arc;
    use std::time::Duration;

    use sqlx::ConnectOptions;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pings.db");
    let port = spawn_status_fixture(r#"{"players":{"online":2}}"#).await;

    let app = Arc::new(
        App::new(single_java_config(port, &sqlite_storage(&db_path)))
            .await
            .unwrap(),
    );
    let mut rx = app.subscribe();

    // Pull the table out from under the open store so the next sample
    // insert fails.
    let mut conn = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(&db_path)
        .connect()
        .await
        .unwrap();
    sqlx::query("DROP TABLE pings").execute(&mut conn).await.unwrap();

    let driver = tokio::spawn(minepulse::orchestrator::run(app.clone()));

    let result = tokio::time::timeout(Duration::from_secs(5), driver)
        .await
        .expect("driver must stop after a failed persistence write")
        .unwrap();
    assert!(result.is_err());

    // the failed cycle published no batch
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn failed_polls_persist_as_null_samples() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pings.db");
    let port = crate::helpers::refused_port().await;

    let app = App::new(single_java_config(port, &sqlite_storage(&db_path)))
        .await
        .unwrap();
    app.run_cycle().await.unwrap();
    drop(app);

    let store = SqlitePingStore::new(&db_path).await.unwrap();
    let rows = store.load_samples(0, epoch_millis() + 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].player_count, None);
    // a null-only history yields no record
    assert_eq!(store.load_record("127.0.0.1").await.unwrap(), None);
}
