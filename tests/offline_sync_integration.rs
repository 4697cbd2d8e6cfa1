//! Offline sync integration tests
//!
//! End-to-end runs of the queue against a sled store on disk and a wiremock
//! stand-in for the REST backend.

use networking::{ConnectivityMonitor, HttpClient, HttpClientConfig, NetworkState};
use offline_queue::{
    ConnectivityTrigger, HttpBackend, ItemStatus, NewMutation, OfflineQueue, QueueConfig,
    RetryPolicy, SubmitOutcome,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storage::{CredentialStore, KvConfig, KvCredentialStore, KvStore};
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct App {
    queue: Arc<OfflineQueue>,
    credentials: Arc<KvCredentialStore>,
}

fn open_kv(dir: &TempDir) -> KvStore {
    let path = dir.path().join("umilax.db");
    KvStore::open(KvConfig::new(path.to_string_lossy().to_string()).flush_every_ms(None)).unwrap()
}

fn app(server: &MockServer, kv: KvStore, config: QueueConfig) -> App {
    let client = HttpClient::new(
        HttpClientConfig::new(server.uri()).with_timeout(Duration::from_millis(500)),
    )
    .unwrap();
    let credentials = Arc::new(KvCredentialStore::new(kv.clone()));
    let queue = Arc::new(OfflineQueue::new(
        kv,
        Arc::new(HttpBackend::new(client)),
        credentials.clone(),
        config,
    ));
    App { queue, credentials }
}

async fn logged_in_app(server: &MockServer, dir: &TempDir) -> App {
    let app = app(server, open_kv(dir), QueueConfig::default());
    app.credentials.save_tokens("A1", Some("R1")).await.unwrap();
    app
}

/// Offline submissions are replayed in order once the queue syncs
#[tokio::test]
async fn test_offline_submissions_replay_in_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = logged_in_app(&server, &dir).await;

    Mock::given(method("POST"))
        .and(path("/transactions/record/"))
        .and(header("authorization", "Bearer A1"))
        .and(body_json(json!({ "amount": 1500, "type": "sale" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/expenses/7/"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let first = app
        .queue
        .submit(
            NewMutation::post("/transactions/record/")
                .with_body(json!({ "amount": 1500, "type": "sale" })),
            NetworkState::Offline,
        )
        .await
        .unwrap();
    assert!(first.is_queued());
    app.queue
        .submit(NewMutation::delete("/expenses/7/"), NetworkState::Offline)
        .await
        .unwrap();
    assert_eq!(app.queue.pending_count(), 2);

    let report = app.queue.sync_queue(None).await;
    assert_eq!(report.synced, 2);
    assert_eq!(report.failed, 0);
    assert!(app.queue.get_queue().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/transactions/record/");
    assert_eq!(requests[1].url.path(), "/expenses/7/");
}

/// An expired access token is refreshed once and the item retried
#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = logged_in_app(&server, &dir).await;

    Mock::given(method("POST"))
        .and(path("/expenses/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh/"))
        .and(body_json(json!({ "refresh": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/expenses/"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    app.queue
        .add_to_queue(NewMutation::post("/expenses/").with_body(json!({ "amount": 300 })))
        .unwrap();

    let report = app.queue.sync_queue(None).await;
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(app.credentials.access_token().await.unwrap().as_deref(), Some("A2"));
    assert_eq!(app.credentials.refresh_token().await.unwrap().as_deref(), Some("R1"));
}

/// A rejected refresh logs the user out and leaves the item queued
#[tokio::test]
async fn test_rejected_refresh_clears_credentials() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = logged_in_app(&server, &dir).await;

    Mock::given(method("POST"))
        .and(path("/expenses/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token blacklisted"))
        .expect(1)
        .mount(&server)
        .await;

    let id = app.queue.add_to_queue(NewMutation::post("/expenses/")).unwrap();

    let report = app.queue.sync_queue(None).await;
    assert_eq!(report.synced, 0);
    assert_eq!(report.failed, 1);

    assert_eq!(app.credentials.access_token().await.unwrap(), None);
    assert_eq!(app.credentials.refresh_token().await.unwrap(), None);

    let item = &app.queue.get_queue()[0];
    assert_eq!(item.id, id);
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.retries, 1);
    assert_eq!(item.error.as_deref(), Some("token blacklisted"));
}

/// Server errors and timeouts are recorded per item without stopping the pass
#[tokio::test]
async fn test_failures_are_isolated_per_item() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = logged_in_app(&server, &dir).await;

    Mock::given(method("POST"))
        .and(path("/ok/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/slow/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    app.queue.add_to_queue(NewMutation::post("/broken/")).unwrap();
    app.queue.add_to_queue(NewMutation::post("/slow/")).unwrap();
    app.queue.add_to_queue(NewMutation::post("/ok/")).unwrap();

    let report = app.queue.sync_queue(None).await;
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 2);

    let items = app.queue.get_queue();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].endpoint, "/broken/");
    assert_eq!(items[0].error.as_deref(), Some("internal error"));
    assert_eq!(items[1].endpoint, "/slow/");
    assert!(items[1].is_failed());
    assert!(items[1].error.is_some());
    assert!(items.iter().all(|item| item.retries == 1));
}

/// The queue survives an app restart
#[tokio::test]
async fn test_queue_survives_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let id = {
        let app = logged_in_app(&server, &dir).await;
        app.queue
            .add_to_queue(NewMutation::patch("/shops/4/").with_body(json!({ "name": "Kiosk" })))
            .unwrap()
    };

    let app = app(&server, open_kv(&dir), QueueConfig::default());
    let items = app.queue.get_queue();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].body, json!({ "name": "Kiosk" }));
    assert_eq!(app.credentials.access_token().await.unwrap().as_deref(), Some("A1"));
}

/// A failed direct send is queued and synced on reconnect
#[tokio::test]
async fn test_reconnect_syncs_failed_direct_send() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = logged_in_app(&server, &dir).await;

    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let outcome = app
        .queue
        .submit(NewMutation::post("/complaints/").with_id("c1"), NetworkState::Online)
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued { id: "c1".to_string() });
    assert_eq!(app.queue.get_queue()[0].error.as_deref(), Some("maintenance"));

    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let monitor = ConnectivityMonitor::new(NetworkState::Offline);
    let trigger = ConnectivityTrigger::spawn(app.queue.clone(), monitor.subscribe());
    let mut reports = trigger.reports();

    monitor.set_state(NetworkState::Online);
    let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(*trigger.pending_count().borrow(), 0);
    trigger.shutdown();
}

/// Items that keep failing end up in the dead-letter collection
#[tokio::test]
async fn test_dead_letter_and_requeue() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = QueueConfig::new().with_retry(RetryPolicy::unlimited().with_max_retries(2));
    let app = app(&server, open_kv(&dir), config);

    Mock::given(method("PUT"))
        .and(path("/shops/1/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid shop"))
        .expect(2)
        .mount(&server)
        .await;

    let id = app.queue.add_to_queue(NewMutation::put("/shops/1/")).unwrap();

    assert_eq!(app.queue.sync_queue(None).await.dead_lettered, 0);
    assert_eq!(app.queue.sync_queue(None).await.dead_lettered, 1);
    assert!(app.queue.get_queue().is_empty());

    let dead = app.queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].error.as_deref(), Some("invalid shop"));

    assert!(app.queue.retry_dead_letter(&id).unwrap());
    assert_eq!(app.queue.get_queue()[0].retries, 0);
    assert!(app.queue.dead_letters().is_empty());
}
