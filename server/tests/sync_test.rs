//! End-to-end sync against a live notes server.

mod common;

use common::{config_with_token, spawn_server, TestServer};
use simplesync_engine::{
    Error, ErrorKind, FileStore, HttpFetcher, Identifier, LocalEntity, MemoryStore, RecordStore,
    SyncConfig, SyncDelegate, SyncSession, Value,
};
use simplesync_server::config::Config;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Change {
    Created(i64),
    Updated(i64),
    Removed(i64),
}

fn int_id(id: &Identifier) -> i64 {
    match id {
        Identifier::Int(n) => *n,
        Identifier::Str(s) => panic!("unexpected string identifier {}", s),
    }
}

#[derive(Default)]
struct Changes {
    seen: Mutex<Vec<Change>>,
    failures: Mutex<Vec<ErrorKind>>,
}

impl SyncDelegate for Changes {
    fn on_record_applied(&self, entity: &LocalEntity, is_new: bool) {
        let id = int_id(&entity.id);
        let change = if is_new {
            Change::Created(id)
        } else {
            Change::Updated(id)
        };
        self.seen.lock().unwrap().push(change);
    }

    fn on_record_removed(&self, id: &Identifier) {
        self.seen.lock().unwrap().push(Change::Removed(int_id(id)));
    }

    fn on_failed(&self, error: &Error) {
        self.failures.lock().unwrap().push(error.kind());
    }
}

fn sync_config(server: &TestServer, token: &str) -> SyncConfig {
    SyncConfig::new(server.url("/api/notes"), "Note").with_bearer_token(token)
}

fn paged(token: &str, page_size: usize) -> Config {
    Config {
        page_size,
        ..config_with_token(token)
    }
}

// ===== Full sync =====

#[tokio::test]
async fn mirrors_remote_collection_across_pages() {
    let server = spawn_server(paged("secret", 2), 5).await;
    let config = sync_config(&server, "secret");
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let store = Arc::new(MemoryStore::new());
    let session = SyncSession::new(config, fetcher, store.clone());

    let changes = Changes::default();
    let report = session.start(&changes).await.unwrap();

    assert_eq!(report.stats.pages, 3);
    assert_eq!(report.stats.created, 5);
    assert_eq!(
        *changes.seen.lock().unwrap(),
        (1..=5).map(Change::Created).collect::<Vec<_>>()
    );

    let first = store.get(&Identifier::Int(1)).unwrap();
    assert_eq!(first.get("title"), Some(&Value::from("Note 1")));
    assert!(first.get("updatedAt").is_some());
    assert_eq!(first.get("id"), None);

    // Nothing changed remotely
    let report = session.start(&()).await.unwrap();
    assert_eq!(report.stats.changes(), 0);
    assert_eq!(report.stats.commits, 0);
}

#[tokio::test]
async fn resync_applies_remote_deltas() {
    let server = spawn_server(paged("secret", 2), 5).await;
    let config = sync_config(&server, "secret");
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let store = Arc::new(MemoryStore::new());
    let session = SyncSession::new(config, fetcher, store.clone());
    session.start(&()).await.unwrap();

    server
        .feed
        .update(2, Some("Note 2".into()), None)
        .await
        .unwrap();
    assert!(server.feed.delete(3).await);
    server.feed.create(Some("Fresh".into()), Some("new".into())).await;

    let changes = Changes::default();
    session.start(&changes).await.unwrap();

    assert_eq!(
        *changes.seen.lock().unwrap(),
        vec![Change::Updated(2), Change::Created(6), Change::Removed(3)]
    );
    assert_eq!(
        store.get(&Identifier::Int(2)).unwrap().get("body"),
        Some(&Value::Null)
    );
    let ids: Vec<Identifier> = store.snapshot().into_iter().map(|e| e.id).collect();
    assert_eq!(
        ids,
        [1, 2, 4, 5, 6].into_iter().map(Identifier::Int).collect::<Vec<_>>()
    );
}

// ===== Failures =====

#[tokio::test]
async fn wrong_token_is_transport_failure() {
    let server = spawn_server(config_with_token("secret"), 2).await;
    let config = sync_config(&server, "guess");
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let store = Arc::new(MemoryStore::with_entities(vec![LocalEntity::new(1)]));
    let session = SyncSession::new(config, fetcher, store.clone());

    let changes = Changes::default();
    let err = session.start(&changes).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(*changes.failures.lock().unwrap(), vec![ErrorKind::Transport]);
    assert_eq!(store.snapshot(), vec![LocalEntity::new(1)]);
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SyncConfig::new(format!("http://{}/api/notes", addr), "Note");
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let session = SyncSession::new(config, fetcher, Arc::new(MemoryStore::new()));

    let err = session.start(&()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

// ===== Persistence =====

#[tokio::test]
async fn file_store_keeps_synced_notes() {
    let server = spawn_server(paged("secret", 3), 4).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");

    {
        let config = sync_config(&server, "secret");
        let fetcher = HttpFetcher::from_config(&config).unwrap();
        let store = Arc::new(FileStore::open(&path, "Note").unwrap());
        SyncSession::new(config, fetcher, store)
            .start(&())
            .await
            .unwrap();
    }

    let store = FileStore::open(&path, "Note").unwrap();
    assert_eq!(store.snapshot().len(), 4);
    assert!(matches!(
        FileStore::open(&path, "Task"),
        Err(Error::InvalidSnapshot(_))
    ));
}
