//! notes-sync - mirrors a remote notes collection into a local JSON file.
//!
//! Configured through `SYNC_*` environment variables (see
//! [`ClientConfig`]). Ctrl-C cancels the running pass; pages already
//! committed are kept.

use simplesync_engine::{
    Error, FileStore, HttpFetcher, Identifier, LocalEntity, RecordStore, SyncDelegate, SyncSession,
};
use simplesync_server::{config::ClientConfig, init_tracing};
use std::sync::Arc;
use std::time::Duration;

/// Logs every change and reports the elapsed sync time.
struct LogDelegate;

impl SyncDelegate for LogDelegate {
    fn on_record_applied(&self, entity: &LocalEntity, is_new: bool) {
        if is_new {
            tracing::info!(id = %entity.id, "created");
        } else {
            tracing::info!(id = %entity.id, "updated");
        }
    }

    fn on_record_removed(&self, id: &Identifier) {
        tracing::info!(id = %id, "removed");
    }

    fn on_finished(&self, duration: Duration) {
        println!("Sync took {:.3}s", duration.as_secs_f64());
    }

    fn on_failed(&self, error: &Error) {
        tracing::error!(kind = ?error.kind(), "sync failed: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    dotenvy::dotenv().ok();
    let client = ClientConfig::from_env()?;

    let store = Arc::new(FileStore::open(
        &client.store_path,
        client.sync.entity_name.as_str(),
    )?);
    let fetcher = HttpFetcher::from_config(&client.sync)?;
    let session = SyncSession::new(client.sync, fetcher, store.clone());

    let sync = session.start(&LogDelegate);
    tokio::pin!(sync);

    let result = tokio::select! {
        result = &mut sync => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, cancelling sync");
            session.cancel();
            sync.await
        }
    };
    let report = result?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!(
        "{} {} entities stored in {}",
        store.snapshot().len(),
        report.entity_name,
        store.path().display()
    );

    Ok(())
}
