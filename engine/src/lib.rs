//! # SimpleSync Engine
//!
//! Keeps a local collection in step with a paginated remote collection.
//!
//! A sync pass fetches every page of the remote collection, reconciles each
//! record against the local store by primary key, and applies the resulting
//! create/update/delete deltas. Passes are idempotent: running one twice
//! against an unchanged remote writes nothing the second time.
//!
//! ## Core Concepts
//!
//! ### Stores
//!
//! A [`RecordStore`] holds the local entities. Mutations are staged and made
//! visible to readers by [`RecordStore::commit`]. [`MemoryStore`] keeps
//! everything in memory; [`FileStore`] persists each commit as a JSON
//! [`StoreSnapshot`].
//!
//! ### Fetchers
//!
//! A [`RemoteFetcher`] retrieves one [`Page`] at a time. [`fetch_pages`] and
//! [`fetch_all`] follow continuation links lazily. `HttpFetcher` (feature
//! `http`) reads JSON pages over HTTP.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] classifies each record as new, changed or unchanged,
//! fills entities through a [`FieldMapper`], commits once per page, and
//! removes local entities absent from a complete enumeration.
//!
//! ### Sessions
//!
//! A [`SyncSession`] wraps passes in a lifecycle, rejects concurrent passes
//! on the same store with [`Error::Busy`], and reports to a [`SyncDelegate`].
//!
//! ## Quick Start
//!
//! ```rust
//! use simplesync_engine::{
//!     MemoryFetcher, MemoryStore, RecordStore, RemoteRecord, SyncConfig, SyncSession,
//! };
//! use std::sync::Arc;
//!
//! # futures::executor::block_on(async {
//! // 1. Describe the remote collection
//! let fetcher = MemoryFetcher::from_pages(vec![
//!     vec![RemoteRecord::new().with("id", 1).with("body", "first")],
//!     vec![RemoteRecord::new().with("id", 2).with("body", "second")],
//! ]);
//!
//! // 2. Create a session over a store
//! let store = Arc::new(MemoryStore::new());
//! let config = SyncConfig::new(MemoryFetcher::START, "Note");
//! let session = SyncSession::new(config, fetcher, store.clone());
//!
//! // 3. Run a pass
//! let report = session.start(&()).await.unwrap();
//! assert_eq!(report.stats.created, 2);
//! assert_eq!(store.snapshot().len(), 2);
//!
//! // 4. A second pass changes nothing
//! let report = session.start(&()).await.unwrap();
//! assert_eq!(report.stats.changes(), 0);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
#[cfg(feature = "http")]
pub mod http;
pub mod mapper;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod value;

// Re-export main types at crate root
pub use config::{SyncConfig, DEFAULT_ID_FIELD};
pub use error::{Error, ErrorKind, Result};
pub use fetcher::{fetch_all, fetch_pages, MemoryFetcher, Page, RemoteFetcher};
#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use mapper::{copy_mapped, CopyFields, FieldMapper, SelectFields};
pub use reconcile::{Cancellation, ChangeEvent, ReconcileStats, Reconciler};
pub use record::{LocalEntity, RemoteRecord};
pub use session::{SessionPhase, SessionStatus, SyncDelegate, SyncReport, SyncSession};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{FileStore, MemoryStore, RecordStore, SyncLease, SyncLock};
pub use value::{Identifier, Value};
