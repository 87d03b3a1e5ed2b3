//! Sync sessions.
//!
//! A [`SyncSession`] runs reconciliation passes for one remote collection and
//! one store. It tracks its lifecycle (idle → running → finished), rejects a
//! second pass on the same store while one is running, and reports progress
//! to a [`SyncDelegate`].
//!
//! Progress is committed page by page, so a pass that fails midway keeps
//! whatever it already committed. Only a pass that enumerated the whole remote
//! collection removes local entities the remote no longer has.
//!
//! When a commit fails, its changes stay pending in the store and the session
//! keeps their events. The next pass delivers them after its first successful
//! commit.

use crate::{
    error::Result, fetch_pages, Cancellation, ChangeEvent, CopyFields, Error, FieldMapper,
    Identifier, LocalEntity, ReconcileStats, Reconciler, RecordStore, RemoteFetcher, SyncConfig,
    SyncLease,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    /// The last pass completed. Stays visible until the next start.
    Finished,
}

/// Snapshot of a session's lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// When the current or last pass started
    pub started_at: Option<DateTime<Utc>>,
    /// When the last pass ended, successfully or not
    pub ended_at: Option<DateTime<Utc>>,
    /// Error of the last pass, cleared by a successful one
    pub last_error: Option<Error>,
}

/// Observer of a session's progress.
///
/// All methods default to no-ops. `on_finished` and `on_failed` are mutually
/// exclusive and called at most once per pass.
pub trait SyncDelegate: Send + Sync {
    /// An entity was created (`is_new`) or updated and committed.
    fn on_record_applied(&self, entity: &LocalEntity, is_new: bool) {
        let _ = (entity, is_new);
    }

    /// An entity absent from the remote collection was deleted.
    fn on_record_removed(&self, id: &Identifier) {
        let _ = id;
    }

    /// The pass completed after `duration`.
    fn on_finished(&self, duration: Duration) {
        let _ = duration;
    }

    /// The pass was rejected or aborted.
    fn on_failed(&self, error: &Error) {
        let _ = error;
    }
}

impl SyncDelegate for () {}

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub entity_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
    pub stats: ReconcileStats,
}

fn notify<D: SyncDelegate + ?Sized>(delegate: &D, event: ChangeEvent) {
    match event {
        ChangeEvent::Created(entity) => delegate.on_record_applied(&entity, true),
        ChangeEvent::Updated(entity) => delegate.on_record_applied(&entity, false),
        ChangeEvent::Removed(id) => delegate.on_record_removed(&id),
    }
}

/// Holds the store lock and the running phase for one pass.
///
/// Dropping it without settling (the pass future was dropped) returns the
/// session to idle.
struct RunGuard<'a> {
    _lease: SyncLease<'a>,
    status: &'a Mutex<SessionStatus>,
    started: Instant,
    started_at: DateTime<Utc>,
    settled: bool,
}

impl RunGuard<'_> {
    fn finish(&mut self) -> (DateTime<Utc>, Duration) {
        let ended_at = Utc::now();
        let mut status = self.status.lock();
        status.phase = SessionPhase::Finished;
        status.ended_at = Some(ended_at);
        status.last_error = None;
        self.settled = true;
        (ended_at, self.started.elapsed())
    }

    fn fail(&mut self, error: &Error) {
        let mut status = self.status.lock();
        status.phase = SessionPhase::Idle;
        status.ended_at = Some(Utc::now());
        status.last_error = Some(error.clone());
        self.settled = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut status = self.status.lock();
            status.phase = SessionPhase::Idle;
            status.ended_at = Some(Utc::now());
            status.last_error = Some(Error::Cancelled);
        }
    }
}

/// Runs sync passes of one remote collection into one store.
pub struct SyncSession<F, S: ?Sized, M = CopyFields> {
    config: SyncConfig,
    fetcher: F,
    store: Arc<S>,
    mapper: M,
    status: Mutex<SessionStatus>,
    cancel: watch::Sender<bool>,
    /// Events of changes whose commit failed
    undelivered: Mutex<Vec<ChangeEvent>>,
}

impl<F, S> SyncSession<F, S, CopyFields>
where
    F: RemoteFetcher,
    S: RecordStore + ?Sized,
{
    /// Create an idle session that copies every remote field.
    pub fn new(config: SyncConfig, fetcher: F, store: Arc<S>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            config,
            fetcher,
            store,
            mapper: CopyFields,
            status: Mutex::new(SessionStatus::default()),
            cancel,
            undelivered: Mutex::new(Vec::new()),
        }
    }
}

impl<F, S, M> SyncSession<F, S, M>
where
    F: RemoteFetcher,
    S: RecordStore + ?Sized,
    M: FieldMapper,
{
    /// Replace the field mapper.
    pub fn with_mapper<N: FieldMapper>(self, mapper: N) -> SyncSession<F, S, N> {
        SyncSession {
            config: self.config,
            fetcher: self.fetcher,
            store: self.store,
            mapper,
            status: self.status,
            cancel: self.cancel,
            undelivered: self.undelivered,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.lock().phase == SessionPhase::Running
    }

    /// Ask the running pass to stop before its next page.
    ///
    /// Has no effect on a later pass.
    pub fn cancel(&self) {
        if self.is_running() {
            tracing::debug!(entity = %self.config.entity_name, "cancel requested");
            self.cancel.send_replace(true);
        }
    }

    /// Run one complete pass.
    ///
    /// Fails with [`Error::Busy`] if a pass is already running against the
    /// same store. The rejected request's delegate is told via `on_failed`.
    pub async fn start<D>(&self, delegate: &D) -> Result<SyncReport>
    where
        D: SyncDelegate + ?Sized,
    {
        match self.begin() {
            Some(run) => self.execute(run, delegate).await,
            None => {
                tracing::warn!(entity = %self.config.entity_name, "sync rejected: already running");
                delegate.on_failed(&Error::Busy);
                Err(Error::Busy)
            }
        }
    }

    /// Like [`start`](Self::start), but a request made while a pass is
    /// running is absorbed by that pass and returns `Ok(None)`.
    pub async fn refresh<D>(&self, delegate: &D) -> Result<Option<SyncReport>>
    where
        D: SyncDelegate + ?Sized,
    {
        match self.begin() {
            Some(run) => self.execute(run, delegate).await.map(Some),
            None => {
                tracing::debug!(entity = %self.config.entity_name, "refresh coalesced into running sync");
                Ok(None)
            }
        }
    }

    fn begin(&self) -> Option<RunGuard<'_>> {
        let lease = self.store.sync_lock().try_acquire()?;
        let started_at = Utc::now();
        {
            let mut status = self.status.lock();
            status.phase = SessionPhase::Running;
            status.started_at = Some(started_at);
            status.ended_at = None;
        }
        self.cancel.send_replace(false);

        Some(RunGuard {
            _lease: lease,
            status: &self.status,
            started: Instant::now(),
            started_at,
            settled: false,
        })
    }

    async fn execute<D>(&self, mut run: RunGuard<'_>, delegate: &D) -> Result<SyncReport>
    where
        D: SyncDelegate + ?Sized,
    {
        tracing::debug!(
            entity = %self.config.entity_name,
            start = %self.config.start_locator,
            "sync started"
        );

        match self.pass(delegate).await {
            Ok(stats) => {
                let (ended_at, duration) = run.finish();
                tracing::info!(
                    entity = %self.config.entity_name,
                    created = stats.created,
                    updated = stats.updated,
                    removed = stats.removed,
                    unchanged = stats.unchanged,
                    pages = stats.pages,
                    elapsed_ms = duration.as_millis() as u64,
                    "sync finished"
                );
                delegate.on_finished(duration);
                Ok(SyncReport {
                    entity_name: self.config.entity_name.clone(),
                    started_at: run.started_at,
                    ended_at,
                    duration,
                    stats,
                })
            }
            Err(error) => {
                run.fail(&error);
                tracing::warn!(entity = %self.config.entity_name, %error, "sync failed");
                delegate.on_failed(&error);
                Err(error)
            }
        }
    }

    async fn pass<D>(&self, delegate: &D) -> Result<ReconcileStats>
    where
        D: SyncDelegate + ?Sized,
    {
        self.config.validate()?;

        let cancel = Cancellation::from(self.cancel.subscribe());
        let pages = fetch_pages(&self.fetcher, &self.config.start_locator);
        let mut reconciler = Reconciler::new(&*self.store, &self.mapper, &self.config.id_field);
        reconciler.carry_over(std::mem::take(&mut *self.undelivered.lock()));

        let outcome = reconciler
            .run(pages, cancel, |event| notify(delegate, event))
            .await;
        if outcome.is_err() {
            let held = reconciler.take_undelivered();
            if !held.is_empty() {
                tracing::debug!(count = held.len(), "holding events until next commit");
            }
            *self.undelivered.lock() = held;
        }
        outcome
    }
}
