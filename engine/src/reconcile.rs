//! Reconciliation of a remote record stream against a local store.
//!
//! # Algorithm
//!
//! 1. For each page, extract every record's identifier (a malformed record
//!    aborts the pass before any of the page is written)
//! 2. For each record in arrival order, look up the local entity:
//!    - absent: build a new entity through [`FieldMapper::fill_new`]
//!    - present: [`FieldMapper::fill_changed`] runs on a copy of the stored
//!      entity, and the copy is written only if it differs from the stored one
//!    - otherwise nothing is written
//! 3. Commit the page, then hand its change events to the caller
//! 4. Once the stream has ended without error, delete every local entity
//!    whose identifier was never seen, and commit those removals
//!
//! Re-running over an unchanged remote collection therefore writes nothing
//! and commits nothing, whatever shape the mapper gives the entity.
//!
//! Events of a batch whose commit failed stay with the reconciler (see
//! [`Reconciler::take_undelivered`]) so a later pass can release them
//! once the retained changes are finally committed.

use crate::{
    error::Result, Error, FieldMapper, Identifier, LocalEntity, Page, RecordStore, RemoteRecord,
};
use futures::stream::{BoxStream, TryStreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::watch;

/// A change applied to the local store.
///
/// Events are coalesced per commit batch, which is one page: within a batch
/// an identifier yields at most one event, and a creation followed by
/// updates stays a single `Created` carrying the last state. A record
/// repeated on a later page falls in another batch and produces its own
/// event, so a pass may report `Created` then `Updated` for one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// An entity seen for the first time
    Created(LocalEntity),
    /// An existing entity whose mapped fields changed
    Updated(LocalEntity),
    /// An entity absent from a complete remote enumeration
    Removed(Identifier),
}

impl ChangeEvent {
    /// Identifier of the affected entity.
    pub fn id(&self) -> &Identifier {
        match self {
            ChangeEvent::Created(entity) | ChangeEvent::Updated(entity) => &entity.id,
            ChangeEvent::Removed(id) => id,
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
    /// Pages received
    pub pages: usize,
    /// Records received, duplicates included
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    /// Records that matched their local entity
    pub unchanged: usize,
    pub removed: usize,
    /// Successful store commits
    pub commits: usize,
}

impl ReconcileStats {
    /// Number of change events delivered.
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

/// Cancellation signal observed between and during page fetches.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn cancelled(&mut self) {
        let fired = match self.signal.as_mut() {
            Some(rx) => rx.wait_for(|cancelled| *cancelled).await.is_ok(),
            None => false,
        };
        if !fired {
            // No sender left, so cancellation can no longer happen
            std::future::pending::<()>().await
        }
    }

    /// Run `fut` unless cancellation fires first.
    pub async fn guard<T, Fut>(&mut self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            out = fut => out,
        }
    }
}

impl From<watch::Receiver<bool>> for Cancellation {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self { signal: Some(rx) }
    }
}

/// Turns remote records into store mutations and change events.
///
/// A reconciler lives for exactly one pass.
pub struct Reconciler<'a, S: ?Sized, M: ?Sized> {
    store: &'a S,
    mapper: &'a M,
    id_field: &'a str,
    /// Identifiers observed so far in this pass
    seen: HashSet<Identifier>,
    /// Events waiting for the next commit
    batch: Vec<ChangeEvent>,
    /// Position of each identifier in `batch`
    batch_index: HashMap<Identifier, usize>,
    stats: ReconcileStats,
}

impl<'a, S, M> Reconciler<'a, S, M>
where
    S: RecordStore + ?Sized,
    M: FieldMapper + ?Sized,
{
    /// Create a reconciler writing through `store`.
    pub fn new(store: &'a S, mapper: &'a M, id_field: &'a str) -> Self {
        Self {
            store,
            mapper,
            id_field,
            seen: HashSet::new(),
            batch: Vec::new(),
            batch_index: HashMap::new(),
            stats: ReconcileStats::default(),
        }
    }

    /// Drive a complete pass over `pages`.
    ///
    /// `on_event` receives each batch's events after the commit that made
    /// them visible. Residue removal only happens once `pages` has ended
    /// without error or cancellation. On error, events not yet delivered
    /// remain available through [`take_undelivered`](Self::take_undelivered).
    pub async fn run<E>(
        &mut self,
        mut pages: BoxStream<'_, Result<Page>>,
        mut cancel: Cancellation,
        mut on_event: E,
    ) -> Result<ReconcileStats>
    where
        E: FnMut(ChangeEvent),
    {
        while let Some(page) = cancel.guard(pages.try_next()).await? {
            self.apply_page(page.records)?;
            self.commit()?.into_iter().for_each(&mut on_event);
        }

        let removed = self.remove_residue();
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "removing residue");
        }
        self.commit()?.into_iter().for_each(&mut on_event);

        Ok(self.stats)
    }

    /// Queue events left undelivered by an earlier pass.
    ///
    /// They are released with the first batch this reconciler commits and
    /// merge with later events for the same identifier.
    pub fn carry_over(&mut self, events: Vec<ChangeEvent>) {
        for event in events {
            self.push(event);
        }
    }

    /// Drain events whose commit has not succeeded.
    pub fn take_undelivered(&mut self) -> Vec<ChangeEvent> {
        self.batch_index.clear();
        std::mem::take(&mut self.batch)
    }

    /// Apply one page of records in arrival order.
    pub fn apply_page(&mut self, records: Vec<RemoteRecord>) -> Result<()> {
        let keyed = records
            .into_iter()
            .map(|mut record| {
                let id = record.identifier(self.id_field)?;
                record.remove(self.id_field);
                Ok((id, record))
            })
            .collect::<Result<Vec<_>>>()?;

        self.stats.pages += 1;
        for (id, record) in keyed {
            self.apply_record(id, &record);
        }
        Ok(())
    }

    fn apply_record(&mut self, id: Identifier, record: &RemoteRecord) {
        self.stats.records += 1;
        self.seen.insert(id.clone());

        match self.store.get(&id) {
            None => {
                let mut entity = LocalEntity::new(id);
                self.mapper.fill_new(&mut entity, record);
                self.store.upsert(entity.clone());
                self.push(ChangeEvent::Created(entity));
            }
            Some(stored) => {
                let mut entity = stored.clone();
                self.mapper.fill_changed(&mut entity, record);
                if entity == stored {
                    self.stats.unchanged += 1;
                    return;
                }
                self.store.upsert(entity.clone());
                self.push(ChangeEvent::Updated(entity));
            }
        }
    }

    /// Queue an event, folding it into an earlier one for the same
    /// identifier in this batch. A creation stays a creation.
    fn push(&mut self, event: ChangeEvent) {
        let id = event.id().clone();
        if let Some(&index) = self.batch_index.get(&id) {
            let merged = match (&self.batch[index], event) {
                (ChangeEvent::Created(_), ChangeEvent::Updated(entity)) => {
                    ChangeEvent::Created(entity)
                }
                (_, event) => event,
            };
            self.batch[index] = merged;
            return;
        }
        self.batch_index.insert(id, self.batch.len());
        self.batch.push(event);
    }

    /// Stage deletion of every stored identifier not seen in this pass.
    ///
    /// Only meaningful after the remote enumeration completed.
    pub fn remove_residue(&mut self) -> Vec<Identifier> {
        let residue: Vec<Identifier> = self
            .store
            .all_ids()
            .into_iter()
            .filter(|id| !self.seen.contains(id))
            .collect();

        for id in &residue {
            self.store.delete(id);
            self.push(ChangeEvent::Removed(id.clone()));
        }
        residue
    }

    /// Commit pending store changes and release the batched events.
    ///
    /// Nothing is committed when the store has no pending changes; events
    /// carried over from an earlier pass are still released. On failure the
    /// events stay batched alongside the retained changes.
    pub fn commit(&mut self) -> Result<Vec<ChangeEvent>> {
        if self.store.has_pending() {
            let published = self.store.commit()?;
            self.stats.commits += 1;
            tracing::debug!(published, "committed batch");
        }

        self.batch_index.clear();
        let events = std::mem::take(&mut self.batch);
        for event in &events {
            match event {
                ChangeEvent::Created(_) => self.stats.created += 1,
                ChangeEvent::Updated(_) => self.stats.updated += 1,
                ChangeEvent::Removed(_) => self.stats.removed += 1,
            }
        }
        Ok(events)
    }

    /// Identifiers observed so far.
    pub fn seen_ids(&self) -> &HashSet<Identifier> {
        &self.seen
    }

    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }
}
