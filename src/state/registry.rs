use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::PhaseError;
use crate::events::MarketId;
use crate::keeper::Submission;
use crate::state::{MarketDetails, MarketRecord, Phase};

/// All markets seen by this process, keyed by id.
///
/// The dispatcher only ever calls `claim`; every other mutation comes from
/// the lifecycle task that owns the id.
#[derive(Debug, Clone, Default)]
pub struct MarketRegistry {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<MarketId, MarketRecord>,
    /// Ids whose terminal record was evicted. Still count as seen.
    evicted: HashSet<MarketId>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `Discovered` record if `id` has never been seen.
    /// Returns false for duplicates, including evicted ids.
    pub async fn claim(&self, id: MarketId) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.evicted.contains(&id) || inner.records.contains_key(&id) {
            return false;
        }
        inner.records.insert(id, MarketRecord::new(id));
        true
    }

    pub async fn set_details(&self, id: MarketId, details: &MarketDetails) -> Result<Phase, PhaseError> {
        self.with_record(id, |r| r.set_details(details)).await
    }

    pub async fn advance(&self, id: MarketId, next: Phase) -> Result<Phase, PhaseError> {
        self.with_record(id, |r| r.advance(next)).await
    }

    pub async fn fail(&self, id: MarketId, error: String) -> Result<Phase, PhaseError> {
        self.with_record(id, |r| r.fail(error)).await
    }

    pub async fn resolve(&self, id: MarketId, submission: Submission) -> Result<Phase, PhaseError> {
        self.with_record(id, |r| r.resolve(submission)).await
    }

    async fn with_record<F>(&self, id: MarketId, f: F) -> Result<Phase, PhaseError>
    where
        F: FnOnce(&mut MarketRecord) -> Result<Phase, PhaseError>,
    {
        let mut inner = self.inner.lock().await;
        match inner.records.get_mut(&id) {
            Some(record) => f(record),
            None => Err(PhaseError::Unknown(id)),
        }
    }

    /// Drop a terminal record, remembering its id. Non-terminal records stay.
    pub async fn evict(&self, id: MarketId) -> Option<MarketRecord> {
        let mut inner = self.inner.lock().await;
        let terminal = inner.records.get(&id).map(|r| r.phase.is_terminal())?;
        if !terminal {
            return None;
        }
        inner.evicted.insert(id);
        inner.records.remove(&id)
    }

    pub async fn get(&self, id: MarketId) -> Option<MarketRecord> {
        self.inner.lock().await.records.get(&id).cloned()
    }

    pub async fn is_known(&self, id: MarketId) -> bool {
        let inner = self.inner.lock().await;
        inner.records.contains_key(&id) || inner.evicted.contains(&id)
    }

    /// Records currently held, sorted by id.
    pub async fn snapshot(&self) -> Vec<MarketRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<MarketRecord> = inner.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Number of held records per phase. Evicted markets are not counted.
    pub async fn phase_counts(&self) -> BTreeMap<Phase, usize> {
        let inner = self.inner.lock().await;
        let mut counts = BTreeMap::new();
        for record in inner.records.values() {
            *counts.entry(record.phase).or_insert(0) += 1;
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
