//! Single writer for the prediction store
//!
//! Every durable write goes through one task fed by an mpsc channel. A commit
//! carrying an acknowledgement channel whose receiver is gone belongs to an
//! abandoned job and is discarded unwritten.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::{ParkId, Prediction, SpeciesId};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{AppError, AppResult};
use crate::services::history::PredictionHistory;
use crate::services::prediction_cache::PredictionCache;
use crate::services::prediction_store::{PredictionStore, UpsertOutcome};

const CHANNEL_CAPACITY: usize = 256;

/// A prediction on its way to the store
#[derive(Debug)]
pub struct Commit {
    pub prediction: Prediction,
    /// Which job produced it, for logs
    pub origin: &'static str,
    pub ack: Option<oneshot::Sender<AppResult<UpsertOutcome>>>,
}

/// Cloneable handle for submitting commits
#[derive(Clone)]
pub struct CommitSender {
    tx: mpsc::Sender<Commit>,
}

impl CommitSender {
    /// Submit and wait for the write to land
    pub async fn commit(&self, prediction: Prediction, origin: &'static str) -> AppResult<UpsertOutcome> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Commit {
                prediction,
                origin,
                ack: Some(ack),
            })
            .await
            .map_err(|_| AppError::Internal("store writer has stopped".into()))?;

        done.await
            .map_err(|_| AppError::Internal("store writer dropped the commit".into()))?
    }

    /// Submit without waiting
    pub async fn submit(&self, prediction: Prediction, origin: &'static str) -> AppResult<()> {
        self.tx
            .send(Commit {
                prediction,
                origin,
                ack: None,
            })
            .await
            .map_err(|_| AppError::Internal("store writer has stopped".into()))
    }
}

/// Writes that failed and wait for the next store sync
#[derive(Default)]
pub struct PendingWrites {
    rows: DashMap<(ParkId, SpeciesId), Prediction>,
}

impl PendingWrites {
    /// Keep the newest failed write per key
    pub fn record(&self, prediction: Prediction) {
        let key = (prediction.park_id.clone(), prediction.species_id.clone());
        let newer = self
            .rows
            .get(&key)
            .map(|existing| prediction.supersedes(existing.value()))
            .unwrap_or(true);
        if newer {
            self.rows.insert(key, prediction);
        }
    }

    /// Take every pending write for a park
    pub fn drain_park(&self, park_id: &ParkId) -> Vec<Prediction> {
        let keys: Vec<_> = self
            .rows
            .iter()
            .filter(|row| &row.key().0 == park_id)
            .map(|row| row.key().clone())
            .collect();
        keys.into_iter()
            .filter_map(|key| self.rows.remove(&key).map(|(_, prediction)| prediction))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The writer task
pub struct StoreWriter {
    rx: mpsc::Receiver<Commit>,
    store: Arc<dyn PredictionStore>,
    cache: Arc<PredictionCache>,
    pending: Arc<PendingWrites>,
    history: Arc<PredictionHistory>,
}

impl StoreWriter {
    pub fn channel(
        store: Arc<dyn PredictionStore>,
        cache: Arc<PredictionCache>,
        pending: Arc<PendingWrites>,
        history: Arc<PredictionHistory>,
    ) -> (CommitSender, StoreWriter) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            CommitSender { tx },
            StoreWriter {
                rx,
                store,
                cache,
                pending,
                history,
            },
        )
    }

    /// Drain commits until every sender is gone or shutdown is signalled
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                commit = self.rx.recv() => match commit {
                    Some(commit) => self.apply(commit).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    // flush what is already queued
                    self.rx.close();
                    while let Some(commit) = self.rx.recv().await {
                        self.apply(commit).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Store writer stopped");
    }

    async fn apply(&self, commit: Commit) {
        if let Some(ack) = &commit.ack {
            if ack.is_closed() {
                tracing::debug!(
                    park = %commit.prediction.park_id,
                    species = %commit.prediction.species_id,
                    job = commit.origin,
                    "Discarding commit from abandoned job"
                );
                return;
            }
        }

        let result = write_through(
            self.store.as_ref(),
            &self.cache,
            &self.pending,
            &self.history,
            &commit.prediction,
            commit.origin,
            Utc::now(),
        )
        .await;

        if let Some(ack) = commit.ack {
            let _ = ack.send(result);
        }
    }
}

/// Write to the store, then bring the fast cache in line with it. Written
/// predictions join the park's history; failed writes are parked for the
/// next store sync.
pub async fn write_through(
    store: &dyn PredictionStore,
    cache: &PredictionCache,
    pending: &PendingWrites,
    history: &PredictionHistory,
    prediction: &Prediction,
    origin: &'static str,
    at: DateTime<Utc>,
) -> AppResult<UpsertOutcome> {
    match store.upsert(prediction).await {
        Ok(UpsertOutcome::Stale) => {
            if let Ok(Some(stored)) = store
                .latest(&prediction.park_id, &prediction.species_id)
                .await
            {
                cache.put(stored);
            }
            Ok(UpsertOutcome::Stale)
        }
        Ok(outcome) => {
            cache.insert_if_newer(prediction.clone());
            history.record(prediction.clone());
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!(
                park = %prediction.park_id,
                species = %prediction.species_id,
                job = origin,
                at = %at,
                error = %e,
                "Prediction store write failed, will retry on next store sync"
            );
            pending.record(prediction.clone());
            Err(e)
        }
    }
}
