//! Durable latest-prediction-per-(park, species) store
//!
//! Writes are last-writer-wins by generation timestamp: a prediction that is
//! not strictly newer than the stored row is dropped as stale.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::{ParkId, Prediction, PredictionProvenance, SpeciesId, TimeOfDay};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};
use crate::external::BoxFuture;

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Older or equal timestamp, nothing written
    Stale,
}

/// Storage backend for predictions
pub trait PredictionStore: Send + Sync {
    fn upsert<'a>(&'a self, prediction: &'a Prediction) -> BoxFuture<'a, AppResult<UpsertOutcome>>;

    fn latest<'a>(
        &'a self,
        park_id: &'a ParkId,
        species_id: &'a SpeciesId,
    ) -> BoxFuture<'a, AppResult<Option<Prediction>>>;

    fn latest_all<'a>(&'a self, park_id: &'a ParkId) -> BoxFuture<'a, AppResult<Vec<Prediction>>>;

    /// Every stored row, used to hydrate the fast cache
    fn all(&self) -> BoxFuture<'_, AppResult<Vec<Prediction>>>;

    /// Backend name and reachability, for health reporting
    fn health(&self) -> BoxFuture<'_, (&'static str, bool)>;
}

fn log_stale(prediction: &Prediction) {
    tracing::debug!(
        park = %prediction.park_id,
        species = %prediction.species_id,
        generated_at = %prediction.generated_at,
        "Stale prediction write ignored"
    );
}

// ============================================================================
// In-memory store
// ============================================================================

/// Sharded in-memory store. Readers never wait on writers of other keys.
#[derive(Default)]
pub struct InMemoryPredictionStore {
    rows: DashMap<(ParkId, SpeciesId), Prediction>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert_sync(&self, prediction: &Prediction) -> UpsertOutcome {
        let key = (prediction.park_id.clone(), prediction.species_id.clone());
        match self.rows.entry(key) {
            Entry::Occupied(mut stored) => {
                if prediction.supersedes(stored.get()) {
                    stored.insert(prediction.clone());
                    UpsertOutcome::Updated
                } else {
                    log_stale(prediction);
                    UpsertOutcome::Stale
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(prediction.clone());
                UpsertOutcome::Inserted
            }
        }
    }

    fn sorted(mut rows: Vec<Prediction>) -> Vec<Prediction> {
        rows.sort_by(|a, b| {
            (&a.park_id, &a.species_id).cmp(&(&b.park_id, &b.species_id))
        });
        rows
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn upsert<'a>(&'a self, prediction: &'a Prediction) -> BoxFuture<'a, AppResult<UpsertOutcome>> {
        Box::pin(async move { Ok(self.upsert_sync(prediction)) })
    }

    fn latest<'a>(
        &'a self,
        park_id: &'a ParkId,
        species_id: &'a SpeciesId,
    ) -> BoxFuture<'a, AppResult<Option<Prediction>>> {
        Box::pin(async move {
            Ok(self
                .rows
                .get(&(park_id.clone(), species_id.clone()))
                .map(|row| row.value().clone()))
        })
    }

    fn latest_all<'a>(&'a self, park_id: &'a ParkId) -> BoxFuture<'a, AppResult<Vec<Prediction>>> {
        Box::pin(async move {
            let rows = self
                .rows
                .iter()
                .filter(|row| &row.key().0 == park_id)
                .map(|row| row.value().clone())
                .collect();
            Ok(Self::sorted(rows))
        })
    }

    fn all(&self) -> BoxFuture<'_, AppResult<Vec<Prediction>>> {
        Box::pin(async move {
            let rows = self.rows.iter().map(|row| row.value().clone()).collect();
            Ok(Self::sorted(rows))
        })
    }

    fn health(&self) -> BoxFuture<'_, (&'static str, bool)> {
        Box::pin(async { ("memory", true) })
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

/// `wildlife_predictions` table, one row per (park, species)
#[derive(Clone)]
pub struct PgPredictionStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct PredictionRow {
    park_id: String,
    species_id: String,
    probability: f64,
    confidence: f64,
    best_time: String,
    best_location: String,
    advisory: String,
    generated_at: DateTime<Utc>,
    model_version: i64,
    provenance: String,
}

impl TryFrom<PredictionRow> for Prediction {
    type Error = AppError;

    fn try_from(row: PredictionRow) -> AppResult<Self> {
        let best_time = TimeOfDay::ALL
            .into_iter()
            .find(|t| t.label() == row.best_time)
            .ok_or_else(|| AppError::Internal(format!("unknown best_time {}", row.best_time)))?;
        let provenance = PredictionProvenance::parse(&row.provenance)
            .ok_or_else(|| AppError::Internal(format!("unknown provenance {}", row.provenance)))?;

        Ok(Prediction {
            park_id: ParkId::new(row.park_id),
            species_id: SpeciesId::new(row.species_id),
            probability: row.probability,
            confidence: row.confidence,
            best_time,
            best_location: row.best_location,
            advisory: row.advisory,
            generated_at: row.generated_at,
            model_version: row.model_version,
            provenance,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT park_id, species_id, probability, confidence, best_time, \
    best_location, advisory, generated_at, model_version, provenance FROM wildlife_predictions";

impl PgPredictionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn upsert_row(&self, prediction: &Prediction) -> AppResult<UpsertOutcome> {
        // RETURNING yields no row when the WHERE guard rejects the update
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO wildlife_predictions
                (park_id, species_id, probability, confidence, best_time, best_location,
                 advisory, generated_at, model_version, provenance, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (park_id, species_id) DO UPDATE SET
                probability = EXCLUDED.probability,
                confidence = EXCLUDED.confidence,
                best_time = EXCLUDED.best_time,
                best_location = EXCLUDED.best_location,
                advisory = EXCLUDED.advisory,
                generated_at = EXCLUDED.generated_at,
                model_version = EXCLUDED.model_version,
                provenance = EXCLUDED.provenance,
                updated_at = NOW()
            WHERE wildlife_predictions.generated_at < EXCLUDED.generated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(prediction.park_id.as_str())
        .bind(prediction.species_id.as_str())
        .bind(prediction.probability)
        .bind(prediction.confidence)
        .bind(prediction.best_time.label())
        .bind(&prediction.best_location)
        .bind(&prediction.advisory)
        .bind(prediction.generated_at)
        .bind(prediction.model_version)
        .bind(prediction.provenance.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => {
                log_stale(prediction);
                UpsertOutcome::Stale
            }
        })
    }

    async fn fetch_rows(&self, park_id: Option<&ParkId>) -> AppResult<Vec<Prediction>> {
        let rows = match park_id {
            Some(park_id) => {
                sqlx::query_as::<_, PredictionRow>(&format!(
                    "{} WHERE park_id = $1 ORDER BY species_id",
                    SELECT_COLUMNS
                ))
                .bind(park_id.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, PredictionRow>(&format!(
                    "{} ORDER BY park_id, species_id",
                    SELECT_COLUMNS
                ))
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.into_iter().map(Prediction::try_from).collect()
    }
}

impl PredictionStore for PgPredictionStore {
    fn upsert<'a>(&'a self, prediction: &'a Prediction) -> BoxFuture<'a, AppResult<UpsertOutcome>> {
        Box::pin(self.upsert_row(prediction))
    }

    fn latest<'a>(
        &'a self,
        park_id: &'a ParkId,
        species_id: &'a SpeciesId,
    ) -> BoxFuture<'a, AppResult<Option<Prediction>>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PredictionRow>(&format!(
                "{} WHERE park_id = $1 AND species_id = $2",
                SELECT_COLUMNS
            ))
            .bind(park_id.as_str())
            .bind(species_id.as_str())
            .fetch_optional(&self.db)
            .await?;

            row.map(Prediction::try_from).transpose()
        })
    }

    fn latest_all<'a>(&'a self, park_id: &'a ParkId) -> BoxFuture<'a, AppResult<Vec<Prediction>>> {
        Box::pin(self.fetch_rows(Some(park_id)))
    }

    fn all(&self) -> BoxFuture<'_, AppResult<Vec<Prediction>>> {
        Box::pin(self.fetch_rows(None))
    }

    fn health(&self) -> BoxFuture<'_, (&'static str, bool)> {
        Box::pin(async move {
            let reachable = sqlx::query("SELECT 1").execute(&self.db).await.is_ok();
            ("postgres", reachable)
        })
    }
}
