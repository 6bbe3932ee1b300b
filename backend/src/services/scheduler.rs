//! Background reconciliation
//!
//! Four job classes run on independent cadences: weather refresh, prediction
//! refresh, store sync and model retrain. Each (class, park, species) key has
//! its own state machine:
//!
//! ```text
//! Idle -> Refreshing -> Committing -> Idle
//!              \             \
//!               +-------------+--> Failed { retry_at } -> Idle
//! ```
//!
//! A tick that finds a key busy or backing off skips it. A semaphore bounds
//! the number of jobs running at once, and every job runs under a time
//! budget; an abandoned job's commit is discarded by the store writer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use shared::{FeatureVector, ParkId, SpeciesId};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::catalog::Catalog;
use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::services::history::PredictionHistory;
use crate::services::model::{fit, PredictionModel};
use crate::services::prediction_cache::PredictionCache;
use crate::services::prediction_store::PredictionStore;
use crate::services::store_writer::{write_through, CommitSender, PendingWrites};
use crate::services::training::{synthetic_training_set, TrainingSet, TrainingSets, SYNTHETIC_SAMPLES};
use crate::services::weather_cache::WeatherCache;

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    WeatherRefresh,
    PredictionRefresh,
    StoreSync,
    ModelRetrain,
}

impl JobClass {
    pub const ALL: [JobClass; 4] = [
        JobClass::WeatherRefresh,
        JobClass::PredictionRefresh,
        JobClass::StoreSync,
        JobClass::ModelRetrain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobClass::WeatherRefresh => "weather_refresh",
            JobClass::PredictionRefresh => "prediction_refresh",
            JobClass::StoreSync => "store_sync",
            JobClass::ModelRetrain => "model_retrain",
        }
    }
}

/// Identity of one unit of background work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub class: JobClass,
    pub park_id: ParkId,
    pub species_id: Option<SpeciesId>,
}

impl JobKey {
    pub fn park(class: JobClass, park_id: &ParkId) -> Self {
        Self {
            class,
            park_id: park_id.clone(),
            species_id: None,
        }
    }

    pub fn species(class: JobClass, park_id: &ParkId, species_id: &SpeciesId) -> Self {
        Self {
            class,
            park_id: park_id.clone(),
            species_id: Some(species_id.clone()),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.species_id {
            Some(species) => write!(f, "{}:{}/{}", self.class.as_str(), self.park_id, species),
            None => write!(f, "{}:{}", self.class.as_str(), self.park_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Refreshing,
    Committing,
    Failed { retry_at: DateTime<Utc> },
}

/// Job counts per state, for health reporting
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub idle: usize,
    pub refreshing: usize,
    pub committing: usize,
    pub failed: usize,
}

/// Per-key state machines
#[derive(Default)]
pub struct JobTracker {
    states: DashMap<JobKey, JobState>,
}

impl JobTracker {
    /// Move an idle key, or one whose backoff has elapsed, to `Refreshing`.
    /// Returns false when the key is busy or still backing off.
    pub fn try_begin(&self, key: &JobKey, now: DateTime<Utc>) -> bool {
        let mut state = self.states.entry(key.clone()).or_insert(JobState::Idle);
        match *state {
            JobState::Idle => {}
            JobState::Failed { retry_at } if retry_at <= now => {}
            _ => return false,
        }
        *state = JobState::Refreshing;
        true
    }

    pub fn committing(&self, key: &JobKey) {
        self.states.insert(key.clone(), JobState::Committing);
    }

    pub fn complete(&self, key: &JobKey) {
        self.states.insert(key.clone(), JobState::Idle);
    }

    pub fn fail(&self, key: &JobKey, retry_at: DateTime<Utc>) {
        self.states.insert(key.clone(), JobState::Failed { retry_at });
    }

    pub fn state(&self, key: &JobKey) -> JobState {
        self.states
            .get(key)
            .map(|state| *state.value())
            .unwrap_or(JobState::Idle)
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for state in self.states.iter() {
            match state.value() {
                JobState::Idle => counts.idle += 1,
                JobState::Refreshing => counts.refreshing += 1,
                JobState::Committing => counts.committing += 1,
                JobState::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

/// Marks its key failed unless the job reports back. Covers jobs that panic
/// and jobs whose cycle is cancelled on shutdown.
struct JobGuard<'a> {
    jobs: &'a JobTracker,
    key: &'a JobKey,
    retry_at: DateTime<Utc>,
    settled: bool,
}

impl JobGuard<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(job = %self.key, retry_at = %self.retry_at, "Job abandoned before finishing");
            self.jobs.fail(self.key, self.retry_at);
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job: String,
    pub error: String,
}

/// Outcome of one cycle across all of its keys
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub class: JobClass,
    pub started_at: DateTime<Utc>,
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<JobFailure>,
}

impl CycleReport {
    fn new(class: JobClass, started_at: DateTime<Utc>) -> Self {
        Self {
            class,
            started_at,
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record(&mut self, key: JobKey, outcome: JobOutcome) {
        let job = key.to_string();
        match outcome {
            JobOutcome::Completed => self.completed.push(job),
            JobOutcome::Skipped => self.skipped.push(job),
            JobOutcome::Failed(error) => self.failed.push(JobFailure { job, error }),
        }
    }

    pub fn completed_key(&self, key: &JobKey) -> bool {
        let job = key.to_string();
        self.completed.iter().any(|c| c == &job)
    }

    pub fn failed_key(&self, key: &JobKey) -> bool {
        let job = key.to_string();
        self.failed.iter().any(|f| f.job == job)
    }

    /// Some keys failed while others went through
    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty() && !self.completed.is_empty()
    }

    fn log(&self) {
        if self.failed.is_empty() {
            tracing::info!(
                job = self.class.as_str(),
                at = %self.started_at,
                completed = self.completed.len(),
                skipped = self.skipped.len(),
                "Cycle finished"
            );
        } else {
            tracing::warn!(
                job = self.class.as_str(),
                at = %self.started_at,
                completed = self.completed.len(),
                skipped = self.skipped.len(),
                failed = self.failed.len(),
                "Cycle finished with failures"
            );
        }
    }
}

/// Most recent cycle of one class
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub job: JobClass,
    pub last_run: DateTime<Utc>,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl From<&CycleReport> for SyncStatus {
    fn from(report: &CycleReport) -> Self {
        Self {
            job: report.class,
            last_run: report.started_at,
            completed: report.completed.len(),
            skipped: report.skipped.len(),
            failed: report.failed.len(),
        }
    }
}

// ============================================================================
// Settings and training source
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub weather_interval: Duration,
    pub prediction_interval: Duration,
    pub store_sync_interval: Duration,
    pub retrain_interval: Duration,
    pub job_timeout: Duration,
    pub failure_backoff: Duration,
    pub max_concurrent_jobs: usize,
}

impl SchedulerSettings {
    pub fn interval(&self, class: JobClass) -> Duration {
        match class {
            JobClass::WeatherRefresh => self.weather_interval,
            JobClass::PredictionRefresh => self.prediction_interval,
            JobClass::StoreSync => self.store_sync_interval,
            JobClass::ModelRetrain => self.retrain_interval,
        }
    }
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            weather_interval: Duration::from_secs(config.weather_interval_secs.max(1)),
            prediction_interval: Duration::from_secs(config.prediction_interval_secs.max(1)),
            store_sync_interval: Duration::from_secs(config.store_sync_interval_secs.max(1)),
            retrain_interval: Duration::from_secs(config.retrain_interval_secs.max(1)),
            job_timeout: Duration::from_secs(config.job_timeout_secs.max(1)),
            failure_backoff: Duration::from_secs(config.failure_backoff_secs),
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

/// Where retrain jobs get their samples
#[derive(Debug, Clone, Default)]
pub struct TrainingSource {
    historical: TrainingSets,
}

impl TrainingSource {
    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn historical(sets: TrainingSets) -> Self {
        Self { historical: sets }
    }

    /// Historical samples for the pair when present, synthetic otherwise
    pub fn training_set(
        &self,
        catalog: &Catalog,
        park_id: &ParkId,
        species_id: &SpeciesId,
    ) -> AppResult<TrainingSet> {
        if let Some(set) = self.historical.get(&(park_id.clone(), species_id.clone())) {
            return Ok(set.clone());
        }
        let entry = catalog
            .entry(park_id, species_id)
            .ok_or_else(|| AppError::PredictionUnavailable {
                park: park_id.to_string(),
                species: species_id.to_string(),
            })?;
        synthetic_training_set(&entry, SYNTHETIC_SAMPLES)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Components the scheduler drives
pub struct SchedulerParts {
    pub catalog: Arc<Catalog>,
    pub weather: Arc<WeatherCache>,
    pub model: Arc<PredictionModel>,
    pub store: Arc<dyn PredictionStore>,
    pub cache: Arc<PredictionCache>,
    pub commits: CommitSender,
    pub pending: Arc<PendingWrites>,
    pub history: Arc<PredictionHistory>,
    pub training: Arc<TrainingSource>,
}

pub struct ReconciliationScheduler {
    catalog: Arc<Catalog>,
    weather: Arc<WeatherCache>,
    model: Arc<PredictionModel>,
    store: Arc<dyn PredictionStore>,
    cache: Arc<PredictionCache>,
    commits: CommitSender,
    pending: Arc<PendingWrites>,
    history: Arc<PredictionHistory>,
    training: Arc<TrainingSource>,
    jobs: JobTracker,
    last_cycles: DashMap<JobClass, SyncStatus>,
    permits: Semaphore,
    settings: SchedulerSettings,
}

impl ReconciliationScheduler {
    pub fn new(parts: SchedulerParts, settings: SchedulerSettings) -> Self {
        Self {
            catalog: parts.catalog,
            weather: parts.weather,
            model: parts.model,
            store: parts.store,
            cache: parts.cache,
            commits: parts.commits,
            pending: parts.pending,
            history: parts.history,
            training: parts.training,
            jobs: JobTracker::default(),
            last_cycles: DashMap::new(),
            permits: Semaphore::new(settings.max_concurrent_jobs),
            settings,
        }
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    /// Last finished cycle per job class, in class order
    pub fn sync_status(&self) -> Vec<SyncStatus> {
        JobClass::ALL
            .iter()
            .filter_map(|class| self.last_cycles.get(class).map(|status| status.value().clone()))
            .collect()
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Run one cycle of the given class
    pub async fn run_cycle(self: &Arc<Self>, class: JobClass, now: DateTime<Utc>) -> CycleReport {
        let report = match class {
            JobClass::WeatherRefresh => self.run_weather_cycle(now).await,
            JobClass::PredictionRefresh => self.run_prediction_cycle(now).await,
            JobClass::StoreSync => self.run_store_sync(now).await,
            JobClass::ModelRetrain => self.run_retrain_cycle(now).await,
        };
        report.log();
        report
    }

    /// Refresh weather for every park. Provider failures are absorbed by the
    /// cache, so these jobs only fail on timeout.
    pub async fn run_weather_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> CycleReport {
        let mut tasks = JoinSet::new();
        for park_id in self.catalog.park_ids().cloned().collect::<Vec<_>>() {
            let scheduler = Arc::clone(self);
            tasks.spawn(async move {
                let key = JobKey::park(JobClass::WeatherRefresh, &park_id);
                let job = async {
                    let observation = scheduler.weather.refresh(&park_id, now).await?;
                    tracing::debug!(
                        park = %park_id,
                        provenance = ?observation.provenance,
                        "Weather refreshed"
                    );
                    Ok::<(), AppError>(())
                };
                let outcome = scheduler.run_job(&key, now, job).await;
                (key, outcome)
            });
        }
        self.collect(JobClass::WeatherRefresh, now, tasks).await
    }

    /// Evaluate every (park, species) against current weather and commit the
    /// results through the store writer. One species failing does not stop
    /// the others.
    pub async fn run_prediction_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> CycleReport {
        let mut tasks = JoinSet::new();
        for (park_id, species_id) in self.catalog.pairs() {
            let scheduler = Arc::clone(self);
            tasks.spawn(async move {
                let key = JobKey::species(JobClass::PredictionRefresh, &park_id, &species_id);
                let job = scheduler.refresh_prediction(&key, &park_id, &species_id, now);
                let outcome = scheduler.run_job(&key, now, job).await;
                (key, outcome)
            });
        }
        self.collect(JobClass::PredictionRefresh, now, tasks).await
    }

    /// Retry parked writes, hydrate the fast cache from the store and drop
    /// expired cache entries
    pub async fn run_store_sync(self: &Arc<Self>, now: DateTime<Utc>) -> CycleReport {
        let purged_weather = self.weather.purge_expired(now);
        let purged_predictions = self.cache.purge_expired(now);
        tracing::debug!(purged_weather, purged_predictions, "Expired cache entries purged");

        let mut tasks = JoinSet::new();
        for park_id in self.catalog.park_ids().cloned().collect::<Vec<_>>() {
            let scheduler = Arc::clone(self);
            tasks.spawn(async move {
                let key = JobKey::park(JobClass::StoreSync, &park_id);
                let job = scheduler.sync_park(&key, &park_id, now);
                let outcome = scheduler.run_job(&key, now, job).await;
                (key, outcome)
            });
        }
        self.collect(JobClass::StoreSync, now, tasks).await
    }

    /// Retrain every (park, species)
    pub async fn run_retrain_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> CycleReport {
        self.retrain_pairs(self.catalog.pairs(), now).await
    }

    /// Retrain every species of one park
    pub async fn retrain_park(self: &Arc<Self>, park_id: &ParkId, now: DateTime<Utc>) -> AppResult<CycleReport> {
        let park = self.catalog.park_or_err(park_id)?;
        let pairs = park
            .species
            .keys()
            .map(|species| (park_id.clone(), species.clone()))
            .collect();
        let report = self.retrain_pairs(pairs, now).await;
        report.log();
        Ok(report)
    }

    /// Load every stored prediction into the fast cache
    pub async fn hydrate(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let rows = self.store.all().await?;
        let mut loaded = 0;
        for prediction in rows {
            if self.cache.is_fresh(&prediction, now) && self.cache.insert_if_newer(prediction) {
                loaded += 1;
            }
        }
        tracing::info!(loaded, "Fast cache hydrated from store");
        Ok(loaded)
    }

    /// Spawn one loop per job class. Loops stop on the shutdown signal.
    pub fn spawn_loops(self: &Arc<Self>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        JobClass::ALL
            .into_iter()
            .map(|class| {
                let scheduler = Arc::clone(self);
                let mut shutdown_rx = shutdown.subscribe();
                let period = self.settings.interval(class);
                // Models are trained at startup, so retraining waits a period
                let start = match class {
                    JobClass::ModelRetrain => Instant::now() + period,
                    _ => Instant::now(),
                };

                tokio::spawn(async move {
                    let mut ticker = interval_at(start, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    tracing::info!(job = class.as_str(), period_secs = period.as_secs(), "Scheduler loop started");

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {}
                            _ = shutdown_rx.recv() => break,
                        }
                        // dropping the cycle aborts its in-flight jobs
                        tokio::select! {
                            _ = scheduler.run_cycle(class, Utc::now()) => {}
                            _ = shutdown_rx.recv() => {
                                tracing::info!(job = class.as_str(), "In-flight cycle cancelled");
                                break;
                            }
                        }
                    }
                    tracing::info!(job = class.as_str(), "Scheduler loop stopping");
                })
            })
            .collect()
    }

    // =========================================================================
    // Internal methods
    // =========================================================================

    async fn run_job<F>(&self, key: &JobKey, now: DateTime<Utc>, job: F) -> JobOutcome
    where
        F: Future<Output = AppResult<()>>,
    {
        if !self.jobs.try_begin(key, now) {
            tracing::debug!(job = %key, state = ?self.jobs.state(key), "Key busy, tick skipped");
            return JobOutcome::Skipped;
        }

        let retry_at = now
            + chrono::Duration::from_std(self.settings.failure_backoff)
                .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let guard = JobGuard {
            jobs: &self.jobs,
            key,
            retry_at,
            settled: false,
        };

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.jobs.complete(key);
                guard.settle();
                return JobOutcome::Skipped;
            }
        };

        let outcome = match tokio::time::timeout(self.settings.job_timeout, job).await {
            Ok(Ok(())) => {
                self.jobs.complete(key);
                JobOutcome::Completed
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    job = %key,
                    park = %key.park_id,
                    species = ?key.species_id,
                    at = %now,
                    error = %e,
                    "Job failed"
                );
                self.jobs.fail(key, retry_at);
                JobOutcome::Failed(e.to_string())
            }
            Err(_) => {
                let e = AppError::JobTimeout {
                    job: key.class.as_str().to_string(),
                    key: key.to_string(),
                    budget_secs: self.settings.job_timeout.as_secs(),
                };
                tracing::warn!(
                    job = %key,
                    park = %key.park_id,
                    species = ?key.species_id,
                    at = %now,
                    "{}",
                    e
                );
                self.jobs.fail(key, retry_at);
                JobOutcome::Failed(e.to_string())
            }
        };
        guard.settle();
        outcome
    }

    async fn collect(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
        mut tasks: JoinSet<(JobKey, JobOutcome)>,
    ) -> CycleReport {
        let mut report = CycleReport::new(class, now);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, outcome)) => report.record(key, outcome),
                Err(e) => {
                    tracing::error!(job = class.as_str(), error = %e, "Job task panicked");
                    report.failed.push(JobFailure {
                        job: class.as_str().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.completed.sort();
        report.skipped.sort();
        report.failed.sort_by(|a, b| a.job.cmp(&b.job));
        self.last_cycles.insert(class, SyncStatus::from(&report));
        report
    }

    async fn refresh_prediction(
        &self,
        key: &JobKey,
        park_id: &ParkId,
        species_id: &SpeciesId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let park = self.catalog.park_or_err(park_id)?;
        let observation = self.weather.get(park_id, now).await?;
        let features = FeatureVector::from_observation(&observation, park.utc_offset_hours);
        let prediction = self.model.evaluate(park_id, species_id, &features, now)?;

        self.jobs.committing(key);
        self.commits
            .commit(prediction, JobClass::PredictionRefresh.as_str())
            .await?;
        Ok(())
    }

    async fn sync_park(&self, key: &JobKey, park_id: &ParkId, now: DateTime<Utc>) -> AppResult<()> {
        let retries = self.pending.drain_park(park_id);
        if !retries.is_empty() {
            tracing::info!(park = %park_id, count = retries.len(), "Retrying parked store writes");
        }

        self.jobs.committing(key);
        let mut first_error = None;
        for prediction in retries {
            if let Err(e) = write_through(
                self.store.as_ref(),
                &self.cache,
                &self.pending,
                &self.history,
                &prediction,
                JobClass::StoreSync.as_str(),
                now,
            )
            .await
            {
                first_error.get_or_insert(e);
            }
        }

        for prediction in self.store.latest_all(park_id).await? {
            self.cache.insert_if_newer(prediction);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn retrain_pairs(
        self: &Arc<Self>,
        pairs: Vec<(ParkId, SpeciesId)>,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let mut tasks = JoinSet::new();
        for (park_id, species_id) in pairs {
            let scheduler = Arc::clone(self);
            tasks.spawn(async move {
                let key = JobKey::species(JobClass::ModelRetrain, &park_id, &species_id);
                let job = scheduler.retrain_one(&key, &park_id, &species_id, now);
                let outcome = scheduler.run_job(&key, now, job).await;
                (key, outcome)
            });
        }
        self.collect(JobClass::ModelRetrain, now, tasks).await
    }

    async fn retrain_one(
        &self,
        key: &JobKey,
        park_id: &ParkId,
        species_id: &SpeciesId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let catalog = Arc::clone(&self.catalog);
        let training = Arc::clone(&self.training);
        let (park, species) = (park_id.clone(), species_id.clone());

        // Fitting is CPU-bound; the swap happens only if the job is still live
        let fitted = tokio::task::spawn_blocking(move || {
            let set = training.training_set(&catalog, &park, &species)?;
            fit(&set, now)
        })
        .await
        .map_err(|e| AppError::Internal(format!("retrain task failed: {}", e)))??;

        self.jobs.committing(key);
        self.model.install(park_id, species_id, fitted.0, fitted.1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> JobKey {
        JobKey::species(
            JobClass::PredictionRefresh,
            &ParkId::from("serengeti"),
            &SpeciesId::from("lions"),
        )
    }

    #[test]
    fn test_busy_key_is_skipped() {
        let tracker = JobTracker::default();
        let now = Utc::now();
        assert!(tracker.try_begin(&key(), now));
        assert!(!tracker.try_begin(&key(), now));
        tracker.committing(&key());
        assert!(!tracker.try_begin(&key(), now));
        tracker.complete(&key());
        assert!(tracker.try_begin(&key(), now));
    }

    #[test]
    fn test_failed_key_waits_for_backoff() {
        let tracker = JobTracker::default();
        let now = Utc::now();
        tracker.fail(&key(), now + chrono::Duration::minutes(5));

        assert!(!tracker.try_begin(&key(), now + chrono::Duration::minutes(4)));
        assert!(tracker.try_begin(&key(), now + chrono::Duration::minutes(5)));
        assert_eq!(tracker.state(&key()), JobState::Refreshing);
    }

    #[test]
    fn test_counts() {
        let tracker = JobTracker::default();
        let now = Utc::now();
        tracker.try_begin(&key(), now);
        tracker.fail(
            &JobKey::park(JobClass::WeatherRefresh, &ParkId::from("gombe")),
            now,
        );
        let counts = tracker.counts();
        assert_eq!(counts.refreshing, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "prediction_refresh:serengeti/lions");
        assert_eq!(
            JobKey::park(JobClass::StoreSync, &ParkId::from("mikumi")).to_string(),
            "store_sync:mikumi"
        );
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.interval(JobClass::WeatherRefresh), Duration::from_secs(1800));
        assert_eq!(settings.interval(JobClass::ModelRetrain), Duration::from_secs(86400));
        assert_eq!(settings.job_timeout, Duration::from_secs(60));
    }
}
