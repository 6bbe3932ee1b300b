//! Engine wiring
//!
//! Owns every component of the prediction engine. `start` trains the models,
//! hydrates the fast cache and spawns the store writer and scheduler loops;
//! `shutdown` signals them and waits for them to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::WeatherProvider;
use crate::services::scheduler::{SchedulerParts, SchedulerSettings};
use crate::services::training::load_csv;
use crate::services::weather_cache::WeatherCacheSettings;
use crate::services::{
    JobClass, PendingWrites, PredictionCache, PredictionHistory, PredictionModel, PredictionService,
    PredictionStore, ReconciliationScheduler, SightingLog, StoreWriter, TrainingSource, WeatherCache,
};

/// Tunables for one engine instance
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub weather: WeatherCacheSettings,
    pub prediction_ttl: Duration,
    pub scheduler: SchedulerSettings,
    /// Spawn the periodic loops on start
    pub run_loops: bool,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            weather: WeatherCacheSettings::from(&config.weather),
            prediction_ttl: config.cache.prediction_ttl(),
            scheduler: SchedulerSettings::from(&config.scheduler),
            run_loops: config.scheduler.enabled,
        }
    }
}

pub struct Engine {
    pub catalog: Arc<Catalog>,
    pub weather: Arc<WeatherCache>,
    pub model: Arc<PredictionModel>,
    pub store: Arc<dyn PredictionStore>,
    pub cache: Arc<PredictionCache>,
    pub scheduler: Arc<ReconciliationScheduler>,
    pub predictions: PredictionService,
    pub sightings: Arc<SightingLog>,
    pub history: Arc<PredictionHistory>,
    settings: EngineSettings,
    shutdown: broadcast::Sender<()>,
    writer: Mutex<Option<StoreWriter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopping: AtomicBool,
}

impl Engine {
    pub fn new(
        catalog: Catalog,
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn PredictionStore>,
        training: TrainingSource,
        settings: EngineSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let weather = Arc::new(WeatherCache::new(provider, catalog.clone(), settings.weather));
        let model = Arc::new(PredictionModel::new(catalog.clone()));
        let cache = Arc::new(PredictionCache::new(settings.prediction_ttl));
        let pending = Arc::new(PendingWrites::default());
        let history = Arc::new(PredictionHistory::default());
        let (commits, writer) =
            StoreWriter::channel(store.clone(), cache.clone(), pending.clone(), history.clone());

        let scheduler = Arc::new(ReconciliationScheduler::new(
            SchedulerParts {
                catalog: catalog.clone(),
                weather: weather.clone(),
                model: model.clone(),
                store: store.clone(),
                cache: cache.clone(),
                commits: commits.clone(),
                pending,
                history: history.clone(),
                training: Arc::new(training),
            },
            settings.scheduler,
        ));

        let predictions = PredictionService::new(
            catalog.clone(),
            weather.clone(),
            model.clone(),
            store.clone(),
            cache.clone(),
            commits,
        );
        let sightings = Arc::new(SightingLog::new(catalog.clone()));
        let (shutdown, _) = broadcast::channel(1);

        Self {
            catalog,
            weather,
            model,
            store,
            cache,
            scheduler,
            predictions,
            sightings,
            history,
            settings,
            shutdown,
            writer: Mutex::new(Some(writer)),
            tasks: Mutex::new(Vec::new()),
            stopping: AtomicBool::new(false),
        }
    }

    /// Build an engine from configuration, loading the catalog and any
    /// historical training data it names
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn PredictionStore>,
    ) -> AppResult<Self> {
        let catalog = match &config.data.catalog_path {
            Some(path) => Catalog::from_json_file(path)?,
            None => Catalog::default(),
        };
        catalog.validate()?;

        let training = match &config.data.training_csv_path {
            Some(path) => {
                let sets = load_csv(path)?;
                tracing::info!(pairs = sets.len(), path = %path, "Historical training data loaded");
                TrainingSource::historical(sets)
            }
            None => TrainingSource::synthetic(),
        };

        Ok(Self::new(catalog, provider, store, training, EngineSettings::from(config)))
    }

    /// Train, hydrate and start background work. Calling it twice is a no-op.
    pub async fn start(&self) -> AppResult<()> {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(writer) = writer else {
            return Ok(());
        };

        let mut handles = vec![tokio::spawn(writer.run(self.shutdown.subscribe()))];

        let now = Utc::now();
        let report = self.scheduler.run_retrain_cycle(now).await;
        tracing::info!(
            trained = report.completed.len(),
            failed = report.failed.len(),
            "Initial model training finished"
        );

        if let Err(e) = self.scheduler.hydrate(now).await {
            tracing::warn!(error = %e, "Could not hydrate fast cache from store");
        }

        if self.settings.run_loops {
            handles.extend(self.scheduler.spawn_loops(&self.shutdown));
        }

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        Ok(())
    }

    /// Run one cycle in the background. Shutdown cancels it along with the
    /// loops.
    pub fn trigger(&self, class: JobClass) -> AppResult<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stopping.load(Ordering::SeqCst) {
            return Err(AppError::ShuttingDown);
        }

        let scheduler = self.scheduler.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = scheduler.run_cycle(class, Utc::now()) => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!(job = class.as_str(), "Manual cycle cancelled");
                }
            }
        });

        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        tracing::info!(job = class.as_str(), "Manual cycle triggered");
        Ok(())
    }

    /// Stop loops, manual cycles and the store writer, waiting for them to
    /// exit. In-flight cycles are cancelled, not drained.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            self.stopping.store(true, Ordering::SeqCst);
            let _ = self.shutdown.send(());
            tasks.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Engine stopped");
    }
}
