//! Automation scheduler
//!
//! Drains the keyword batch queue one batch at a time:
//! - Unbounded mode works through every remaining keyword in one run
//! - Rate-limited mode handles one quota-sized slice per tick
//!
//! A run is claimed with `begin()` and executed separately, so a caller can
//! return before the run does any work while `stop()` still sees it. All
//! queue mutations happen while the run lock is held. `stop()` cancels the
//! run and then takes the run lock itself, so once it returns nothing else
//! is written until the next run is claimed.

use crate::processor::{BatchContext, KeywordOutcome, KeywordProcessor};
use chrono::{DateTime, Utc};
use contentforge_common::{
    config::AutomationSettings,
    errors::{AppError, Result},
    metrics,
    models::{AutomationConfig, KeywordBatch},
    queue::BatchQueue,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing and failure policy for a scheduler
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Pause between keywords in unbounded mode
    pub keyword_delay: Duration,
    /// Pause between keywords inside a rate-limited slice
    pub slice_delay: Duration,
    pub tick_interval: Duration,
    pub halt_on_invalid_credential: bool,
}

impl SchedulerSettings {
    pub fn from_config(settings: &AutomationSettings) -> Self {
        Self {
            keyword_delay: settings.keyword_delay(),
            slice_delay: settings.slice_delay(),
            tick_interval: settings.tick_interval(),
            halt_on_invalid_credential: settings.halt_on_invalid_credential,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&AutomationSettings::default())
    }
}

/// Snapshot returned by the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_per_tick: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub active_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<KeywordBatch>,
}

/// How a slice of one batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliceEnd {
    Completed,
    /// Keywords remain for a later tick
    Partial,
    /// The batch was deleted underneath the run
    Vanished,
    /// The batch cannot be worked on right now
    Blocked,
    Halted,
    Cancelled,
}

struct RunState {
    running: bool,
    generation: u64,
    cancel: CancellationToken,
    ticker: Option<JoinHandle<()>>,
    config: Option<AutomationConfig>,
    started_at: Option<DateTime<Utc>>,
}

struct Inner {
    queue: Arc<BatchQueue>,
    processor: KeywordProcessor,
    settings: SchedulerSettings,
    state: Mutex<RunState>,
    run_lock: Mutex<()>,
}

/// Cloneable handle to the automation scheduler
#[derive(Clone)]
pub struct AutomationScheduler {
    inner: Arc<Inner>,
}

impl AutomationScheduler {
    pub fn new(queue: Arc<BatchQueue>, processor: KeywordProcessor, settings: SchedulerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                processor,
                settings,
                state: Mutex::new(RunState {
                    running: false,
                    generation: 0,
                    cancel: CancellationToken::new(),
                    ticker: None,
                    config: None,
                    started_at: None,
                }),
                run_lock: Mutex::new(()),
            }),
        }
    }

    /// Checks that must pass before a run may start
    pub fn preflight(&self, config: &AutomationConfig) -> Result<()> {
        if !config.enabled {
            return Err(AppError::AutomationDisabled);
        }
        if !self.inner.processor.has_credential() {
            return Err(AppError::MissingCredential);
        }
        Ok(())
    }

    /// Claim a new run.
    ///
    /// From here on the scheduler reports running and `stop()` cancels the
    /// run, even before [`ClaimedRun::execute`] is polled. Returns `None`
    /// when a run is already active.
    pub async fn begin(&self, config: AutomationConfig) -> Result<Option<ClaimedRun>> {
        self.preflight(&config)?;

        let mut state = self.inner.state.lock().await;
        if state.running {
            debug!("Automation already running, ignoring start");
            return Ok(None);
        }

        state.running = true;
        state.generation += 1;
        state.cancel = CancellationToken::new();
        state.config = Some(config.clone());
        state.started_at = Some(Utc::now());

        Ok(Some(ClaimedRun {
            inner: self.inner.clone(),
            config,
            cancel: state.cancel.clone(),
            generation: state.generation,
        }))
    }

    /// Claim and execute a run in place; a no-op while one is active
    #[cfg(test)]
    pub async fn start(&self, config: AutomationConfig) -> Result<()> {
        if let Some(run) = self.begin(config).await? {
            run.execute().await;
        }
        Ok(())
    }

    /// Stop automation.
    ///
    /// Waits for an in-flight keyword to finish. Batches keep their status
    /// and progress.
    pub async fn stop(&self) {
        let (ticker, was_running) = {
            let mut state = self.inner.state.lock().await;
            state.cancel.cancel();
            let was_running = state.running;
            state.running = false;
            state.config = None;
            state.started_at = None;
            (state.ticker.take(), was_running)
        };

        if let Some(handle) = ticker {
            if let Err(e) = handle.await {
                warn!(error = %e, "Automation ticker ended abnormally");
            }
        }

        let _guard = self.inner.run_lock.lock().await;
        if was_running {
            info!("Automation stopped");
        }
    }

    /// Stop and release the scheduler, used on shutdown.
    ///
    /// Also waits for index notifications that are still being submitted.
    pub async fn dispose(&self) {
        self.stop().await;
        self.inner.processor.drain_notifications().await;
        debug!("Automation scheduler disposed");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    pub async fn status(&self) -> SchedulerStatus {
        let (running, config, started_at) = {
            let state = self.inner.state.lock().await;
            (state.running, state.config.clone(), state.started_at)
        };

        let mode = config.as_ref().map(|c| {
            if c.is_unbounded() {
                "unbounded"
            } else {
                "rate_limited"
            }
        });

        SchedulerStatus {
            running,
            mode: mode.filter(|_| running),
            quota_per_tick: config.and_then(|c| c.effective_quota()).filter(|_| running),
            started_at: started_at.filter(|_| running),
            active_batches: self.inner.queue.active_count().await,
            current_batch: self.inner.queue.select_next_batch().await,
        }
    }
}

/// A run claimed by [`AutomationScheduler::begin`]
pub struct ClaimedRun {
    inner: Arc<Inner>,
    config: AutomationConfig,
    cancel: CancellationToken,
    generation: u64,
}

impl ClaimedRun {
    /// Do the work of the run.
    ///
    /// In unbounded mode this returns once the queue is drained or the run
    /// is stopped. In rate-limited mode the first slice runs before
    /// returning and later slices run on the recurring ticker.
    pub async fn execute(self) {
        let ClaimedRun {
            inner,
            config,
            cancel,
            generation,
        } = self;

        if config.auto_social_share {
            info!("Social sharing requested, not supported by this service");
        }

        let Some(quota) = config.effective_quota() else {
            info!("Automation started in unbounded mode");
            inner.drain(&config, &cancel).await;
            inner.finish(generation).await;
            return;
        };

        info!(
            quota,
            hourly_limit = config.hourly_limit,
            daily_limit = config.daily_limit,
            interval_secs = inner.settings.tick_interval.as_secs(),
            "Automation started in rate-limited mode"
        );

        if !inner.run_tick(&config, quota, &cancel).await {
            inner.finish(generation).await;
            return;
        }

        let handle = tokio::spawn(run_ticker(
            inner.clone(),
            config,
            quota,
            cancel,
            generation,
        ));

        let mut state = inner.state.lock().await;
        if state.running && state.generation == generation && !handle.is_finished() {
            state.ticker = Some(handle);
        }
    }
}

async fn run_ticker(
    inner: Arc<Inner>,
    config: AutomationConfig,
    quota: usize,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut interval = tokio::time::interval(inner.settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; that slice already ran in execute()
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!("Automation tick");
                if !inner.run_tick(&config, quota, &cancel).await {
                    inner.finish(generation).await;
                    break;
                }
            }
        }
    }
}

impl Inner {
    /// Process every remaining keyword across all active batches
    async fn drain(&self, config: &AutomationConfig, cancel: &CancellationToken) {
        let _guard = self.run_lock.lock().await;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let Some(batch) = self.queue.select_next_batch().await else {
                info!("No pending keyword batches left");
                break;
            };

            let end = self
                .process_slice(&batch, None, config, cancel, self.settings.keyword_delay)
                .await;
            self.refresh_pending_gauge().await;

            match end {
                SliceEnd::Completed | SliceEnd::Vanished => {
                    if !pause(self.settings.keyword_delay, cancel).await {
                        break;
                    }
                }
                SliceEnd::Partial
                | SliceEnd::Blocked
                | SliceEnd::Halted
                | SliceEnd::Cancelled => break,
            }
        }
    }

    /// Run one rate-limited slice.
    ///
    /// Returns whether the run should keep ticking.
    async fn run_tick(&self, config: &AutomationConfig, quota: usize, cancel: &CancellationToken) -> bool {
        let _guard = self.run_lock.lock().await;

        if cancel.is_cancelled() {
            return false;
        }

        let Some(batch) = self.queue.select_next_batch().await else {
            info!("No pending keyword batches left");
            return false;
        };

        let end = self
            .process_slice(&batch, Some(quota), config, cancel, self.settings.slice_delay)
            .await;
        self.refresh_pending_gauge().await;

        match end {
            SliceEnd::Halted | SliceEnd::Cancelled => false,
            SliceEnd::Completed
            | SliceEnd::Partial
            | SliceEnd::Vanished
            | SliceEnd::Blocked => self.queue.active_count().await > 0,
        }
    }

    /// Process up to `limit` remaining keywords of one batch, in order
    async fn process_slice(
        &self,
        batch: &KeywordBatch,
        limit: Option<usize>,
        config: &AutomationConfig,
        cancel: &CancellationToken,
        delay: Duration,
    ) -> SliceEnd {
        let batch_id = batch.id.as_str();

        let batch = match self.queue.mark_processing(batch_id).await {
            Ok(batch) => batch,
            Err(AppError::BatchNotFound { .. }) => return SliceEnd::Vanished,
            Err(e) => {
                warn!(batch_id, error = %e, "Failed to persist batch status");
                batch.clone()
            }
        };

        let category = match self.processor.category(&batch.category_id).await {
            Ok(Some(category)) => category,
            Ok(None) => {
                let error = AppError::CategoryNotFound {
                    id: batch.category_id.clone(),
                };
                warn!(batch_id, error = %error, "Skipping batch for now");
                self.note_error(batch_id, error.to_string()).await;
                return SliceEnd::Blocked;
            }
            Err(e) => {
                warn!(batch_id, error = %e, "Category lookup failed, skipping batch for now");
                self.note_error(batch_id, format!("category lookup failed: {}", e)).await;
                return SliceEnd::Blocked;
            }
        };

        let remaining = batch.remaining();
        let keywords = &remaining[..limit.unwrap_or(remaining.len()).min(remaining.len())];

        info!(
            batch_id,
            category = %category.name,
            slice = keywords.len(),
            processed = batch.processed_count,
            total = batch.total_count,
            "Processing keyword slice"
        );

        let ctx = BatchContext {
            batch_id,
            category: &category,
            config,
        };

        for (index, keyword) in keywords.iter().enumerate() {
            if cancel.is_cancelled() {
                return SliceEnd::Cancelled;
            }

            let error = match self.processor.process(&ctx, keyword).await {
                KeywordOutcome::Published { .. } => None,
                KeywordOutcome::Skipped { error } => Some(error),
                KeywordOutcome::Halt { error } if self.settings.halt_on_invalid_credential => {
                    error!(batch_id, keyword = %keyword, error = %error, "Generation credentials rejected, halting automation");
                    self.note_error(batch_id, error.to_string()).await;
                    return SliceEnd::Halted;
                }
                KeywordOutcome::Halt { error } => {
                    warn!(batch_id, keyword = %keyword, error = %error, "Generation credentials rejected, skipping keyword");
                    Some(error.to_string())
                }
            };

            match self.queue.record_processed(batch_id, error).await {
                Ok(updated) => debug!(
                    batch_id,
                    processed = updated.processed_count,
                    total = updated.total_count,
                    "Keyword processed"
                ),
                Err(AppError::BatchNotFound { .. }) => {
                    info!(batch_id, "Batch deleted while processing, moving on");
                    return SliceEnd::Vanished;
                }
                Err(e) => warn!(batch_id, error = %e, "Failed to persist batch progress"),
            }

            if index + 1 < keywords.len() && !pause(delay, cancel).await {
                return SliceEnd::Cancelled;
            }
        }

        match self.queue.complete_if_exhausted(batch_id).await {
            Ok(true) => {
                info!(batch_id, total = batch.total_count, "Keyword batch completed");
                metrics::record_batch_completed();
                SliceEnd::Completed
            }
            Ok(false) => SliceEnd::Partial,
            Err(AppError::BatchNotFound { .. }) => SliceEnd::Vanished,
            Err(e) => {
                warn!(batch_id, error = %e, "Failed to persist batch completion");
                SliceEnd::Partial
            }
        }
    }

    async fn note_error(&self, batch_id: &str, message: impl Into<String>) {
        if let Err(e) = self.queue.record_error(batch_id, message).await {
            debug!(batch_id, error = %e, "Could not record batch error");
        }
    }

    async fn refresh_pending_gauge(&self) {
        metrics::set_batches_pending(self.queue.active_count().await);
    }

    /// Mark the run finished unless a newer run has started since
    async fn finish(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation && state.running {
            state.running = false;
            state.ticker = None;
            info!("Automation run finished");
        }
    }
}

/// Sleep unless cancelled first; returns false on cancellation
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
