//! Pipeline runtime - sequences stages and fans out their steps

use crate::{
    backend::Engine,
    core::{Config, Stage},
    execution::{Logger, RuntimeError, StepExecutor, Tracer},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Live execution context for one pipeline run
///
/// Stages run strictly in order and the steps of a stage run concurrently.
/// A failed stage does not stop the run: its error becomes the accumulated
/// pipeline error, which later steps are gated on, and is reported as the
/// run result unless a later stage fails too. The backend environment is
/// destroyed and closed exactly once when [`Runtime::run`] finishes, whatever
/// the outcome.
pub struct Runtime<E> {
    config: Arc<Config>,
    engine: Arc<E>,
    tracer: Option<Arc<dyn Tracer>>,
    logger: Option<Arc<dyn Logger>>,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl<E: Engine + 'static> Runtime<E> {
    pub fn new(config: Config, engine: E) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            tracer: None,
            logger: None,
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use an externally owned cancellation signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run the pipeline to completion and tear down the environment
    pub async fn run(self) -> Result<(), RuntimeError> {
        let started_at = Utc::now();
        info!(
            "Starting pipeline run {} ({} stages, {} steps)",
            self.run_id,
            self.config.stages.len(),
            self.config.step_count()
        );

        let result = self.run_stages(started_at).await;
        self.teardown().await;

        match &result {
            Ok(()) => info!("Pipeline run {} completed", self.run_id),
            Err(RuntimeError::Cancelled) => warn!("Pipeline run {} cancelled", self.run_id),
            Err(e) => error!("Pipeline run {} failed: {}", self.run_id, e),
        }
        result
    }

    async fn run_stages(&self, started_at: DateTime<Utc>) -> Result<(), RuntimeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RuntimeError::Cancelled),
            setup = self.engine.setup(&self.config) => setup.map_err(RuntimeError::Setup)?,
        }

        let executor = Arc::new(StepExecutor::new(
            Arc::clone(&self.engine),
            self.tracer.clone(),
            self.logger.clone(),
            self.run_id,
            started_at,
        ));

        // Owned by this loop alone; step tasks only ever see a snapshot
        let mut failure: Option<RuntimeError> = None;
        for stage in &self.config.stages {
            if self.cancel.is_cancelled() {
                warn!("Not starting stage {}: run cancelled", stage.name);
                return Err(RuntimeError::Cancelled);
            }
            if let Some(err) = self.exec_all(&executor, stage, failure.clone()).await? {
                failure = Some(err);
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run every step of a stage concurrently
    ///
    /// All steps run to completion; the first error to arrive is the stage
    /// result. Returns `Err(Cancelled)` if the run is cancelled first.
    async fn exec_all(
        &self,
        executor: &Arc<StepExecutor<E>>,
        stage: &Stage,
        failure: Option<RuntimeError>,
    ) -> Result<Option<RuntimeError>, RuntimeError> {
        info!("Running stage {} ({} steps)", stage.name, stage.steps.len());

        let mut tasks = JoinSet::new();
        for step in &stage.steps {
            let executor = Arc::clone(executor);
            let step = step.clone();
            let failure = failure.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                // A task first polled after cancellation never reaches the backend
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
                    result = executor.execute(&step, failure.as_ref()) => result,
                };
                (step.name, result)
            });
        }

        let mut first_error = None;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Cancelling stage {}", stage.name);
                    tasks.abort_all();
                    // Drain first so no task can register a step after the kill sweep
                    while tasks.join_next().await.is_some() {}
                    executor.kill_running().await;
                    return Err(RuntimeError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((_, Ok(_)))) => {}
                    Some(Ok((name, Err(err)))) => {
                        error!("Step {} failed: {}", name, err);
                        first_error.get_or_insert(err);
                    }
                    Some(Err(join_error)) => {
                        error!("Step task in stage {} did not finish: {}", stage.name, join_error);
                        first_error.get_or_insert(RuntimeError::Panicked {
                            stage: stage.name.clone(),
                            message: join_error.to_string(),
                        });
                    }
                },
            }
        }

        Ok(first_error)
    }

    async fn teardown(&self) {
        if let Err(e) = self.engine.destroy(&self.config).await {
            warn!("Failed to destroy pipeline environment: {}", e);
        }
        if let Err(e) = self.engine.close().await {
            warn!("Failed to close backend: {}", e);
        }
    }
}
