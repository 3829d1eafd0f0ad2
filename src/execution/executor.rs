//! Step executor - runs individual steps against the backend

use crate::{
    backend::Engine,
    core::{PipelineState, ProcessState, Step},
    execution::{Logger, RuntimeError, TraceError, Tracer},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of executing a step that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step was not run
    Skipped { reason: String },
    /// Step was started and left running
    Detached,
    /// Step ran to completion successfully
    Completed(ProcessState),
}

/// Executes a single step
pub struct StepExecutor<E> {
    engine: Arc<E>,
    tracer: Option<Arc<dyn Tracer>>,
    logger: Option<Arc<dyn Logger>>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    /// Steps that may be running on the backend and have not been waited on
    ///
    /// Never locked across an await.
    running: Mutex<HashMap<String, Step>>,
}

impl<E: Engine + 'static> StepExecutor<E> {
    pub fn new(
        engine: Arc<E>,
        tracer: Option<Arc<dyn Tracer>>,
        logger: Option<Arc<dyn Logger>>,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            engine,
            tracer,
            logger,
            run_id,
            started_at,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Execute a step given the pipeline error accumulated before its stage
    pub async fn execute(
        &self,
        step: &Step,
        failure: Option<&RuntimeError>,
    ) -> Result<StepOutcome, RuntimeError> {
        if !step.run_policy.permits(failure.is_some()) {
            let reason = format!(
                "policy {} does not run while the pipeline is {}",
                step.run_policy,
                if failure.is_some() { "failing" } else { "passing" }
            );
            debug!("Skipping step {}: {}", step.name, reason);
            return Ok(StepOutcome::Skipped { reason });
        }

        if let Some(tracer) = &self.tracer {
            match tracer.trace(&self.snapshot(step, failure, None)) {
                Ok(()) => {}
                Err(TraceError::Skip) => {
                    info!("Step {} skipped by tracer", step.name);
                    return Ok(StepOutcome::Skipped {
                        reason: "skipped by tracer".to_string(),
                    });
                }
                Err(TraceError::Abort(message)) => {
                    return Err(RuntimeError::Trace {
                        step: step.name.clone(),
                        message,
                    });
                }
            }
        }

        info!("Starting step {} ({})", step.name, step.image);
        // Tracked before exec so a start interrupted by cancellation is still killed
        self.running().insert(step.name.clone(), step.clone());
        if let Err(source) = self.engine.exec(step).await {
            self.running().remove(&step.name);
            return Err(RuntimeError::Start {
                step: step.name.clone(),
                source,
            });
        }

        if let Some(logger) = &self.logger {
            let stream = self
                .engine
                .tail(step)
                .await
                .map_err(|source| RuntimeError::Tail {
                    step: step.name.clone(),
                    source,
                })?;
            let logger = Arc::clone(logger);
            let step = step.clone();
            tokio::spawn(async move {
                logger.log(&step, stream).await;
            });
        }

        if step.detached {
            info!("Step {} detached", step.name);
            return Ok(StepOutcome::Detached);
        }

        let process = self.wait(step).await;
        self.running().remove(&step.name);
        let process = process?;

        if let Some(tracer) = &self.tracer {
            match tracer.trace(&self.snapshot(step, failure, Some(process))) {
                // The step already ran, so a late skip has nothing to skip
                Ok(()) | Err(TraceError::Skip) => {}
                Err(TraceError::Abort(message)) => {
                    return Err(RuntimeError::Trace {
                        step: step.name.clone(),
                        message,
                    });
                }
            }
        }

        classify(step, process)
    }

    /// Wait for the step, bounded by its timeout when one is set
    async fn wait(&self, step: &Step) -> Result<ProcessState, RuntimeError> {
        let waited = match step.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), self.engine.wait(step)).await {
                Ok(waited) => waited,
                Err(_) => {
                    error!("Timeout for step {} after {}s", step.name, secs);
                    if let Err(e) = self.engine.kill(step).await {
                        warn!("Failed to kill timed out step {}: {}", step.name, e);
                    }
                    return Err(RuntimeError::Timeout {
                        name: step.name.clone(),
                        secs,
                    });
                }
            },
            None => self.engine.wait(step).await,
        };

        waited.map_err(|source| RuntimeError::Wait {
            step: step.name.clone(),
            source,
        })
    }

    /// Kill every step that was started and has not finished
    pub async fn kill_running(&self) {
        let running: Vec<Step> = self.running().drain().map(|(_, step)| step).collect();

        for step in running {
            match self.engine.kill(&step).await {
                Ok(()) => info!("Killed step {}", step.name),
                Err(e) => warn!("Failed to kill step {}: {}", step.name, e),
            }
        }
    }

    /// Names of the steps currently tracked as running
    pub fn running_steps(&self) -> Vec<String> {
        self.running().keys().cloned().collect()
    }

    fn running(&self) -> MutexGuard<'_, HashMap<String, Step>> {
        // The map stays consistent even if a holder panicked
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(
        &self,
        step: &Step,
        failure: Option<&RuntimeError>,
        process: Option<ProcessState>,
    ) -> PipelineState {
        PipelineState {
            run_id: self.run_id,
            started_at: self.started_at,
            step: step.clone(),
            error: failure.cloned(),
            process,
        }
    }
}

/// Turn a terminal process state into the step's result
///
/// An OOM kill wins over the exit code.
pub fn classify(step: &Step, process: ProcessState) -> Result<StepOutcome, RuntimeError> {
    if process.oom_killed {
        Err(RuntimeError::Oom {
            name: step.name.clone(),
            code: process.exit_code,
        })
    } else if process.exit_code != 0 {
        Err(RuntimeError::Exit {
            name: step.name.clone(),
            code: process.exit_code,
        })
    } else {
        info!("Step {} completed successfully", step.name);
        Ok(StepOutcome::Completed(process))
    }
}
