use crate::{
    error::{ExecutionError, PartialExecution, TaskError},
    execution::{factory::TransferPlugins, state::ProcessState, utils::run_id_for, workers},
};
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    context::{ExecConfig, ExecSession},
    error::PluginError,
    metrics::MetricsSnapshot,
    plugin::{FilterControl, InputControl, OutputControl, PluginRegistry},
    state::{ResumeState, TaskPhase},
};
use futures::future::BoxFuture;
use model::schema::Schema;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

/// Outcome of a committed transaction.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// `{ "in": <input diff>, "out": <output diff> }`
    pub config_diff: ConfigDiff,
    pub metrics: MetricsSnapshot,
}

/// Drives the transaction of every stage and the partition tasks in
/// between.
pub struct TransferExecutor {
    registry: PluginRegistry,
    cancel: CancellationToken,
}

impl TransferExecutor {
    pub fn new(registry: PluginRegistry) -> Self {
        TransferExecutor {
            registry,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops launching tasks once `cancel` fires. Tasks already running
    /// finish normally.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, config: &ConfigSource) -> Result<ExecutionResult, ExecutionError> {
        let run_id = run_id_for(config);
        let exec_config = config.nested_or_empty("exec")?;
        let session = Arc::new(ExecSession::from_config(run_id, config)?);
        let plugins = TransferPlugins::resolve(&self.registry, config)?;

        info!(run_id = %session.run_id(), "Starting transaction");
        let mut transfer = Transfer {
            plugins,
            session,
            exec_config,
            cancel: self.cancel.clone(),
            state: ProcessState::new(),
            resuming: false,
            output_diff: None,
        };

        let span = transfer.session.span().clone();
        let result = async {
            let input = transfer.plugins.input.clone();
            let input_config = transfer.plugins.input_config.clone();
            let mut stage = InputStage {
                transfer: &mut transfer,
            };
            input.transaction(&input_config, &mut stage).await
        }
        .instrument(span)
        .await;

        transfer.finish(result)
    }

    /// Runs only the tasks `saved` does not record as committed and reuses
    /// the saved reports of the others.
    pub async fn resume(
        &self,
        config: &ConfigSource,
        saved: &ResumeState,
    ) -> Result<ExecutionResult, ExecutionError> {
        let run_id = run_id_for(config);
        if run_id != saved.run_id {
            warn!(
                run_id = %run_id,
                saved_run_id = %saved.run_id,
                "Config changed since the interrupted run"
            );
        }

        let exec: ExecConfig = saved.exec_config.load_config()?;
        let session = Arc::new(ExecSession::new(saved.run_id.clone(), exec));
        let plugins = TransferPlugins::resolve(&self.registry, config)?;
        if plugins.filters.len() != saved.filter_tasks.len() {
            return Err(ExecutionError::ResumeMismatch(format!(
                "config has {} filters, resume state has {}",
                plugins.filters.len(),
                saved.filter_tasks.len()
            )));
        }

        let committed = saved.committed_tasks().count();
        info!(
            run_id = %session.run_id(),
            committed,
            task_count = saved.task_count,
            "Resuming transaction"
        );
        let mut transfer = Transfer {
            plugins,
            session,
            exec_config: saved.exec_config.clone(),
            cancel: self.cancel.clone(),
            state: ProcessState::resumed(saved),
            resuming: true,
            output_diff: None,
        };

        let span = transfer.session.span().clone();
        let result = async {
            let input = transfer.plugins.input.clone();
            let mut stage = InputStage {
                transfer: &mut transfer,
            };
            input
                .resume(
                    &saved.input_task,
                    &saved.input_schema,
                    saved.task_count,
                    &mut stage,
                )
                .await
        }
        .instrument(span)
        .await;

        transfer.finish(result)
    }

    /// Undoes what the committed sides of an interrupted transfer left
    /// behind. Safe to repeat.
    pub async fn cleanup(
        &self,
        config: &ConfigSource,
        saved: &ResumeState,
    ) -> Result<(), ExecutionError> {
        let plugins = TransferPlugins::resolve(&self.registry, config)?;
        let input_reports = saved.phase_reports(TaskPhase::Input);
        let output_reports = saved.phase_reports(TaskPhase::Output);
        info!(
            run_id = %saved.run_id,
            input_tasks = input_reports.len(),
            output_tasks = output_reports.len(),
            "Cleaning up"
        );

        let mut errors = Vec::new();
        if let Err(err) = plugins
            .input
            .cleanup(
                &saved.input_task,
                &saved.input_schema,
                saved.task_count,
                &input_reports,
            )
            .await
        {
            error!(error = %err, "Input cleanup failed");
            errors.push(err);
        }
        if let Err(err) = plugins
            .output
            .cleanup(
                &saved.output_task,
                &saved.output_schema,
                saved.task_count,
                &output_reports,
            )
            .await
        {
            error!(error = %err, "Output cleanup failed");
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExecutionError::Cleanup(errors))
        }
    }
}

/// One transaction in flight.
struct Transfer {
    plugins: TransferPlugins,
    session: Arc<ExecSession>,
    exec_config: ConfigSource,
    cancel: CancellationToken,
    state: ProcessState,
    resuming: bool,
    output_diff: Option<ConfigDiff>,
}

impl Transfer {
    fn run_filters(
        &mut self,
        index: usize,
        schema: Schema,
    ) -> BoxFuture<'_, Result<(), PluginError>> {
        Box::pin(async move {
            let next = self
                .plugins
                .filters
                .get(index)
                .map(|filter| (filter.plugin.clone(), filter.config.clone()));
            match next {
                Some((plugin, config)) => {
                    let mut stage = FilterStage {
                        transfer: self,
                        index,
                    };
                    plugin.transaction(&config, &schema, &mut stage).await
                }
                None => self.run_output(schema).await,
            }
        })
    }

    async fn run_output(&mut self, schema: Schema) -> Result<(), PluginError> {
        let output = self.plugins.output.clone();
        let output_config = self.plugins.output_config.clone();
        let saved_task = self.state.output_task().cloned();
        let task_count = self.state.task_count();
        let resuming = self.resuming;

        let mut stage = OutputStage {
            transfer: &mut *self,
            schema: schema.clone(),
        };
        let diff = match saved_task {
            Some(task) if resuming => {
                output
                    .resume(&task, &schema, task_count, &mut stage)
                    .await?
            }
            _ => {
                output
                    .transaction(&output_config, &schema, task_count, &mut stage)
                    .await?
            }
        };
        self.output_diff = Some(diff);
        Ok(())
    }

    async fn run_tasks(&mut self) -> Result<(), PluginError> {
        let processor = Arc::new(self.state.processor(&self.plugins)?);
        let pending = self.state.pending_tasks();
        let task_count = self.state.task_count();
        info!(task_count, pending = pending.len(), "Running tasks");

        self.state.mark_started();
        let outcomes =
            workers::spawn(processor, self.session.clone(), pending, &self.cancel).await;
        for outcome in outcomes {
            self.state.record(outcome);
        }

        match self.state.failed_count() {
            0 => Ok(()),
            failed => Err(PluginError::TasksFailed {
                failed,
                total: task_count,
            }),
        }
    }

    fn finish(
        mut self,
        result: Result<ConfigDiff, PluginError>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let metrics = self.session.metrics().snapshot();
        info!(
            records = metrics.records_processed,
            pages = metrics.pages_processed,
            bytes = metrics.bytes_transferred,
            committed = metrics.tasks_committed,
            failed = metrics.tasks_failed,
            "Transaction finished"
        );

        match result {
            Ok(input_diff) => Ok(ExecutionResult {
                config_diff: ConfigDiff::new()
                    .set_nested("in", input_diff)
                    .set_nested("out", self.output_diff.take().unwrap_or_default()),
                metrics,
            }),
            Err(err) => {
                let Some(resume_state) = self
                    .state
                    .resume_state(self.session.run_id(), &self.exec_config)
                else {
                    return Err(ExecutionError::Plugin(err));
                };

                let mut task_errors = self.state.take_task_errors().into_iter();
                let (cause, suppressed) = match task_errors.next() {
                    Some(first) => {
                        let mut suppressed: Vec<ExecutionError> =
                            task_errors.map(ExecutionError::Task).collect();
                        if !matches!(err, PluginError::TasksFailed { .. }) {
                            suppressed.push(ExecutionError::Plugin(err));
                        }
                        (first, suppressed)
                    }
                    None => (
                        TaskError {
                            index: None,
                            error: err,
                        },
                        Vec::new(),
                    ),
                };

                error!(cause = %cause, "Transaction partially failed");
                Err(ExecutionError::PartiallyFailed(Box::new(PartialExecution {
                    resume_state,
                    cause,
                    suppressed,
                })))
            }
        }
    }
}

struct InputStage<'a> {
    transfer: &'a mut Transfer,
}

#[async_trait]
impl InputControl for InputStage<'_> {
    async fn run(
        &mut self,
        task: TaskSource,
        schema: Schema,
        task_count: usize,
    ) -> Result<Vec<TaskReport>, PluginError> {
        let transfer = &mut *self.transfer;
        if transfer.resuming {
            let saved = transfer.state.task_count();
            if saved != task_count {
                return Err(PluginError::other(format!(
                    "resumed input reports {task_count} tasks, resume state has {saved}"
                )));
            }
            transfer.state.set_input(task, schema, task_count);
            let output_schema = transfer
                .state
                .output_schema()
                .cloned()
                .ok_or_else(|| PluginError::other("resume state has no output schema"))?;
            transfer.run_output(output_schema).await?;
        } else {
            transfer.state.set_input(task, schema.clone(), task_count);
            transfer.run_filters(0, schema).await?;
        }
        transfer.state.input_reports()
    }
}

struct FilterStage<'a> {
    transfer: &'a mut Transfer,
    index: usize,
}

#[async_trait]
impl FilterControl for FilterStage<'_> {
    async fn run(&mut self, task: TaskSource, output_schema: Schema) -> Result<(), PluginError> {
        self.transfer.state.push_filter(task, output_schema.clone());
        self.transfer.run_filters(self.index + 1, output_schema).await
    }
}

struct OutputStage<'a> {
    transfer: &'a mut Transfer,
    schema: Schema,
}

#[async_trait]
impl OutputControl for OutputStage<'_> {
    async fn run(&mut self, task: TaskSource) -> Result<Vec<TaskReport>, PluginError> {
        self.transfer.state.set_output(task, self.schema.clone());
        self.transfer.run_tasks().await?;
        self.transfer.state.output_reports()
    }
}
