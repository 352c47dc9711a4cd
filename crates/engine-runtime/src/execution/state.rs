use crate::error::TaskError;
use engine_config::{ConfigSource, TaskReport, TaskSource};
use engine_core::{
    error::PluginError,
    state::{ResumeState, TaskPhase, TaskRecord},
};
use engine_processing::{FilterTask, TaskOutcome, TaskProcessor};
use model::{core::identifiers::RunId, schema::Schema};

use super::factory::TransferPlugins;

#[derive(Debug, Default)]
struct TaskSlot {
    input: Option<TaskReport>,
    output: Option<TaskReport>,
    error: Option<PluginError>,
}

impl TaskSlot {
    fn is_committed(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }
}

/// What one transaction has frozen so far and how each partition task
/// ended. Filled in by the nested transaction controls, turned into a
/// [`ResumeState`] when the transaction does not commit.
#[derive(Debug, Default)]
pub struct ProcessState {
    input_task: Option<TaskSource>,
    input_schema: Option<Schema>,
    filter_tasks: Vec<TaskSource>,
    filter_schemas: Vec<Schema>,
    output_task: Option<TaskSource>,
    output_schema: Option<Schema>,
    task_count: usize,
    slots: Vec<TaskSlot>,
    started: bool,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the state of an interrupted transaction. Tasks committed on
    /// both sides keep their reports and are not run again.
    pub fn resumed(saved: &ResumeState) -> Self {
        let slots = (0..saved.task_count)
            .map(|index| {
                let mut slot = TaskSlot::default();
                if saved.is_task_committed(index) {
                    slot.input = saved
                        .record(TaskPhase::Input, index)
                        .and_then(|r| r.report.clone());
                    slot.output = saved
                        .record(TaskPhase::Output, index)
                        .and_then(|r| r.report.clone());
                }
                slot
            })
            .collect();

        ProcessState {
            input_task: Some(saved.input_task.clone()),
            input_schema: Some(saved.input_schema.clone()),
            filter_tasks: saved.filter_tasks.clone(),
            filter_schemas: saved.filter_schemas.clone(),
            output_task: Some(saved.output_task.clone()),
            output_schema: Some(saved.output_schema.clone()),
            task_count: saved.task_count,
            slots,
            started: false,
        }
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    pub fn set_input(&mut self, task: TaskSource, schema: Schema, task_count: usize) {
        self.input_task = Some(task);
        self.input_schema = Some(schema);
        if self.task_count != task_count || self.slots.len() != task_count {
            self.slots = (0..task_count).map(|_| TaskSlot::default()).collect();
        }
        self.task_count = task_count;
    }

    pub fn push_filter(&mut self, task: TaskSource, output_schema: Schema) {
        self.filter_tasks.push(task);
        self.filter_schemas.push(output_schema);
    }

    pub fn set_output(&mut self, task: TaskSource, schema: Schema) {
        self.output_task = Some(task);
        self.output_schema = Some(schema);
    }

    pub fn output_schema(&self) -> Option<&Schema> {
        self.output_schema.as_ref()
    }

    pub fn output_task(&self) -> Option<&TaskSource> {
        self.output_task.as_ref()
    }

    /// Indices that still have to run, ascending.
    pub fn pending_tasks(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_committed())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        if let Some(slot) = self.slots.get_mut(outcome.index) {
            slot.input = outcome.input_report;
            slot.output = outcome.output_report;
            slot.error = outcome.error;
        }
    }

    pub fn failed_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_committed()).count()
    }

    pub fn input_reports(&self) -> Result<Vec<TaskReport>, PluginError> {
        self.reports(|slot| slot.input.as_ref())
    }

    pub fn output_reports(&self) -> Result<Vec<TaskReport>, PluginError> {
        self.reports(|slot| slot.output.as_ref())
    }

    fn reports<F>(&self, side: F) -> Result<Vec<TaskReport>, PluginError>
    where
        F: Fn(&TaskSlot) -> Option<&TaskReport>,
    {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                side(slot)
                    .cloned()
                    .ok_or_else(|| PluginError::other(format!("task {index} has no report")))
            })
            .collect()
    }

    /// Freezes the per-task view of every stage.
    pub fn processor(&self, plugins: &TransferPlugins) -> Result<TaskProcessor, PluginError> {
        let (Some(input_task), Some(input_schema)) = (&self.input_task, &self.input_schema) else {
            return Err(PluginError::other("input transaction has not started"));
        };
        let (Some(output_task), Some(output_schema)) = (&self.output_task, &self.output_schema)
        else {
            return Err(PluginError::other("output transaction has not started"));
        };

        let mut filters = Vec::with_capacity(self.filter_tasks.len());
        let mut schema = input_schema.clone();
        for ((filter, task), output) in plugins
            .filters
            .iter()
            .zip(&self.filter_tasks)
            .zip(&self.filter_schemas)
        {
            filters.push(FilterTask {
                plugin: filter.plugin.clone(),
                task: task.clone(),
                input_schema: schema,
                output_schema: output.clone(),
            });
            schema = output.clone();
        }

        Ok(TaskProcessor {
            input: plugins.input.clone(),
            input_task: input_task.clone(),
            input_schema: input_schema.clone(),
            filters,
            output: plugins.output.clone(),
            output_task: output_task.clone(),
            output_schema: output_schema.clone(),
        })
    }

    /// `None` when no task was launched: there is nothing to resume or
    /// clean up.
    pub fn resume_state(&self, run_id: &RunId, exec_config: &ConfigSource) -> Option<ResumeState> {
        if !self.started {
            return None;
        }
        let input_task = self.input_task.clone()?;
        let output_task = self.output_task.clone()?;

        let mut tasks = Vec::with_capacity(self.slots.len() * 2);
        for (index, slot) in self.slots.iter().enumerate() {
            tasks.push(TaskRecord {
                phase: TaskPhase::Input,
                index,
                committed: slot.input.is_some(),
                task_source: input_task.clone(),
                report: slot.input.clone(),
            });
            tasks.push(TaskRecord {
                phase: TaskPhase::Output,
                index,
                committed: slot.output.is_some(),
                task_source: output_task.clone(),
                report: slot.output.clone(),
            });
        }

        Some(ResumeState {
            run_id: run_id.clone(),
            exec_config: exec_config.clone(),
            input_task,
            input_schema: self.input_schema.clone()?,
            output_task,
            output_schema: self.output_schema.clone()?,
            filter_tasks: self.filter_tasks.clone(),
            filter_schemas: self.filter_schemas.clone(),
            task_count: self.task_count,
            tasks,
        })
    }

    /// Failures in ascending task order. A task that neither committed nor
    /// reported an error counts as failed too.
    pub fn take_task_errors(&mut self) -> Vec<TaskError> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| !slot.is_committed())
            .map(|(index, slot)| {
                let error = slot
                    .error
                    .take()
                    .unwrap_or_else(|| PluginError::other("task did not complete"));
                TaskError {
                    index: Some(index),
                    error,
                }
            })
            .collect()
    }
}
