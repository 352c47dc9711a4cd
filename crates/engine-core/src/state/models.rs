use engine_config::{ConfigSource, TaskReport, TaskSource};
use model::{core::identifiers::RunId, schema::Schema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Input,
    Output,
}

/// Outcome of one side of one partition task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub phase: TaskPhase,
    pub index: usize,
    pub committed: bool,
    pub task_source: TaskSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TaskReport>,
}

/// Everything needed to resume or clean up a partially failed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub run_id: RunId,
    pub exec_config: ConfigSource,
    pub input_task: TaskSource,
    pub input_schema: Schema,
    pub output_task: TaskSource,
    pub output_schema: Schema,
    #[serde(default)]
    pub filter_tasks: Vec<TaskSource>,
    #[serde(default)]
    pub filter_schemas: Vec<Schema>,
    pub task_count: usize,
    pub tasks: Vec<TaskRecord>,
}

impl ResumeState {
    pub fn record(&self, phase: TaskPhase, index: usize) -> Option<&TaskRecord> {
        self.tasks
            .iter()
            .find(|r| r.phase == phase && r.index == index)
    }

    /// A task counts as committed only when both of its sides committed.
    pub fn is_task_committed(&self, index: usize) -> bool {
        [TaskPhase::Input, TaskPhase::Output]
            .iter()
            .all(|phase| self.record(*phase, index).is_some_and(|r| r.committed))
    }

    pub fn committed_tasks(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.task_count).filter(|i| self.is_task_committed(*i))
    }

    /// Reports of every task whose `phase` side committed, whether or not
    /// the other side did. This is what a plugin's cleanup has to undo.
    pub fn phase_reports(&self, phase: TaskPhase) -> Vec<TaskReport> {
        let mut records: Vec<&TaskRecord> = self
            .tasks
            .iter()
            .filter(|r| r.phase == phase && r.committed)
            .collect();
        records.sort_by_key(|r| r.index);
        records.into_iter().filter_map(|r| r.report.clone()).collect()
    }
}
