//! Record outputs that need no file plumbing.

pub mod null;
pub mod stdout;

pub use null::NullOutputPlugin;
pub use stdout::StdoutOutputPlugin;

use engine_config::{ConfigDiff, TaskReport, TaskSource};
use engine_core::{error::PluginError, plugin::OutputControl};

/// Runs the tasks of a stateless output and sums their `records` reports.
async fn run_counting(
    task: TaskSource,
    control: &mut dyn OutputControl,
) -> Result<ConfigDiff, PluginError> {
    let reports = control.run(task).await?;
    let records = total_records(&reports)?;
    Ok(ConfigDiff::new().set("records", records))
}

fn total_records(reports: &[TaskReport]) -> Result<i64, PluginError> {
    let mut total = 0;
    for report in reports {
        total += report.get_or::<i64>("records", 0)?;
    }
    Ok(total)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    pub(crate) struct CaptureOutput(pub Option<TaskSource>, pub Vec<TaskReport>);

    #[async_trait]
    impl OutputControl for CaptureOutput {
        async fn run(&mut self, task: TaskSource) -> Result<Vec<TaskReport>, PluginError> {
            self.0 = Some(task);
            Ok(self.1.clone())
        }
    }

    #[tokio::test]
    async fn diff_sums_task_records() {
        let mut control = CaptureOutput(
            None,
            vec![
                TaskReport::new().set("records", 2),
                TaskReport::new().set("records", 3),
            ],
        );

        let diff = run_counting(TaskSource::new(), &mut control).await.unwrap();

        assert_eq!(diff.get::<i64>("records").unwrap(), Some(5));
    }
}
