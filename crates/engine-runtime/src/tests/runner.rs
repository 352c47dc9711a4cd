use super::{Recorder, config, registry};
use crate::{ExecutionError, TransferExecutor, TransferRunner};
use engine_core::state::{ResumeStateStore, YamlStateStore};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_test::traced_test;

fn runner(recorder: &Arc<Recorder>, store: Option<Arc<YamlStateStore>>) -> TransferRunner {
    let store = store.map(|s| s as Arc<dyn ResumeStateStore>);
    TransferRunner::new(TransferExecutor::new(registry(recorder)), store)
}

fn store(dir: &TempDir) -> Arc<YamlStateStore> {
    Arc::new(YamlStateStore::new(dir.path().join("resume.yml")))
}

#[tokio::test]
#[traced_test]
async fn without_store_failure_cleans_up_and_keeps_the_cause() {
    let recorder = Arc::new(Recorder::default());
    recorder.fail_tasks(&[1]);

    let err = runner(&recorder, None).run(&config(2)).await.unwrap_err();

    let partial = err.partial().unwrap();
    assert_eq!(partial.cause.index, Some(1));
    assert!(partial.suppressed.is_empty());
    assert_eq!(recorder.cleanups(), vec![("in", 1), ("out", 1)]);
    assert!(logs_contain("cleaning up committed tasks"));
}

#[tokio::test]
async fn without_store_first_task_failure_cleans_up_the_second() {
    let recorder = Arc::new(Recorder::default());
    recorder.fail_tasks(&[0]);

    let err = runner(&recorder, None).run(&config(2)).await.unwrap_err();

    let partial = err.partial().unwrap();
    assert_eq!(partial.cause.index, Some(0));
    assert_eq!(recorder.cleanups(), vec![("in", 1), ("out", 1)]);
    let cleanups = recorder.cleanups.lock().unwrap();
    let (_, input_reports) = &cleanups[0];
    assert_eq!(input_reports[0].get::<i64>("index").unwrap(), Some(1));
    let (_, output_reports) = &cleanups[1];
    assert_eq!(output_reports[0].get::<i64>("rows").unwrap(), Some(2));
}

#[tokio::test]
#[traced_test]
async fn with_store_failure_is_persisted_then_resumed() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let recorder = Arc::new(Recorder::default());
    let runner = runner(&recorder, Some(store.clone()));
    let config = config(3);
    recorder.fail_tasks(&[1]);

    let err = runner.run(&config).await.unwrap_err();
    assert!(matches!(err, ExecutionError::PartiallyFailed(_)));
    assert!(recorder.cleanups().is_empty());
    let saved = store.load().await.unwrap().expect("state saved");
    assert_eq!(saved.committed_tasks().collect::<Vec<_>>(), vec![0, 2]);

    recorder.fail_tasks(&[]);
    recorder.reset_ran();
    let outcome = runner.run(&config).await.unwrap();

    assert!(outcome.resumed);
    assert_eq!(recorder.ran(), vec![1]);
    assert!(store.load().await.unwrap().is_none());
    let next_in = outcome.next_config.nested("in").unwrap().unwrap();
    assert_eq!(next_in.get::<String>("type").unwrap().as_deref(), Some("mock"));
    assert_eq!(next_in.get::<i64>("tasks").unwrap(), Some(3));
    let next_out = outcome.next_config.nested("out").unwrap().unwrap();
    assert_eq!(next_out.get::<i64>("rows").unwrap(), Some(6));
    assert!(logs_contain("Committed."));
}

#[tokio::test]
async fn cleanup_removes_saved_state() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let recorder = Arc::new(Recorder::default());
    let runner = runner(&recorder, Some(store.clone()));
    let config = config(2);
    recorder.fail_tasks(&[0]);
    runner.run(&config).await.unwrap_err();

    runner.cleanup(&config).await.unwrap();
    runner.cleanup(&config).await.unwrap();

    assert!(store.load().await.unwrap().is_none());
    assert_eq!(recorder.cleanups(), vec![("in", 1), ("out", 1)]);
}

#[tokio::test]
async fn cleanup_needs_a_store() {
    let recorder = Arc::new(Recorder::default());
    let err = runner(&recorder, None).cleanup(&config(1)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Config(_)));
}
