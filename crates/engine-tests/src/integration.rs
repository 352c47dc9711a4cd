#[cfg(test)]
mod tests {
    use crate::utils::{
        ACCESS_LOG_A, ACCESS_LOG_B, Workspace, ltsv_columns, ltsv_to_csv_config, nested_string,
        runner,
    };
    use engine_config::ConfigSource;
    use engine_core::state::{ResumeStateStore, YamlStateStore};
    use engine_runtime::ExecutionError;
    use serde_json::json;
    use tracing_test::traced_test;

    // Scenario: two LTSV files are renamed and written as CSV.
    // Expected Outcome:
    // - One CSV file per input file, each with a header.
    // - The next config carries the last input path.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        let last = ws.write_input("access_02.ltsv", ACCESS_LOG_B);

        let outcome = runner(None).run(&ltsv_to_csv_config(&ws)).await.unwrap();

        assert!(!outcome.resumed);
        assert_eq!(outcome.result.metrics.records_processed, 5);
        assert_eq!(
            ws.output_files(),
            vec!["result_000.00.csv", "result_001.00.csv"]
        );
        assert_eq!(
            ws.read_output("result_000.00.csv"),
            "client,status,time,path\n\
             10.0.0.1,200,2024-01-02T03:04:05,/\n\
             10.0.0.2,404,2024-01-02T03:04:06,/missing\n\
             10.0.0.3,200,2024-01-02T03:04:07,\"/a,b\"\n"
        );
        assert_eq!(
            ws.read_output("result_001.00.csv"),
            "client,status,time,path\n\
             10.0.0.4,500,2024-01-03T00:00:00,/boom\n\
             10.0.0.5,,2024-01-03T00:00:01,/\n"
        );
        assert_eq!(
            nested_string(&outcome.next_config, "in", "last_path"),
            Some(last.display().to_string())
        );
    }

    // Scenario: the next config of a committed run is run again.
    // Expected Outcome: no files are read and `last_path` is kept.
    #[tokio::test]
    async fn tc02() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        let runner = runner(None);

        let first = runner.run(&ltsv_to_csv_config(&ws)).await.unwrap();
        let second = runner.run(&first.next_config).await.unwrap();

        assert_eq!(second.result.metrics.records_processed, 0);
        assert_eq!(
            nested_string(&second.next_config, "in", "last_path"),
            nested_string(&first.next_config, "in", "last_path")
        );
        assert_eq!(ws.output_files(), vec!["result_000.00.csv"]);
    }

    // Scenario: a new file shows up after a committed run.
    // Expected Outcome: only the new file is transferred.
    #[tokio::test]
    async fn tc03() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        let runner = runner(None);
        let first = runner.run(&ltsv_to_csv_config(&ws)).await.unwrap();

        let newer = ws.write_input("access_02.ltsv", ACCESS_LOG_B);
        let second = runner.run(&first.next_config).await.unwrap();

        assert_eq!(second.result.metrics.records_processed, 2);
        assert_eq!(
            nested_string(&second.next_config, "in", "last_path"),
            Some(newer.display().to_string())
        );
    }

    // Scenario: the second file holds a value that is not a long, and no
    // resume state is kept.
    // Expected Outcome:
    // - The run fails with the parse error as its cause.
    // - The committed first task is cleaned up, so no CSV file is left.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        ws.write_input("access_02.ltsv", &["host:x\tstatus:oops\ttime:2024-01-03 00:00:00\tpath:/"]);

        let err = runner(None).run(&ltsv_to_csv_config(&ws)).await.unwrap_err();

        let partial = err.partial().expect("partial failure");
        assert_eq!(partial.cause.index, Some(1));
        assert!(partial.cause.to_string().contains("oops"));
        assert!(ws.output_files().is_empty());
        assert!(!ws.resume_state_path().exists());
    }

    // Scenario: the first file is broken and the second one commits, with no
    // resume state kept.
    // Expected Outcome: the CSV file of the second task is removed by the
    // automatic cleanup.
    #[tokio::test]
    async fn tc09() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", &["host:x\tstatus:oops\ttime:2024-01-03 00:00:00\tpath:/"]);
        ws.write_input("access_02.ltsv", ACCESS_LOG_B);

        let err = runner(None).run(&ltsv_to_csv_config(&ws)).await.unwrap_err();

        let partial = err.partial().expect("partial failure");
        assert_eq!(partial.cause.index, Some(0));
        assert!(ws.output_files().is_empty());
    }

    // Scenario: the same failure with a resume state file; the bad file is
    // fixed and the transfer is run again.
    // Expected Outcome:
    // - The first run saves a state where only task 0 is committed, and keeps
    //   its CSV file.
    // - The second run resumes, reruns task 1 only and deletes the state.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        ws.write_input("access_02.ltsv", &["host:x\tstatus:oops\ttime:2024-01-03 00:00:00\tpath:/"]);
        let state_path = ws.resume_state_path();
        let runner = runner(Some(&state_path));
        let config = ltsv_to_csv_config(&ws);

        let err = runner.run(&config).await.unwrap_err();
        assert!(matches!(err, ExecutionError::PartiallyFailed(_)));
        let saved = YamlStateStore::new(&state_path)
            .load()
            .await
            .unwrap()
            .expect("state saved");
        assert_eq!(saved.committed_tasks().collect::<Vec<_>>(), vec![0]);
        assert_eq!(ws.output_files(), vec!["result_000.00.csv"]);

        let last = ws.write_input("access_02.ltsv", ACCESS_LOG_B);
        let outcome = runner.run(&config).await.unwrap();

        assert!(outcome.resumed);
        assert_eq!(outcome.result.metrics.records_processed, 2);
        assert!(!state_path.exists() || std::fs::read_to_string(&state_path).unwrap().is_empty());
        assert_eq!(
            ws.output_files(),
            vec!["result_000.00.csv", "result_001.00.csv"]
        );
        assert_eq!(
            nested_string(&outcome.next_config, "in", "last_path"),
            Some(last.display().to_string())
        );
    }

    // Scenario: a failed transfer with a saved state is cleaned up instead of
    // resumed.
    // Expected Outcome: the CSV file of the committed task and the state are
    // both removed, and a second cleanup is a no-op.
    #[tokio::test]
    async fn tc06() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        ws.write_input("access_02.ltsv", &["no label here"]);
        let state_path = ws.resume_state_path();
        let runner = runner(Some(&state_path));
        let config = ltsv_to_csv_config(&ws);
        runner.run(&config).await.unwrap_err();
        assert_eq!(ws.output_files(), vec!["result_000.00.csv"]);

        runner.cleanup(&config).await.unwrap();
        runner.cleanup(&config).await.unwrap();

        assert!(ws.output_files().is_empty());
        assert!(
            YamlStateStore::new(&state_path)
                .load()
                .await
                .unwrap()
                .is_none()
        );
    }

    // Scenario: LTSV fields in varying order are sent to the null output.
    // Expected Outcome: every record is counted in the output diff.
    #[tokio::test]
    async fn tc07() {
        let ws = Workspace::new();
        ws.write_input(
            "access_01.ltsv",
            &[
                "path:/\thost:a\tstatus:200\ttime:2024-01-02 03:04:05",
                "status:201\ttime:2024-01-02 03:04:06\thost:b",
            ],
        );
        let config = ConfigSource::from_value(json!({
            "in": {
                "type": "file",
                "path_prefix": ws.input_prefix(),
                "parser": {
                    "type": "ltsv",
                    "columns": ltsv_columns(),
                    "allow_irregular_column_order": true,
                },
            },
            "out": {"type": "null"},
        }))
        .unwrap();

        let outcome = runner(None).run(&config).await.unwrap();

        let out = outcome.next_config.nested("out").unwrap().unwrap();
        assert_eq!(out.get::<String>("type").unwrap().as_deref(), Some("null"));
        assert_eq!(out.get::<i64>("records").unwrap(), Some(2));
    }

    // Scenario: the config names a parser that is not registered.
    // Expected Outcome: the run fails before any task starts.
    #[tokio::test]
    async fn tc08() {
        let ws = Workspace::new();
        ws.write_input("access_01.ltsv", ACCESS_LOG_A);
        let config = ConfigSource::from_value(json!({
            "in": {"type": "file", "path_prefix": ws.input_prefix(), "parser": {"type": "xml"}},
            "out": {"type": "null"},
        }))
        .unwrap();

        let err = runner(None).run(&config).await.unwrap_err();

        assert!(err.partial().is_none());
        assert!(err.to_string().contains("xml"));
        assert!(ws.output_files().is_empty());
    }
}
