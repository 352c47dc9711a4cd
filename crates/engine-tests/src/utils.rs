use engine_config::ConfigSource;
use engine_core::state::{ResumeStateStore, YamlStateStore};
use engine_runtime::{TransferExecutor, TransferRunner};
use serde_json::{Value, json};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;

/// Access log rows in LTSV, three per file.
pub const ACCESS_LOG_A: &[&str] = &[
    "host:10.0.0.1\tstatus:200\ttime:2024-01-02 03:04:05\tpath:/",
    "host:10.0.0.2\tstatus:404\ttime:2024-01-02 03:04:06\tpath:/missing",
    "host:10.0.0.3\tstatus:200\ttime:2024-01-02 03:04:07\tpath:/a,b",
];

pub const ACCESS_LOG_B: &[&str] = &[
    "host:10.0.0.4\tstatus:500\ttime:2024-01-03 00:00:00\tpath:/boom",
    "",
    "host:10.0.0.5\tstatus:null\ttime:2024-01-03 00:00:01\tpath:/",
];

/// A temp directory with an `in/` tree for LTSV sources and an `out/` tree
/// for CSV results.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("in")).unwrap();
        Workspace { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_input(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.path().join("in").join(name);
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(&path, body).unwrap();
        path
    }

    pub fn input_prefix(&self) -> String {
        format!("{}/in/access_", self.path().display())
    }

    pub fn output_prefix(&self) -> String {
        format!("{}/out/result_", self.path().display())
    }

    pub fn resume_state_path(&self) -> PathBuf {
        self.path().join("resume.yml")
    }

    /// Every file under `out/`, sorted by name.
    pub fn output_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path().join("out")) else {
            return Vec::new();
        };
        let mut names = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.path().join("out").join(name)).unwrap()
    }
}

pub fn ltsv_columns() -> Value {
    json!([
        {"name": "host", "type": "string"},
        {"name": "status", "type": "long"},
        {"name": "time", "type": "timestamp", "format": "%Y-%m-%d %H:%M:%S"},
        {"name": "path", "type": "string"},
    ])
}

/// file + ltsv -> rename(host -> client) -> csv + file
pub fn ltsv_to_csv_config(ws: &Workspace) -> ConfigSource {
    ConfigSource::from_value(json!({
        "exec": {"max_threads": 2},
        "in": {
            "type": "file",
            "path_prefix": ws.input_prefix(),
            "parser": {"type": "ltsv", "columns": ltsv_columns()},
        },
        "filters": [
            {"type": "rename", "columns": {"host": "client"}},
        ],
        "out": {
            "type": "file",
            "path_prefix": ws.output_prefix(),
            "file_ext": "csv",
            "formatter": {
                "type": "csv",
                "newline": "LF",
                "column_options": {"time": {"format": "%Y-%m-%dT%H:%M:%S"}},
            },
        },
    }))
    .unwrap()
}

pub fn runner(resume_state: Option<&Path>) -> TransferRunner {
    let store = resume_state
        .map(|path| Arc::new(YamlStateStore::new(path)) as Arc<dyn ResumeStateStore>);
    TransferRunner::new(
        TransferExecutor::new(connectors::builtin_registry()),
        store,
    )
}

pub fn nested_string(config: &ConfigSource, section: &str, key: &str) -> Option<String> {
    config
        .nested(section)
        .unwrap()
        .and_then(|s| s.get::<String>(key).unwrap())
}
