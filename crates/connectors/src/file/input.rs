use crate::error::FileError;
use async_trait::async_trait;
use bytes::Bytes;
use engine_config::{
    ConfigDiff, ConfigError, ConfigSource, FieldKind, FieldSpec, TaskReport, TaskShape, TaskSource,
};
use engine_core::{
    error::PluginError,
    plugin::{FileInput, FileInputControl, FileInputPlugin},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::PathBuf,
};
use tracing::{debug, info};

const READ_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Deserialize)]
struct LocalFileConfig {
    path_prefix: String,
    #[serde(default)]
    last_path: Option<String>,
}

impl TaskShape for LocalFileConfig {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("path_prefix", FieldKind::String),
        FieldSpec::optional("last_path", FieldKind::String),
    ];
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalFileTask {
    files: Vec<String>,
    last_path: Option<String>,
}

/// Reads every local file whose path starts with `path_prefix`, one task per
/// file. Files sorting at or before `last_path` were read by an earlier run
/// and are skipped.
pub struct LocalFileInputPlugin;

#[async_trait]
impl FileInputPlugin for LocalFileInputPlugin {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn FileInputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let config: LocalFileConfig = config.load_config()?;
        let files = list_files(&config.path_prefix, config.last_path.as_deref()).await?;
        info!(path_prefix = %config.path_prefix, files = files.len(), "Listed input files");

        let task = LocalFileTask {
            files,
            last_path: config.last_path,
        };
        let task_count = task.files.len();
        self.resume(&TaskSource::dump(&task)?, task_count, control)
            .await
    }

    async fn resume(
        &self,
        task: &TaskSource,
        task_count: usize,
        control: &mut dyn FileInputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let local: LocalFileTask = task.load_task()?;
        control.run(task.clone(), task_count).await?;

        let diff = match local.files.last().or(local.last_path.as_ref()) {
            Some(last) => ConfigDiff::new().set("last_path", last.as_str()),
            None => ConfigDiff::new(),
        };
        Ok(diff)
    }

    async fn cleanup(
        &self,
        _task: &TaskSource,
        _task_count: usize,
        _successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn open(&self, task: &TaskSource, task_index: usize) -> Result<Box<dyn FileInput>, PluginError> {
        let local: LocalFileTask = task.load_task()?;
        let path = local
            .files
            .get(task_index)
            .ok_or_else(|| ConfigError::Missing(format!("files[{task_index}]")))?;
        Ok(Box::new(LocalFileInput::new(vec![PathBuf::from(path)])))
    }
}

/// Lists files matching `prefix`, sorted, keeping only those after
/// `last_path`. Directories are descended when they can contain a match.
async fn list_files(prefix: &str, last_path: Option<&str>) -> Result<Vec<String>, FileError> {
    let root = match prefix.rfind('/') {
        Some(at) => prefix[..=at].to_string(),
        None => String::new(),
    };

    let mut pending = vec![root];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let dir_path = PathBuf::from(if dir.is_empty() { "." } else { dir.as_str() });
        let mut entries = match tokio::fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(FileError::io(&dir_path, err)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FileError::io(&dir_path, e))?
        {
            let name = format!("{dir}{}", entry.file_name().to_string_lossy());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FileError::io(&entry.path(), e))?;
            if file_type.is_dir() {
                let sub = format!("{name}/");
                if sub.starts_with(prefix) || prefix.starts_with(&sub) {
                    pending.push(sub);
                }
            } else if name.starts_with(prefix) {
                files.push(name);
            }
        }
    }

    files.sort();
    if let Some(last) = last_path {
        files.retain(|f| f.as_str() > last);
    }
    debug!(prefix, matched = files.len(), "Scanned input directory");
    Ok(files)
}

/// Streams local files in fixed-size chunks.
pub struct LocalFileInput {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, File)>,
}

impl LocalFileInput {
    pub fn new(files: Vec<PathBuf>) -> Self {
        LocalFileInput {
            files: files.into_iter(),
            current: None,
        }
    }
}

impl FileInput for LocalFileInput {
    fn next_file(&mut self) -> Result<bool, PluginError> {
        self.current = None;
        let Some(path) = self.files.next() else {
            return Ok(false);
        };
        let file = File::open(&path).map_err(|e| FileError::io(&path, e))?;
        debug!(path = %path.display(), "Opened input file");
        self.current = Some((path, file));
        Ok(true)
    }

    fn poll(&mut self) -> Result<Option<Bytes>, PluginError> {
        let Some((path, file)) = self.current.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let read = file.read(&mut buf).map_err(|e| FileError::io(path, e))?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(Bytes::from(buf)))
    }

    fn close(&mut self) {
        self.current = None;
    }

    fn abort(&mut self) {}

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        Ok(TaskReport::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Capture {
        task: Option<TaskSource>,
        task_count: usize,
    }

    #[async_trait]
    impl FileInputControl for Capture {
        async fn run(
            &mut self,
            task: TaskSource,
            task_count: usize,
        ) -> Result<Vec<TaskReport>, PluginError> {
            self.task = Some(task);
            self.task_count = task_count;
            Ok(vec![TaskReport::new(); task_count])
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("access_2.log"), "b").unwrap();
        std::fs::write(dir.path().join("access_1.log"), "a").unwrap();
        std::fs::write(dir.path().join("error.log"), "x").unwrap();
        std::fs::create_dir(dir.path().join("access_old")).unwrap();
        std::fs::write(dir.path().join("access_old/0.log"), "old").unwrap();
        dir
    }

    fn prefix(dir: &TempDir) -> String {
        format!("{}/access_", dir.path().display())
    }

    fn config(prefix: &str, last_path: Option<&str>) -> ConfigSource {
        ConfigSource::from_value(json!({"type": "file", "path_prefix": prefix, "last_path": last_path}))
            .unwrap()
    }

    fn read_all(input: &mut dyn FileInput) -> Vec<String> {
        let mut files = Vec::new();
        while input.next_file().unwrap() {
            let mut text = Vec::new();
            while let Some(chunk) = input.poll().unwrap() {
                text.extend_from_slice(&chunk);
            }
            files.push(String::from_utf8(text).unwrap());
        }
        files
    }

    #[tokio::test]
    async fn one_task_per_matching_file_in_order() {
        let dir = fixture();
        let prefix = prefix(&dir);
        let mut control = Capture::default();

        let diff = LocalFileInputPlugin
            .transaction(&config(&prefix, None), &mut control)
            .await
            .unwrap();

        assert_eq!(control.task_count, 3);
        let expected_last = format!("{prefix}old/0.log");
        assert_eq!(diff.get::<String>("last_path").unwrap(), Some(expected_last));

        let task = control.task.unwrap();
        let mut first = LocalFileInputPlugin.open(&task, 0).unwrap();
        assert_eq!(read_all(&mut first), vec!["a"]);
        let mut third = LocalFileInputPlugin.open(&task, 2).unwrap();
        assert_eq!(read_all(&mut third), vec!["old"]);
    }

    #[tokio::test]
    async fn last_path_skips_files_already_read() {
        let dir = fixture();
        let prefix = prefix(&dir);
        let last = format!("{prefix}1.log");
        let mut control = Capture::default();

        LocalFileInputPlugin
            .transaction(&config(&prefix, Some(last.as_str())), &mut control)
            .await
            .unwrap();

        assert_eq!(control.task_count, 2);
        let task: LocalFileTask = control.task.unwrap().load_task().unwrap();
        assert_eq!(task.files[0], format!("{prefix}2.log"));
    }

    #[tokio::test]
    async fn nothing_new_keeps_last_path() {
        let dir = TempDir::new().unwrap();
        let prefix = format!("{}/none_", dir.path().display());
        let mut control = Capture::default();

        let diff = LocalFileInputPlugin
            .transaction(&config(&prefix, Some("earlier")), &mut control)
            .await
            .unwrap();

        assert_eq!(control.task_count, 0);
        assert_eq!(diff.get::<String>("last_path").unwrap().as_deref(), Some("earlier"));
    }

    #[tokio::test]
    async fn missing_prefix_is_a_validation_error() {
        let mut control = Capture::default();
        let config = ConfigSource::from_value(json!({"type": "file"})).unwrap();

        let err = LocalFileInputPlugin
            .transaction(&config, &mut control)
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Config(ConfigError::Validation(_))));
    }

    #[test]
    fn large_files_are_read_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big");
        std::fs::write(&path, vec![b'x'; READ_CHUNK_SIZE + 10]).unwrap();

        let mut input = LocalFileInput::new(vec![path]);
        assert!(input.next_file().unwrap());
        assert_eq!(input.poll().unwrap().unwrap().len(), READ_CHUNK_SIZE);
        assert_eq!(input.poll().unwrap().unwrap().len(), 10);
        assert!(input.poll().unwrap().is_none());
        assert!(!input.next_file().unwrap());
    }
}
