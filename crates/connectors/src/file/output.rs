use crate::error::FileError;
use async_trait::async_trait;
use engine_config::{
    ConfigDiff, ConfigSource, FieldKind, FieldSpec, TaskReport, TaskShape, TaskSource,
};
use engine_core::{
    error::PluginError,
    plugin::{FileOutput, FileOutputControl, FileOutputPlugin, TransactionalFileOutput},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalFileOutputTask {
    path_prefix: String,
    file_ext: String,
}

impl TaskShape for LocalFileOutputTask {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("path_prefix", FieldKind::String),
        FieldSpec::required("file_ext", FieldKind::String),
    ];
}

impl LocalFileOutputTask {
    fn file_path(&self, task_index: usize, file_index: usize) -> PathBuf {
        PathBuf::from(format!(
            "{}{task_index:03}.{file_index:02}.{}",
            self.path_prefix, self.file_ext
        ))
    }
}

/// Writes each task's files as `<prefix><task>.<file>.<ext>`.
///
/// Bytes go to a temporary sibling first; commit renames it into place and
/// abort removes it, so a failed task leaves nothing behind.
pub struct LocalFileOutputPlugin;

#[async_trait]
impl FileOutputPlugin for LocalFileOutputPlugin {
    async fn transaction(
        &self,
        config: &ConfigSource,
        task_count: usize,
        control: &mut dyn FileOutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let task: LocalFileOutputTask = config.load_config()?;
        if let Some(parent) = Path::new(&task.path_prefix).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| FileError::io(parent, e))?;
            }
        }
        info!(path_prefix = %task.path_prefix, task_count, "Writing local files");
        self.resume(&TaskSource::dump(&task)?, task_count, control)
            .await
    }

    async fn resume(
        &self,
        task: &TaskSource,
        _task_count: usize,
        control: &mut dyn FileOutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        control.run(task.clone()).await?;
        Ok(ConfigDiff::new())
    }

    async fn cleanup(
        &self,
        _task: &TaskSource,
        _task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        for report in successful {
            for file in report.get_or::<Vec<String>>("files", Vec::new())? {
                match tokio::fs::remove_file(&file).await {
                    Ok(()) => info!(path = %file, "Removed committed file"),
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        debug!(path = %file, "Committed file already gone")
                    }
                    Err(err) => return Err(FileError::io(Path::new(&file), err).into()),
                }
            }
        }
        Ok(())
    }

    fn open(
        &self,
        task: &TaskSource,
        task_index: usize,
    ) -> Result<Box<dyn TransactionalFileOutput>, PluginError> {
        Ok(Box::new(LocalFileOutput {
            task: task.load_task()?,
            task_index,
            current: None,
            pending: Vec::new(),
            renamed: Vec::new(),
        }))
    }
}

/// A file written to `temp` until commit moves it to `path`.
struct PendingFile {
    path: PathBuf,
    temp: PathBuf,
}

struct LocalFileOutput {
    task: LocalFileOutputTask,
    task_index: usize,
    current: Option<BufWriter<File>>,
    pending: Vec<PendingFile>,
    renamed: Vec<PathBuf>,
}

impl LocalFileOutput {
    fn close_current(&mut self) -> Result<(), PluginError> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl FileOutput for LocalFileOutput {
    fn next_file(&mut self) -> Result<(), PluginError> {
        self.close_current()?;
        let path = self.task.file_path(self.task_index, self.pending.len());
        let temp = PathBuf::from(format!("{}{TEMP_SUFFIX}", path.display()));
        let file = File::create(&temp).map_err(|e| FileError::io(&temp, e))?;
        debug!(path = %temp.display(), "Opened output file");
        self.current = Some(BufWriter::new(file));
        self.pending.push(PendingFile { path, temp });
        Ok(())
    }

    fn add(&mut self, data: &[u8]) -> Result<(), PluginError> {
        match self.current.as_mut() {
            Some(writer) => Ok(writer.write_all(data)?),
            None => Err(FileError::InvalidFormat("data written before next_file".into()).into()),
        }
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        self.close_current()
    }

    fn close(&mut self) {
        self.current = None;
    }
}

impl TransactionalFileOutput for LocalFileOutput {
    fn abort(&mut self) {
        self.current = None;
        let leftovers = self
            .pending
            .drain(..)
            .map(|f| f.temp)
            .chain(self.renamed.drain(..));
        for path in leftovers {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed aborted file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove aborted file"),
            }
        }
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        self.close_current()?;
        while let Some(file) = self.pending.first() {
            fs::rename(&file.temp, &file.path).map_err(|e| FileError::io(&file.path, e))?;
            let file = self.pending.remove(0);
            self.renamed.push(file.path);
        }

        let files: Vec<String> = self
            .renamed
            .drain(..)
            .map(|p| p.display().to_string())
            .collect();
        info!(task_index = self.task_index, files = files.len(), "Committed output files");
        Ok(TaskReport::new().set("files", files))
    }
}
