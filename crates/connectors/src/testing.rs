use bytes::Bytes;
use engine_config::TaskReport;
use engine_core::{
    context::{ExecConfig, ExecSession, TaskContext},
    error::PluginError,
    plugin::{FileInput, FileOutput, PageOutput, TransactionalFileOutput},
};
use model::{
    core::{identifiers::RunId, value::Value},
    records::Page,
    schema::Schema,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

pub(crate) fn task_context() -> TaskContext {
    let session = ExecSession::new(RunId::from("run-test"), ExecConfig::default());
    TaskContext::new(Arc::new(session), 0)
}

/// File input over in-memory files, each delivered in the given chunks.
pub(crate) struct MemoryInput {
    files: VecDeque<Vec<Vec<u8>>>,
    current: VecDeque<Vec<u8>>,
}

impl MemoryInput {
    pub(crate) fn new(files: &[&[&str]]) -> Self {
        MemoryInput {
            files: files
                .iter()
                .map(|chunks| chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
                .collect(),
            current: VecDeque::new(),
        }
    }
}

impl FileInput for MemoryInput {
    fn next_file(&mut self) -> Result<bool, PluginError> {
        match self.files.pop_front() {
            Some(chunks) => {
                self.current = chunks.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn poll(&mut self) -> Result<Option<Bytes>, PluginError> {
        Ok(self.current.pop_front().map(Bytes::from))
    }

    fn abort(&mut self) {}

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        Ok(TaskReport::new())
    }
}

/// Decodes every page it receives back into rows.
#[derive(Debug)]
pub(crate) struct Collect {
    schema: Schema,
    pub rows: Vec<Vec<Value>>,
    pub pages: usize,
}

impl Collect {
    pub(crate) fn new(schema: &Schema) -> Self {
        Collect {
            schema: schema.clone(),
            rows: Vec::new(),
            pages: 0,
        }
    }
}

impl PageOutput for Collect {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        self.pages += 1;
        self.rows.extend(page.to_values(&self.schema)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// What a [`MemoryFileOutput`] received, shared with the test.
#[derive(Default)]
pub(crate) struct WrittenFiles {
    pub files: Vec<Vec<u8>>,
    pub events: Vec<&'static str>,
}

impl WrittenFiles {
    pub(crate) fn text(&self, file: usize) -> String {
        String::from_utf8_lossy(&self.files[file]).into_owned()
    }
}

pub(crate) struct MemoryFileOutput(pub Arc<Mutex<WrittenFiles>>);

impl FileOutput for MemoryFileOutput {
    fn next_file(&mut self) -> Result<(), PluginError> {
        self.0.lock().unwrap().files.push(Vec::new());
        Ok(())
    }

    fn add(&mut self, data: &[u8]) -> Result<(), PluginError> {
        let mut written = self.0.lock().unwrap();
        match written.files.last_mut() {
            Some(file) => file.extend_from_slice(data),
            None => panic!("add before next_file"),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        self.0.lock().unwrap().events.push("finish");
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().unwrap().events.push("close");
    }
}

impl TransactionalFileOutput for MemoryFileOutput {
    fn abort(&mut self) {
        self.0.lock().unwrap().events.push("abort");
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        self.0.lock().unwrap().events.push("commit");
        Ok(TaskReport::new().set("files", 1))
    }
}
