use crate::metrics::Metrics;
use engine_config::{ConfigError, ConfigSource, FieldKind, FieldSpec, TaskShape};
use model::{
    buffer::{BufferAllocator, DEFAULT_PAGE_SIZE},
    core::identifiers::RunId,
};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, thread};
use tracing::{Span, info_span};

/// Settings read from the `exec` subtree of a transfer config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl TaskShape for ExecConfig {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("max_threads", FieldKind::Long),
        FieldSpec::optional("page_size", FieldKind::Long),
    ];
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            max_threads: default_max_threads(),
            page_size: default_page_size(),
        }
    }
}

fn default_max_threads() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Everything a transfer shares across its tasks: run id, page buffer pool,
/// counters and the root tracing span.
#[derive(Debug, Clone)]
pub struct ExecSession {
    run_id: RunId,
    exec: ExecConfig,
    allocator: BufferAllocator,
    metrics: Metrics,
    span: Span,
}

impl ExecSession {
    pub fn new(run_id: RunId, exec: ExecConfig) -> Self {
        let span = info_span!("transfer", run_id = %run_id);
        ExecSession {
            allocator: BufferAllocator::new(exec.page_size),
            exec: ExecConfig {
                max_threads: exec.max_threads.max(1),
                ..exec
            },
            run_id,
            metrics: Metrics::new(),
            span,
        }
    }

    /// Builds a session from the `exec` subtree of `config`.
    pub fn from_config(run_id: RunId, config: &ConfigSource) -> Result<Self, ConfigError> {
        let exec: ExecConfig = config.nested_or_empty("exec")?.load_config()?;
        Ok(Self::new(run_id, exec))
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn exec_config(&self) -> &ExecConfig {
        &self.exec
    }

    pub fn max_threads(&self) -> usize {
        self.exec.max_threads
    }

    pub fn allocator(&self) -> &BufferAllocator {
        &self.allocator
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
