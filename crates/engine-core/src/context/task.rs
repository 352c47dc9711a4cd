use crate::{context::session::ExecSession, metrics::Metrics};
use model::buffer::BufferAllocator;
use std::sync::Arc;
use tracing::{Span, info_span};

/// Per-task view of the session handed to plugin `run`/`open` calls.
#[derive(Debug, Clone)]
pub struct TaskContext {
    session: Arc<ExecSession>,
    task_index: usize,
    span: Span,
}

impl TaskContext {
    pub fn new(session: Arc<ExecSession>, task_index: usize) -> Self {
        let span = info_span!(parent: session.span(), "task", index = task_index);
        TaskContext {
            session,
            task_index,
            span,
        }
    }

    pub fn session(&self) -> &ExecSession {
        &self.session
    }

    pub fn task_index(&self) -> usize {
        self.task_index
    }

    pub fn allocator(&self) -> &BufferAllocator {
        self.session.allocator()
    }

    pub fn metrics(&self) -> &Metrics {
        self.session.metrics()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
