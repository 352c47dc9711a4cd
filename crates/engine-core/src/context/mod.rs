pub mod session;
pub mod task;

pub use session::{ExecConfig, ExecSession};
pub use task::TaskContext;
