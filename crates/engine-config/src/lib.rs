pub mod error;
pub mod loader;
pub mod schema_config;
pub mod source;
pub mod task;

pub use error::{ConfigError, ConfigValidationError};
pub use source::{ConfigDiff, ConfigSource, DataSource, TaskReport, TaskSource};
pub use task::{FieldKind, FieldSpec, TaskShape};
