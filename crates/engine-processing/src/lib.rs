pub mod file_input;
pub mod file_output;
pub mod task;

pub use file_input::FileInputRunner;
pub use file_output::FileOutputRunner;
pub use task::{FilterTask, TaskOutcome, TaskProcessor};
