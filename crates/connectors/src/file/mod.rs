pub mod input;
pub mod output;

pub use input::LocalFileInputPlugin;
pub use output::LocalFileOutputPlugin;
