pub mod rename;

pub use rename::RenameFilterPlugin;
