//! Built-in plugins: local files in and out, LTSV parsing, column renaming,
//! CSV rendering and two demo outputs.

pub mod error;
pub mod file;
pub mod filter;
pub mod formatter;
pub mod ltsv;
pub mod output;
pub mod timestamp;

#[cfg(test)]
pub(crate) mod testing;

use engine_core::plugin::PluginRegistry;
use std::sync::Arc;

/// Registers every built-in plugin under its config `type` name.
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry
        .register_file_input("file", Arc::new(file::LocalFileInputPlugin))
        .register_parser("ltsv", Arc::new(ltsv::LtsvParserPlugin))
        .register_filter("rename", Arc::new(filter::RenameFilterPlugin))
        .register_formatter("csv", Arc::new(formatter::CsvFormatterPlugin))
        .register_file_output("file", Arc::new(file::LocalFileOutputPlugin))
        .register_output("stdout", Arc::new(output::StdoutOutputPlugin))
        .register_output("null", Arc::new(output::NullOutputPlugin));
}

/// A registry holding only the built-in plugins.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    registry
}
