//! Two-phase plugin contract.
//!
//! Every plugin has a transaction phase (async, runs once on the
//! orchestrator) and a task phase (`run`/`open`, synchronous, runs once per
//! partition task on the blocking pool). The transaction phase receives a
//! control callback; calling it hands the frozen task and schema to the next
//! stage and returns only after every task of the transfer finished.

pub mod file_input;
pub mod file_output;
pub mod filter;
pub mod input;
pub mod output;
pub mod page;
pub mod registry;

pub use file_input::{
    DecoderControl, DecoderPlugin, FileInput, FileInputControl, FileInputPlugin, ParserControl,
    ParserPlugin,
};
pub use file_output::{
    EncoderControl, EncoderPlugin, FileOutput, FileOutputControl, FileOutputPlugin,
    FormatterControl, FormatterPlugin, TransactionalFileOutput,
};
pub use filter::{FilterControl, FilterPlugin};
pub use input::{InputControl, InputPlugin};
pub use output::{OutputControl, OutputPlugin};
pub use page::{PageBuilder, PageOutput, TransactionalOutputRef, TransactionalPageOutput};
pub use registry::PluginRegistry;
