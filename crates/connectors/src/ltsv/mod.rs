//! Labeled Tab-separated Values: one record per line, `label:value` fields
//! separated by tabs.

pub mod parser;
pub mod tokenizer;

pub use parser::LtsvParserPlugin;
pub use tokenizer::LtsvTokenizer;
