use crate::error::FileError;
use engine_core::{
    error::PluginError,
    plugin::FileInput,
    util::{LineDecoder, Newline},
};

const FIELD_SEPARATOR: char = '\t';
const LABEL_SEPARATOR: char = ':';

/// Reads LTSV records file by file. Empty lines are skipped.
pub struct LtsvTokenizer<'a> {
    lines: LineDecoder<'a>,
}

impl<'a> LtsvTokenizer<'a> {
    pub fn new(input: &'a mut dyn FileInput, newline: Newline) -> Self {
        LtsvTokenizer {
            lines: LineDecoder::new(input, newline),
        }
    }

    pub fn next_file(&mut self) -> Result<bool, PluginError> {
        self.lines.next_file()
    }

    /// Next non-empty line of the current file, `None` at its end.
    pub fn next_record(&mut self) -> Result<Option<String>, PluginError> {
        while let Some(line) = self.lines.poll_line()? {
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

/// Splits one record into `(label, value)` pairs. Consecutive tabs do not
/// produce empty fields. Only the first `:` separates label from value.
pub fn split_fields(line: &str) -> Result<Vec<(&str, &str)>, FileError> {
    line.split(FIELD_SEPARATOR)
        .filter(|field| !field.is_empty())
        .map(|field| {
            field.split_once(LABEL_SEPARATOR).ok_or_else(|| {
                FileError::InvalidFormat(format!(
                    "cannot split field '{field}' by separator '{LABEL_SEPARATOR}'"
                ))
            })
        })
        .collect()
}
