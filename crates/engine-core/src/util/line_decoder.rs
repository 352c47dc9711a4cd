use crate::{error::PluginError, plugin::FileInput};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Newline {
    #[default]
    Lf,
    Crlf,
    Cr,
}

impl Newline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::Crlf => "\r\n",
            Newline::Cr => "\r",
        }
    }
}

impl FromStr for Newline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LF" => Ok(Newline::Lf),
            "CRLF" => Ok(Newline::Crlf),
            "CR" => Ok(Newline::Cr),
            other => Err(format!("Unknown newline: {other}")),
        }
    }
}

/// Splits the byte stream of a [`FileInput`] into UTF-8 lines, file by file.
pub struct LineDecoder<'a> {
    input: &'a mut dyn FileInput,
    newline: Newline,
    buf: BytesMut,
    scanned: usize,
    eof: bool,
}

impl<'a> LineDecoder<'a> {
    pub fn new(input: &'a mut dyn FileInput, newline: Newline) -> Self {
        LineDecoder {
            input,
            newline,
            buf: BytesMut::new(),
            scanned: 0,
            eof: false,
        }
    }

    pub fn next_file(&mut self) -> Result<bool, PluginError> {
        self.buf.clear();
        self.scanned = 0;
        self.eof = false;
        self.input.next_file()
    }

    /// Next line of the current file without its terminator, `None` at the
    /// end of the file.
    pub fn poll_line(&mut self) -> Result<Option<String>, PluginError> {
        loop {
            if let Some((end, sep_len)) = self.find_newline() {
                let line = self.buf.split_to(end + sep_len);
                self.scanned = 0;
                return decode(&line[..end]).map(Some);
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = self.buf.split();
                self.scanned = 0;
                return decode(&line).map(Some);
            }

            match self.input.poll()? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }

    fn find_newline(&mut self) -> Option<(usize, usize)> {
        let found = match self.newline {
            Newline::Lf => self.buf[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| {
                    let at = self.scanned + i;
                    // tolerate CRLF input in LF mode
                    if at > 0 && self.buf[at - 1] == b'\r' {
                        (at - 1, 2)
                    } else {
                        (at, 1)
                    }
                }),
            Newline::Cr => self.buf[self.scanned..]
                .iter()
                .position(|b| *b == b'\r')
                .map(|i| (self.scanned + i, 1)),
            Newline::Crlf => self.buf[self.scanned..]
                .windows(2)
                .position(|w| w == b"\r\n")
                .map(|i| (self.scanned + i, 2)),
        };
        if found.is_none() {
            // keep one byte back so a CRLF split across chunks is still found
            self.scanned = self.buf.len().saturating_sub(1);
        }
        found
    }
}

fn decode(bytes: &[u8]) -> Result<String, PluginError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| PluginError::InvalidFormat(format!("invalid UTF-8: {e}")))
}
