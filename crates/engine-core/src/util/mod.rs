pub mod line_decoder;

pub use line_decoder::{LineDecoder, Newline};
