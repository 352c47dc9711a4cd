pub mod layout;
pub mod page;
pub mod writer;

pub use page::{Page, PageReader, RecordView};
pub use writer::PageWriter;
