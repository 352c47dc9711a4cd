pub mod csv_format;

pub use csv_format::CsvFormatterPlugin;
