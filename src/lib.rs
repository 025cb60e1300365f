//! Sheet Scraper
//!
//! Extracts flat records from rendered web pages through a WebDriver
//! session and appends them to a Google Sheets worksheet.

pub mod cli;
pub mod client;
pub mod etl;
pub mod mapping;
pub mod page;
pub mod record;
pub mod schedule;
pub mod scrape;
pub mod sink;

// Re-exports for convenience
pub use client::{Auth, SheetsClient, Spreadsheet};
pub use etl::{Extractor, Loader, Pipeline};
pub use mapping::FieldMapping;
pub use page::{AccessError, PageAccessor, WebDriverPage};
pub use record::Record;
pub use scrape::{ExtractMode, Extraction, RecordExtractor};
pub use sink::{HeaderPolicy, MemorySink, SheetSink, SheetWriter};
