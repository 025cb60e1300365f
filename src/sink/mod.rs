//! Spreadsheet sinks
//!
//! A sink is schema-less row storage. The first row is the header; the
//! [`SheetWriter`] keeps records and header in step.

mod memory;
mod writer;

pub use memory::MemorySink;
pub use writer::{HeaderPolicy, SheetWriter};

use eyre::Result;
use std::future::Future;

/// Row storage a [`SheetWriter`] appends to
pub trait SheetSink: Send + Sync {
    /// Current header row; empty when the sheet has none yet
    fn header(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Write `fields` as the first row, replacing whatever it holds
    fn write_header(&self, fields: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Append data rows after the last used row
    fn append_rows(&self, rows: &[Vec<String>]) -> impl Future<Output = Result<()>> + Send;
}
