//! Header reconciliation and row appends

use super::SheetSink;
use crate::etl::Loader;
use crate::record::Record;

use eyre::Result;

/// What to do when the sheet's header differs from the records' fields
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// Keep the existing header and place values by field name. Fields the
    /// header lacks are dropped with a warning.
    #[default]
    Align,
    /// Refuse to append a batch whose fields differ from the header
    Strict,
}

/// Loader appending records to a [`SheetSink`]
///
/// The header row is written once, from the first record's fields, when
/// the sheet's first row is blank. It is never rewritten afterwards.
///
/// # Example
/// ```no_run
/// use sheet_scraper::etl::Loader;
/// use sheet_scraper::record::Record;
/// use sheet_scraper::sink::{MemorySink, SheetWriter};
///
/// # async fn example() -> eyre::Result<()> {
/// let sink = MemorySink::new();
/// let writer = SheetWriter::new(sink.clone());
///
/// let record: Record = [("titulo", "Hello"), ("enlace", "https://example.com")]
///     .into_iter()
///     .collect();
/// let count = writer.load(vec![record]).await?;
/// assert_eq!(count, 1);
/// # Ok(())
/// # }
/// ```
pub struct SheetWriter<S> {
    sink: S,
    policy: HeaderPolicy,
}

impl<S: SheetSink> SheetWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            policy: HeaderPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: HeaderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn policy(&self) -> HeaderPolicy {
        self.policy
    }

    /// Make sure the sheet has a header and return it
    ///
    /// Writes one from `first`'s fields when the sheet has none.
    ///
    /// # Errors
    /// Returns an error if the sink fails, or under [`HeaderPolicy::Strict`]
    /// when `first`'s fields don't match the existing header
    pub async fn ensure_header(&self, first: &Record) -> Result<Vec<String>> {
        let existing = self.sink.header().await?;

        if existing.iter().all(|cell| cell.trim().is_empty()) {
            let header: Vec<String> = first.keys().map(str::to_string).collect();
            log::debug!("Sheet has no header, writing [{}]", header.join(", "));
            self.sink.write_header(&header).await?;
            return Ok(header);
        }

        if !first.keys().eq(existing.iter().map(String::as_str)) {
            match self.policy {
                HeaderPolicy::Strict => eyre::bail!(
                    "Sheet header [{}] doesn't match record fields [{}]",
                    existing.join(", "),
                    first.keys().collect::<Vec<_>>().join(", ")
                ),
                HeaderPolicy::Align => {
                    let dropped: Vec<&str> = first
                        .keys()
                        .filter(|key| !existing.iter().any(|h| h == key))
                        .collect();
                    if dropped.is_empty() {
                        log::debug!("Record fields reordered against the sheet header");
                    } else {
                        log::warn!(
                            "Sheet header has no column for [{}]; those values are dropped",
                            dropped.join(", ")
                        );
                    }
                }
            }
        }

        Ok(existing)
    }
}

impl<S: SheetSink> Loader for SheetWriter<S> {
    type Item = Record;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        let Some(first) = items.first() else {
            log::info!("No data to send");
            return Ok(0);
        };

        let header = self.ensure_header(first).await?;
        let rows: Vec<Vec<String>> = items.iter().map(|r| r.to_row(&header)).collect();

        self.sink.append_rows(&rows).await?;
        log::info!("Sent {} row(s) to the sheet", rows.len());

        Ok(rows.len())
    }
}
