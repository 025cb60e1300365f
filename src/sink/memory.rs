//! In-process sink

use super::SheetSink;

use eyre::{Result, eyre};
use std::sync::{Arc, Mutex, MutexGuard};

/// Sink keeping rows in memory
///
/// Clones share the same rows, so a clone handed to a [`super::SheetWriter`]
/// can be inspected afterwards.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink pre-filled with rows, the first one acting as header
    pub fn with_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Vec<String>>>> {
        self.rows
            .lock()
            .map_err(|e| eyre!("Memory sink poisoned: {}", e))
    }

    /// Every row, header included
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows as tab separated lines
    pub fn to_tsv(&self) -> String {
        self.rows()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.replace(['\t', '\n'], " "))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl SheetSink for MemorySink {
    async fn header(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.first().cloned().unwrap_or_default())
    }

    async fn write_header(&self, fields: &[String]) -> Result<()> {
        let mut rows = self.lock()?;
        match rows.first_mut() {
            Some(first) => *first = fields.to_vec(),
            None => rows.push(fields.to_vec()),
        }
        Ok(())
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        self.lock()?.extend(rows.iter().cloned());
        Ok(())
    }
}
