//! Page extractor
//!
//! Loads a URL through a [`PageAccessor`] and extracts records from it.

use super::engine::{ExtractMode, ExtractOptions, Extraction, Outcome, extract};
use crate::etl::Extractor;
use crate::page::PageAccessor;
use crate::record::Record;

use eyre::{Context, Result};

/// Extractor for one page
///
/// Owns the page accessor for the duration of the run. Take it back with
/// [`RecordExtractor::into_page`] to close the session.
///
/// # Example
/// ```no_run
/// use sheet_scraper::etl::Extractor;
/// use sheet_scraper::page::{DriverOptions, WebDriverPage};
/// use sheet_scraper::scrape::{ExtractMode, RecordExtractor};
///
/// # async fn example() -> eyre::Result<()> {
/// let page = WebDriverPage::connect(&DriverOptions::default()).await?;
/// let extractor = RecordExtractor::new(page, "https://example.com", ExtractMode::Simple);
/// let records = extractor.extract().await?;
/// # Ok(())
/// # }
/// ```
pub struct RecordExtractor<P> {
    page: P,
    url: String,
    mode: ExtractMode,
    options: ExtractOptions,
    send_partial: bool,
}

impl<P: PageAccessor> RecordExtractor<P> {
    /// Create a new extractor
    ///
    /// # Arguments
    /// * `page` - Accessor the page is loaded through
    /// * `url` - Page to scrape
    /// * `mode` - Simple headline mode or a structured field mapping
    pub fn new(page: P, url: impl Into<String>, mode: ExtractMode) -> Self {
        Self {
            page,
            url: url.into(),
            mode,
            options: ExtractOptions::default(),
            send_partial: true,
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether records gathered before an aborted scan are passed on
    /// (default: true). When false an aborted scan is an error.
    pub fn with_send_partial(mut self, send_partial: bool) -> Self {
        self.send_partial = send_partial;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> &ExtractMode {
        &self.mode
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Load the page and extract from it
    ///
    /// # Errors
    /// Returns an error only if the page can't be loaded. Timeouts and
    /// scan faults are reported in [`Extraction::outcome`].
    pub async fn run(&self) -> Result<Extraction> {
        log::info!("Scraping {}", self.url);
        self.page
            .load(&self.url)
            .await
            .with_context(|| format!("Failed to load {}", self.url))?;

        let extraction = extract(&self.page, &self.mode, &self.options).await;
        log::debug!(
            "Extraction of {} {}: {} record(s)",
            self.url,
            extraction.outcome,
            extraction.len()
        );
        Ok(extraction)
    }
}

impl<P: PageAccessor> Extractor for RecordExtractor<P> {
    type Item = Record;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        let extraction = self.run().await?;

        match &extraction.outcome {
            Outcome::Complete => {}
            Outcome::TimedOut => {
                log::warn!("{}: {}", self.url, extraction.outcome);
            }
            Outcome::Aborted(reason) if self.send_partial => {
                log::warn!(
                    "{}: scan aborted ({}), keeping {} record(s)",
                    self.url,
                    reason,
                    extraction.len()
                );
            }
            Outcome::Aborted(reason) => {
                eyre::bail!("Scan of {} aborted: {}", self.url, reason);
            }
        }

        Ok(extraction.into_records())
    }
}
