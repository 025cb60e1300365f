//! Extractor trait for pulling items out of a source

use eyre::Result;

/// Extractor trait for extracting data from a source
///
/// # Example
/// ```no_run
/// use sheet_scraper::etl::Extractor;
/// use eyre::Result;
///
/// struct FixedExtractor(Vec<String>);
///
/// impl Extractor for FixedExtractor {
///     type Item = String;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (driver, network, parsing, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<Vec<Self::Item>>> + Send;
}
