//! Pipeline orchestration for one extract/load pass

use super::{Extractor, Loader};
use eyre::Result;

/// Pipeline that feeds everything an extractor produces into a loader
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `L`: Loader type (must load `E::Item`)
///
/// # Example
/// ```no_run
/// use sheet_scraper::etl::Pipeline;
/// # use sheet_scraper::etl::{Extractor, Loader};
/// # use eyre::Result;
/// # struct MyExtractor;
/// # impl Extractor for MyExtractor {
/// #     type Item = i32;
/// #     async fn extract(&self) -> Result<Vec<Self::Item>> { Ok(vec![]) }
/// # }
/// # struct MyLoader;
/// # impl Loader for MyLoader {
/// #     type Item = i32;
/// #     async fn load(&self, items: Vec<Self::Item>) -> Result<usize> { Ok(items.len()) }
/// # }
///
/// # async fn example() -> Result<()> {
/// let pipeline = Pipeline::new(MyExtractor, MyLoader);
///
/// let count = pipeline.run().await?;
/// println!("Processed {} items", count);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, L> {
    extractor: E,
    loader: L,
    load_empty: bool,
}

impl<E, L> Pipeline<E, L>
where
    E: Extractor,
    L: Loader<Item = E::Item>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, loader: L) -> Self {
        Self {
            extractor,
            loader,
            load_empty: false,
        }
    }

    /// Hand empty extractions to the loader too (default: skip the loader)
    pub fn with_load_empty(mut self, load_empty: bool) -> Self {
        self.load_empty = load_empty;
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Take the extractor back, e.g. to release the session it owns
    pub fn into_parts(self) -> (E, L) {
        (self.extractor, self.loader)
    }

    /// Run the pipeline once
    ///
    /// Returns the number of items loaded
    ///
    /// # Errors
    /// Returns an error if either stage fails
    pub async fn run(&self) -> Result<usize> {
        log::debug!("Extracting from source...");
        let items = self.extractor.extract().await?;
        log::debug!("Extracted {} items", items.len());

        if items.is_empty() && !self.load_empty {
            log::info!("No data to send");
            return Ok(0);
        }

        log::debug!("Loading to destination...");
        let count = self.loader.load(items).await?;
        log::debug!("Loaded {} items", count);

        Ok(count)
    }
}
