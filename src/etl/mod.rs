//! Extract/load seams of the scraping pipeline
//!
//! A run extracts records from a page and loads them into a sink. The
//! traits here keep the two sides independent so either can be swapped
//! (a live browser or a fixture page, Google Sheets or an in-memory sink).

mod extract;
mod load;
mod pipeline;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::Pipeline;
