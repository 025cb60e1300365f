//! Record extraction from rendered pages

mod engine;
mod extractor;

pub use engine::{
    DISCOVERY_TIMEOUT, ExtractMode, ExtractOptions, Extraction, HEADLINE_LIMIT,
    HEADLINE_SELECTOR, Outcome, extract,
};
pub use extractor::RecordExtractor;
