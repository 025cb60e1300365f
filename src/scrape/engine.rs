//! Record extraction over a loaded page
//!
//! Two modes:
//! - **Simple**: a fixed headline schema. The first `limit` links matching
//!   [`HEADLINE_SELECTOR`] become `titulo`/`enlace` records.
//! - **Structured**: a [`FieldMapping`]. Every container element becomes a
//!   record and each mapped field is looked up inside its container.
//!
//! Failures stay distinguishable. A discovery timeout yields an empty
//! [`Extraction`] marked [`Outcome::TimedOut`]. A session fault stops the
//! scan and keeps the records built so far ([`Outcome::Aborted`]). Field
//! lookups that miss become empty strings.

use crate::mapping::FieldMapping;
use crate::page::{AccessError, PageAccessor};
use crate::record::{
    LINK_FIELD, POSITION_FIELD, Record, TIMESTAMP_FIELD, TITLE_FIELD, timestamp_now,
};

use std::time::Duration;

/// Headline-like links picked up in simple mode
pub const HEADLINE_SELECTOR: &str = "h2 a, h3 a, .title a";

/// Wait ceiling for the first container/match to appear
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of headlines kept in simple mode
pub const HEADLINE_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractMode {
    Simple,
    Structured(FieldMapping),
}

impl ExtractMode {
    /// Structured when a mapping is given, simple otherwise
    pub fn from_mapping(mapping: Option<FieldMapping>) -> Self {
        match mapping {
            Some(mapping) => Self::Structured(mapping),
            None => Self::Simple,
        }
    }

    /// Columns the records of this mode carry, in order
    pub fn header(&self) -> Vec<String> {
        match self {
            Self::Simple => [TITLE_FIELD, LINK_FIELD, TIMESTAMP_FIELD, POSITION_FIELD]
                .into_iter()
                .map(str::to_string)
                .collect(),
            Self::Structured(mapping) => mapping.header(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub timeout: Duration,
    /// Simple mode only; structured mode keeps every container
    pub limit: usize,
    pub headline_selector: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            timeout: DISCOVERY_TIMEOUT,
            limit: HEADLINE_LIMIT,
            headline_selector: HEADLINE_SELECTOR.to_string(),
        }
    }
}

/// How an extraction pass ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    /// Nothing matched within the discovery timeout
    TimedOut,
    /// A driver fault stopped the scan; records before it are kept
    Aborted(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::TimedOut => write!(f, "timed out waiting for matching elements"),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Records produced by one pass over one page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub outcome: Outcome,
}

impl Extraction {
    fn complete(records: Vec<Record>) -> Self {
        Self {
            records,
            outcome: Outcome::Complete,
        }
    }

    fn timed_out() -> Self {
        Self {
            records: Vec::new(),
            outcome: Outcome::TimedOut,
        }
    }

    fn aborted(records: Vec<Record>, err: &AccessError) -> Self {
        Self {
            records,
            outcome: Outcome::Aborted(err.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Complete
    }

    /// Non-fatal condition worth reporting, if any
    pub fn warning(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Complete => None,
            other => Some(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Extract records from an already loaded page
pub async fn extract<P: PageAccessor>(
    page: &P,
    mode: &ExtractMode,
    options: &ExtractOptions,
) -> Extraction {
    match mode {
        ExtractMode::Simple => extract_headlines(page, options).await,
        ExtractMode::Structured(mapping) => extract_structured(page, mapping, options).await,
    }
}

/// Wait for the first match. Timeouts and faults come back as the final
/// (empty) extraction.
async fn discover<P: PageAccessor>(
    page: &P,
    selector: &str,
    timeout: Duration,
) -> Result<Vec<P::Handle>, Extraction> {
    match page.wait_for_any(selector, timeout).await {
        Ok(found) => {
            log::debug!("Found {} element(s) matching '{}'", found.len(), selector);
            Ok(found)
        }
        Err(AccessError::Timeout) => {
            log::warn!(
                "No elements matched '{}' within {:?}",
                selector,
                timeout
            );
            Err(Extraction::timed_out())
        }
        Err(e) => {
            log::error!("Scan of '{}' failed: {}", selector, e);
            Err(Extraction::aborted(Vec::new(), &e))
        }
    }
}

async fn extract_headlines<P: PageAccessor>(page: &P, options: &ExtractOptions) -> Extraction {
    let links = match discover(page, &options.headline_selector, options.timeout).await {
        Ok(links) => links,
        Err(extraction) => return extraction,
    };

    let mut records = Vec::new();
    for (index, link) in links.iter().take(options.limit).enumerate() {
        let position = index + 1;
        match read_headline(page, link, position).await {
            Ok(record) => records.push(record),
            Err(e) if e.is_session_fault() => {
                log::error!("Scan aborted at element {}: {}", position, e);
                return Extraction::aborted(records, &e);
            }
            Err(e) => log::warn!("Skipping element {}: {}", position, e),
        }
    }

    Extraction::complete(records)
}

async fn read_headline<P: PageAccessor>(
    page: &P,
    link: &P::Handle,
    position: usize,
) -> Result<Record, AccessError> {
    let title = page.text(link).await?;
    let href = page.attribute(link, "href").await?;

    let mut record = Record::new();
    record.insert(TITLE_FIELD, title.trim());
    record.insert(LINK_FIELD, href.unwrap_or_default());
    record.insert(TIMESTAMP_FIELD, timestamp_now());
    record.insert(POSITION_FIELD, position.to_string());
    Ok(record)
}

/// Why a field couldn't be resolved inside its container
enum FieldError {
    /// Zero or many matches, or the field element itself failed to read
    Miss(AccessError),
    /// The container is no longer in the document
    Detached,
    /// The driver session failed
    Fault(AccessError),
}

async fn resolve_field<P: PageAccessor>(
    page: &P,
    container: &P::Handle,
    selector: &str,
) -> Result<String, FieldError> {
    let element = match page.find_one(container, selector).await {
        Ok(element) => element,
        Err(e) if e.is_element_fault() => return Err(FieldError::Detached),
        Err(e) if e.is_session_fault() => return Err(FieldError::Fault(e)),
        Err(e) => return Err(FieldError::Miss(e)),
    };
    match page.text(&element).await {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) if e.is_session_fault() => Err(FieldError::Fault(e)),
        Err(e) => Err(FieldError::Miss(e)),
    }
}

async fn extract_structured<P: PageAccessor>(
    page: &P,
    mapping: &FieldMapping,
    options: &ExtractOptions,
) -> Extraction {
    let containers = match discover(page, mapping.container(), options.timeout).await {
        Ok(containers) => containers,
        Err(extraction) => return extraction,
    };

    let mut records = Vec::with_capacity(containers.len());
    'containers: for (index, container) in containers.iter().enumerate() {
        let position = index + 1;
        let mut record = Record::stamped(timestamp_now(), position);

        for (name, selector) in mapping.fields() {
            let value = match resolve_field(page, container, selector).await {
                Ok(text) => text,
                Err(FieldError::Miss(e)) if e.is_miss() => {
                    log::debug!("Container {}: field '{}' left empty ({})", position, name, e);
                    String::new()
                }
                Err(FieldError::Miss(e)) => {
                    log::warn!(
                        "Container {}: field '{}' unreadable, left empty ({})",
                        position,
                        name,
                        e
                    );
                    String::new()
                }
                Err(FieldError::Detached) => {
                    log::warn!("Container {} detached from the page, skipping", position);
                    continue 'containers;
                }
                Err(FieldError::Fault(e)) => {
                    log::error!("Scan aborted at container {}: {}", position, e);
                    return Extraction::aborted(records, &e);
                }
            };
            record.insert(name, value);
        }

        records.push(record);
    }

    Extraction::complete(records)
}
