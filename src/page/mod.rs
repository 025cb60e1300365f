//! Page access over a browser automation driver
//!
//! The extractor never talks to a driver directly. It goes through
//! [`PageAccessor`], which loads a page, waits for elements and reads their
//! text and attributes. [`WebDriverPage`] is the real implementation.

mod webdriver;

pub use webdriver::{DriverOptions, WebDriverPage};

use std::future::Future;
use std::time::Duration;

/// Failure of a single page access call
///
/// The extractor treats these differently: misses collapse into empty
/// field values, element faults skip one element, session faults abort
/// the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// Nothing matched within the wait ceiling
    Timeout,
    /// The selector matched no element
    NotFound,
    /// The selector matched more than one element where one was expected
    Ambiguous(usize),
    /// The element is no longer attached to the document
    Stale,
    /// The driver rejected the selector
    InvalidSelector(String),
    /// Driver or session failure
    Session(String),
}

impl AccessError {
    /// The lookup resolved to zero or to many elements
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound | Self::Ambiguous(_))
    }

    pub fn is_element_fault(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn is_session_fault(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for elements"),
            Self::NotFound => write!(f, "no element matched"),
            Self::Ambiguous(n) => write!(f, "{} elements matched, expected one", n),
            Self::Stale => write!(f, "element is detached from the document"),
            Self::InvalidSelector(s) => write!(f, "invalid selector: {}", s),
            Self::Session(s) => write!(f, "driver error: {}", s),
        }
    }
}

impl std::error::Error for AccessError {}

pub type AccessResult<T> = Result<T, AccessError>;

/// Capability surface the extractor needs from a rendered page
pub trait PageAccessor: Send + Sync {
    /// An element on the loaded page
    type Handle: Send + Sync;

    /// Navigate to `url` and let it render
    fn load(&self, url: &str) -> impl Future<Output = AccessResult<()>> + Send;

    /// Wait up to `timeout` for at least one element matching `selector`,
    /// then return every match in document order.
    ///
    /// # Errors
    /// [`AccessError::Timeout`] when nothing matched in time
    fn wait_for_any(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = AccessResult<Vec<Self::Handle>>> + Send;

    /// Find exactly one descendant of `scope` matching `selector`
    ///
    /// # Errors
    /// [`AccessError::NotFound`] or [`AccessError::Ambiguous`] when the
    /// selector doesn't resolve to a single element
    fn find_one(
        &self,
        scope: &Self::Handle,
        selector: &str,
    ) -> impl Future<Output = AccessResult<Self::Handle>> + Send;

    /// Rendered text of the element
    fn text(&self, handle: &Self::Handle) -> impl Future<Output = AccessResult<String>> + Send;

    /// Attribute value, `None` when the element doesn't carry it
    fn attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> impl Future<Output = AccessResult<Option<String>>> + Send;

    /// Release the underlying browser session
    fn close(self) -> impl Future<Output = AccessResult<()>> + Send;
}
