//! In-memory page fixture for integration tests
#![allow(dead_code)]

use sheet_scraper::mapping::FieldMapping;
use sheet_scraper::page::{AccessError, AccessResult, PageAccessor};
use sheet_scraper::scrape::HEADLINE_SELECTOR;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const URL: &str = "https://shop.example.com/catalog";

/// One element of a fixture page
///
/// An element with a fault fails every lookup scoped to it and every read
/// of it.
#[derive(Clone, Debug, Default)]
pub struct FixtureElement {
    text: String,
    attributes: HashMap<String, String>,
    children: HashMap<String, Vec<FixtureElement>>,
    fault: Option<AccessError>,
}

impl FixtureElement {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, selector: &str, child: FixtureElement) -> Self {
        self.children
            .entry(selector.to_string())
            .or_default()
            .push(child);
        self
    }

    pub fn failing(mut self, fault: AccessError) -> Self {
        self.fault = Some(fault);
        self
    }

    fn check(&self) -> AccessResult<()> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FixturePage {
    elements: HashMap<String, Vec<FixtureElement>>,
    load_error: Option<AccessError>,
    loaded: Mutex<Vec<String>>,
    closed: Arc<AtomicBool>,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements returned for a top-level `selector`, in document order
    pub fn with(mut self, selector: &str, elements: Vec<FixtureElement>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    pub fn failing_load(mut self, error: AccessError) -> Self {
        self.load_error = Some(error);
        self
    }

    /// Flag set once the page is closed, readable after the page is consumed
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }
}

impl PageAccessor for FixturePage {
    type Handle = FixtureElement;

    async fn load(&self, url: &str) -> AccessResult<()> {
        if let Some(e) = &self.load_error {
            return Err(e.clone());
        }
        self.loaded.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn wait_for_any(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> AccessResult<Vec<FixtureElement>> {
        match self.elements.get(selector) {
            Some(found) if !found.is_empty() => Ok(found.clone()),
            _ => Err(AccessError::Timeout),
        }
    }

    async fn find_one(
        &self,
        scope: &FixtureElement,
        selector: &str,
    ) -> AccessResult<FixtureElement> {
        scope.check()?;
        match scope.children.get(selector).map(Vec::as_slice) {
            None | Some([]) => Err(AccessError::NotFound),
            Some([one]) => Ok(one.clone()),
            Some(many) => Err(AccessError::Ambiguous(many.len())),
        }
    }

    async fn text(&self, handle: &FixtureElement) -> AccessResult<String> {
        handle.check()?;
        Ok(handle.text.clone())
    }

    async fn attribute(
        &self,
        handle: &FixtureElement,
        name: &str,
    ) -> AccessResult<Option<String>> {
        handle.check()?;
        Ok(handle.attributes.get(name).cloned())
    }

    async fn close(self) -> AccessResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// `.item` container with a title and, optionally, a price
pub fn product(title: &str, price: Option<&str>) -> FixtureElement {
    let item = FixtureElement::new("").with_child("h3", FixtureElement::new(title));
    match price {
        Some(price) => item.with_child(".price", FixtureElement::new(price)),
        None => item,
    }
}

/// Three products, the third without a price
pub fn product_page() -> FixturePage {
    FixturePage::new().with(
        ".item",
        vec![
            product("Lamp", Some("19.99")),
            product("Chair", Some("45.00")),
            product("Desk", None),
        ],
    )
}

pub fn product_mapping() -> FieldMapping {
    FieldMapping::from_pairs([("container", ".item"), ("title", "h3"), ("price", ".price")])
        .unwrap()
}

/// `count` headline links, numbered from 1
pub fn headline_page(count: usize) -> FixturePage {
    let links = (1..=count)
        .map(|n| {
            FixtureElement::new(&format!("  Headline {} ", n))
                .with_attr("href", &format!("https://news.example.com/{}", n))
        })
        .collect();
    FixturePage::new().with(HEADLINE_SELECTOR, links)
}
