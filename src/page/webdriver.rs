//! WebDriver-backed page accessor
//!
//! Talks to a running WebDriver endpoint (chromedriver by default) through
//! `fantoccini`.

use super::{AccessError, AccessResult, PageAccessor};

use eyre::{Context, Result};
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::time::Duration;

/// Browser session options
#[derive(Clone, Debug)]
pub struct DriverOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_size: (u32, u32),
    pub extra_args: Vec<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_size: (1920, 1080),
            extra_args: Vec::new(),
        }
    }
}

impl DriverOptions {
    /// Chrome command line the session is started with
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        args.extend(
            ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"]
                .into_iter()
                .map(str::to_string),
        );
        args.push(format!(
            "--window-size={},{}",
            self.window_size.0, self.window_size.1
        ));
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// WebDriver capabilities requesting a Chrome session with [`Self::chrome_args`]
    pub fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut caps = serde_json::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": self.chrome_args() }),
        );
        caps
    }
}

/// [`PageAccessor`] over a WebDriver session
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    /// Start a new browser session
    ///
    /// # Errors
    /// Returns an error if the WebDriver endpoint can't be reached or
    /// refuses the session
    pub async fn connect(options: &DriverOptions) -> Result<Self> {
        log::debug!(
            "Starting browser session at {} (headless: {})",
            options.webdriver_url,
            options.headless
        );
        let mut builder = ClientBuilder::native();
        builder.capabilities(options.capabilities());
        let client = builder
            .connect(&options.webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to start a browser session at {}",
                    options.webdriver_url
                )
            })?;
        Ok(Self { client })
    }
}

fn classify(err: CmdError) -> AccessError {
    match err {
        CmdError::WaitTimeout => AccessError::Timeout,
        CmdError::Standard(ref e) => match e.error {
            ErrorStatus::NoSuchElement => AccessError::NotFound,
            ErrorStatus::StaleElementReference => AccessError::Stale,
            ErrorStatus::InvalidSelector => AccessError::InvalidSelector(e.to_string()),
            _ => AccessError::Session(err.to_string()),
        },
        other => AccessError::Session(other.to_string()),
    }
}

impl PageAccessor for WebDriverPage {
    type Handle = Element;

    async fn load(&self, url: &str) -> AccessResult<()> {
        log::debug!("Loading {}", url);
        self.client.goto(url).await.map_err(classify)
    }

    async fn wait_for_any(&self, selector: &str, timeout: Duration) -> AccessResult<Vec<Element>> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(classify)?;

        let found = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(classify)?;
        if found.is_empty() {
            // The element seen by the wait vanished before the lookup
            return Err(AccessError::Timeout);
        }
        Ok(found)
    }

    async fn find_one(&self, scope: &Element, selector: &str) -> AccessResult<Element> {
        let mut found = scope
            .find_all(Locator::Css(selector))
            .await
            .map_err(classify)?;
        match found.len() {
            0 => Err(AccessError::NotFound),
            1 => Ok(found.remove(0)),
            n => Err(AccessError::Ambiguous(n)),
        }
    }

    async fn text(&self, handle: &Element) -> AccessResult<String> {
        handle.text().await.map_err(classify)
    }

    async fn attribute(&self, handle: &Element, name: &str) -> AccessResult<Option<String>> {
        // Properties resolve relative links the way the page sees them
        match handle.prop(name).await.map_err(classify)? {
            Some(value) => Ok(Some(value)),
            None => handle.attr(name).await.map_err(classify),
        }
    }

    async fn close(self) -> AccessResult<()> {
        log::debug!("Closing browser session");
        self.client.close().await.map_err(classify)
    }
}
