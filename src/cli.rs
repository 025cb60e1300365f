//! CLI helper functions

use crate::{
    client::{Auth, SheetsClient, Spreadsheet},
    etl::Pipeline,
    mapping::FieldMapping,
    page::{DriverOptions, PageAccessor, WebDriverPage},
    schedule::Scheduler,
    scrape::{ExtractMode, ExtractOptions, RecordExtractor},
    sink::{HeaderPolicy, MemorySink, SheetSink, SheetWriter},
};
use eyre::{Context, Result, eyre};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Worksheet used when `SHEETS_WORKSHEET` isn't set
pub const DEFAULT_WORKSHEET: &str = "Datos";

/// Runtime settings read from the environment
#[derive(Clone, Debug)]
pub struct Settings {
    pub driver: DriverOptions,
    pub spreadsheet: Option<Spreadsheet>,
    pub worksheet: String,
    pub extract: ExtractOptions,
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| eyre::eyre!("Invalid {}={}: {}", name, value, e)),
        _ => Ok(default),
    }
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => eyre::bail!("Invalid {}={}: expected true or false", name, other),
        },
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// Expected environment variables:
    /// - WEBDRIVER_URL: WebDriver endpoint (optional, defaults to http://localhost:9515)
    /// - SCRAPER_HEADLESS: Run the browser headless (optional, defaults to true)
    /// - SHEETS_SPREADSHEET_ID: Target spreadsheet ID
    /// - SHEETS_SPREADSHEET_NAME: Target spreadsheet title, used when no ID is set
    /// - SHEETS_WORKSHEET: Worksheet name (optional, defaults to "Datos")
    /// - SCRAPER_TIMEOUT_SECS: Discovery timeout (optional, defaults to 10)
    /// - SCRAPER_LIMIT: Headlines kept in simple mode (optional, defaults to 10)
    pub fn from_env() -> Result<Self> {
        let defaults = DriverOptions::default();
        let webdriver_url: String = env_or("WEBDRIVER_URL", defaults.webdriver_url.clone())?;
        Url::parse(&webdriver_url)
            .with_context(|| format!("Invalid WEBDRIVER_URL: {}", webdriver_url))?;

        let driver = DriverOptions {
            webdriver_url,
            headless: env_flag("SCRAPER_HEADLESS", defaults.headless)?,
            ..defaults
        };

        let extract_defaults = ExtractOptions::default();
        let extract = ExtractOptions {
            timeout: Duration::from_secs(env_or(
                "SCRAPER_TIMEOUT_SECS",
                extract_defaults.timeout.as_secs(),
            )?),
            limit: env_or("SCRAPER_LIMIT", extract_defaults.limit)?,
            ..extract_defaults
        };

        let non_empty = |name: &str| std::env::var(name).ok().filter(|s| !s.trim().is_empty());
        let spreadsheet = non_empty("SHEETS_SPREADSHEET_ID")
            .map(Spreadsheet::Id)
            .or_else(|| non_empty("SHEETS_SPREADSHEET_NAME").map(Spreadsheet::Name));

        Ok(Self {
            driver,
            spreadsheet,
            worksheet: env_or("SHEETS_WORKSHEET", DEFAULT_WORKSHEET.to_string())?,
            extract,
        })
    }
}

/// What to scrape and how to write it
#[derive(Clone, Debug)]
pub struct ScrapeRequest {
    pub url: Url,
    pub mapping: Option<FieldMapping>,
    pub header_policy: HeaderPolicy,
    pub send_partial: bool,
    /// Print rows instead of sending them to the sheet
    pub dry_run: bool,
}

impl ScrapeRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            mapping: None,
            header_policy: HeaderPolicy::default(),
            send_partial: true,
            dry_run: false,
        }
    }

    pub fn mode(&self) -> ExtractMode {
        ExtractMode::from_mapping(self.mapping.clone())
    }
}

/// Load the Sheets client from settings and environment credentials
pub fn load_sheets_client(settings: &Settings) -> Result<SheetsClient> {
    let spreadsheet = settings
        .spreadsheet
        .clone()
        .ok_or_else(|| eyre!("SHEETS_SPREADSHEET_ID or SHEETS_SPREADSHEET_NAME must be set"))?;
    let auth = Auth::from_env()?;
    SheetsClient::try_new(spreadsheet, &settings.worksheet, auth)
        .context("Failed to create Sheets client")
}

/// Scrape one page into a sink
///
/// Pipeline: RecordExtractor → SheetWriter. The page is closed on every
/// exit path.
pub async fn scrape_into<P, S>(
    page: P,
    sink: S,
    request: &ScrapeRequest,
    options: &ExtractOptions,
) -> Result<usize>
where
    P: PageAccessor,
    S: SheetSink,
{
    let extractor = RecordExtractor::new(page, request.url.as_str(), request.mode())
        .with_options(options.clone())
        .with_send_partial(request.send_partial);
    let writer = SheetWriter::new(sink).with_policy(request.header_policy);

    let pipeline = Pipeline::new(extractor, writer);
    let result = pipeline.run().await;

    let (extractor, _) = pipeline.into_parts();
    if let Err(e) = extractor.into_page().close().await {
        log::warn!("Failed to close browser session: {}", e);
    }

    result
}

/// Run one full scrape: start the browser, connect the sheet, extract, send
///
/// Returns the number of rows written
pub async fn run_scraping(settings: &Settings, request: &ScrapeRequest) -> Result<usize> {
    if request.dry_run {
        let sink = MemorySink::new();
        let page = WebDriverPage::connect(&settings.driver).await?;
        let count = scrape_into(page, sink.clone(), request, &settings.extract).await?;
        if !sink.is_empty() {
            println!("{}", sink.to_tsv());
        }
        log::info!("✓ Dry run produced {} row(s)", count);
        return Ok(count);
    }

    log::info!("Connecting to Google Sheets...");
    let client = load_sheets_client(settings)?;
    client.ensure_worksheet().await?;

    log::info!("Starting browser...");
    let page = WebDriverPage::connect(&settings.driver).await?;
    scrape_into(page, client, request, &settings.extract).await
}

/// Verify the configured spreadsheet is reachable
pub async fn test_sheet_access(settings: &Settings) -> Result<String> {
    let client = load_sheets_client(settings)?;
    let title = client.test_connection().await?;
    client.ensure_worksheet().await?;
    Ok(title)
}

/// Repeat [`run_scraping`] every `period` until the process is stopped
///
/// A run that fails is logged and the schedule carries on.
pub async fn scheduled_scraping(
    settings: Settings,
    request: ScrapeRequest,
    period: Duration,
    run_immediately: bool,
) {
    let settings = Arc::new(settings);
    let request = Arc::new(request);
    let scheduler = Scheduler::new(period).with_run_immediately(run_immediately);

    scheduler
        .run_forever(move || {
            let settings = settings.clone();
            let request = request.clone();
            async move {
                if let Err(e) = run_scraping(&settings, &request).await {
                    log::error!("Error in scraping run: {:#}", e);
                }
            }
        })
        .await;
}
