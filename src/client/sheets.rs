//! Google Sheets client
//!
//! Writes to one worksheet of one spreadsheet through the Sheets v4 values
//! API. A spreadsheet given by name is looked up through Drive once.

use super::Auth;
use crate::sink::SheetSink;

use eyre::{Context, Result, eyre};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Size of a worksheet created by [`SheetsClient::ensure_worksheet`]
const NEW_SHEET_ROWS: u32 = 1000;
const NEW_SHEET_COLUMNS: u32 = 20;

/// Refresh tokens this many seconds before Google says they expire
const TOKEN_LEEWAY_SECS: i64 = 60;

/// The spreadsheet a client writes to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Spreadsheet {
    Id(String),
    /// Title of a spreadsheet shared with the credentials
    Name(String),
}

impl From<&str> for Spreadsheet {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for Spreadsheet {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl std::fmt::Display for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "'{}'", name),
        }
    }
}

#[derive(Clone, Debug)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - TOKEN_LEEWAY_SECS > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

/// Quote a value for a Drive `files.list` query string literal
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Client for one worksheet of a spreadsheet
///
/// # Example
/// ```no_run
/// use sheet_scraper::client::{Auth, SheetsClient, Spreadsheet};
///
/// # async fn example() -> eyre::Result<()> {
/// let by_id = SheetsClient::try_new("1AbC...", "Datos", Auth::from_env()?)?;
/// by_id.ensure_worksheet().await?;
///
/// let by_name = Spreadsheet::Name("Scraping".to_string());
/// let client = SheetsClient::try_new(by_name, "Datos", Auth::from_env()?)?;
/// client.ensure_worksheet().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    drive_url: Url,
    spreadsheet: Spreadsheet,
    resolved_id: Arc<OnceCell<String>>,
    worksheet: String,
    auth: Arc<Auth>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl SheetsClient {
    /// Create a client for `worksheet` in `spreadsheet` (an ID or a
    /// [`Spreadsheet::Name`])
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the
    /// spreadsheet ID or name is empty
    pub fn try_new(
        spreadsheet: impl Into<Spreadsheet>,
        worksheet: impl Into<String>,
        auth: Auth,
    ) -> Result<Self> {
        let spreadsheet = spreadsheet.into();
        match &spreadsheet {
            Spreadsheet::Id(id) if id.trim().is_empty() => {
                eyre::bail!("Spreadsheet ID must not be empty")
            }
            Spreadsheet::Name(name) if name.trim().is_empty() => {
                eyre::bail!("Spreadsheet name must not be empty")
            }
            _ => {}
        }
        let client = Client::builder()
            .user_agent(concat!("sheet-scraper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(SHEETS_API)?,
            drive_url: Url::parse(DRIVE_API)?,
            spreadsheet,
            resolved_id: Arc::new(OnceCell::new()),
            worksheet: worksheet.into(),
            auth: Arc::new(auth),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Point the client at another Sheets API root
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Point spreadsheet name lookups at another Drive API root
    pub fn with_drive_url(mut self, drive_url: Url) -> Self {
        self.drive_url = drive_url;
        self
    }

    pub fn spreadsheet(&self) -> &Spreadsheet {
        &self.spreadsheet
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    /// A1 range for the worksheet, quoted so any title works
    pub fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet.replace('\'', "''"), cells)
    }

    /// Build `{base}/{spreadsheet}/{segments...}`
    fn url(&self, spreadsheet: &str, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| eyre!("Sheets API URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push(spreadsheet)
            .extend(segments);
        Ok(url)
    }

    /// ID of the target spreadsheet, looking a name up on first use
    pub async fn spreadsheet_id(&self) -> Result<String> {
        match &self.spreadsheet {
            Spreadsheet::Id(id) => Ok(id.clone()),
            Spreadsheet::Name(name) => self
                .resolved_id
                .get_or_try_init(|| self.find_spreadsheet(name))
                .await
                .cloned(),
        }
    }

    /// Find the ID of the spreadsheet titled `name`
    ///
    /// # Errors
    /// Returns an error if no spreadsheet by that name is visible to the
    /// credentials
    pub async fn find_spreadsheet(&self, name: &str) -> Result<String> {
        let mut url = self.drive_url.clone();
        url.path_segments_mut()
            .map_err(|_| eyre!("Drive API URL cannot be a base: {}", self.drive_url))?
            .pop_if_empty()
            .push("files");

        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query(name),
            SPREADSHEET_MIME
        );
        let request = self.client.get(url).query(&[
            ("q", query.as_str()),
            ("fields", "files(id,name)"),
            ("pageSize", "10"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let list: FileList = self
            .send(request, "look up spreadsheet")
            .await?
            .json()
            .await
            .context("Failed to parse Drive file list")?;

        let mut files = list.files.into_iter();
        let Some(first) = files.next() else {
            eyre::bail!("No spreadsheet named '{}' is shared with these credentials", name);
        };
        if files.next().is_some() {
            log::warn!("Several spreadsheets are named '{}', using {}", name, first.id);
        }
        log::debug!("Spreadsheet '{}' resolved to {}", name, first.id);
        Ok(first.id)
    }

    async fn access_token(&self) -> Result<String> {
        let key = match self.auth.as_ref() {
            Auth::Bearer(token) => return Ok(token.clone()),
            Auth::ServiceAccount(key) => key,
        };

        let mut cached = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        log::debug!("Requesting access token for {}", key.client_email);
        let assertion = key.assertion(now)?;
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach token endpoint {}", key.token_uri))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Token request rejected ({}): {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;
        let value = token.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: now + token.expires_in.unwrap_or(3600),
        });
        Ok(value)
    }

    /// Authorize and send a request, turning non-success statuses into errors
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| eyre!("Failed to send request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to {} ({}): {}", what, status, body);
        }
        Ok(response)
    }

    async fn metadata(&self) -> Result<SpreadsheetMeta> {
        let id = self.spreadsheet_id().await?;
        let url = self.url(&id, &[])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "properties.title,sheets.properties.title")]);
        self.send(request, "read spreadsheet metadata")
            .await?
            .json()
            .await
            .context("Failed to parse spreadsheet metadata")
    }

    /// Verify access and return the spreadsheet title
    pub async fn test_connection(&self) -> Result<String> {
        let meta = self.metadata().await?;
        Ok(meta
            .properties
            .map(|p| p.title)
            .unwrap_or_else(|| self.spreadsheet.to_string()))
    }

    /// Open the worksheet, creating it when the spreadsheet lacks it
    ///
    /// Returns true if the worksheet was created.
    pub async fn ensure_worksheet(&self) -> Result<bool> {
        let meta = self.metadata().await?;
        if meta
            .sheets
            .iter()
            .any(|s| s.properties.title == self.worksheet)
        {
            log::debug!("Worksheet '{}' found", self.worksheet);
            return Ok(false);
        }

        log::info!("Creating worksheet '{}'", self.worksheet);
        let id = self.spreadsheet_id().await?;
        let url = self.url(&format!("{}:batchUpdate", id), &[])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.worksheet,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLUMNS,
                        }
                    }
                }
            }]
        });
        self.send(self.client.post(url).json(&body), "create worksheet")
            .await?;
        Ok(true)
    }
}

impl SheetSink for SheetsClient {
    async fn header(&self) -> Result<Vec<String>> {
        let id = self.spreadsheet_id().await?;
        let range = self.range("1:1");
        let url = self.url(&id, &["values", &range])?;
        let request = self.client.get(url).query(&[("majorDimension", "ROWS")]);
        let values: ValueRange = self
            .send(request, "read header row")
            .await?
            .json()
            .await
            .context("Failed to parse header row")?;
        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    async fn write_header(&self, fields: &[String]) -> Result<()> {
        let id = self.spreadsheet_id().await?;
        let range = self.range("A1");
        let url = self.url(&id, &["values", &range])?;
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "majorDimension": "ROWS", "values": [fields] }));
        self.send(request, "write header row").await?;
        Ok(())
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let id = self.spreadsheet_id().await?;
        let target = format!("{}:append", self.range("A1"));
        let url = self.url(&id, &["values", &target])?;
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }));
        self.send(request, "append rows").await?;
        Ok(())
    }
}

impl std::fmt::Display for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SheetsClient {{ spreadsheet: {}, worksheet: {}, auth: {} }}",
            self.spreadsheet, self.worksheet, self.auth
        )
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url.as_str())
            .field("spreadsheet", &self.spreadsheet)
            .field("worksheet", &self.worksheet)
            .field("auth", &self.auth.to_string())
            .finish()
    }
}
