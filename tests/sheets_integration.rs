//! Integration tests for the Google Sheets client
//!
//! The client talks to a local axum server standing in for the token,
//! Sheets and Drive endpoints. Every request it receives is recorded.

use axum::Router;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{Value, json};
use sheet_scraper::client::{Auth, ServiceAccountKey, SheetsClient, Spreadsheet};
use sheet_scraper::etl::Loader;
use sheet_scraper::record::Record;
use sheet_scraper::sink::{SheetSink, SheetWriter};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

const TEST_KEY: &str = include_str!("data/test_rsa_key.pem");

/// A request as the stub received it
#[derive(Clone, Debug)]
struct Seen {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: String,
}

impl Seen {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct Reply {
    method: Method,
    suffix: &'static str,
    status: StatusCode,
    body: String,
}

#[derive(Clone, Default)]
struct Stub {
    replies: Arc<Mutex<Vec<Reply>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    /// Answer `method` requests whose path ends with `suffix`
    fn reply(
        self,
        method: Method,
        suffix: &'static str,
        status: StatusCode,
        body: Value,
    ) -> Self {
        self.replies.lock().unwrap().push(Reply {
            method,
            suffix,
            status,
            body: body.to_string(),
        });
        self
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn seen_at(&self, method: Method, suffix: &str) -> Vec<Seen> {
        self.seen()
            .into_iter()
            .filter(|s| s.method == method && s.path.ends_with(suffix))
            .collect()
    }

    /// Serve on an ephemeral local port and return the server root
    async fn start(self) -> (Url, Stub) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let root = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });
        (root, self)
    }
}

async fn handle(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let query = url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .into_owned()
        .collect();
    let seen = Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query,
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };
    stub.seen.lock().unwrap().push(seen);

    let replies = stub.replies.lock().unwrap();
    match replies
        .iter()
        .find(|r| r.method == method && uri.path().ends_with(r.suffix))
    {
        Some(reply) => (reply.status, reply.body.clone()),
        None => (StatusCode::NOT_FOUND, "no such route".to_string()),
    }
}

fn client(root: &Url, spreadsheet: impl Into<Spreadsheet>, auth: Auth) -> SheetsClient {
    SheetsClient::try_new(spreadsheet, "Datos", auth)
        .unwrap()
        .with_base_url(root.join("v4/spreadsheets/").unwrap())
        .with_drive_url(root.join("drive/v3/").unwrap())
}

fn bearer() -> Auth {
    Auth::Bearer("stub-token".to_string())
}

fn service_account(root: &Url) -> Auth {
    Auth::ServiceAccount(ServiceAccountKey {
        client_email: "bot@project.iam.gserviceaccount.com".to_string(),
        private_key: TEST_KEY.to_string(),
        private_key_id: Some("key-1".to_string()),
        token_uri: root.join("token").unwrap().to_string(),
    })
}

fn token(expires_in: i64) -> Value {
    json!({ "access_token": "ya29.issued", "expires_in": expires_in, "token_type": "Bearer" })
}

fn header_row(cells: &[&str]) -> Value {
    json!({ "range": "'Datos'!A1:Z1", "majorDimension": "ROWS", "values": [cells] })
}

fn headline(title: &str) -> Record {
    [
        ("titulo", title),
        ("enlace", "https://news.example.com/1"),
        ("fecha_scraping", "2024-05-01 10:00:00"),
        ("posicion", "1"),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_header_request_shape() {
    let (root, stub) = Stub::default()
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&["titulo", "enlace"]))
        .start()
        .await;

    let header = client(&root, "sheet-id", bearer()).header().await.unwrap();

    assert_eq!(header, vec!["titulo", "enlace"]);
    let seen = stub.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/v4/spreadsheets/sheet-id/values/'Datos'!1:1");
    assert_eq!(seen[0].query["majorDimension"], "ROWS");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer stub-token"));
}

#[tokio::test]
async fn test_empty_sheet_has_no_header() {
    let (root, _stub) = Stub::default()
        .reply(Method::GET, "!1:1", StatusCode::OK, json!({ "range": "'Datos'!A1:Z1" }))
        .start()
        .await;

    let header = client(&root, "sheet-id", bearer()).header().await.unwrap();
    assert!(header.is_empty());
}

#[tokio::test]
async fn test_load_into_empty_sheet_writes_header_then_rows() {
    let (root, stub) = Stub::default()
        .reply(Method::GET, "!1:1", StatusCode::OK, json!({}))
        .reply(Method::PUT, "!A1", StatusCode::OK, json!({ "updatedRows": 1 }))
        .reply(Method::POST, "!A1:append", StatusCode::OK, json!({ "updates": {} }))
        .start()
        .await;

    let writer = SheetWriter::new(client(&root, "sheet-id", bearer()));
    let count = writer
        .load(vec![headline("First"), headline("Second")])
        .await
        .unwrap();
    assert_eq!(count, 2);

    let put = stub.seen_at(Method::PUT, "!A1");
    assert_eq!(put.len(), 1);
    assert_eq!(put[0].query["valueInputOption"], "RAW");
    assert_eq!(
        put[0].json()["values"],
        json!([["titulo", "enlace", "fecha_scraping", "posicion"]])
    );

    let append = stub.seen_at(Method::POST, "!A1:append");
    assert_eq!(append.len(), 1);
    assert_eq!(append[0].query["valueInputOption"], "RAW");
    assert_eq!(append[0].query["insertDataOption"], "INSERT_ROWS");
    let body = append[0].json();
    let values = &body["values"];
    assert_eq!(values.as_array().unwrap().len(), 2);
    assert_eq!(values[1][0], "Second");
}

#[tokio::test]
async fn test_existing_header_is_not_rewritten() {
    let existing = ["titulo", "enlace", "fecha_scraping", "posicion"];
    let (root, stub) = Stub::default()
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&existing))
        .reply(Method::POST, "!A1:append", StatusCode::OK, json!({}))
        .start()
        .await;

    SheetWriter::new(client(&root, "sheet-id", bearer()))
        .load(vec![headline("Only")])
        .await
        .unwrap();

    assert!(stub.seen_at(Method::PUT, "!A1").is_empty());
    assert_eq!(stub.seen_at(Method::POST, "!A1:append").len(), 1);
}

#[tokio::test]
async fn test_append_server_error_fails_load() {
    let (root, _stub) = Stub::default()
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&["titulo"]))
        .reply(
            Method::POST,
            "!A1:append",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": { "message": "backend error" } }),
        )
        .start()
        .await;

    let err = SheetWriter::new(client(&root, "sheet-id", bearer()))
        .load(vec![headline("Lost")])
        .await
        .unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("append rows"), "{}", message);
    assert!(message.contains("500"), "{}", message);
    assert!(message.contains("backend error"), "{}", message);
}

#[tokio::test]
async fn test_header_forbidden_fails_load() {
    let (root, stub) = Stub::default()
        .reply(
            Method::GET,
            "!1:1",
            StatusCode::FORBIDDEN,
            json!({ "error": { "status": "PERMISSION_DENIED" } }),
        )
        .start()
        .await;

    let err = SheetWriter::new(client(&root, "sheet-id", bearer()))
        .load(vec![headline("Denied")])
        .await
        .unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("403"), "{}", message);
    assert!(message.contains("PERMISSION_DENIED"), "{}", message);
    assert!(stub.seen_at(Method::POST, "!A1:append").is_empty());
}

#[tokio::test]
async fn test_missing_worksheet_is_created() {
    let meta = json!({
        "properties": { "title": "Scraping" },
        "sheets": [{ "properties": { "title": "Hoja 1" } }]
    });
    let (root, stub) = Stub::default()
        .reply(Method::GET, "/sheet-id", StatusCode::OK, meta)
        .reply(Method::POST, "/sheet-id:batchUpdate", StatusCode::OK, json!({}))
        .start()
        .await;

    let created = client(&root, "sheet-id", bearer())
        .ensure_worksheet()
        .await
        .unwrap();
    assert!(created);

    let update = stub.seen_at(Method::POST, ":batchUpdate");
    assert_eq!(update.len(), 1);
    let body = update[0].json();
    let properties = &body["requests"][0]["addSheet"]["properties"];
    assert_eq!(properties["title"], "Datos");
    assert_eq!(properties["gridProperties"]["rowCount"], 1000);
    assert_eq!(properties["gridProperties"]["columnCount"], 20);
}

#[tokio::test]
async fn test_existing_worksheet_is_kept() {
    let meta = json!({
        "properties": { "title": "Scraping" },
        "sheets": [{ "properties": { "title": "Datos" } }]
    });
    let (root, stub) = Stub::default()
        .reply(Method::GET, "/sheet-id", StatusCode::OK, meta)
        .start()
        .await;

    let sheets = client(&root, "sheet-id", bearer());
    assert!(!sheets.ensure_worksheet().await.unwrap());
    assert_eq!(sheets.test_connection().await.unwrap(), "Scraping");

    let seen = stub.seen();
    assert!(seen.iter().all(|s| s.method == Method::GET));
    assert_eq!(
        seen[0].query["fields"],
        "properties.title,sheets.properties.title"
    );
}

#[tokio::test]
async fn test_connection_forbidden() {
    let (root, _stub) = Stub::default()
        .reply(Method::GET, "/sheet-id", StatusCode::FORBIDDEN, json!({}))
        .start()
        .await;

    let err = client(&root, "sheet-id", bearer())
        .test_connection()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("read spreadsheet metadata"));
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_service_account_token_is_cached() {
    let (root, stub) = Stub::default()
        .reply(Method::POST, "/token", StatusCode::OK, token(3600))
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&["titulo"]))
        .start()
        .await;

    let sheets = client(&root, "sheet-id", service_account(&root));
    sheets.header().await.unwrap();
    sheets.header().await.unwrap();

    let grants = stub.seen_at(Method::POST, "/token");
    assert_eq!(grants.len(), 1);
    let form: HashMap<String, String> = url::form_urlencoded::parse(grants[0].body.as_bytes())
        .into_owned()
        .collect();
    assert_eq!(form["grant_type"], "urn:ietf:params:oauth:grant-type:jwt-bearer");
    assert_eq!(form["assertion"].split('.').count(), 3);

    for read in stub.seen_at(Method::GET, "!1:1") {
        assert_eq!(read.authorization.as_deref(), Some("Bearer ya29.issued"));
    }
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() {
    let (root, stub) = Stub::default()
        .reply(Method::POST, "/token", StatusCode::OK, token(30))
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&["titulo"]))
        .start()
        .await;

    let sheets = client(&root, "sheet-id", service_account(&root));
    sheets.header().await.unwrap();
    sheets.header().await.unwrap();

    assert_eq!(stub.seen_at(Method::POST, "/token").len(), 2);
}

#[tokio::test]
async fn test_rejected_token_request() {
    let (root, stub) = Stub::default()
        .reply(
            Method::POST,
            "/token",
            StatusCode::UNAUTHORIZED,
            json!({ "error": "invalid_grant" }),
        )
        .start()
        .await;

    let err = client(&root, "sheet-id", service_account(&root))
        .header()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Token request rejected"));
    assert!(err.to_string().contains("invalid_grant"));
    assert!(stub.seen_at(Method::GET, "!1:1").is_empty());
}

#[tokio::test]
async fn test_spreadsheet_name_resolved_once() {
    let (root, stub) = Stub::default()
        .reply(
            Method::GET,
            "/drive/v3/files",
            StatusCode::OK,
            json!({ "files": [{ "id": "resolved-id", "name": "Scraping" }] }),
        )
        .reply(Method::GET, "!1:1", StatusCode::OK, header_row(&["titulo"]))
        .start()
        .await;

    let sheets = client(&root, Spreadsheet::Name("Scraping".into()), bearer());
    sheets.header().await.unwrap();
    sheets.header().await.unwrap();
    assert_eq!(sheets.spreadsheet_id().await.unwrap(), "resolved-id");

    let lookups = stub.seen_at(Method::GET, "/drive/v3/files");
    assert_eq!(lookups.len(), 1);
    let q = &lookups[0].query["q"];
    assert!(q.contains("name = 'Scraping'"), "{}", q);
    assert!(q.contains("application/vnd.google-apps.spreadsheet"), "{}", q);

    let reads = stub.seen_at(Method::GET, "!1:1");
    assert_eq!(reads.len(), 2);
    assert!(reads[0].path.starts_with("/v4/spreadsheets/resolved-id/"));
}

#[tokio::test]
async fn test_unknown_spreadsheet_name() {
    let (root, stub) = Stub::default()
        .reply(Method::GET, "/drive/v3/files", StatusCode::OK, json!({ "files": [] }))
        .start()
        .await;

    let err = client(&root, Spreadsheet::Name("Missing".into()), bearer())
        .header()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("No spreadsheet named 'Missing'"));
    assert!(stub.seen_at(Method::GET, "!1:1").is_empty());
}
