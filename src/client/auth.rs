use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OAuth scope needed to read and append worksheet values
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// OAuth scope needed to look spreadsheets up by name
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

pub enum Auth {
    /// Sign short-lived tokens with a service account key
    ServiceAccount(ServiceAccountKey),
    /// Use an already issued OAuth access token
    Bearer(String),
}

impl Auth {
    /// Pick credentials from the environment
    ///
    /// `GOOGLE_ACCESS_TOKEN` wins over `GOOGLE_CREDENTIALS` (path to a
    /// service account JSON key).
    pub fn from_env() -> Result<Self> {
        if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            return Ok(Self::Bearer(token));
        }
        let path = std::env::var("GOOGLE_CREDENTIALS").context(
            "Neither GOOGLE_ACCESS_TOKEN nor GOOGLE_CREDENTIALS environment variable is set",
        )?;
        Ok(Self::ServiceAccount(ServiceAccountKey::read(path)?))
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount(key) => write!(f, "ServiceAccount({})", key.client_email),
            Self::Bearer(_) => write!(f, "Bearer"),
        }
    }
}

/// The fields of a Google service account JSON key the client uses
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
    }

    /// Signed RS256 assertion for the JWT bearer grant, valid for an hour
    /// from `issued_at` (unix seconds)
    pub fn assertion(&self, issued_at: i64) -> Result<String> {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope: format!("{} {}", SHEETS_SCOPE, DRIVE_SCOPE),
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + 3600,
        };

        let key = jsonwebtoken::EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM")?;
        jsonwebtoken::encode(&header, &claims, &key).context("Failed to sign token request")
    }
}
