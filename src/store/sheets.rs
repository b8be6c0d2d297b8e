use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::ApplicationStore;
use crate::error::{AppError, Result};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
// The sheet is addressed by id, so no Drive lookup by title is needed.
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// Refresh a little before Google expires the token
const TOKEN_SLACK_SECS: i64 = 60;

/// The fields of a Google service account key file that signing needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// A worksheet of a Google spreadsheet, accessed with a service account.
pub struct SheetsStore {
    client: Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    worksheet: String,
    token: Mutex<Option<AccessToken>>,
}

impl SheetsStore {
    /// Loads the key file and fetches a first token so bad credentials fail here.
    pub async fn connect(credentials_path: &Path, spreadsheet_id: &str, worksheet: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(credentials_path).await.map_err(|e| {
            AppError::ConfigError(format!(
                "Cannot read service account file {}: {}",
                credentials_path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid service account file: {}", e)))?;

        let store = Self {
            client: Client::new(),
            key,
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            token: Mutex::new(None),
        };
        store.access_token().await?;
        info!(
            spreadsheet = %store.spreadsheet_id,
            worksheet = %store.worksheet,
            account = %store.key.client_email,
            "connected to spreadsheet"
        );
        Ok(store)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_SLACK_SECS) > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        debug!(account = %self.key.client_email, "requesting access token");
        let assertion = sign_assertion(&self.key, Utc::now())?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(store_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreError(format!(
                "Token request failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(store_error)?;
        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });
        Ok(value)
    }

    fn values_url(&self, suffix: &str) -> Result<Url> {
        values_url(&self.spreadsheet_id, &self.worksheet, suffix)
    }
}

#[async_trait]
impl ApplicationStore for SheetsStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let url = self.values_url("")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(store_error)?;
        if !response.status().is_success() {
            return Err(AppError::StoreError(format!(
                "Reading worksheet failed: {}",
                response.status()
            )));
        }

        let range: ValueRange = response.json().await.map_err(store_error)?;
        debug!(rows = range.values.len(), "worksheet read");
        Ok(pad_rows(range.values))
    }

    async fn append_row(&self, fields: &[String]) -> Result<()> {
        let token = self.access_token().await?;
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [fields] }))
            .send()
            .await
            .map_err(store_error)?;
        if !response.status().is_success() {
            return Err(AppError::StoreError(format!(
                "Appending row failed: {}",
                response.status()
            )));
        }

        info!(worksheet = %self.worksheet, "row appended to spreadsheet");
        Ok(())
    }
}

fn store_error(err: reqwest::Error) -> AppError {
    AppError::StoreError(err.to_string())
}

fn claims(key: &ServiceAccountKey, now: DateTime<Utc>) -> Claims {
    let iat = now.timestamp();
    Claims {
        iss: key.client_email.clone(),
        scope: SCOPES.to_string(),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    }
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let claims = claims(key, now);
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &encoding_key,
    )?)
}

fn values_url(spreadsheet_id: &str, worksheet: &str, suffix: &str) -> Result<Url> {
    let mut url = Url::parse(SHEETS_API)
        .map_err(|e| AppError::ConfigError(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| AppError::ConfigError("Sheets API URL cannot take a path".to_string()))?
        .pop_if_empty()
        .push(spreadsheet_id)
        .push("values")
        .push(&format!("{}{}", worksheet, suffix));
    Ok(url)
}

/// The API drops trailing empty cells; widen every row to the widest one.
fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}
