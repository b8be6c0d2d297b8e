use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324";

/// Where application rows are persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Csv {
        path: PathBuf,
    },
    Sheets {
        credentials_path: PathBuf,
        spreadsheet_id: String,
        worksheet: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub openrouter_api_key: String,
    pub llm_model: String,
    pub fetch_timeout: Duration,
    pub store: StoreBackend,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so it can be exercised
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let openrouter_api_key = lookup("OPENROUTER_API_KEY").ok_or_else(|| {
            AppError::ConfigError("OPENROUTER_API_KEY is not set".to_string())
        })?;

        let host = var("HOST", "127.0.0.1");
        let port = var("PORT", "3000");
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let fetch_timeout_ms = var("FETCH_TIMEOUT_MS", "30000")
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid FETCH_TIMEOUT_MS: {}", e)))?;

        let store = match var("STORE_BACKEND", "csv").to_ascii_lowercase().as_str() {
            "csv" => StoreBackend::Csv {
                path: PathBuf::from(var("CSV_PATH", "applications.csv")),
            },
            "sheets" => StoreBackend::Sheets {
                credentials_path: PathBuf::from(var("GOOGLE_CREDENTIALS", "creds.json")),
                spreadsheet_id: lookup("SPREADSHEET_ID").ok_or_else(|| {
                    AppError::ConfigError(
                        "SPREADSHEET_ID is required when STORE_BACKEND=sheets".to_string(),
                    )
                })?,
                worksheet: var("WORKSHEET", "Sheet1"),
            },
            other => {
                return Err(AppError::ConfigError(format!(
                    "Unknown STORE_BACKEND '{}', expected 'csv' or 'sheets'",
                    other
                )));
            }
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            openrouter_api_key,
            llm_model: var("LLM_MODEL", DEFAULT_MODEL),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            store,
        })
    }
}
