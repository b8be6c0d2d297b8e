use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use scraper::{Html, Node, Selector};
use tracing::{info, warn};

use crate::error::{AppError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Elements whose text never shows up on a rendered page
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

// Create a static client to reuse connections
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "HTTP client setup failed, falling back to defaults");
            Client::new()
        })
});

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("Failed to parse body selector"));

/// Turns a job posting URL into the visible text of the page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// Plain HTTP fetcher: GET the page, then flatten the `<body>` into text.
#[derive(Clone, Default)]
pub struct HttpFetcher;

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        info!(%url, timeout_ms = timeout.as_millis() as u64, "fetching listing page");
        let fetch_start = std::time::Instant::now();

        let html = match tokio::time::timeout(timeout, fetch_html(url)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%url, "page load timed out");
                return Err(AppError::FetchError(format!(
                    "Page load timed out after {} ms",
                    timeout.as_millis()
                )));
            }
        };

        let text = page_text(&html)
            .ok_or_else(|| AppError::ParseError("No <body> tag found in the HTML".to_string()))?;
        info!(
            %url,
            chars = text.chars().count(),
            elapsed_ms = fetch_start.elapsed().as_millis() as u64,
            "listing page rendered to text"
        );
        Ok(text)
    }
}

pub async fn fetch_html(url: &str) -> Result<String> {
    let response = CLIENT.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AppError::FetchError(format!(
            "HTTP error: {}",
            response.status()
        )));
    }
    let html = response.text().await?;
    Ok(html)
}

/// Visible text of the document body, one text run per line.
pub fn page_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let body = document.select(&BODY_SELECTOR).next()?;

    let mut raw = String::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        raw.push_str(text);
        raw.push('\n');
    }

    Some(collapse_lines(&raw))
}

/// Trims every line and drops the blank ones.
pub fn collapse_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !trimmed.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&trimmed);
        }
    }

    result
}
