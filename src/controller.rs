//! One submission at a time: validate, fetch, extract, append, refresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::extractor;
use crate::llm::CompletionClient;
use crate::parser::{self, ExtractedFields};
use crate::records::{ApplicationRecord, SheetSnapshot};
use crate::scraper::PageFetcher;
use crate::store::{ApplicationStore, StoreConnector};
use crate::validator::is_valid_url;
use crate::view::{self, TableView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Validating,
    Fetching,
    Extracting,
    Appending,
    Refreshing,
}

#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub url: String,
    /// Typed by the user; wins over the extracted company when not blank.
    pub company: Option<String>,
}

/// Raw model output, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Extraction {
    Extracted { text: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub status_line: String,
    pub record: ApplicationRecord,
    pub fields: ExtractedFields,
    pub extraction: Extraction,
    pub table: TableView,
}

pub struct FormController {
    connector: Arc<dyn StoreConnector>,
    fetcher: Arc<dyn PageFetcher>,
    completion: Arc<dyn CompletionClient>,
    fetch_timeout: Duration,
    store: tokio::sync::Mutex<Option<Arc<dyn ApplicationStore>>>,
    phase: Arc<Mutex<Phase>>,
    in_flight: tokio::sync::Mutex<()>,
}

/// Puts the controller back to `Idle` however the submission ends.
struct PhaseGuard {
    phase: Arc<Mutex<Phase>>,
}

impl PhaseGuard {
    fn set(&self, next: Phase) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = next;
        }
        info!(phase = ?next, "submission phase");
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = Phase::Idle;
        }
    }
}

impl FormController {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        fetcher: Arc<dyn PageFetcher>,
        completion: Arc<dyn CompletionClient>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            fetcher,
            completion,
            fetch_timeout,
            store: tokio::sync::Mutex::new(None),
            phase: Arc::new(Mutex::new(Phase::Idle)),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.lock().map(|p| *p).unwrap_or(Phase::Idle)
    }

    /// Runs one submission end to end. A second call while one is running
    /// is rejected with [`AppError::Busy`].
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome> {
        let _running = self.in_flight.try_lock().map_err(|_| {
            warn!("submission rejected, another one is in progress");
            AppError::Busy
        })?;
        let phase = PhaseGuard {
            phase: Arc::clone(&self.phase),
        };

        phase.set(Phase::Validating);
        let url = submission.url.trim().to_string();
        if !is_valid_url(&url) {
            return Err(AppError::InvalidUrl(format!(
                "'{}' is not a valid URL, please include the scheme (https://...)",
                url
            )));
        }

        let extraction = match self.fetch_and_extract(&url, &phase).await {
            Ok(text) => Extraction::Extracted { text },
            Err(e) => {
                warn!(%url, error = %e, "continuing without extracted fields");
                Extraction::Failed {
                    error: e.to_string(),
                }
            }
        };

        let fields = match &extraction {
            Extraction::Extracted { text } => parser::parse_fields(text),
            Extraction::Failed { .. } => ExtractedFields::default(),
        };

        let company = submission
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fields.company.clone());
        let record = ApplicationRecord::applied(company, fields.title.clone(), url);

        phase.set(Phase::Appending);
        let store = self.store().await?;
        if let Err(e) = store.append_row(&record.to_row()).await {
            self.drop_store(&store, &e).await;
            return Err(e);
        }
        info!(company = %record.company, title = %record.title, "application appended");

        phase.set(Phase::Refreshing);
        let table = self.read_view(&store).await?;

        Ok(SubmissionOutcome {
            status_line: format!("Added {}", record.company),
            record,
            fields,
            extraction,
            table,
        })
    }

    /// Reads the store afresh and builds the table.
    pub async fn refresh(&self) -> Result<TableView> {
        let store = self.store().await?;
        self.read_view(&store).await
    }

    /// Loads the table once in the background so the first page view is warm.
    pub fn spawn_warmup(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match controller.refresh().await {
                Ok(TableView::Grid { rows, .. }) => {
                    info!(applications = rows.len(), "initial table loaded")
                }
                Ok(TableView::Placeholder { .. }) => info!("initial table is empty"),
                Err(e) => warn!(error = %e, "initial table load failed"),
            }
        })
    }

    async fn fetch_and_extract(&self, url: &str, phase: &PhaseGuard) -> Result<String> {
        phase.set(Phase::Fetching);
        let page_text = self.fetcher.render(url, self.fetch_timeout).await?;

        phase.set(Phase::Extracting);
        extractor::extract(&page_text, self.completion.as_ref()).await
    }

    async fn read_view(&self, store: &Arc<dyn ApplicationStore>) -> Result<TableView> {
        match store.read_all().await {
            Ok(raw) => Ok(view::build_view(&SheetSnapshot::from_raw(raw))),
            Err(e) => {
                self.drop_store(store, &e).await;
                Err(e)
            }
        }
    }

    async fn store(&self) -> Result<Arc<dyn ApplicationStore>> {
        let mut handle = self.store.lock().await;
        if let Some(store) = handle.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store = self.connector.connect().await.inspect_err(|e| {
            error!(error = %e, "could not connect to the application store");
        })?;
        *handle = Some(Arc::clone(&store));
        Ok(store)
    }

    // Forgets `failed` so the next call reconnects. A handle another call
    // has already replaced it with is left alone.
    async fn drop_store(&self, failed: &Arc<dyn ApplicationStore>, cause: &AppError) {
        error!(error = %cause, "store call failed, dropping connection");
        let mut handle = self.store.lock().await;
        if handle
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            handle.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::NOT_FOUND;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPage(std::result::Result<String, String>);

    #[async_trait]
    impl PageFetcher for FixedPage {
        async fn render(&self, _url: &str, _timeout: Duration) -> Result<String> {
            self.0.clone().map_err(AppError::FetchError)
        }
    }

    struct FixedReply(&'static str);

    #[async_trait]
    impl CompletionClient for FixedReply {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Fails the first `failures` connects, then hands out the memory store.
    struct FlakyConnector {
        store: MemoryStore,
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl StoreConnector for FlakyConnector {
        async fn connect(&self) -> Result<Arc<dyn ApplicationStore>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(AppError::StoreError("unreachable".to_string()));
            }
            Ok(Arc::new(self.store.clone()))
        }
    }

    fn controller(store: MemoryStore, page: std::result::Result<String, String>) -> FormController {
        FormController::new(
            Arc::new(store),
            Arc::new(FixedPage(page)),
            Arc::new(FixedReply("Company Name: Acme\nJob Title: Engineer")),
            Duration::from_secs(5),
        )
    }

    fn submission(url: &str) -> Submission {
        Submission {
            url: url.to_string(),
            company: None,
        }
    }

    #[tokio::test]
    async fn test_submit_appends_and_shows_newest_first() {
        let store = MemoryStore::with_header();
        let ctl = controller(store.clone(), Ok("Acme hiring".to_string()));

        ctl.submit(submission("https://acme.example/1")).await.unwrap();
        let outcome = ctl.submit(submission(" https://acme.example/2 ")).await.unwrap();

        assert_eq!(outcome.status_line, "Added Acme");
        assert_eq!(outcome.fields.title, "Engineer");
        assert_eq!(outcome.record.status, "Applied");

        let raw = store.read_all().await.unwrap();
        assert_eq!(raw.last().unwrap()[4], "https://acme.example/2");

        let TableView::Grid { rows, .. } = outcome.table else {
            panic!("expected a grid");
        };
        assert_eq!(rows[0][4].as_text(), "https://acme.example/2");
        assert!(rows[0][4].is_link());
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_calls() {
        let store = MemoryStore::with_header();
        let ctl = controller(store.clone(), Ok("page".to_string()));

        let result = ctl.submit(submission("example.com")).await;
        assert!(matches!(result, Err(AppError::InvalidUrl(_))));
        assert_eq!(store.read_all().await.unwrap().len(), 1);
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_fetch_failure_still_appends() {
        let store = MemoryStore::with_header();
        let ctl = controller(store.clone(), Err("connection refused".to_string()));

        let outcome = ctl
            .submit(Submission {
                url: "https://acme.example/1".to_string(),
                company: Some("Typed Co".to_string()),
            })
            .await
            .unwrap();

        assert!(matches!(
            &outcome.extraction,
            Extraction::Failed { error } if error.contains("connection refused")
        ));
        assert_eq!(outcome.fields, ExtractedFields::default());
        assert_eq!(outcome.record.company, "Typed Co");
        assert_eq!(outcome.record.title, NOT_FOUND);
        assert_eq!(store.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_submission_is_rejected() {
        let ctl = controller(MemoryStore::with_header(), Ok("page".to_string()));

        let _running = ctl.in_flight.lock().await;
        let result = ctl.submit(submission("https://acme.example/1")).await;
        assert!(matches!(result, Err(AppError::Busy)));
    }

    #[tokio::test]
    async fn test_store_reconnects_after_failure() {
        let store = MemoryStore::with_header();
        let ctl = FormController::new(
            Arc::new(FlakyConnector {
                store: store.clone(),
                failures: 1,
                attempts: AtomicUsize::new(0),
            }),
            Arc::new(FixedPage(Ok("page".to_string()))),
            Arc::new(FixedReply("")),
            Duration::from_secs(5),
        );

        assert!(matches!(ctl.refresh().await, Err(AppError::StoreError(_))));
        assert!(ctl.refresh().await.unwrap().is_placeholder());
    }

    #[tokio::test]
    async fn test_failed_handle_does_not_evict_newer_one() {
        let ctl = controller(MemoryStore::with_header(), Ok("page".to_string()));
        let failed = ctl.store().await.unwrap();

        let newer: Arc<dyn ApplicationStore> = Arc::new(MemoryStore::with_header());
        *ctl.store.lock().await = Some(Arc::clone(&newer));

        let cause = AppError::StoreError("timeout".to_string());
        ctl.drop_store(&failed, &cause).await;
        let kept = ctl.store.lock().await.clone().unwrap();
        assert!(Arc::ptr_eq(&kept, &newer));

        ctl.drop_store(&newer, &cause).await;
        assert!(ctl.store.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_warmup_connects_store() {
        let ctl = Arc::new(controller(MemoryStore::with_header(), Ok("page".to_string())));
        ctl.spawn_warmup().await.unwrap();
        assert!(ctl.store.lock().await.is_some());
    }
}
