pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod parser;
pub mod records;
pub mod scraper;
pub mod store;
pub mod validator;
pub mod view;

use std::sync::Arc;

use controller::FormController;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<FormController>,
}
