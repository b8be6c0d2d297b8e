use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ApplicationStore, StoreConnector};
use crate::error::{AppError, Result};
use crate::records::HEADER;

/// Rows kept in process memory. Clones share the same rows.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header() -> Self {
        Self::with_rows(vec![HEADER.iter().map(|h| h.to_string()).collect()])
    }

    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        Ok(rows.clone())
    }

    async fn append_row(&self, fields: &[String]) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        rows.push(fields.to_vec());
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Arc<dyn ApplicationStore>> {
        Ok(Arc::new(self.clone()))
    }
}
