//! Append-only row storage behind the tracker.

pub mod csv_file;
pub mod memory;
pub mod sheets;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreBackend;
use crate::error::Result;

pub use csv_file::CsvStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

/// Row 0 is the header; every later row is one application.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn read_all(&self) -> Result<Vec<Vec<String>>>;

    async fn append_row(&self, fields: &[String]) -> Result<()>;
}

/// Opens a store handle. Called lazily and again after a store failure.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ApplicationStore>>;
}

#[async_trait]
impl StoreConnector for StoreBackend {
    async fn connect(&self) -> Result<Arc<dyn ApplicationStore>> {
        match self {
            StoreBackend::Csv { path } => Ok(Arc::new(CsvStore::open(path.clone()).await?)),
            StoreBackend::Sheets {
                credentials_path,
                spreadsheet_id,
                worksheet,
            } => {
                let store =
                    SheetsStore::connect(credentials_path, spreadsheet_id, worksheet).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
