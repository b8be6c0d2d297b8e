use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use super::ApplicationStore;
use crate::error::{AppError, Result};
use crate::records::HEADER;

/// Applications kept in a local CSV file, header on the first line.
pub struct CsvStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvStore {
    /// Opens `path`, writing the header first if the file is missing or empty.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let store = Self {
            path,
            lock: Arc::new(Mutex::new(())),
        };
        store
            .blocking(|path| {
                let empty = match std::fs::metadata(path) {
                    Ok(meta) => meta.len() == 0,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
                    Err(e) => return Err(e.into()),
                };
                if empty {
                    info!(path = %path.display(), "creating application sheet");
                    append_record(path, &HEADER.map(String::from))?;
                }
                Ok(())
            })
            .await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock
                .lock()
                .map_err(|e| AppError::StoreError(e.to_string()))?;
            op(&path)
        })
        .await
        .map_err(|e| AppError::StoreError(format!("CSV task failed: {}", e)))?
    }
}

#[async_trait]
impl ApplicationStore for CsvStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        self.blocking(|path| {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(File::open(path)?);

            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record?;
                rows.push(record.iter().map(|field| field.to_string()).collect());
            }
            Ok(rows)
        })
        .await
    }

    async fn append_row(&self, fields: &[String]) -> Result<()> {
        let fields = fields.to_vec();
        self.blocking(move |path| append_record(path, &fields)).await
    }
}

fn append_record(path: &Path, fields: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    terminate_last_line(&mut file)?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(file);
    writer.write_record(fields)?;
    writer.flush()?;
    Ok(())
}

// A file edited by hand may lack the final newline; the next record must not join it.
fn terminate_last_line(file: &mut File) -> Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}
