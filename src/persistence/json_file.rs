use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{from_slice, to_vec_pretty};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{AuctionRow, AuctionUpdate, RecordStore, StoreError};
use crate::domain::AuctionId;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    next_id: AuctionId,
    rows: Vec<AuctionRow>,
}

/// Keeps every row in one JSON document. Each change rewrites the file
/// through a temporary sibling so a crash never leaves it half written.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Document, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, document: &Document) -> Result<(), StoreError> {
        let json = to_vec_pretty(document)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} auction rows to {}", document.rows.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn init(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        if fs::metadata(&self.path).await.is_err() {
            self.write_document(&Document::default()).await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<AuctionRow>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.rows)
    }

    async fn add(&self, row: &AuctionRow) -> Result<AuctionId, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.next_id += 1;
        let id = document.next_id;
        document.rows.push(AuctionRow { id, ..row.clone() });
        self.write_document(&document).await?;
        Ok(id)
    }

    async fn update(&self, update: &AuctionUpdate) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        match document.rows.iter_mut().find(|row| row.id == update.id) {
            Some(row) => row.apply(update),
            None => return Ok(0),
        }
        self.write_document(&document).await?;
        Ok(1)
    }

    async fn remove(&self, id: AuctionId) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let before = document.rows.len();
        document.rows.retain(|row| row.id != id);
        if document.rows.len() == before {
            return Ok(0);
        }
        self.write_document(&document).await?;
        Ok(1)
    }
}
