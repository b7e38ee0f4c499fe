//! Write-behind queue between the auction manager and its store.
//!
//! Updates and removals are applied to memory first and then queued here.
//! A single task drains the queue in order, so the store never sees an older
//! snapshot of an auction after a newer one.

use log::{debug, error};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::{AuctionUpdate, RecordStore, StoreError};
use crate::domain::{AuctionEvent, AuctionId, StoreOperation};

#[derive(Debug)]
enum Write {
    Update(AuctionUpdate),
    Remove(AuctionId),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Write>,
}

impl WriteQueue {
    /// Starts the draining task. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn RecordStore>, events: broadcast::Sender<AuctionEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(store, events, rx));
        WriteQueue { tx }
    }

    pub fn update(&self, update: AuctionUpdate) {
        self.send(Write::Update(update));
    }

    pub fn remove(&self, id: AuctionId) {
        self.send(Write::Remove(id));
    }

    /// Waits until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        if self.tx.send(Write::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }

    fn send(&self, write: Write) {
        if let Err(e) = self.tx.send(write) {
            error!("Write queue is closed, dropped {:?}", e.0);
        }
    }
}

async fn drain(
    store: Arc<dyn RecordStore>,
    events: broadcast::Sender<AuctionEvent>,
    mut rx: mpsc::UnboundedReceiver<Write>,
) {
    while let Some(write) = rx.recv().await {
        match write {
            Write::Update(update) => {
                let id = update.id;
                match store.update(&update).await {
                    Ok(0) => debug!("Auction {} is no longer stored, skipped update", id),
                    Ok(_) => debug!("Persisted auction {}", id),
                    Err(e) => report(&events, id, StoreOperation::Update, e),
                }
            }
            Write::Remove(id) => match store.remove(id).await {
                Ok(0) => debug!("Auction {} was already gone from the store", id),
                Ok(_) => debug!("Deleted auction {} from the store", id),
                Err(e) => report(&events, id, StoreOperation::Remove, e),
            },
            Write::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Write queue closed");
}

fn report(events: &broadcast::Sender<AuctionEvent>, auction_id: AuctionId, operation: StoreOperation, e: StoreError) {
    error!("Failed to persist {:?} of auction {}: {}", operation, auction_id, e);
    // No subscribers is fine; the failure is already logged.
    let _ = events.send(AuctionEvent::PersistenceFailed {
        auction_id,
        operation,
        reason: e.to_string(),
    });
}
