//! Mapping between auctions and the rows kept by a [`RecordStore`].

pub mod json_file;
pub mod memory;
pub mod queue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Auction, AuctionBid, AuctionId, Item};
use crate::domain::item::ItemError;
use crate::money::Amount;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A stored row that could not be turned back into an auction.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("row {id}: bad item: {source}")]
    Item { id: AuctionId, source: ItemError },

    #[error("row {id}: bad {column}: {source}")]
    Bids {
        id: AuctionId,
        column: &'static str,
        source: serde_json::Error,
    },

    #[error("row {id}: bad amount in {column}: {value}")]
    Amount {
        id: AuctionId,
        column: &'static str,
        value: i64,
    },

    #[error("row {id}: {reason}")]
    Inconsistent { id: AuctionId, reason: &'static str },
}

/// One auction as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRow {
    pub id: AuctionId,
    pub auctioneer: String,
    pub item: String,
    pub startdate: i64,
    pub enddate: i64,
    pub claimed: i64,
    pub claimed_bids: String,
    pub starting_bid: i64,
    pub bids: String,
}

/// The columns rewritten after every change to an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionUpdate {
    pub id: AuctionId,
    pub claimed: i64,
    pub claimed_bids: String,
    pub bids: String,
}

/// Asynchronous row store. `add` ignores `row.id` and returns the generated one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates whatever backing structure is missing. Safe to call repeatedly.
    async fn init(&self) -> Result<(), StoreError>;
    async fn load(&self) -> Result<Vec<AuctionRow>, StoreError>;
    async fn add(&self, row: &AuctionRow) -> Result<AuctionId, StoreError>;
    /// Returns the number of rows changed; zero when the row is gone.
    async fn update(&self, update: &AuctionUpdate) -> Result<u64, StoreError>;
    async fn remove(&self, id: AuctionId) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredBid {
    bidder: String,
    bidamount: i64,
    timestamp: i64,
}

fn encode_bids(bids: &[AuctionBid]) -> String {
    let stored: Vec<StoredBid> = bids
        .iter()
        .map(|bid| StoredBid {
            bidder: bid.bidder.clone(),
            bidamount: bid.bid_amount.value(),
            timestamp: bid.timestamp,
        })
        .collect();
    // Only strings and integers; serde_json cannot fail on these.
    serde_json::to_string(&stored).unwrap_or_else(|_| "[]".to_string())
}

fn decode_bids(id: AuctionId, column: &'static str, text: &str) -> Result<Vec<AuctionBid>, DecodeError> {
    let stored: Vec<StoredBid> = serde_json::from_str(text)
        .map_err(|source| DecodeError::Bids { id, column, source })?;
    stored
        .into_iter()
        .map(|bid| {
            let bid_amount = Amount::new(bid.bidamount).map_err(|_| DecodeError::Amount {
                id,
                column,
                value: bid.bidamount,
            })?;
            Ok(AuctionBid {
                auction_id: id,
                bidder: bid.bidder,
                bid_amount,
                timestamp: bid.timestamp,
            })
        })
        .collect()
}

impl From<&Auction> for AuctionRow {
    fn from(auction: &Auction) -> Self {
        AuctionRow {
            id: auction.id,
            auctioneer: auction.auctioneer.clone(),
            item: auction.item.encode(),
            startdate: auction.start_date,
            enddate: auction.end_date,
            claimed: i64::from(auction.claimed),
            claimed_bids: encode_bids(&auction.claimed_bids),
            starting_bid: auction.starting_bid.value(),
            bids: encode_bids(&auction.bids),
        }
    }
}

impl From<&Auction> for AuctionUpdate {
    fn from(auction: &Auction) -> Self {
        AuctionUpdate {
            id: auction.id,
            claimed: i64::from(auction.claimed),
            claimed_bids: encode_bids(&auction.claimed_bids),
            bids: encode_bids(&auction.bids),
        }
    }
}

impl TryFrom<AuctionRow> for Auction {
    type Error = DecodeError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let item = Item::decode(&row.item).map_err(|source| DecodeError::Item { id, source })?;
        let starting_bid = Amount::new(row.starting_bid).map_err(|_| DecodeError::Amount {
            id,
            column: "starting_bid",
            value: row.starting_bid,
        })?;

        let auction = Auction {
            id,
            auctioneer: row.auctioneer,
            item,
            start_date: row.startdate,
            end_date: row.enddate,
            claimed: row.claimed != 0,
            starting_bid,
            bids: decode_bids(id, "bids", &row.bids)?,
            claimed_bids: decode_bids(id, "claimed_bids", &row.claimed_bids)?,
        };
        check_consistency(&auction).map_err(|reason| DecodeError::Inconsistent { id, reason })?;
        Ok(auction)
    }
}

fn check_consistency(auction: &Auction) -> Result<(), &'static str> {
    if auction.end_date <= auction.start_date {
        return Err("end date is not after start date");
    }
    if auction.bids.windows(2).any(|pair| pair[1].bid_amount < pair[0].bid_amount) {
        return Err("bid amounts decrease");
    }
    if auction.claimed_bids.iter().any(|bid| !auction.bids.contains(bid)) {
        return Err("claimed bid missing from bids");
    }
    Ok(())
}

impl AuctionRow {
    pub fn apply(&mut self, update: &AuctionUpdate) {
        self.claimed = update.claimed;
        self.claimed_bids = update.claimed_bids.clone();
        self.bids = update.bids.clone();
    }
}
