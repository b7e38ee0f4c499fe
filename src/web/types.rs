use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ListingDefaults;
use crate::domain::{Auction, AuctionBid, AuctionId, AuctionState, BidRules, Item, Payout};
use crate::manager::{AuctionManager, AuctionSort};
use crate::money::{Amount, AmountValue};
use crate::stats::SharedStats;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<AuctionManager>>,
    pub stats: SharedStats,
    pub defaults: ListingDefaults,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BidRequest {
    pub amount: AmountValue,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SortQuery {
    pub sort: Option<AuctionSort>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddAuctionRequest {
    pub item: Item,
    #[serde(rename = "startingBid")]
    pub starting_bid: Option<AmountValue>,
    /// Seconds from now until the auction ends.
    pub duration: Option<i64>,
}

impl AddAuctionRequest {
    pub fn starting_bid(&self, defaults: &ListingDefaults) -> AmountValue {
        self.starting_bid.unwrap_or(defaults.starting_bid)
    }

    pub fn end_date(&self, now: i64, defaults: &ListingDefaults) -> i64 {
        now.saturating_add(self.duration.unwrap_or(defaults.duration))
    }
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

#[derive(Debug, Serialize)]
pub struct AuctionItem {
    pub id: AuctionId,
    pub auctioneer: String,
    pub item: Item,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "topBid")]
    pub top_bid: Option<Amount>,
    #[serde(rename = "bidCount")]
    pub bid_count: usize,
    #[serde(rename = "minNextBid")]
    pub min_next_bid: Amount,
}

impl AuctionItem {
    pub fn new(auction: &Auction, rules: &BidRules) -> Self {
        AuctionItem {
            id: auction.id,
            auctioneer: auction.auctioneer.clone(),
            item: auction.item.clone(),
            starts_at: timestamp(auction.start_date),
            ends_at: timestamp(auction.end_date),
            top_bid: auction.top_bid().map(|bid| bid.bid_amount),
            bid_count: auction.bids.len(),
            min_next_bid: auction.min_next_bid(rules),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuctionDetail {
    #[serde(flatten)]
    pub summary: AuctionItem,
    pub state: AuctionState,
    pub claimed: bool,
    #[serde(rename = "startingBid")]
    pub starting_bid: Amount,
    /// Newest first.
    pub bids: Vec<AuctionBid>,
}

impl AuctionDetail {
    pub fn new(auction: &Auction, rules: &BidRules, now: i64) -> Self {
        AuctionDetail {
            summary: AuctionItem::new(auction, rules),
            state: auction.state(now),
            claimed: auction.claimed,
            starting_bid: auction.starting_bid,
            bids: auction.bids.iter().rev().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(rename = "auctionId")]
    pub auction_id: AuctionId,
    pub payout: Payout,
}
