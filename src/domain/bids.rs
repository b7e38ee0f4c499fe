// src/domain/bids.rs
use serde::{Deserialize, Serialize};
use crate::money::Amount;
use super::core::{AuctionId, PlayerName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionBid {
    #[serde(rename = "auctionId")]
    pub auction_id: AuctionId,
    pub bidder: PlayerName,
    #[serde(rename = "bidAmount")]
    pub bid_amount: Amount,
    pub timestamp: i64,
}
