use serde::{Deserialize, Serialize};
use crate::money::Amount;
use super::auctions::{Auction, Payout};
use super::bids::AuctionBid;
use super::core::{AuctionId, PlayerName};

/// Which store write a [`AuctionEvent::PersistenceFailed`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOperation {
    Update,
    Remove,
}

/// Lifecycle notifications published by the auction manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum AuctionEvent {
    #[serde(rename = "AuctionLoad")]
    Loaded { auction: Auction },

    #[serde(rename = "AuctionBid")]
    BidPlaced {
        bid: AuctionBid,
        /// What the bidder was actually charged for this bid.
        charged: Amount,
    },

    #[serde(rename = "AuctionClaim")]
    Claimed {
        #[serde(rename = "auctionId")]
        auction_id: AuctionId,
        auctioneer: PlayerName,
        payout: Payout,
    },

    #[serde(rename = "AuctionBidderClaim")]
    BidderClaimed {
        #[serde(rename = "auctionId")]
        auction_id: AuctionId,
        bidder: PlayerName,
        payout: Payout,
    },

    #[serde(rename = "AuctionExpire")]
    Expired { auction: Auction },

    #[serde(rename = "PersistenceFailed")]
    PersistenceFailed {
        #[serde(rename = "auctionId")]
        auction_id: AuctionId,
        operation: StoreOperation,
        reason: String,
    },
}
