// src/domain/core.rs
use thiserror::Error;
use crate::money::Amount;

pub type AuctionId = i64;
pub type PlayerName = String;

/// Player names are compared without regard to case.
pub fn same_player(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Errors {
    #[error("Unknown auction: {0}")]
    UnknownAuction(AuctionId),

    #[error("Bid amount must be positive: {0}")]
    InvalidAmount(i64),

    #[error("Auction {0} is not in a state that allows this")]
    InvalidState(AuctionId),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("Bid too low, minimum is {minimum}")]
    BidTooLow { minimum: Amount },

    #[error("Already the top bidder on auction {0}")]
    AlreadyTopBidder(AuctionId),

    #[error("Seller cannot place bids: {0:?}")]
    SellerCannotBid((PlayerName, AuctionId)),

    #[error("Not the auctioneer of auction {0}")]
    NotAuctioneer(AuctionId),

    #[error("Nothing to claim on auction {0}")]
    NothingToClaim(AuctionId),

    #[error("Auction must end after it starts ({start} >= {end})")]
    InvalidDuration { start: i64, end: i64 },

    #[error("Auction {0} still has unsettled claims")]
    Unsettled(AuctionId),
}
