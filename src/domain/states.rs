// src/domain/states.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionState {
    /// Accepting bids until the end date.
    Open,
    /// Ended; the auctioneer has not collected the item or proceeds yet.
    ExpiredUnclaimed,
    /// Ended and collected by the auctioneer. Bidders may still be owed claims.
    ExpiredClaimed,
}

impl AuctionState {
    pub fn has_ended(&self) -> bool {
        !matches!(self, AuctionState::Open)
    }
}
