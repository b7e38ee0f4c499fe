// src/domain/auctions.rs
use serde::{Deserialize, Serialize};
use crate::money::Amount;
use super::bids::AuctionBid;
use super::core::{same_player, AuctionId, Errors, PlayerName};
use super::item::Item;
use super::states::AuctionState;

/// Rules a new bid has to satisfy on top of the auction's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRules {
    /// Every bid after the first must beat the top bid by at least this
    /// percentage, rounded up to the next whole coin.
    pub min_raise_percent: u32,
}

impl Default for BidRules {
    fn default() -> Self {
        BidRules { min_raise_percent: 15 }
    }
}

/// What a successful claim hands to the claimant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Payout {
    /// The winning bid, paid to the auctioneer.
    Proceeds { amount: Amount },
    /// The listed item, back to an auctioneer nobody bid against.
    ReturnedItem { item: Item },
    /// The listed item, to the winning bidder.
    WonItem { item: Item },
    /// Everything an outbid bidder had committed.
    Refund { amount: Amount },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub auctioneer: PlayerName,
    pub item: Item,
    #[serde(rename = "startDate")]
    pub start_date: i64,
    #[serde(rename = "endDate")]
    pub end_date: i64,
    pub claimed: bool,
    #[serde(rename = "startingBid")]
    pub starting_bid: Amount,
    /// Every accepted bid in the order it was placed.
    pub bids: Vec<AuctionBid>,
    /// Bids whose bidder has been refunded or has collected the item.
    #[serde(rename = "claimedBids")]
    pub claimed_bids: Vec<AuctionBid>,
}

impl Auction {
    pub fn new(
        id: AuctionId,
        auctioneer: PlayerName,
        item: Item,
        start_date: i64,
        end_date: i64,
        starting_bid: Amount,
    ) -> Self {
        Auction {
            id,
            auctioneer,
            item,
            start_date,
            end_date,
            claimed: false,
            starting_bid,
            bids: Vec::new(),
            claimed_bids: Vec::new(),
        }
    }

    pub fn top_bid(&self) -> Option<&AuctionBid> {
        self.bids.last()
    }

    pub fn has_expired(&self, now: i64) -> bool {
        now >= self.end_date
    }

    pub fn state(&self, now: i64) -> AuctionState {
        if !self.has_expired(now) {
            AuctionState::Open
        } else if self.claimed {
            AuctionState::ExpiredClaimed
        } else {
            AuctionState::ExpiredUnclaimed
        }
    }

    pub fn is_auctioneer(&self, identity: &str) -> bool {
        same_player(&self.auctioneer, identity)
    }

    fn is_bid_settled(&self, bid: &AuctionBid) -> bool {
        self.claimed_bids.contains(bid)
    }

    pub fn unclaimed_bids_held_by(&self, bidder: &str) -> Vec<&AuctionBid> {
        self.bids
            .iter()
            .filter(|bid| same_player(&bid.bidder, bidder) && !self.is_bid_settled(bid))
            .collect()
    }

    /// Amount the bidder currently has committed, if any of their bids is unsettled.
    pub fn top_bid_by(&self, bidder: &str) -> Option<Amount> {
        self.unclaimed_bids_held_by(bidder)
            .into_iter()
            .map(|bid| bid.bid_amount)
            .max()
    }

    /// Claimed by the auctioneer and every bidder paid out.
    pub fn is_settled(&self) -> bool {
        self.claimed && self.bids.iter().all(|bid| self.is_bid_settled(bid))
    }

    /// Whether `identity` could claim something right now.
    pub fn has_claim_for(&self, identity: &str, now: i64) -> bool {
        self.has_expired(now)
            && ((self.is_auctioneer(identity) && !self.claimed)
                || !self.unclaimed_bids_held_by(identity).is_empty())
    }

    pub fn min_next_bid(&self, rules: &BidRules) -> Amount {
        match self.top_bid() {
            Some(top) => top.bid_amount.raised_by_percent(rules.min_raise_percent),
            None => self.starting_bid,
        }
    }

    /// Time of the last bid, or the start date for an auction without bids.
    pub fn last_activity(&self) -> i64 {
        self.top_bid().map_or(self.start_date, |bid| bid.timestamp)
    }

    pub fn validate_bid(&self, bidder: &str, amount: Amount, now: i64, rules: &BidRules) -> Result<(), Errors> {
        if amount.is_zero() {
            return Err(Errors::InvalidAmount(amount.value()));
        }
        if self.has_expired(now) {
            return Err(Errors::InvalidState(self.id));
        }
        if self.is_auctioneer(bidder) {
            return Err(Errors::SellerCannotBid((bidder.to_string(), self.id)));
        }
        if let Some(top) = self.top_bid() {
            if same_player(&top.bidder, bidder) {
                return Err(Errors::AlreadyTopBidder(self.id));
            }
        }
        let minimum = self.min_next_bid(rules);
        if amount < minimum {
            return Err(Errors::BidTooLow { minimum });
        }
        Ok(())
    }

    /// Appends a bid after checking it against the current top bid, so the
    /// bid amounts can never decrease along `bids`.
    pub fn add_bid(&mut self, bid: AuctionBid, rules: &BidRules) -> Result<(), Errors> {
        if bid.auction_id != self.id {
            return Err(Errors::UnknownAuction(bid.auction_id));
        }
        self.validate_bid(&bid.bidder, bid.bid_amount, bid.timestamp, rules)?;
        self.bids.push(bid);
        Ok(())
    }

    pub fn claim(&mut self, seller: &str, now: i64) -> Result<Payout, Errors> {
        if !self.has_expired(now) {
            return Err(Errors::InvalidState(self.id));
        }
        if !self.is_auctioneer(seller) {
            return Err(Errors::NotAuctioneer(self.id));
        }
        if self.claimed {
            return Err(Errors::NothingToClaim(self.id));
        }

        self.claimed = true;
        Ok(match self.top_bid() {
            Some(top) => Payout::Proceeds { amount: top.bid_amount },
            None => Payout::ReturnedItem { item: self.item.clone() },
        })
    }

    pub fn bidder_claim(&mut self, bidder: &str, now: i64) -> Result<Payout, Errors> {
        if !self.has_expired(now) {
            return Err(Errors::InvalidState(self.id));
        }
        let unclaimed: Vec<AuctionBid> = self
            .unclaimed_bids_held_by(bidder)
            .into_iter()
            .cloned()
            .collect();
        let committed = match unclaimed.iter().map(|bid| bid.bid_amount).max() {
            Some(amount) => amount,
            None => return Err(Errors::NothingToClaim(self.id)),
        };

        let won = self
            .top_bid()
            .map_or(false, |top| same_player(&top.bidder, bidder));
        let payout = if won {
            Payout::WonItem { item: self.item.clone() }
        } else {
            Payout::Refund { amount: committed }
        };

        self.claimed_bids.extend(unclaimed);
        Ok(payout)
    }
}
