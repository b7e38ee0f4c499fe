//! Per-player auction statistics, built purely from engine events.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::domain::{AuctionEvent, Payout};
use crate::money::AmountValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub auctions_created: u64,
    pub auctions_sold: u64,
    pub auctions_unsold: u64,
    pub auctions_won: u64,
    pub bids_placed: u64,
    pub highest_bid: AmountValue,
    pub money_earned: AmountValue,
    pub money_spent: AmountValue,
    pub money_refunded: AmountValue,
}

#[derive(Debug, Default)]
pub struct AuctionStats {
    players: HashMap<String, PlayerStats>,
}

pub type SharedStats = Arc<RwLock<AuctionStats>>;

impl AuctionStats {
    pub fn get(&self, player: &str) -> PlayerStats {
        self.players.get(&player.to_lowercase()).copied().unwrap_or_default()
    }

    fn entry(&mut self, player: &str) -> &mut PlayerStats {
        self.players.entry(player.to_lowercase()).or_default()
    }

    pub fn record(&mut self, event: &AuctionEvent) {
        match event {
            AuctionEvent::Loaded { auction } => {
                self.entry(&auction.auctioneer).auctions_created += 1;
            }
            AuctionEvent::BidPlaced { bid, charged } => {
                let stats = self.entry(&bid.bidder);
                stats.bids_placed += 1;
                stats.highest_bid = stats.highest_bid.max(bid.bid_amount.value());
                stats.money_spent = stats.money_spent.saturating_add(charged.value());
            }
            AuctionEvent::Claimed { auctioneer, payout, .. } => {
                let stats = self.entry(auctioneer);
                match payout {
                    Payout::Proceeds { amount } => {
                        stats.auctions_sold += 1;
                        stats.money_earned = stats.money_earned.saturating_add(amount.value());
                    }
                    _ => stats.auctions_unsold += 1,
                }
            }
            AuctionEvent::BidderClaimed { bidder, payout, .. } => {
                let stats = self.entry(bidder);
                match payout {
                    Payout::WonItem { .. } => stats.auctions_won += 1,
                    Payout::Refund { amount } => {
                        stats.money_refunded = stats.money_refunded.saturating_add(amount.value());
                    }
                    _ => {}
                }
            }
            AuctionEvent::Expired { .. } | AuctionEvent::PersistenceFailed { .. } => {}
        }
    }
}

/// Feeds every event from `events` into `stats` until the channel closes.
pub fn spawn_collector(mut events: broadcast::Receiver<AuctionEvent>, stats: SharedStats) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => stats.write().await.record(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Statistics missed {} auction events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
