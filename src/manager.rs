//! The auction engine: the one owner of every auction in memory.
//!
//! All reads are served from memory. Creating an auction waits for the
//! store to hand out an id; every other change is applied to memory first
//! and then queued for the store (see [`WriteQueue`]).

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::domain::{
    Auction, AuctionBid, AuctionEvent, AuctionId, BidRules, Errors, Item, Payout, same_player,
};
use crate::economy::{Economy, EconomyError};
use crate::money::{Amount, AmountValue};
use crate::persistence::queue::WriteQueue;
use crate::persistence::{AuctionRow, AuctionUpdate, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(#[from] Errors),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Economy failure: {0}")]
    Economy(#[from] EconomyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub bid_rules: BidRules,
    /// Events buffered per subscriber before slow subscribers start lagging.
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            bid_rules: BidRules::default(),
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuctionSort {
    #[default]
    RecentlyUpdated,
    HighestBid,
    MostBids,
    EndingSoon,
}

impl fmt::Display for AuctionSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionSort::RecentlyUpdated => write!(f, "recently-updated"),
            AuctionSort::HighestBid => write!(f, "highest-bid"),
            AuctionSort::MostBids => write!(f, "most-bids"),
            AuctionSort::EndingSoon => write!(f, "ending-soon"),
        }
    }
}

impl FromStr for AuctionSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recently-updated" => Ok(AuctionSort::RecentlyUpdated),
            "highest-bid" => Ok(AuctionSort::HighestBid),
            "most-bids" => Ok(AuctionSort::MostBids),
            "ending-soon" => Ok(AuctionSort::EndingSoon),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

/// Orders auctions for display. Ties fall back to the auction id.
pub fn sort_auctions(mut auctions: Vec<&Auction>, order: AuctionSort) -> Vec<&Auction> {
    auctions.sort_by(|a, b| {
        let primary = match order {
            AuctionSort::RecentlyUpdated => b.last_activity().cmp(&a.last_activity()),
            AuctionSort::HighestBid => {
                let price = |auction: &Auction| auction.top_bid().map_or(auction.starting_bid, |bid| bid.bid_amount);
                price(*b).cmp(&price(*a))
            }
            AuctionSort::MostBids => b.bids.len().cmp(&a.bids.len()),
            AuctionSort::EndingSoon => a.end_date.cmp(&b.end_date),
        };
        primary.then(a.id.cmp(&b.id))
    });
    auctions
}

pub struct AuctionManager {
    auctions: HashMap<AuctionId, Auction>,
    auctions_loaded: bool,
    store: Arc<dyn RecordStore>,
    economy: Arc<dyn Economy>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    events: broadcast::Sender<AuctionEvent>,
    writes: WriteQueue,
}

impl AuctionManager {
    /// Must be called from within a Tokio runtime; the store writer is spawned here.
    pub fn new(
        store: Arc<dyn RecordStore>,
        economy: Arc<dyn Economy>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let writes = WriteQueue::spawn(store.clone(), events.clone());
        AuctionManager {
            auctions: HashMap::new(),
            auctions_loaded: false,
            store,
            economy,
            clock,
            settings,
            events,
            writes,
        }
    }

    /// Prepares the store and loads every auction in it. Rows that cannot be
    /// decoded are logged and skipped.
    pub async fn init(&mut self) -> Result<LoadReport, EngineError> {
        self.store.init().await?;
        let rows = self.store.load().await?;

        let mut report = LoadReport::default();
        for row in rows {
            match Auction::try_from(row) {
                Ok(auction) => {
                    self.auctions.insert(auction.id, auction);
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping stored auction: {}", e);
                    report.skipped += 1;
                }
            }
        }

        self.auctions_loaded = true;
        info!("Loaded {} auctions ({} skipped)", report.loaded, report.skipped);
        Ok(report)
    }

    pub fn auctions_loaded(&self) -> bool {
        self.auctions_loaded
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.events.subscribe()
    }

    /// Resolves once every store write queued so far has been attempted.
    pub async fn flush(&self) {
        self.writes.flush().await
    }

    pub fn get_auction(&self, id: AuctionId) -> Option<&Auction> {
        self.auctions.get(&id)
    }

    pub fn get_auctions(&self) -> Vec<&Auction> {
        self.auctions.values().collect()
    }

    pub fn get_auctions_held_by(&self, identity: &str) -> Vec<&Auction> {
        self.auctions
            .values()
            .filter(|auction| auction.is_auctioneer(identity))
            .collect()
    }

    pub fn get_active_auctions_held_by(&self, identity: &str) -> Vec<&Auction> {
        let now = self.clock.now();
        self.auctions
            .values()
            .filter(|auction| auction.is_auctioneer(identity) && !auction.has_expired(now))
            .collect()
    }

    pub fn get_active_auctions(&self) -> Vec<&Auction> {
        let now = self.clock.now();
        self.auctions
            .values()
            .filter(|auction| !auction.has_expired(now))
            .collect()
    }

    pub fn get_bids(&self) -> Vec<&AuctionBid> {
        self.auctions.values().flat_map(|auction| auction.bids.iter()).collect()
    }

    pub fn get_bids_by(&self, identity: &str) -> Vec<&AuctionBid> {
        self.auctions
            .values()
            .flat_map(|auction| auction.bids.iter())
            .filter(|bid| same_player(&bid.bidder, identity))
            .collect()
    }

    /// Ended auctions where `identity` still has proceeds, an item or a refund to collect.
    pub fn get_claimable_auctions_for(&self, identity: &str) -> Vec<&Auction> {
        let now = self.clock.now();
        self.auctions
            .values()
            .filter(|auction| auction.has_claim_for(identity, now))
            .collect()
    }

    /// Lists a new auction, taking the item from the auctioneer. Nothing is
    /// kept in memory unless the store accepts the row; otherwise the item
    /// goes back to the auctioneer.
    pub async fn add_auction(
        &mut self,
        auctioneer: &str,
        item: Item,
        start_date: i64,
        end_date: i64,
        starting_bid: Amount,
    ) -> Result<AuctionId, EngineError> {
        if end_date <= start_date {
            return Err(Errors::InvalidDuration { start: start_date, end: end_date }.into());
        }
        if starting_bid.is_zero() {
            return Err(Errors::InvalidAmount(starting_bid.value()).into());
        }

        self.economy.take_item(auctioneer, &item)?;
        let mut auction = Auction::new(0, auctioneer.to_string(), item, start_date, end_date, starting_bid);
        let id = match self.store.add(&AuctionRow::from(&auction)).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not store auction by {}, returning {}: {}", auctioneer, auction.item, e);
                self.economy.give_item(auctioneer, auction.item);
                return Err(e.into());
            }
        };
        auction.id = id;

        info!("{} listed {} as auction {} (starting bid {})", auctioneer, auction.item, id, starting_bid);
        self.auctions.insert(id, auction.clone());
        self.emit(AuctionEvent::Loaded { auction });
        Ok(id)
    }

    /// Places a bid. The bidder pays only the difference from any bid they
    /// already have committed on this auction.
    pub fn add_bid(&mut self, id: AuctionId, bidder: &str, amount: AmountValue) -> Result<AuctionBid, EngineError> {
        let mut auction = self.auctions.get(&id).cloned().ok_or(Errors::UnknownAuction(id))?;
        let amount = Amount::new(amount).map_err(|_| Errors::InvalidAmount(amount))?;
        let now = self.clock.now();
        let rules = self.settings.bid_rules;

        auction.validate_bid(bidder, amount, now, &rules)?;
        let available = self.economy.balance(bidder);
        if available < amount {
            return Err(Errors::InsufficientFunds { needed: amount, available }.into());
        }
        let charged = amount.saturating_sub(auction.top_bid_by(bidder).unwrap_or(Amount::ZERO));

        let bid = AuctionBid {
            auction_id: id,
            bidder: bidder.to_string(),
            bid_amount: amount,
            timestamp: now,
        };
        auction.add_bid(bid.clone(), &rules)?;
        self.economy
            .withdraw(bidder, charged)
            .map_err(|_| Errors::InsufficientFunds { needed: charged, available })?;

        debug!("{} bid {} on auction {} (charged {})", bidder, amount, id, charged);
        self.auctions.insert(id, auction);
        self.update_auction(id)?;
        self.emit(AuctionEvent::BidPlaced { bid: bid.clone(), charged });
        Ok(bid)
    }

    /// Collects the top bid, or the item when nobody bid, for the auctioneer.
    pub fn claim(&mut self, id: AuctionId, seller: &str) -> Result<Payout, EngineError> {
        let now = self.clock.now();
        let mut auction = self.auctions.get(&id).cloned().ok_or(Errors::UnknownAuction(id))?;

        let payout = auction.claim(seller, now)?;
        let auctioneer = auction.auctioneer.clone();
        self.pay_out(&auctioneer, &payout)?;

        info!("{} claimed auction {}: {:?}", auctioneer, id, payout);
        self.auctions.insert(id, auction);
        self.update_auction(id)?;
        self.emit(AuctionEvent::Claimed {
            auction_id: id,
            auctioneer,
            payout: payout.clone(),
        });
        Ok(payout)
    }

    /// Settles a bidder: the winner gets the item, everyone else a refund.
    pub fn bidder_claim(&mut self, id: AuctionId, bidder: &str) -> Result<Payout, EngineError> {
        let now = self.clock.now();
        let mut auction = self.auctions.get(&id).cloned().ok_or(Errors::UnknownAuction(id))?;

        let payout = auction.bidder_claim(bidder, now)?;
        self.pay_out(bidder, &payout)?;

        info!("{} claimed from auction {}: {:?}", bidder, id, payout);
        self.auctions.insert(id, auction);
        self.update_auction(id)?;
        self.emit(AuctionEvent::BidderClaimed {
            auction_id: id,
            bidder: bidder.to_string(),
            payout: payout.clone(),
        });
        Ok(payout)
    }

    /// Claims every ended auction the seller has not collected yet.
    pub fn claim_all(&mut self, seller: &str) -> Vec<(AuctionId, Payout)> {
        let now = self.clock.now();
        let mut ids: Vec<AuctionId> = self
            .auctions
            .values()
            .filter(|auction| auction.is_auctioneer(seller) && auction.has_expired(now) && !auction.claimed)
            .map(|auction| auction.id)
            .collect();
        ids.sort_unstable();

        ids.into_iter()
            .filter_map(|id| match self.claim(id, seller) {
                Ok(payout) => Some((id, payout)),
                Err(e) => {
                    warn!("Could not claim auction {} for {}: {}", id, seller, e);
                    None
                }
            })
            .collect()
    }

    /// Queues a rewrite of the auction's claim state and bid lists.
    pub fn update_auction(&self, id: AuctionId) -> Result<(), Errors> {
        let auction = self.auctions.get(&id).ok_or(Errors::UnknownAuction(id))?;
        self.writes.update(AuctionUpdate::from(auction));
        Ok(())
    }

    /// Drops a fully settled auction from memory and from the store.
    pub fn remove_auction(&mut self, id: AuctionId) -> Result<Auction, Errors> {
        let auction = self.auctions.get(&id).ok_or(Errors::UnknownAuction(id))?;
        if !auction.is_settled() {
            return Err(Errors::Unsettled(id));
        }
        let auction = self.auctions.remove(&id).ok_or(Errors::UnknownAuction(id))?;

        info!("Removed settled auction {}", id);
        self.emit(AuctionEvent::Expired { auction: auction.clone() });
        self.writes.remove(id);
        Ok(auction)
    }

    /// Removes every settled auction. Returns the removed ids.
    pub fn sweep(&mut self) -> Vec<AuctionId> {
        let mut settled: Vec<AuctionId> = self
            .auctions
            .values()
            .filter(|auction| auction.is_settled())
            .map(|auction| auction.id)
            .collect();
        settled.sort_unstable();
        settled.retain(|id| self.remove_auction(*id).is_ok());
        if !settled.is_empty() {
            debug!("Sweep removed {} auctions", settled.len());
        }
        settled
    }

    fn pay_out(&self, player: &str, payout: &Payout) -> Result<(), EconomyError> {
        match payout {
            Payout::Proceeds { amount } | Payout::Refund { amount } => {
                self.economy.deposit(player, *amount).map_err(|e| {
                    error!("Could not pay {} to {}: {}", amount, player, e);
                    e
                })
            }
            Payout::ReturnedItem { item } | Payout::WonItem { item } => {
                self.economy.give_item(player, item.clone());
                Ok(())
            }
        }
    }

    fn emit(&self, event: AuctionEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

/// Runs [`AuctionManager::sweep`] every `period` until the task is aborted.
pub fn spawn_sweeper(engine: Arc<Mutex<AuctionManager>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            engine.lock().await.sweep();
        }
    })
}
