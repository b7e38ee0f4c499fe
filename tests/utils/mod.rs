#![allow(dead_code)]
use auction_house::clock::ManualClock;
use auction_house::domain::{Auction, AuctionBid, Item, Tag};
use auction_house::economy::MemoryEconomy;
use auction_house::manager::{AuctionManager, EngineSettings};
use auction_house::money::Amount;
use auction_house::persistence::memory::MemoryStore;
use std::sync::Arc;
// See https://users.rust-lang.org/t/sharing-code-and-macros-in-tests-directory/3098/7

// Sample data for tests
pub fn sample_auction_id() -> i64 {
    1
}

pub fn sample_starts_at() -> i64 {
    1_451_636_880 // 2016-01-01 8:28 UTC
}

pub fn sample_ends_at() -> i64 {
    sample_starts_at() + 2 * 60 * 60
}

pub fn sample_bid_time() -> i64 {
    sample_starts_at() + 60 * 60
}

pub fn sample_seller() -> String {
    "Sample_Seller".to_string()
}

pub fn buyer_1() -> String {
    "Buyer_1".to_string()
}

pub fn buyer_2() -> String {
    "Buyer_2".to_string()
}

pub fn buyer_3() -> String {
    "Buyer_3".to_string()
}

pub fn coins(value: i64) -> Amount {
    Amount::new(value).unwrap()
}

pub fn sample_item() -> Item {
    Item::new("minecraft:diamond_sword", 1).unwrap().with_tag(Tag::compound([
        ("Damage", Tag::Int(3)),
        (
            "display",
            Tag::compound([
                ("Name", Tag::String("Excalibur".to_string())),
                ("Lore", Tag::List(vec![Tag::String("Sharp".to_string())])),
            ]),
        ),
        (
            "ench",
            Tag::List(vec![Tag::compound([("id", Tag::Short(16)), ("lvl", Tag::Short(5))])]),
        ),
    ]))
}

pub fn sample_auction() -> Auction {
    Auction::new(
        sample_auction_id(),
        sample_seller(),
        sample_item(),
        sample_starts_at(),
        sample_ends_at(),
        coins(50),
    )
}

pub fn bid(bidder: &str, amount: i64, at: i64) -> AuctionBid {
    AuctionBid {
        auction_id: sample_auction_id(),
        bidder: bidder.to_string(),
        bid_amount: coins(amount),
        timestamp: at,
    }
}

pub struct Harness {
    pub engine: AuctionManager,
    pub store: Arc<MemoryStore>,
    pub economy: Arc<MemoryEconomy>,
    pub clock: ManualClock,
}

pub const STARTING_BALANCE: i64 = 1_000;

/// An initialised engine over an empty memory store, clock at the sample start.
pub async fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryStore::new())).await
}

pub async fn harness_with_store(store: Arc<MemoryStore>) -> Harness {
    let economy = Arc::new(MemoryEconomy::new(coins(STARTING_BALANCE)));
    let clock = ManualClock::new(sample_starts_at());
    let mut engine = AuctionManager::new(
        store.clone(),
        economy.clone(),
        Arc::new(clock.clone()),
        EngineSettings::default(),
    );
    engine.init().await.unwrap();
    Harness {
        engine,
        store,
        economy,
        clock,
    }
}

impl Harness {
    /// Hands the sample seller the sample item and lists it, running from now
    /// for two hours.
    pub async fn list_sample(&mut self, starting_bid: i64) -> i64 {
        use auction_house::economy::Economy;
        self.economy.give_item(&sample_seller(), sample_item());
        let now = self.engine.now();
        self.engine
            .add_auction(&sample_seller(), sample_item(), now, now + 2 * 60 * 60, coins(starting_bid))
            .await
            .unwrap()
    }

    pub fn expire(&self) {
        self.clock.advance(2 * 60 * 60);
    }

    pub fn balance(&self, player: &str) -> i64 {
        use auction_house::economy::Economy;
        self.economy.balance(player).value()
    }
}
