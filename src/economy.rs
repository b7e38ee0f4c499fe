//! Money and item transfers to players.
//!
//! The host game owns player balances and inventories. The engine only needs
//! the handful of operations in [`Economy`].

use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::item::Item;
use crate::money::Amount;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconomyError {
    #[error("{player} cannot pay {needed}, balance is {available}")]
    InsufficientFunds {
        player: String,
        needed: Amount,
        available: Amount,
    },

    #[error("Balance overflow for {0}")]
    Overflow(String),

    #[error("{player} does not hold {item}")]
    MissingItem { player: String, item: String },
}

pub trait Economy: Send + Sync {
    fn balance(&self, player: &str) -> Amount;
    fn withdraw(&self, player: &str, amount: Amount) -> Result<(), EconomyError>;
    fn deposit(&self, player: &str, amount: Amount) -> Result<(), EconomyError>;
    /// Removes `item` from the player's inventory, to be held in escrow.
    fn take_item(&self, player: &str, item: &Item) -> Result<(), EconomyError>;
    fn give_item(&self, player: &str, item: Item);
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<String, Amount>,
    inventories: HashMap<String, Vec<Item>>,
}

/// In-process balances and inventories, keyed by lowercase player name.
/// Players the ledger has not seen yet hold the starting balance and kit.
#[derive(Debug, Default)]
pub struct MemoryEconomy {
    starting_balance: Amount,
    starting_items: Vec<Item>,
    ledger: Mutex<Ledger>,
}

impl MemoryEconomy {
    pub fn new(starting_balance: Amount) -> Self {
        MemoryEconomy {
            starting_balance,
            starting_items: Vec::new(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn with_starting_items(mut self, items: Vec<Item>) -> Self {
        self.starting_items = items;
        self
    }

    pub fn set_balance(&self, player: &str, amount: Amount) {
        self.with_ledger(|ledger| {
            ledger.balances.insert(player.to_lowercase(), amount);
        })
    }

    pub fn inventory(&self, player: &str) -> Vec<Item> {
        self.with_ledger(|ledger| {
            ledger
                .inventories
                .get(&player.to_lowercase())
                .cloned()
                .unwrap_or_else(|| self.starting_items.clone())
        })
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        // A poisoned lock still holds consistent balances: every update below
        // is a single map write.
        let mut guard = self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn balance_in(&self, ledger: &Ledger, key: &str) -> Amount {
        ledger.balances.get(key).copied().unwrap_or(self.starting_balance)
    }
}

impl Economy for MemoryEconomy {
    fn balance(&self, player: &str) -> Amount {
        self.with_ledger(|ledger| self.balance_in(ledger, &player.to_lowercase()))
    }

    fn withdraw(&self, player: &str, amount: Amount) -> Result<(), EconomyError> {
        let key = player.to_lowercase();
        self.with_ledger(|ledger| {
            let available = self.balance_in(ledger, &key);
            let remaining = (available - amount).map_err(|_| EconomyError::InsufficientFunds {
                player: player.to_string(),
                needed: amount,
                available,
            })?;
            ledger.balances.insert(key, remaining);
            debug!("Withdrew {} from {}", amount, player);
            Ok(())
        })
    }

    fn deposit(&self, player: &str, amount: Amount) -> Result<(), EconomyError> {
        let key = player.to_lowercase();
        self.with_ledger(|ledger| {
            let total = (self.balance_in(ledger, &key) + amount)
                .map_err(|_| EconomyError::Overflow(player.to_string()))?;
            ledger.balances.insert(key, total);
            debug!("Deposited {} to {}", amount, player);
            Ok(())
        })
    }

    fn take_item(&self, player: &str, item: &Item) -> Result<(), EconomyError> {
        let key = player.to_lowercase();
        self.with_ledger(|ledger| {
            let stacks = ledger
                .inventories
                .entry(key)
                .or_insert_with(|| self.starting_items.clone());
            let position = stacks
                .iter()
                .position(|held| held.identity == item.identity && held.tag == item.tag && held.count >= item.count)
                .ok_or_else(|| EconomyError::MissingItem {
                    player: player.to_string(),
                    item: item.to_string(),
                })?;
            stacks[position].count -= item.count;
            if stacks[position].count == 0 {
                stacks.remove(position);
            }
            debug!("Took {} from {}", item, player);
            Ok(())
        })
    }

    fn give_item(&self, player: &str, item: Item) {
        debug!("Gave {} to {}", item, player);
        self.with_ledger(|ledger| {
            ledger
                .inventories
                .entry(player.to_lowercase())
                .or_insert_with(|| self.starting_items.clone())
                .push(item)
        })
    }
}
