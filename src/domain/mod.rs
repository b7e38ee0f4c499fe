// src/domain/mod.rs
pub mod auctions;
pub mod bids;
pub mod core;
pub mod events;
pub mod item;
pub mod states;

pub use self::auctions::*;
pub use self::bids::*;
pub use self::core::*;
pub use self::events::*;
pub use self::item::{Item, ItemId, Tag};
pub use self::states::*;
