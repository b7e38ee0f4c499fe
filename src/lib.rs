// src/lib.rs
pub mod clock;
pub mod config;
pub mod domain;
pub mod economy;
pub mod manager;
pub mod money;
pub mod persistence;
pub mod stats;
pub mod web;

pub use domain::*;
pub use manager::{AuctionManager, AuctionSort, EngineError, EngineSettings, LoadReport};
pub use money::*;
