//! Command line and environment configuration for the auction service.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{BidRules, Item};
use crate::manager::EngineSettings;

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "auction-house", about = "Auction house bidding engine")]
pub struct Arguments {
    #[clap(long, env, default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// JSON document holding every auction row.
    #[clap(long, env, default_value = "data/auctions.json")]
    pub store_path: PathBuf,

    #[clap(long, env, default_value = "info,actix_web=info")]
    pub log_filter: String,

    /// Seconds between sweeps for fully settled auctions.
    #[clap(long, env, default_value_t = 1)]
    pub sweep_interval: u64,

    /// Balance of a player the in-process economy has not seen before.
    #[clap(long, env, default_value_t = 1000)]
    pub starting_balance: i64,

    /// Stacks every new player of the in-process economy holds, as
    /// comma-separated `identity=count` pairs, e.g. `diamond=64,minecraft:stone=16`.
    #[clap(long, env, value_delimiter = ',', value_parser = parse_stack)]
    pub starting_items: Vec<Item>,

    #[clap(long, env, default_value_t = 15)]
    pub min_raise_percent: u32,

    #[clap(long, env, default_value_t = 50)]
    pub default_starting_bid: i64,

    /// Auction length in seconds when a listing does not give one.
    #[clap(long, env, default_value_t = 7200)]
    pub default_duration: i64,
}

fn parse_stack(raw: &str) -> Result<Item, String> {
    let (identity, count) = match raw.rsplit_once('=') {
        Some((identity, count)) => {
            let count = count.trim().parse::<u32>().map_err(|e| format!("{}: {}", raw, e))?;
            (identity, count)
        }
        None => (raw, 1),
    };
    Item::new(identity, count).map_err(|e| e.to_string())
}

impl Arguments {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            bid_rules: BidRules {
                min_raise_percent: self.min_raise_percent,
            },
            ..EngineSettings::default()
        }
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn listing_defaults(&self) -> ListingDefaults {
        ListingDefaults {
            starting_bid: self.default_starting_bid,
            duration: self.default_duration,
        }
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            bind_address,
            store_path,
            log_filter,
            sweep_interval,
            starting_balance,
            starting_items,
            min_raise_percent,
            default_starting_bid,
            default_duration,
        } = self;

        writeln!(f, "bind_address: {}", bind_address)?;
        writeln!(f, "store_path: {}", store_path.display())?;
        writeln!(f, "log_filter: {}", log_filter)?;
        writeln!(f, "sweep_interval: {}", sweep_interval)?;
        writeln!(f, "starting_balance: {}", starting_balance)?;
        let starting_items: Vec<String> = starting_items.iter().map(ToString::to_string).collect();
        writeln!(f, "starting_items: [{}]", starting_items.join(", "))?;
        writeln!(f, "min_raise_percent: {}", min_raise_percent)?;
        writeln!(f, "default_starting_bid: {}", default_starting_bid)?;
        writeln!(f, "default_duration: {}", default_duration)?;
        Ok(())
    }
}

/// Values used when a new listing leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingDefaults {
    pub starting_bid: i64,
    pub duration: i64,
}

impl Default for ListingDefaults {
    fn default() -> Self {
        ListingDefaults {
            starting_bid: 50,
            duration: 2 * 60 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_listing_defaults() {
        let args = Arguments::parse_from(["auction-house"]);
        assert_eq!(args.listing_defaults(), ListingDefaults::default());
        assert_eq!(args.engine_settings().bid_rules, BidRules::default());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Arguments::parse_from(["auction-house", "--min-raise-percent", "20", "--sweep-interval", "0"]);
        assert_eq!(args.engine_settings().bid_rules.min_raise_percent, 20);
        assert_eq!(args.sweep_period(), Duration::from_secs(1));
    }

    #[test]
    fn starting_items_are_parsed() {
        let args = Arguments::parse_from(["auction-house", "--starting-items", "Diamond=64,minecraft:stone"]);
        assert_eq!(
            args.starting_items,
            vec![Item::new("minecraft:diamond", 64).unwrap(), Item::new("stone", 1).unwrap()]
        );
        assert!(Arguments::try_parse_from(["auction-house", "--starting-items", "stone=0"]).is_err());
        assert!(Arguments::try_parse_from(["auction-house", "--starting-items", "stone=many"]).is_err());
    }
}
