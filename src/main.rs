use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use auction_house::clock::SystemClock;
use auction_house::config::Arguments;
use auction_house::economy::MemoryEconomy;
use auction_house::manager::{spawn_sweeper, AuctionManager};
use auction_house::money::Amount;
use auction_house::persistence::json_file::JsonFileStore;
use auction_house::stats::{spawn_collector, SharedStats};
use auction_house::web::app::{configure_app, init_app_state};
use clap::Parser;
use log::info;
use std::io::{Error, ErrorKind};
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn run_app(args: Arguments) -> std::io::Result<()> {
    let starting_balance = Amount::new(args.starting_balance)
        .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;

    let store = Arc::new(JsonFileStore::new(&args.store_path));
    info!("Keeping auctions in {}", store.path().display());
    let economy = Arc::new(MemoryEconomy::new(starting_balance).with_starting_items(args.starting_items.clone()));
    let mut engine = AuctionManager::new(store, economy, Arc::new(SystemClock), args.engine_settings());

    let stats = SharedStats::default();
    spawn_collector(engine.subscribe(), stats.clone());

    engine
        .init()
        .await
        .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;

    let engine = Arc::new(Mutex::new(engine));
    spawn_sweeper(engine.clone(), args.sweep_period());

    let app_state = init_app_state(engine, stats, args.listing_defaults());

    info!("Starting server on {}", args.bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind(&args.bind_address)?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Arguments::parse();
    env_logger::Builder::new().parse_filters(&args.log_filter).init();
    info!("Running with arguments:\n{}", args);
    run_app(args).await
}
