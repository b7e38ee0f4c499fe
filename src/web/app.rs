use actix_web::{web, HttpRequest, HttpResponse, Result};
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ListingDefaults;
use crate::domain::{AuctionId, Errors};
use crate::economy::EconomyError;
use crate::manager::{sort_auctions, AuctionManager, EngineError};
use crate::money::Amount;
use crate::stats::SharedStats;
use super::types::{
    AddAuctionRequest, ApiError, AppState, AuctionDetail, AuctionItem, BidRequest, ClaimResponse, SortQuery,
};

pub fn init_app_state(
    engine: Arc<Mutex<AuctionManager>>,
    stats: SharedStats,
    defaults: ListingDefaults,
) -> AppState {
    AppState { engine, stats, defaults }
}

// Read x-jwt-payload header and extract the player name
fn get_auth_user(req: &HttpRequest) -> Option<String> {
    let auth_header = req.headers().get("x-jwt-payload")?;
    let auth_str = auth_header.to_str().ok()?;

    let decoded = general_purpose::STANDARD.decode(auth_str).ok()?;
    let json: Value = serde_json::from_slice(&decoded).ok()?;

    let name = json
        .get("name")
        .or_else(|| json.get("sub"))?
        .as_str()?
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(ApiError {
        message: "Unauthorized".to_string(),
    })
}

fn error_response(err: EngineError) -> HttpResponse {
    let body = ApiError {
        message: err.to_string(),
    };
    match err {
        EngineError::Validation(Errors::UnknownAuction(_)) => HttpResponse::NotFound().json(body),
        EngineError::Validation(_) => HttpResponse::BadRequest().json(body),
        EngineError::Persistence(_) => HttpResponse::ServiceUnavailable().json(body),
        EngineError::Economy(EconomyError::MissingItem { .. }) => HttpResponse::BadRequest().json(body),
        EngineError::Economy(_) => HttpResponse::InternalServerError().json(body),
    }
}

// Active auctions, optionally sorted
async fn get_auctions(query: web::Query<SortQuery>, data: web::Data<AppState>) -> Result<HttpResponse> {
    let engine = data.engine.lock().await;
    let rules = engine.settings().bid_rules;
    let order = query.sort.unwrap_or_default();

    let auction_list: Vec<AuctionItem> = sort_auctions(engine.get_active_auctions(), order)
        .into_iter()
        .map(|auction| AuctionItem::new(auction, &rules))
        .collect();

    Ok(HttpResponse::Ok().json(auction_list))
}

async fn get_auction(path: web::Path<AuctionId>, data: web::Data<AppState>) -> Result<HttpResponse> {
    let auction_id = path.into_inner();
    let engine = data.engine.lock().await;

    match engine.get_auction(auction_id) {
        Some(auction) => {
            let detail = AuctionDetail::new(auction, &engine.settings().bid_rules, engine.now());
            Ok(HttpResponse::Ok().json(detail))
        }
        None => Ok(error_response(Errors::UnknownAuction(auction_id).into())),
    }
}

async fn create_auction(
    req: HttpRequest,
    auction_req: web::Json<AddAuctionRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(user) = get_auth_user(&req) else {
        return Ok(unauthorized());
    };
    let request = auction_req.into_inner();
    let starting_bid = request.starting_bid(&data.defaults);
    let starting_bid = match Amount::new(starting_bid) {
        Ok(amount) => amount,
        Err(_) => return Ok(error_response(Errors::InvalidAmount(starting_bid).into())),
    };

    let mut engine = data.engine.lock().await;
    let now = engine.now();
    let end_date = request.end_date(now, &data.defaults);

    match engine.add_auction(&user, request.item, now, end_date, starting_bid).await {
        Ok(id) => match engine.get_auction(id) {
            Some(auction) => Ok(HttpResponse::Created().json(AuctionDetail::new(auction, &engine.settings().bid_rules, now))),
            None => Ok(error_response(Errors::UnknownAuction(id).into())),
        },
        Err(err) => Ok(error_response(err)),
    }
}

async fn place_bid(
    req: HttpRequest,
    path: web::Path<AuctionId>,
    bid_req: web::Json<BidRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(user) = get_auth_user(&req) else {
        return Ok(unauthorized());
    };
    let auction_id = path.into_inner();

    let mut engine = data.engine.lock().await;
    match engine.add_bid(auction_id, &user, bid_req.amount) {
        Ok(bid) => Ok(HttpResponse::Ok().json(bid)),
        Err(err) => {
            debug!("Rejected bid by {} on auction {}: {}", user, auction_id, err);
            Ok(error_response(err))
        }
    }
}

// The auctioneer collects proceeds or the item; anyone else settles their bids
async fn claim(req: HttpRequest, path: web::Path<AuctionId>, data: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(user) = get_auth_user(&req) else {
        return Ok(unauthorized());
    };
    let auction_id = path.into_inner();

    let mut engine = data.engine.lock().await;
    let is_auctioneer = match engine.get_auction(auction_id) {
        Some(auction) => auction.is_auctioneer(&user),
        None => return Ok(error_response(Errors::UnknownAuction(auction_id).into())),
    };
    let result = if is_auctioneer {
        engine.claim(auction_id, &user)
    } else {
        engine.bidder_claim(auction_id, &user)
    };

    match result {
        Ok(payout) => Ok(HttpResponse::Ok().json(ClaimResponse { auction_id, payout })),
        Err(err) => Ok(error_response(err)),
    }
}

async fn claim_all(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(user) = get_auth_user(&req) else {
        return Ok(unauthorized());
    };
    let mut engine = data.engine.lock().await;
    let claims: Vec<ClaimResponse> = engine
        .claim_all(&user)
        .into_iter()
        .map(|(auction_id, payout)| ClaimResponse { auction_id, payout })
        .collect();
    Ok(HttpResponse::Ok().json(claims))
}

async fn my_bids(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(user) = get_auth_user(&req) else {
        return Ok(unauthorized());
    };
    let engine = data.engine.lock().await;
    let mut bids: Vec<_> = engine.get_bids_by(&user).into_iter().cloned().collect();
    bids.sort_by_key(|bid| std::cmp::Reverse(bid.timestamp));
    Ok(HttpResponse::Ok().json(bids))
}

async fn player_stats(path: web::Path<String>, data: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = data.stats.read().await.get(&path.into_inner());
    Ok(HttpResponse::Ok().json(stats))
}

// Configure routes
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .route("/auctions", web::get().to(get_auctions))
            .route("/auctions", web::post().to(create_auction))
            .route("/auctions/{id}", web::get().to(get_auction))
            .route("/auctions/{id}/bids", web::post().to(place_bid))
            .route("/auctions/{id}/claim", web::post().to(claim))
            .route("/claims", web::post().to(claim_all))
            .route("/bids", web::get().to(my_bids))
            .route("/players/{name}/stats", web::get().to(player_stats)),
    );
}
