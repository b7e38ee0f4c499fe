use auction_house::domain::{Auction, AuctionEvent, Item, ItemId, Payout, Tag};
use auction_house::persistence::json_file::JsonFileStore;
use auction_house::persistence::{AuctionRow, AuctionUpdate, DecodeError, RecordStore};
use serde_json::{from_str, json, to_value};
#[path = "utils/mod.rs"]
mod utils;
use utils::*;

fn enchanted_bow() -> Item {
    Item::new("Bow", 1).unwrap().with_tag(Tag::compound([
        ("Damage", Tag::Int(12)),
        ("Speed", Tag::Float(0.1)),
        ("Draw", Tag::Double(1.0 / 3.0)),
        ("Seed", Tag::Long(-4_611_686_018_427_387_904)),
        ("Flags", Tag::ByteArray(vec![1, -1, 0])),
        ("Colors", Tag::IntArray(vec![16_711_680, 255])),
        ("Owners", Tag::LongArray(vec![i64::MAX, i64::MIN])),
        ("Unbreakable", Tag::Byte(1)),
        (
            "ench",
            Tag::List(vec![
                Tag::compound([("id", Tag::Short(48)), ("lvl", Tag::Short(5))]),
                Tag::compound([("id", Tag::Short(51)), ("lvl", Tag::Short(1))]),
            ]),
        ),
        ("display", Tag::compound([("Name", Tag::String("Ünïcødé \"bow\"".to_string()))])),
    ]))
}

#[test]
fn test_item_decodes_to_the_same_stack() {
    let item = enchanted_bow();
    let text = item.encode();

    let decoded = Item::decode(&text).unwrap();
    assert_eq!(decoded, item);
    assert_eq!(decoded.identity.as_str(), "minecraft:bow");
    assert_eq!(decoded.encode(), text);
}

#[test]
fn test_every_tag_survives_encoding() {
    let cases = vec![
        ("byte", Tag::Byte(i8::MIN)),
        ("byte max", Tag::Byte(i8::MAX)),
        ("short", Tag::Short(i16::MIN)),
        ("int", Tag::Int(i32::MAX)),
        ("long min", Tag::Long(i64::MIN)),
        ("long max", Tag::Long(i64::MAX)),
        ("float", Tag::Float(0.1)),
        ("float max", Tag::Float(f32::MAX)),
        ("float subnormal", Tag::Float(f32::from_bits(1))),
        ("float negative zero", Tag::Float(-0.0)),
        ("float nan", Tag::Float(f32::NAN)),
        ("float nan payload", Tag::Float(f32::from_bits(0x7fc0_0abc))),
        ("float infinity", Tag::Float(f32::INFINITY)),
        ("double", Tag::Double(1.0 / 3.0)),
        ("double min positive", Tag::Double(f64::MIN_POSITIVE)),
        ("double subnormal", Tag::Double(f64::from_bits(1))),
        ("double negative zero", Tag::Double(-0.0)),
        ("double whole", Tag::Double(1e300)),
        ("double negative nan", Tag::Double(f64::from_bits(0xfff8_0000_0000_0001))),
        ("double negative infinity", Tag::Double(f64::NEG_INFINITY)),
        ("string", Tag::String("Ünïcødé \"quoted\" \\ \n".to_string())),
        ("empty string", Tag::String(String::new())),
        ("byte array", Tag::ByteArray(vec![i8::MIN, 0, i8::MAX])),
        ("empty byte array", Tag::ByteArray(vec![])),
        ("int array", Tag::IntArray(vec![i32::MIN, i32::MAX])),
        ("long array", Tag::LongArray(vec![i64::MIN, 0, i64::MAX])),
        ("empty list", Tag::List(vec![])),
        ("empty compound", Tag::compound(Vec::<(String, Tag)>::new())),
        (
            "nested list",
            Tag::List(vec![Tag::List(vec![Tag::Int(1)]), Tag::compound([("k", Tag::Long(-1))])]),
        ),
        (
            "unicode keys",
            Tag::compound([("名前", Tag::String("剣".to_string())), ("émoji 🗡", Tag::Byte(1)), ("", Tag::Short(0))]),
        ),
    ];

    for (name, tag) in cases {
        let item = Item::new("minecraft:stone", 64).unwrap().with_tag(tag);
        let text = item.encode();
        let decoded = Item::decode(&text).unwrap_or_else(|e| panic!("{}: {} from {}", name, e, text));
        assert_eq!(decoded, item, "{}", name);
        assert_eq!(decoded.encode(), text, "{}", name);
    }
}

#[test]
fn test_nested_tags_can_be_looked_up() {
    let item = Item::decode(&sample_item().encode()).unwrap();
    let tag = item.tag.unwrap();

    assert_eq!(tag.get("Damage"), Some(&Tag::Int(3)));
    assert_eq!(
        tag.get("display").and_then(|display| display.get("Name")),
        Some(&Tag::String("Excalibur".to_string()))
    );
    assert_eq!(tag.get("missing"), None);
    assert_eq!(Tag::Int(3).get("Damage"), None);
}

#[test]
fn test_item_text_form() {
    let item = Item::new("minecraft:stone", 64)
        .unwrap()
        .with_tag(Tag::compound([("b", Tag::Int(2)), ("a", Tag::Byte(1))]));

    // Compound keys come out sorted.
    assert_eq!(
        item.encode(),
        r#"{"id":"minecraft:stone","count":64,"tag":{"Compound":{"a":{"Byte":1},"b":{"Int":2}}}}"#
    );
    let plain = Item::decode(r#"{"id":"minecraft:dirt","count":3}"#).unwrap();
    assert_eq!(plain.tag, None);
    assert_eq!(plain.count, 3);
}

#[test]
fn test_unknown_identity_keeps_the_rest_of_the_item() {
    let decoded = Item::decode(r#"{"id":"Not An Item!","count":5,"tag":{"Int":7}}"#).unwrap();

    assert!(decoded.identity.is_unknown());
    assert_eq!(decoded.identity.as_str(), ItemId::UNKNOWN);
    assert_eq!(decoded.count, 5);
    assert_eq!(decoded.tag, Some(Tag::Int(7)));
}

#[test]
fn test_malformed_item_text_is_an_error() {
    assert!(Item::decode("").is_err());
    assert!(Item::decode("{\"id\":\"minecraft:stone\"").is_err());
    assert!(Item::decode(r#"{"id":"minecraft:stone","count":"many"}"#).is_err());
    assert!(Item::decode(r#"{"id":"minecraft:stone","count":1,"tag":{"Nope":1}}"#).is_err());
}

#[test]
fn test_identity_normalization() {
    assert_eq!(ItemId::parse("Diamond Sword").unwrap().as_str(), "minecraft:diamond_sword");
    assert_eq!(ItemId::parse("MyMod:Copper/Wire").unwrap().as_str(), "mymod:copper/wire");
    assert!(ItemId::parse("").is_err());
    assert!(ItemId::parse(":stone").is_err());
    assert!(ItemId::parse("minecraft:").is_err());
}

#[test]
fn test_item_json_rejects_invalid_items() {
    let empty: Result<Item, _> = serde_json::from_value(json!({ "id": "minecraft:stone", "count": 0 }));
    assert!(empty.is_err());
    let bad_id: Result<Item, _> = serde_json::from_value(json!({ "id": "???", "count": 1 }));
    assert!(bad_id.is_err());
}

fn settled_auction() -> Auction {
    let rules = Default::default();
    let mut auction = sample_auction();
    auction.item = enchanted_bow();
    auction.add_bid(bid(&buyer_1(), 50, sample_bid_time()), &rules).unwrap();
    auction.add_bid(bid(&buyer_2(), 58, sample_bid_time() + 1), &rules).unwrap();
    auction.claim(&sample_seller(), sample_ends_at()).unwrap();
    auction.bidder_claim(&buyer_1(), sample_ends_at()).unwrap();
    auction
}

#[test]
fn test_auction_row_round_trip() {
    let auction = settled_auction();
    let row = AuctionRow::from(&auction);

    assert_eq!(row.claimed, 1);
    assert_eq!(row.startdate, sample_starts_at());
    assert_eq!(row.enddate, sample_ends_at());
    assert_eq!(row.starting_bid, 50);
    assert_eq!(
        from_str::<serde_json::Value>(&row.claimed_bids).unwrap(),
        json!([{ "bidder": "Buyer_1", "bidamount": 50, "timestamp": sample_bid_time() }])
    );

    assert_eq!(Auction::try_from(row).unwrap(), auction);
}

#[test]
fn test_row_with_negative_amount_is_rejected() {
    let mut row = AuctionRow::from(&sample_auction());
    row.bids = r#"[{"bidder":"Buyer_1","bidamount":-3,"timestamp":0}]"#.to_string();
    assert!(Auction::try_from(row.clone()).is_err());

    row.bids = "[]".to_string();
    row.starting_bid = -1;
    assert!(Auction::try_from(row).is_err());
}

#[test]
fn test_rows_breaking_auction_invariants_are_rejected() {
    let valid = AuctionRow::from(&settled_auction());
    assert!(Auction::try_from(valid.clone()).is_ok());

    let ends_at_start = AuctionRow {
        enddate: valid.startdate,
        ..valid.clone()
    };
    let decreasing_bids = AuctionRow {
        bids: r#"[{"bidder":"Buyer_1","bidamount":80,"timestamp":1},{"bidder":"Buyer_2","bidamount":60,"timestamp":2}]"#
            .to_string(),
        claimed_bids: "[]".to_string(),
        ..valid.clone()
    };
    let stray_claim = AuctionRow {
        claimed_bids: r#"[{"bidder":"Buyer_3","bidamount":50,"timestamp":1}]"#.to_string(),
        ..valid.clone()
    };

    for row in [ends_at_start, decreasing_bids, stray_claim] {
        assert!(matches!(
            Auction::try_from(row),
            Err(DecodeError::Inconsistent { id: 1, .. })
        ));
    }
}

#[test]
fn test_update_rewrites_only_mutable_columns() {
    let auction = settled_auction();
    let mut row = AuctionRow::from(&sample_auction());
    row.apply(&AuctionUpdate::from(&auction));

    assert_eq!(row.item, sample_item().encode());
    assert_eq!(row.claimed, 1);
    assert_eq!(row.bids, AuctionRow::from(&auction).bids);
}

#[test]
fn test_event_serialization() {
    let event = AuctionEvent::BidPlaced {
        bid: bid(&buyer_1(), 67, sample_bid_time()),
        charged: coins(17),
    };
    assert_eq!(
        to_value(&event).unwrap(),
        json!({
            "$type": "AuctionBid",
            "bid": {
                "auctionId": 1,
                "bidder": "Buyer_1",
                "bidAmount": 67,
                "timestamp": sample_bid_time()
            },
            "charged": 17
        })
    );

    let claimed = AuctionEvent::Claimed {
        auction_id: 1,
        auctioneer: sample_seller(),
        payout: Payout::Proceeds { amount: coins(58) },
    };
    let value = to_value(&claimed).unwrap();
    assert_eq!(value["$type"], "AuctionClaim");
    assert_eq!(value["payout"], json!({ "kind": "Proceeds", "amount": 58 }));
    assert_eq!(serde_json::from_value::<AuctionEvent>(value).unwrap(), claimed);
}

#[tokio::test]
async fn test_json_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("auctions.json");
    let store = JsonFileStore::new(&path);

    store.init().await.unwrap();
    store.init().await.unwrap();
    assert!(path.exists());
    assert!(store.load().await.unwrap().is_empty());

    let first = store.add(&AuctionRow::from(&sample_auction())).await.unwrap();
    let second = store.add(&AuctionRow::from(&sample_auction())).await.unwrap();
    assert_eq!((first, second), (1, 2));

    let mut auction = settled_auction();
    auction.id = first;
    assert_eq!(store.update(&AuctionUpdate::from(&auction)).await.unwrap(), 1);
    assert_eq!(store.remove(second).await.unwrap(), 1);
    assert_eq!(store.remove(second).await.unwrap(), 0);

    let missing = AuctionUpdate {
        id: 99,
        ..AuctionUpdate::from(&auction)
    };
    assert_eq!(store.update(&missing).await.unwrap(), 0);

    // A fresh handle sees what the first one wrote.
    let reopened = JsonFileStore::new(&path);
    let rows = reopened.load().await.unwrap();
    assert_eq!(rows.len(), 1);
    let loaded = Auction::try_from(rows[0].clone()).unwrap();
    assert_eq!(loaded.claimed_bids, auction.claimed_bids);
    assert_eq!(loaded.bids, auction.bids);
    assert!(loaded.claimed);
    assert_eq!(loaded.item, sample_item());

    // Ids keep counting up after removals.
    assert_eq!(reopened.add(&AuctionRow::from(&sample_auction())).await.unwrap(), 3);
}

#[tokio::test]
async fn test_corrupt_store_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auctions.json");
    std::fs::write(&path, "not json").unwrap();

    let store = JsonFileStore::new(&path);
    assert!(store.load().await.is_err());
}
