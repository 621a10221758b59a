//! Cold-restart recovery: a new process reconstructs current state from the
//! latest checkpoint plus the event tail, without replaying all history.

use std::sync::Arc;

use polybook::replay::reconstruct_book;
use polybook::repository::{ColumnarOrderBookRepository, OrderBookRepository};
use polybook::service::OrderBookService;
use polybook::{
    BookDelta, BookSnapshot, EventHeader, MarketAsset, OrderBookEvent, Price, PriceLevel,
    PriceLevelDelta, Quantity, Side, Timestamp, TradeEvent,
};
use tempfile::tempdir;

// 2025-07-15 13:45:00 UTC
const TS: i64 = 1_752_587_100_000;

fn asset() -> MarketAsset {
    MarketAsset::new("0xbd31dc", "65818612345678901234").unwrap()
}

fn header(ts_offset: i64) -> EventHeader {
    EventHeader {
        asset: asset(),
        timestamp: Timestamp::new(TS + ts_offset).unwrap(),
        sequence_number: 0,
    }
}

fn level(price: f64, size: f64) -> PriceLevel {
    PriceLevel::new(Price::new(price).unwrap(), Quantity::new(size).unwrap())
}

fn snapshot_event() -> OrderBookEvent {
    OrderBookEvent::Snapshot(BookSnapshot {
        header: header(0),
        bids: vec![level(0.48, 30.0), level(0.49, 20.0)],
        asks: vec![level(0.52, 25.0)],
        hash: "0xabc".to_string(),
    })
}

fn delta_event(price: f64, size: f64) -> OrderBookEvent {
    OrderBookEvent::Delta(BookDelta {
        header: header(1_000),
        changes: vec![PriceLevelDelta {
            asset_id: asset().token_id().to_string(),
            price: Price::new(price).unwrap(),
            new_size: Quantity::new(size).unwrap(),
            side: Side::Buy,
            best_bid: Price::new(0.49).unwrap(),
            best_ask: Price::new(0.52).unwrap(),
        }],
    })
}

fn trade_event() -> OrderBookEvent {
    OrderBookEvent::Trade(TradeEvent {
        header: header(2_000),
        price: Price::new(0.50).unwrap(),
        size: Quantity::new(10.0).unwrap(),
        side: Side::Buy,
        fee_rate_bps: "0".to_string(),
    })
}

#[test]
fn restart_rebuilds_the_live_projection() {
    let dir = tempdir().expect("tempdir");

    let live_book = {
        let repo = Arc::new(
            ColumnarOrderBookRepository::open_local(dir.path(), 1024).expect("open"),
        );
        // Checkpoint every 2 events: the snapshot lands mid-stream and the
        // tail after it must replay on recovery.
        let service = OrderBookService::new(repo.clone(), 2);
        service.on_event(snapshot_event()).unwrap();
        service.on_event(delta_event(0.50, 100.0)).unwrap();
        service.on_event(trade_event()).unwrap();
        service.on_event(delta_event(0.47, 15.0)).unwrap();
        service.on_event(delta_event(0.49, 0.0)).unwrap();

        let book = service.current_book(&asset()).unwrap();
        repo.flush().unwrap();
        book
    };

    // Fresh process: no in-memory state survives.
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), 1024).expect("reopen");
    let recovered = reconstruct_book(&repo, &asset()).unwrap();

    assert_eq!(recovered.bids(), live_book.bids());
    assert_eq!(recovered.asks(), live_book.asks());
    assert_eq!(recovered.tick_size(), live_book.tick_size());
    assert_eq!(recovered.book_hash(), live_book.book_hash());
    assert_eq!(recovered.timestamp(), live_book.timestamp());
    assert_eq!(recovered.last_sequence_number(), 5);
    assert_eq!(recovered.best_bid().unwrap(), Price::new(0.50).unwrap());

    // The checkpoint keeps the trade's economic fields but not the sequence
    // it was ingested under, so the trades match on everything observable.
    let live_trade = live_book.latest_trade().expect("live trade");
    let recovered_trade = recovered.latest_trade().expect("recovered trade");
    assert_eq!(recovered_trade.price, live_trade.price);
    assert_eq!(recovered_trade.size, live_trade.size);
    assert_eq!(recovered_trade.side, live_trade.side);
    assert_eq!(recovered_trade.fee_rate_bps, live_trade.fee_rate_bps);
    assert_eq!(recovered_trade.header.timestamp, live_trade.header.timestamp);
}

#[test]
fn recovery_with_no_history_yields_an_empty_book() {
    let dir = tempdir().expect("tempdir");
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), 1024).expect("open");

    let book = reconstruct_book(&repo, &asset()).unwrap();
    assert_eq!(book.depth(), 0);
    assert_eq!(book.last_sequence_number(), 0);
    assert!(book.best_bid().is_err());
}

#[test]
fn recovery_sees_unflushed_events() {
    let dir = tempdir().expect("tempdir");
    let repo = Arc::new(
        ColumnarOrderBookRepository::open_local(dir.path(), 1024).expect("open"),
    );
    let service = OrderBookService::new(repo.clone(), 0);
    service.on_event(snapshot_event()).unwrap();
    service.on_event(delta_event(0.50, 100.0)).unwrap();

    // Same-process recovery before any flush: buffers must read through.
    let book = reconstruct_book(repo.as_ref(), &asset()).unwrap();
    assert_eq!(book, service.current_book(&asset()).unwrap());
}
