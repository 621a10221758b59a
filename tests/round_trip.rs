//! Round-trip laws for the columnar repository: whatever goes in comes back
//! out in sequence order, independent of flush boundaries.

use std::sync::Arc;

use polybook::repository::columnar::DEFAULT_WRITE_BUFFER_SIZE;
use polybook::repository::{ColumnarOrderBookRepository, OrderBookRepository};
use polybook::{
    BookDelta, BookSnapshot, EventHeader, MarketAsset, OrderBook, OrderBookEvent, Price,
    PriceLevel, PriceLevelDelta, Quantity, Side, TickSizeChange, Timestamp, TradeEvent,
};
use tempfile::tempdir;

// 2025-07-15 13:45:00 UTC
const TS: i64 = 1_752_587_100_000;

fn asset() -> MarketAsset {
    MarketAsset::new("0xbd31dc", "65818612345678901234").unwrap()
}

fn header(seq: u64) -> EventHeader {
    EventHeader {
        asset: asset(),
        timestamp: Timestamp::new(TS).unwrap(),
        sequence_number: seq,
    }
}

fn level(price: f64, size: f64) -> PriceLevel {
    PriceLevel::new(Price::new(price).unwrap(), Quantity::new(size).unwrap())
}

fn snapshot_event(seq: u64) -> OrderBookEvent {
    OrderBookEvent::Snapshot(BookSnapshot {
        header: header(seq),
        bids: vec![level(0.48, 30.0), level(0.49, 20.0)],
        asks: vec![level(0.52, 25.0), level(0.53, 60.0)],
        hash: "0xabc".to_string(),
    })
}

fn delta_event(seq: u64, price: f64, size: f64) -> OrderBookEvent {
    OrderBookEvent::Delta(BookDelta {
        header: header(seq),
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

fn trade_event(seq: u64) -> OrderBookEvent {
    OrderBookEvent::Trade(TradeEvent {
        header: header(seq),
        price: Price::new(0.50).unwrap(),
        size: Quantity::new(10.0).unwrap(),
        side: Side::Sell,
        fee_rate_bps: "25".to_string(),
    })
}

fn tick_event(seq: u64) -> OrderBookEvent {
    OrderBookEvent::TickSize(TickSizeChange {
        header: header(seq),
        old_tick_size: Price::new(0.01).unwrap(),
        new_tick_size: Price::new(0.001).unwrap(),
    })
}

#[test]
fn event_log_round_trips_across_flush_boundaries() {
    let dir = tempdir().expect("tempdir");
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
        .expect("open");

    let events = vec![
        snapshot_event(1),
        delta_event(2, 0.50, 100.0),
        trade_event(3),
        tick_event(4),
        delta_event(5, 0.47, 12.0),
    ];

    for (i, event) in events.iter().enumerate() {
        repo.append_event(event).unwrap();
        // Flush mid-stream so the log spans files and buffers.
        if i == 2 {
            repo.flush().unwrap();
        }
    }

    let read = repo.get_events_since(&asset(), 0).unwrap();
    assert_eq!(read, events);

    // The same result once everything is durable.
    repo.flush().unwrap();
    let read = repo.get_events_since(&asset(), 0).unwrap();
    assert_eq!(read, events);
}

#[test]
fn get_events_since_is_strictly_greater_than() {
    let dir = tempdir().expect("tempdir");
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
        .expect("open");

    for seq in 1..=4 {
        repo.append_event(&delta_event(seq, 0.50, seq as f64)).unwrap();
    }
    repo.flush().unwrap();

    let read = repo.get_events_since(&asset(), 2).unwrap();
    let sequences: Vec<u64> = read.iter().map(|e| e.sequence_number()).collect();
    assert_eq!(sequences, vec![3, 4]);
}

#[test]
fn snapshot_round_trips_every_observable_field() {
    let dir = tempdir().expect("tempdir");
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
        .expect("open");

    // Trade last, so the reconstructed trade header carries the same
    // sequence the checkpoint stores.
    let book = OrderBook::empty(asset())
        .apply(&snapshot_event(1))
        .apply(&tick_event(2))
        .apply(&trade_event(3));

    repo.store_snapshot(&book).unwrap();
    let loaded = repo.get_latest_snapshot(&asset()).unwrap().expect("snapshot");

    assert_eq!(loaded.bids(), book.bids());
    assert_eq!(loaded.asks(), book.asks());
    assert_eq!(loaded.latest_trade(), book.latest_trade());
    assert_eq!(loaded.tick_size(), book.tick_size());
    assert_eq!(loaded.book_hash(), book.book_hash());
    assert_eq!(loaded.timestamp(), book.timestamp());
    assert_eq!(loaded.last_sequence_number(), book.last_sequence_number());
}

#[test]
fn snapshot_without_trade_round_trips() {
    let dir = tempdir().expect("tempdir");
    let repo = ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
        .expect("open");

    let book = OrderBook::empty(asset()).apply(&snapshot_event(1));
    repo.store_snapshot(&book).unwrap();

    let loaded = repo.get_latest_snapshot(&asset()).unwrap().expect("snapshot");
    assert_eq!(loaded, book);
    assert!(loaded.latest_trade().is_none());
}

#[test]
fn dropping_the_repository_flushes_buffers() {
    let dir = tempdir().expect("tempdir");
    {
        let repo =
            ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
                .expect("open");
        repo.append_event(&trade_event(1)).unwrap();
        // No explicit flush; the drop path must persist the buffer.
    }

    let reopened = Arc::new(
        ColumnarOrderBookRepository::open_local(dir.path(), DEFAULT_WRITE_BUFFER_SIZE)
            .expect("reopen"),
    );
    let read = reopened.get_events_since(&asset(), 0).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].sequence_number(), 1);
}
