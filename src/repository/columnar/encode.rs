//! Event buffers and book checkpoints into arrow record batches.
//!
//! Each function takes a type-sharded buffer; events of any other kind are
//! not expected and are ignored rather than corrupting the batch.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, ListBuilder, StringBuilder,
    UInt64Builder, UInt8Builder,
};
use arrow::record_batch::RecordBatch;

use crate::book::OrderBook;
use crate::error::Result;
use crate::events::{EventHeader, EventKind, OrderBookEvent};
use crate::market::PriceLevel;

use super::schema;

/// Dispatch a buffer of one kind to its batch builder.
pub fn events_batch(kind: EventKind, events: &[OrderBookEvent]) -> Result<RecordBatch> {
    match kind {
        EventKind::BookSnapshot => book_snapshots(events),
        EventKind::BookDelta => book_deltas(events),
        EventKind::TradeEvent => trade_events(events),
        EventKind::TickSizeChange => tick_size_changes(events),
    }
}

struct HeaderColumns {
    condition_ids: StringBuilder,
    token_ids: StringBuilder,
    timestamps: Int64Builder,
    sequences: UInt64Builder,
}

impl HeaderColumns {
    fn new() -> Self {
        HeaderColumns {
            condition_ids: StringBuilder::new(),
            token_ids: StringBuilder::new(),
            timestamps: Int64Builder::new(),
            sequences: UInt64Builder::new(),
        }
    }

    fn append(&mut self, header: &EventHeader) {
        self.condition_ids.append_value(header.asset.condition_id());
        self.token_ids.append_value(header.asset.token_id());
        self.timestamps.append_value(header.timestamp.millis());
        self.sequences.append_value(header.sequence_number);
    }

    fn finish(mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.condition_ids.finish()),
            Arc::new(self.token_ids.finish()),
            Arc::new(self.timestamps.finish()),
            Arc::new(self.sequences.finish()),
        ]
    }
}

fn append_levels(
    prices: &mut ListBuilder<Float64Builder>,
    sizes: &mut ListBuilder<Float64Builder>,
    levels: &[PriceLevel],
) {
    for level in levels {
        prices.values().append_value(level.price().value());
        sizes.values().append_value(level.size().size());
    }
    prices.append(true);
    sizes.append(true);
}

fn book_snapshots(events: &[OrderBookEvent]) -> Result<RecordBatch> {
    let mut header = HeaderColumns::new();
    let mut hashes = StringBuilder::new();
    let mut bid_prices = ListBuilder::new(Float64Builder::new());
    let mut bid_sizes = ListBuilder::new(Float64Builder::new());
    let mut ask_prices = ListBuilder::new(Float64Builder::new());
    let mut ask_sizes = ListBuilder::new(Float64Builder::new());

    for event in events {
        let OrderBookEvent::Snapshot(snap) = event else {
            continue;
        };
        header.append(&snap.header);
        hashes.append_value(&snap.hash);
        append_levels(&mut bid_prices, &mut bid_sizes, &snap.bids);
        append_levels(&mut ask_prices, &mut ask_sizes, &snap.asks);
    }

    let mut columns = header.finish();
    columns.push(Arc::new(hashes.finish()));
    columns.push(Arc::new(bid_prices.finish()));
    columns.push(Arc::new(bid_sizes.finish()));
    columns.push(Arc::new(ask_prices.finish()));
    columns.push(Arc::new(ask_sizes.finish()));

    Ok(RecordBatch::try_new(schema::book_snapshot_schema(), columns)?)
}

fn book_deltas(events: &[OrderBookEvent]) -> Result<RecordBatch> {
    let mut header = HeaderColumns::new();
    let mut asset_ids = ListBuilder::new(StringBuilder::new());
    let mut prices = ListBuilder::new(Float64Builder::new());
    let mut new_sizes = ListBuilder::new(Float64Builder::new());
    let mut sides = ListBuilder::new(UInt8Builder::new());
    let mut best_bids = ListBuilder::new(Float64Builder::new());
    let mut best_asks = ListBuilder::new(Float64Builder::new());

    for event in events {
        let OrderBookEvent::Delta(delta) = event else {
            continue;
        };
        header.append(&delta.header);
        for change in &delta.changes {
            asset_ids.values().append_value(&change.asset_id);
            prices.values().append_value(change.price.value());
            new_sizes.values().append_value(change.new_size.size());
            sides.values().append_value(change.side.as_u8());
            best_bids.values().append_value(change.best_bid.value());
            best_asks.values().append_value(change.best_ask.value());
        }
        asset_ids.append(true);
        prices.append(true);
        new_sizes.append(true);
        sides.append(true);
        best_bids.append(true);
        best_asks.append(true);
    }

    let mut columns = header.finish();
    columns.push(Arc::new(asset_ids.finish()));
    columns.push(Arc::new(prices.finish()));
    columns.push(Arc::new(new_sizes.finish()));
    columns.push(Arc::new(sides.finish()));
    columns.push(Arc::new(best_bids.finish()));
    columns.push(Arc::new(best_asks.finish()));

    Ok(RecordBatch::try_new(schema::book_delta_schema(), columns)?)
}

fn trade_events(events: &[OrderBookEvent]) -> Result<RecordBatch> {
    let mut header = HeaderColumns::new();
    let mut prices = Float64Builder::new();
    let mut sizes = Float64Builder::new();
    let mut sides = UInt8Builder::new();
    let mut fees = StringBuilder::new();

    for event in events {
        let OrderBookEvent::Trade(trade) = event else {
            continue;
        };
        header.append(&trade.header);
        prices.append_value(trade.price.value());
        sizes.append_value(trade.size.size());
        sides.append_value(trade.side.as_u8());
        fees.append_value(&trade.fee_rate_bps);
    }

    let mut columns = header.finish();
    columns.push(Arc::new(prices.finish()));
    columns.push(Arc::new(sizes.finish()));
    columns.push(Arc::new(sides.finish()));
    columns.push(Arc::new(fees.finish()));

    Ok(RecordBatch::try_new(schema::trade_event_schema(), columns)?)
}

fn tick_size_changes(events: &[OrderBookEvent]) -> Result<RecordBatch> {
    let mut header = HeaderColumns::new();
    let mut old_ticks = Float64Builder::new();
    let mut new_ticks = Float64Builder::new();

    for event in events {
        let OrderBookEvent::TickSize(change) = event else {
            continue;
        };
        header.append(&change.header);
        old_ticks.append_value(change.old_tick_size.value());
        new_ticks.append_value(change.new_tick_size.value());
    }

    let mut columns = header.finish();
    columns.push(Arc::new(old_ticks.finish()));
    columns.push(Arc::new(new_ticks.finish()));

    Ok(RecordBatch::try_new(
        schema::tick_size_change_schema(),
        columns,
    )?)
}

/// One book as the single row of a checkpoint file. Absent-trade columns
/// carry sentinel zeros / empty strings behind `has_trade = false`.
pub fn book_state(book: &OrderBook) -> Result<RecordBatch> {
    let mut condition_ids = StringBuilder::new();
    let mut token_ids = StringBuilder::new();
    let mut timestamps = Int64Builder::new();
    let mut sequences = UInt64Builder::new();
    let mut tick_sizes = Float64Builder::new();
    let mut hashes = StringBuilder::new();
    let mut bid_prices = ListBuilder::new(Float64Builder::new());
    let mut bid_sizes = ListBuilder::new(Float64Builder::new());
    let mut ask_prices = ListBuilder::new(Float64Builder::new());
    let mut ask_sizes = ListBuilder::new(Float64Builder::new());
    let mut trade_prices = Float64Builder::new();
    let mut trade_sizes = Float64Builder::new();
    let mut trade_sides = UInt8Builder::new();
    let mut trade_fees = StringBuilder::new();
    let mut trade_timestamps = Int64Builder::new();
    let mut has_trades = BooleanBuilder::new();

    condition_ids.append_value(book.asset().condition_id());
    token_ids.append_value(book.asset().token_id());
    timestamps.append_value(book.timestamp().millis());
    sequences.append_value(book.last_sequence_number());
    tick_sizes.append_value(book.tick_size().value());
    hashes.append_value(book.book_hash());
    append_levels(&mut bid_prices, &mut bid_sizes, book.bids());
    append_levels(&mut ask_prices, &mut ask_sizes, book.asks());

    match book.latest_trade() {
        Some(trade) => {
            trade_prices.append_value(trade.price.value());
            trade_sizes.append_value(trade.size.size());
            trade_sides.append_value(trade.side.as_u8());
            trade_fees.append_value(&trade.fee_rate_bps);
            trade_timestamps.append_value(trade.header.timestamp.millis());
            has_trades.append_value(true);
        }
        None => {
            trade_prices.append_value(0.0);
            trade_sizes.append_value(0.0);
            trade_sides.append_value(0);
            trade_fees.append_value("");
            trade_timestamps.append_value(0);
            has_trades.append_value(false);
        }
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(condition_ids.finish()),
        Arc::new(token_ids.finish()),
        Arc::new(timestamps.finish()),
        Arc::new(sequences.finish()),
        Arc::new(tick_sizes.finish()),
        Arc::new(hashes.finish()),
        Arc::new(bid_prices.finish()),
        Arc::new(bid_sizes.finish()),
        Arc::new(ask_prices.finish()),
        Arc::new(ask_sizes.finish()),
        Arc::new(trade_prices.finish()),
        Arc::new(trade_sizes.finish()),
        Arc::new(trade_sides.finish()),
        Arc::new(trade_fees.finish()),
        Arc::new(trade_timestamps.finish()),
        Arc::new(has_trades.finish()),
    ];

    Ok(RecordBatch::try_new(schema::book_state_schema(), columns)?)
}
