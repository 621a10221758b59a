//! Record batches back into domain events and books.
//!
//! Row-level filtering happens here: partition placement is only a locality
//! hint, so every row is checked against the requested asset and minimum
//! sequence before it is reconstructed.

use arrow::array::{
    Array, BooleanArray, Float64Array, Int64Array, ListArray, StringArray, UInt64Array, UInt8Array,
};
use arrow::record_batch::RecordBatch;

use crate::book::OrderBook;
use crate::error::{Error, Result};
use crate::events::{
    BookDelta, BookSnapshot, EventHeader, EventKind, OrderBookEvent, PriceLevelDelta,
    TickSizeChange, TradeEvent,
};
use crate::market::{MarketAsset, Price, PriceLevel, Quantity, Side, Timestamp};

use super::schema::get_array;

/// Append every row of `batch` that belongs to `asset` and sits strictly
/// after `min_sequence`, reconstructed as events of `kind`.
pub fn events_from_batch(
    kind: EventKind,
    batch: &RecordBatch,
    asset: &MarketAsset,
    min_sequence: u64,
    out: &mut Vec<OrderBookEvent>,
) -> Result<()> {
    let condition_ids = get_array::<StringArray>(batch, "condition_id")?;
    let token_ids = get_array::<StringArray>(batch, "token_id")?;
    let timestamps = get_array::<Int64Array>(batch, "timestamp_ms")?;
    let sequences = get_array::<UInt64Array>(batch, "sequence_number")?;

    for row in 0..batch.num_rows() {
        let sequence = sequences.value(row);
        if sequence <= min_sequence {
            continue;
        }
        if token_ids.value(row) != asset.token_id()
            || condition_ids.value(row) != asset.condition_id()
        {
            continue;
        }

        let header = EventHeader {
            asset: asset.clone(),
            timestamp: Timestamp::new(timestamps.value(row))?,
            sequence_number: sequence,
        };

        let event = match kind {
            EventKind::BookSnapshot => book_snapshot_row(batch, row, header)?,
            EventKind::BookDelta => book_delta_row(batch, row, header)?,
            EventKind::TradeEvent => trade_event_row(batch, row, header)?,
            EventKind::TickSizeChange => tick_size_change_row(batch, row, header)?,
        };
        out.push(event);
    }

    Ok(())
}

fn book_snapshot_row(batch: &RecordBatch, row: usize, header: EventHeader) -> Result<OrderBookEvent> {
    let hash = get_array::<StringArray>(batch, "hash")?.value(row).to_string();
    let bids = levels_at(batch, "bid_prices", "bid_sizes", row)?;
    let asks = levels_at(batch, "ask_prices", "ask_sizes", row)?;
    Ok(OrderBookEvent::Snapshot(BookSnapshot {
        header,
        bids,
        asks,
        hash,
    }))
}

fn book_delta_row(batch: &RecordBatch, row: usize, header: EventHeader) -> Result<OrderBookEvent> {
    let asset_ids = list_strings(get_array::<ListArray>(batch, "change_asset_ids")?, row)?;
    let prices = list_f64(get_array::<ListArray>(batch, "change_prices")?, row)?;
    let new_sizes = list_f64(get_array::<ListArray>(batch, "change_new_sizes")?, row)?;
    let sides = list_u8(get_array::<ListArray>(batch, "change_sides")?, row)?;
    let best_bids = list_f64(get_array::<ListArray>(batch, "change_best_bids")?, row)?;
    let best_asks = list_f64(get_array::<ListArray>(batch, "change_best_asks")?, row)?;

    let len = asset_ids.len();
    if [prices.len(), new_sizes.len(), sides.len(), best_bids.len(), best_asks.len()]
        .iter()
        .any(|&l| l != len)
    {
        return Err(Error::Schema(
            "book_delta change lists have mismatched lengths".to_string(),
        ));
    }

    let mut changes = Vec::with_capacity(len);
    for i in 0..len {
        changes.push(PriceLevelDelta {
            asset_id: asset_ids[i].clone(),
            price: Price::new(prices[i])?,
            new_size: Quantity::new(new_sizes[i])?,
            side: Side::from_u8(sides[i])?,
            best_bid: Price::new(best_bids[i])?,
            best_ask: Price::new(best_asks[i])?,
        });
    }

    Ok(OrderBookEvent::Delta(BookDelta { header, changes }))
}

fn trade_event_row(batch: &RecordBatch, row: usize, header: EventHeader) -> Result<OrderBookEvent> {
    Ok(OrderBookEvent::Trade(TradeEvent {
        header,
        price: Price::new(get_array::<Float64Array>(batch, "price")?.value(row))?,
        size: Quantity::new(get_array::<Float64Array>(batch, "size")?.value(row))?,
        side: Side::from_u8(get_array::<UInt8Array>(batch, "side")?.value(row))?,
        fee_rate_bps: get_array::<StringArray>(batch, "fee_rate_bps")?
            .value(row)
            .to_string(),
    }))
}

fn tick_size_change_row(
    batch: &RecordBatch,
    row: usize,
    header: EventHeader,
) -> Result<OrderBookEvent> {
    Ok(OrderBookEvent::TickSize(TickSizeChange {
        header,
        old_tick_size: Price::new(get_array::<Float64Array>(batch, "old_tick_size")?.value(row))?,
        new_tick_size: Price::new(get_array::<Float64Array>(batch, "new_tick_size")?.value(row))?,
    }))
}

/// Rebuild a book from the single row of a checkpoint file.
///
/// Returns `None` when the file is empty or records a different asset than
/// the one requested. The book is reconstructed through the same folds the
/// live path uses: a synthetic snapshot, then a tick-size change if the
/// stored tick differs from the default, then the stored trade if present.
pub fn book_from_state(batch: &RecordBatch, asset: &MarketAsset) -> Result<Option<OrderBook>> {
    if batch.num_rows() == 0 {
        return Ok(None);
    }

    let condition_id = get_array::<StringArray>(batch, "condition_id")?.value(0);
    let token_id = get_array::<StringArray>(batch, "token_id")?.value(0);
    if token_id != asset.token_id() || condition_id != asset.condition_id() {
        return Ok(None);
    }

    let timestamp = Timestamp::new(get_array::<Int64Array>(batch, "timestamp_ms")?.value(0))?;
    let sequence = get_array::<UInt64Array>(batch, "sequence_number")?.value(0);
    let hash = get_array::<StringArray>(batch, "book_hash")?.value(0).to_string();

    let snapshot = BookSnapshot {
        header: EventHeader {
            asset: asset.clone(),
            timestamp,
            sequence_number: sequence,
        },
        bids: levels_at(batch, "bid_prices", "bid_sizes", 0)?,
        asks: levels_at(batch, "ask_prices", "ask_sizes", 0)?,
        hash,
    };
    let mut book = OrderBook::empty(asset.clone()).apply_snapshot(&snapshot);

    let tick_size = get_array::<Float64Array>(batch, "tick_size")?.value(0);
    if tick_size != Price::DEFAULT_TICK.value() {
        book = book.apply_tick_size_change(&TickSizeChange {
            header: EventHeader {
                asset: asset.clone(),
                timestamp,
                sequence_number: sequence,
            },
            old_tick_size: Price::DEFAULT_TICK,
            new_tick_size: Price::new(tick_size)?,
        });
    }

    if get_array::<BooleanArray>(batch, "has_trade")?.value(0) {
        book = book.apply_trade(&TradeEvent {
            header: EventHeader {
                asset: asset.clone(),
                timestamp: Timestamp::new(
                    get_array::<Int64Array>(batch, "trade_timestamp_ms")?.value(0),
                )?,
                sequence_number: sequence,
            },
            price: Price::new(get_array::<Float64Array>(batch, "trade_price")?.value(0))?,
            size: Quantity::new(get_array::<Float64Array>(batch, "trade_size")?.value(0))?,
            side: Side::from_u8(get_array::<UInt8Array>(batch, "trade_side")?.value(0))?,
            fee_rate_bps: get_array::<StringArray>(batch, "trade_fee_rate_bps")?
                .value(0)
                .to_string(),
        });
    }

    Ok(Some(book))
}

fn levels_at(
    batch: &RecordBatch,
    prices_column: &str,
    sizes_column: &str,
    row: usize,
) -> Result<Vec<PriceLevel>> {
    let prices = list_f64(get_array::<ListArray>(batch, prices_column)?, row)?;
    let sizes = list_f64(get_array::<ListArray>(batch, sizes_column)?, row)?;
    if prices.len() != sizes.len() {
        return Err(Error::Schema(format!(
            "{prices_column}/{sizes_column} lists have mismatched lengths"
        )));
    }
    prices
        .into_iter()
        .zip(sizes)
        .map(|(price, size)| Ok(PriceLevel::new(Price::new(price)?, Quantity::new(size)?)))
        .collect()
}

fn list_f64(list: &ListArray, row: usize) -> Result<Vec<f64>> {
    let values = list.value(row);
    let values = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Schema("list items are not float64".to_string()))?;
    Ok((0..values.len()).map(|i| values.value(i)).collect())
}

fn list_u8(list: &ListArray, row: usize) -> Result<Vec<u8>> {
    let values = list.value(row);
    let values = values
        .as_any()
        .downcast_ref::<UInt8Array>()
        .ok_or_else(|| Error::Schema("list items are not uint8".to_string()))?;
    Ok((0..values.len()).map(|i| values.value(i)).collect())
}

fn list_strings(list: &ListArray, row: usize) -> Result<Vec<String>> {
    let values = list.value(row);
    let values = values
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Schema("list items are not utf8".to_string()))?;
    Ok((0..values.len()).map(|i| values.value(i).to_string()).collect())
}
