//! Arrow schemas for the persisted event and checkpoint files.
//!
//! The first four columns are identical across all event types so generic
//! row filtering (sequence + asset) never needs to know the kind.

use std::sync::Arc;

use arrow::array::Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};
use crate::events::EventKind;

fn base_event_fields() -> Vec<Field> {
    vec![
        Field::new("condition_id", DataType::Utf8, false),
        Field::new("token_id", DataType::Utf8, false),
        Field::new("timestamp_ms", DataType::Int64, false),
        Field::new("sequence_number", DataType::UInt64, false),
    ]
}

fn list_of(name: &str, item: DataType) -> Field {
    // ListBuilder produces a nullable item field named "item"; the schema has
    // to match it exactly.
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", item, true))),
        false,
    )
}

fn extend(mut base: Vec<Field>, extra: Vec<Field>) -> SchemaRef {
    base.extend(extra);
    Arc::new(Schema::new(base))
}

pub fn event_schema(kind: EventKind) -> SchemaRef {
    match kind {
        EventKind::BookSnapshot => book_snapshot_schema(),
        EventKind::BookDelta => book_delta_schema(),
        EventKind::TradeEvent => trade_event_schema(),
        EventKind::TickSizeChange => tick_size_change_schema(),
    }
}

pub fn book_snapshot_schema() -> SchemaRef {
    extend(
        base_event_fields(),
        vec![
            Field::new("hash", DataType::Utf8, false),
            list_of("bid_prices", DataType::Float64),
            list_of("bid_sizes", DataType::Float64),
            list_of("ask_prices", DataType::Float64),
            list_of("ask_sizes", DataType::Float64),
        ],
    )
}

pub fn book_delta_schema() -> SchemaRef {
    extend(
        base_event_fields(),
        vec![
            list_of("change_asset_ids", DataType::Utf8),
            list_of("change_prices", DataType::Float64),
            list_of("change_new_sizes", DataType::Float64),
            list_of("change_sides", DataType::UInt8),
            list_of("change_best_bids", DataType::Float64),
            list_of("change_best_asks", DataType::Float64),
        ],
    )
}

pub fn trade_event_schema() -> SchemaRef {
    extend(
        base_event_fields(),
        vec![
            Field::new("price", DataType::Float64, false),
            Field::new("size", DataType::Float64, false),
            Field::new("side", DataType::UInt8, false),
            Field::new("fee_rate_bps", DataType::Utf8, false),
        ],
    )
}

pub fn tick_size_change_schema() -> SchemaRef {
    extend(
        base_event_fields(),
        vec![
            Field::new("old_tick_size", DataType::Float64, false),
            Field::new("new_tick_size", DataType::Float64, false),
        ],
    )
}

/// Single-row per-asset checkpoint: trade state and book in one record.
pub fn book_state_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("condition_id", DataType::Utf8, false),
        Field::new("token_id", DataType::Utf8, false),
        Field::new("timestamp_ms", DataType::Int64, false),
        Field::new("sequence_number", DataType::UInt64, false),
        Field::new("tick_size", DataType::Float64, false),
        Field::new("book_hash", DataType::Utf8, false),
        list_of("bid_prices", DataType::Float64),
        list_of("bid_sizes", DataType::Float64),
        list_of("ask_prices", DataType::Float64),
        list_of("ask_sizes", DataType::Float64),
        Field::new("trade_price", DataType::Float64, false),
        Field::new("trade_size", DataType::Float64, false),
        Field::new("trade_side", DataType::UInt8, false),
        Field::new("trade_fee_rate_bps", DataType::Utf8, false),
        Field::new("trade_timestamp_ms", DataType::Int64, false),
        Field::new("has_trade", DataType::Boolean, false),
    ]))
}

/// Look a column up by name and downcast it to its concrete array type.
pub(crate) fn get_array<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let index = batch
        .schema()
        .column_with_name(name)
        .ok_or_else(|| Error::Schema(format!("missing column {name}")))?
        .0;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Schema(format!("column {name} has unexpected type")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_header_columns_lead_every_event_schema() {
        for kind in EventKind::ALL {
            let schema = event_schema(kind);
            let names: Vec<_> = schema
                .fields()
                .iter()
                .take(4)
                .map(|f| f.name().as_str())
                .collect();
            assert_eq!(
                names,
                ["condition_id", "token_id", "timestamp_ms", "sequence_number"],
                "kind {:?}",
                kind
            );
        }
    }

    #[test]
    fn book_state_schema_has_sixteen_columns() {
        assert_eq!(book_state_schema().fields().len(), 16);
    }
}
