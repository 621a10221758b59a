//! The four market event records and the closed variant they form.
//!
//! Events arrive from the feed with `sequence_number = 0`; the service assigns
//! the real global ordinal before anything else sees them.

use crate::market::{MarketAsset, Price, PriceLevel, Quantity, Side, Timestamp};

/// Fields shared by every event kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHeader {
    pub asset: MarketAsset,
    pub timestamp: Timestamp,
    pub sequence_number: u64,
}

/// Full replacement of both sides of a book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSnapshot {
    pub header: EventHeader,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Opaque upstream digest; may be empty.
    pub hash: String,
}

/// One price-level change inside a [`BookDelta`].
///
/// `new_size == 0` removes the level. The upstream asset id and BBO are kept
/// for the persisted record but play no part in the fold.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevelDelta {
    pub asset_id: String,
    pub price: Price,
    pub new_size: Quantity,
    pub side: Side,
    pub best_bid: Price,
    pub best_ask: Price,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookDelta {
    pub header: EventHeader,
    pub changes: Vec<PriceLevelDelta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub header: EventHeader,
    pub price: Price,
    pub size: Quantity,
    pub side: Side,
    pub fee_rate_bps: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickSizeChange {
    pub header: EventHeader,
    pub old_tick_size: Price,
    pub new_tick_size: Price,
}

/// The closed event domain. Adding a variant is a deliberate breaking change:
/// every match over this enum is exhaustive so the compiler finds the folds
/// that need updating.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderBookEvent {
    Snapshot(BookSnapshot),
    Delta(BookDelta),
    Trade(TradeEvent),
    TickSize(TickSizeChange),
}

impl OrderBookEvent {
    pub fn header(&self) -> &EventHeader {
        match self {
            OrderBookEvent::Snapshot(e) => &e.header,
            OrderBookEvent::Delta(e) => &e.header,
            OrderBookEvent::Trade(e) => &e.header,
            OrderBookEvent::TickSize(e) => &e.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut EventHeader {
        match self {
            OrderBookEvent::Snapshot(e) => &mut e.header,
            OrderBookEvent::Delta(e) => &mut e.header,
            OrderBookEvent::Trade(e) => &mut e.header,
            OrderBookEvent::TickSize(e) => &mut e.header,
        }
    }

    pub fn asset(&self) -> &MarketAsset {
        &self.header().asset
    }

    pub fn timestamp(&self) -> Timestamp {
        self.header().timestamp
    }

    pub fn sequence_number(&self) -> u64 {
        self.header().sequence_number
    }

    pub fn kind(&self) -> EventKind {
        match self {
            OrderBookEvent::Snapshot(_) => EventKind::BookSnapshot,
            OrderBookEvent::Delta(_) => EventKind::BookDelta,
            OrderBookEvent::Trade(_) => EventKind::TradeEvent,
            OrderBookEvent::TickSize(_) => EventKind::TickSizeChange,
        }
    }
}

/// Persisted type tag for an event; doubles as the storage shard name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BookSnapshot,
    BookDelta,
    TradeEvent,
    TickSizeChange,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::BookSnapshot,
        EventKind::BookDelta,
        EventKind::TradeEvent,
        EventKind::TickSizeChange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BookSnapshot => "book_snapshot",
            EventKind::BookDelta => "book_delta",
            EventKind::TradeEvent => "trade_event",
            EventKind::TickSizeChange => "tick_size_change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Quantity;

    fn asset() -> MarketAsset {
        MarketAsset::new("0xbd31dc", "6581861").unwrap()
    }

    fn header(seq: u64) -> EventHeader {
        EventHeader {
            asset: asset(),
            timestamp: Timestamp::new(1_000).unwrap(),
            sequence_number: seq,
        }
    }

    #[test]
    fn kind_maps_to_storage_names() {
        let trade = OrderBookEvent::Trade(TradeEvent {
            header: header(0),
            price: Price::new(0.5).unwrap(),
            size: Quantity::new(10.0).unwrap(),
            side: Side::Buy,
            fee_rate_bps: "0".to_string(),
        });
        assert_eq!(trade.kind(), EventKind::TradeEvent);
        assert_eq!(trade.kind().as_str(), "trade_event");
        assert_eq!(EventKind::ALL.len(), 4);
    }

    #[test]
    fn header_mut_renumbers_any_variant() {
        let mut event = OrderBookEvent::TickSize(TickSizeChange {
            header: header(0),
            old_tick_size: Price::new(0.01).unwrap(),
            new_tick_size: Price::new(0.001).unwrap(),
        });
        event.header_mut().sequence_number = 42;
        assert_eq!(event.sequence_number(), 42);
        assert_eq!(event.asset(), &asset());
    }
}
