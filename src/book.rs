//! The order book aggregate: an immutable fold target for market events.
//!
//! Every `apply_*` returns a fresh book and leaves the receiver untouched.
//! Invariants held after every fold: bids strictly descending in price, asks
//! strictly ascending, no duplicate prices on a side, no zero-size levels, and
//! `last_sequence_number` tracks the applied event.

use crate::error::{Error, Result};
use crate::events::{
    BookDelta, BookSnapshot, OrderBookEvent, TickSizeChange, TradeEvent,
};
use crate::market::{MarketAsset, Price, PriceLevel, Quantity, Side, Spread, Timestamp};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    asset: MarketAsset,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    latest_trade: Option<TradeEvent>,
    tick_size: Price,
    timestamp: Timestamp,
    last_sequence_number: u64,
    book_hash: String,
}

impl OrderBook {
    /// A book that has seen no events: default tick, empty sides, sequence 0.
    pub fn empty(asset: MarketAsset) -> Self {
        OrderBook {
            asset,
            bids: Vec::new(),
            asks: Vec::new(),
            latest_trade: None,
            tick_size: Price::DEFAULT_TICK,
            timestamp: Timestamp::ZERO,
            last_sequence_number: 0,
            book_hash: String::new(),
        }
    }

    pub fn asset(&self) -> &MarketAsset {
        &self.asset
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn latest_trade(&self) -> Option<&TradeEvent> {
        self.latest_trade.as_ref()
    }

    pub fn tick_size(&self) -> Price {
        self.tick_size
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }

    pub fn book_hash(&self) -> &str {
        &self.book_hash
    }

    /// Fold one event of any kind.
    pub fn apply(&self, event: &OrderBookEvent) -> OrderBook {
        match event {
            OrderBookEvent::Snapshot(e) => self.apply_snapshot(e),
            OrderBookEvent::Delta(e) => self.apply_delta(e),
            OrderBookEvent::Trade(e) => self.apply_trade(e),
            OrderBookEvent::TickSize(e) => self.apply_tick_size_change(e),
        }
    }

    /// Replace both sides with the snapshot's levels. The snapshot carries no
    /// trade and no tick size, so both survive from the current book.
    pub fn apply_snapshot(&self, event: &BookSnapshot) -> OrderBook {
        let mut bids: Vec<PriceLevel> = event
            .bids
            .iter()
            .filter(|level| !level.size().is_zero())
            .copied()
            .collect();
        bids.sort_by(|a, b| b.price().cmp(&a.price()));

        let mut asks: Vec<PriceLevel> = event
            .asks
            .iter()
            .filter(|level| !level.size().is_zero())
            .copied()
            .collect();
        asks.sort_by(|a, b| a.price().cmp(&b.price()));

        OrderBook {
            asset: self.asset.clone(),
            bids,
            asks,
            latest_trade: self.latest_trade.clone(),
            tick_size: self.tick_size,
            timestamp: event.header.timestamp,
            last_sequence_number: event.header.sequence_number,
            book_hash: event.hash.clone(),
        }
    }

    /// Patch individual levels. Levels are matched by exact price equality;
    /// the upstream guarantees tick-aligned prices.
    pub fn apply_delta(&self, event: &BookDelta) -> OrderBook {
        let mut bids = self.bids.clone();
        let mut asks = self.asks.clone();

        for change in &event.changes {
            match change.side {
                Side::Buy => update_levels(&mut bids, change.price, change.new_size, SortOrder::Descending),
                Side::Sell => update_levels(&mut asks, change.price, change.new_size, SortOrder::Ascending),
            }
        }

        OrderBook {
            asset: self.asset.clone(),
            bids,
            asks,
            latest_trade: self.latest_trade.clone(),
            tick_size: self.tick_size,
            timestamp: event.header.timestamp,
            last_sequence_number: event.header.sequence_number,
            book_hash: self.book_hash.clone(),
        }
    }

    /// Record the trade without touching the sides; upstream always follows a
    /// trade with a snapshot that carries the post-trade book.
    pub fn apply_trade(&self, event: &TradeEvent) -> OrderBook {
        OrderBook {
            asset: self.asset.clone(),
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            latest_trade: Some(event.clone()),
            tick_size: self.tick_size,
            timestamp: event.header.timestamp,
            last_sequence_number: event.header.sequence_number,
            book_hash: self.book_hash.clone(),
        }
    }

    pub fn apply_tick_size_change(&self, event: &TickSizeChange) -> OrderBook {
        OrderBook {
            asset: self.asset.clone(),
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            latest_trade: self.latest_trade.clone(),
            tick_size: event.new_tick_size,
            timestamp: event.header.timestamp,
            last_sequence_number: event.header.sequence_number,
            book_hash: self.book_hash.clone(),
        }
    }

    pub fn best_bid(&self) -> Result<Price> {
        self.bids
            .first()
            .map(PriceLevel::price)
            .ok_or(Error::EmptyBookSide("bids"))
    }

    pub fn best_ask(&self) -> Result<Price> {
        self.asks
            .first()
            .map(PriceLevel::price)
            .ok_or(Error::EmptyBookSide("asks"))
    }

    pub fn spread(&self) -> Result<Spread> {
        Ok(Spread {
            best_bid: self.best_bid()?,
            best_ask: self.best_ask()?,
        })
    }

    pub fn midpoint(&self) -> Result<Price> {
        let bid = self.best_bid()?.value();
        let ask = self.best_ask()?.value();
        Price::new((bid + ask) / 2.0)
    }

    /// Number of levels on the deeper side.
    pub fn depth(&self) -> usize {
        self.bids.len().max(self.asks.len())
    }
}

#[derive(Clone, Copy)]
enum SortOrder {
    Descending,
    Ascending,
}

fn update_levels(levels: &mut Vec<PriceLevel>, price: Price, new_size: Quantity, order: SortOrder) {
    let existing = levels.iter().position(|level| level.price() == price);

    if new_size.is_zero() {
        if let Some(index) = existing {
            levels.remove(index);
        }
    } else if let Some(index) = existing {
        levels[index] = PriceLevel::new(price, new_size);
    } else {
        let index = match order {
            SortOrder::Descending => levels.partition_point(|level| level.price() > price),
            SortOrder::Ascending => levels.partition_point(|level| level.price() < price),
        };
        levels.insert(index, PriceLevel::new(price, new_size));
    }
}
