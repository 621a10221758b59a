pub mod book;
pub mod error;
pub mod events;
pub mod fs;
pub mod layout;
pub mod market;
pub mod replay;
pub mod repository;
pub mod service;
pub mod settings;

pub use book::OrderBook;
pub use error::{Error, Result};
pub use events::{
    BookDelta, BookSnapshot, EventHeader, EventKind, OrderBookEvent, PriceLevelDelta,
    TickSizeChange, TradeEvent,
};
pub use market::{MarketAsset, Price, PriceLevel, Quantity, Side, Spread, Timestamp};
pub use repository::{InMemoryOrderBookRepository, OrderBookRepository};
pub use service::{EventCallback, MarketDataFeed, OrderBookService};
