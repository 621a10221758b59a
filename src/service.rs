//! Projection engine: one owner of per-asset book state.
//!
//! The feed drives the service through the callback installed by [`attach`];
//! delivery is single-threaded in callback order, so sequence assignment and
//! projection updates need no coordination beyond the interior lock that lets
//! queries run from other threads.
//!
//! [`attach`]: OrderBookService::attach

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::book::OrderBook;
use crate::error::{Error, Result};
use crate::events::OrderBookEvent;
use crate::market::{MarketAsset, Price, Spread};
use crate::repository::OrderBookRepository;

pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 1000;

/// Invoked by the feed once per parsed event. A returned error tells the feed
/// the event was not ingested (repository append failed, etc.).
pub type EventCallback = Box<dyn FnMut(OrderBookEvent) -> Result<()> + Send>;

/// The transport contract the service consumes. Implementations deliver
/// events for all subscribed assets on a single logical thread.
pub trait MarketDataFeed {
    fn set_on_event(&mut self, callback: EventCallback);
    fn subscribe(&mut self, token_id: &str);
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
}

struct Projection {
    books: BTreeMap<MarketAsset, OrderBook>,
    next_sequence_number: u64,
}

pub struct OrderBookService {
    repository: Arc<dyn OrderBookRepository>,
    projection: Mutex<Projection>,
    /// Checkpoint every Nth ingested event (by global sequence); 0 disables.
    snapshot_interval: u64,
}

impl OrderBookService {
    pub fn new(repository: Arc<dyn OrderBookRepository>, snapshot_interval: u64) -> Arc<Self> {
        Arc::new(OrderBookService {
            repository,
            projection: Mutex::new(Projection {
                books: BTreeMap::new(),
                next_sequence_number: 1,
            }),
            snapshot_interval,
        })
    }

    /// Construct and install the ingestion callback on `feed` in one step.
    pub fn with_feed(
        repository: Arc<dyn OrderBookRepository>,
        feed: &mut dyn MarketDataFeed,
        snapshot_interval: u64,
    ) -> Arc<Self> {
        let service = Self::new(repository, snapshot_interval);
        service.attach(feed);
        service
    }

    /// Install this service's `on_event` as the feed's callback.
    pub fn attach(self: &Arc<Self>, feed: &mut dyn MarketDataFeed) {
        let service = Arc::clone(self);
        feed.set_on_event(Box::new(move |event| service.on_event(event)));
    }

    /// Ingest one event: assign the next global sequence number, persist,
    /// fold into the projection, and checkpoint on the snapshot interval.
    pub fn on_event(&self, mut event: OrderBookEvent) -> Result<()> {
        let mut projection = self.lock();

        let sequence = projection.next_sequence_number;
        event.header_mut().sequence_number = sequence;
        projection.next_sequence_number += 1;

        self.repository.append_event(&event)?;

        let asset = event.asset().clone();
        let current = projection.books.entry(asset).or_insert_with_key(|asset| {
            log::info!(
                "tracking new asset {}/{}",
                asset.condition_id(),
                asset.token_id()
            );
            OrderBook::empty(asset.clone())
        });
        *current = current.apply(&event);

        if self.snapshot_interval > 0 && sequence % self.snapshot_interval == 0 {
            self.repository.store_snapshot(current)?;
        }
        Ok(())
    }

    /// The current projection for `asset`, or an unknown-asset error if no
    /// event has referenced it.
    pub fn current_book(&self, asset: &MarketAsset) -> Result<OrderBook> {
        self.lock()
            .books
            .get(asset)
            .cloned()
            .ok_or_else(|| Error::UnknownAsset(asset.clone()))
    }

    pub fn current_spread(&self, asset: &MarketAsset) -> Result<Spread> {
        self.current_book(asset)?.spread()
    }

    pub fn midpoint(&self, asset: &MarketAsset) -> Result<Price> {
        self.current_book(asset)?.midpoint()
    }

    /// First tracked asset with this token id. Linear; called once per asset
    /// at startup, not on the hot path.
    pub fn resolve_asset(&self, token_id: &str) -> Option<MarketAsset> {
        self.lock()
            .books
            .keys()
            .find(|asset| asset.token_id() == token_id)
            .cloned()
    }

    /// Events ingested so far.
    pub fn event_count(&self) -> u64 {
        self.lock().next_sequence_number - 1
    }

    /// Assets with a live projection.
    pub fn book_count(&self) -> usize {
        self.lock().books.len()
    }

    fn lock(&self) -> MutexGuard<'_, Projection> {
        self.projection.lock().expect("projection lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BookDelta, BookSnapshot, EventHeader, PriceLevelDelta, TradeEvent};
    use crate::market::{PriceLevel, Quantity, Side, Timestamp};
    use crate::repository::InMemoryOrderBookRepository;

    struct FakeFeed {
        on_event: Option<EventCallback>,
    }

    impl FakeFeed {
        fn new() -> Self {
            FakeFeed { on_event: None }
        }

        fn emit(&mut self, event: OrderBookEvent) -> Result<()> {
            match self.on_event.as_mut() {
                Some(callback) => callback(event),
                None => Ok(()),
            }
        }
    }

    impl MarketDataFeed for FakeFeed {
        fn set_on_event(&mut self, callback: EventCallback) {
            self.on_event = Some(callback);
        }

        fn subscribe(&mut self, _token_id: &str) {}

        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}
    }

    fn asset() -> MarketAsset {
        MarketAsset::new("0xbd31dc", "6581861").unwrap()
    }

    fn header(ts: i64) -> EventHeader {
        EventHeader {
            asset: asset(),
            timestamp: Timestamp::new(ts).unwrap(),
            sequence_number: 0,
        }
    }

    fn level(price: f64, size: f64) -> PriceLevel {
        PriceLevel::new(Price::new(price).unwrap(), Quantity::new(size).unwrap())
    }

    fn snapshot() -> OrderBookEvent {
        OrderBookEvent::Snapshot(BookSnapshot {
            header: header(1_000),
            bids: vec![level(0.48, 30.0), level(0.49, 20.0)],
            asks: vec![level(0.52, 25.0), level(0.53, 60.0)],
            hash: "0xabc".to_string(),
        })
    }

    fn trade() -> OrderBookEvent {
        OrderBookEvent::Trade(TradeEvent {
            header: header(2_000),
            price: Price::new(0.50).unwrap(),
            size: Quantity::new(10.0).unwrap(),
            side: Side::Buy,
            fee_rate_bps: "0".to_string(),
        })
    }

    fn delta() -> OrderBookEvent {
        OrderBookEvent::Delta(BookDelta {
            header: header(2_000),
            changes: vec![PriceLevelDelta {
                asset_id: "6581861".to_string(),
                price: Price::new(0.50).unwrap(),
                new_size: Quantity::new(100.0).unwrap(),
                side: Side::Buy,
                best_bid: Price::new(0.50).unwrap(),
                best_ask: Price::new(0.52).unwrap(),
            }],
        })
    }

    #[test]
    fn persists_event_and_updates_projection() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let mut feed = FakeFeed::new();
        let service =
            OrderBookService::with_feed(repo.clone(), &mut feed, DEFAULT_SNAPSHOT_INTERVAL);

        feed.emit(snapshot()).unwrap();

        assert_eq!(repo.event_count(), 1);
        let book = service.current_book(&asset()).unwrap();
        assert_eq!(book.depth(), 2);
        assert_eq!(book.best_bid().unwrap(), Price::new(0.49).unwrap());
        assert_eq!(book.best_ask().unwrap(), Price::new(0.52).unwrap());
    }

    #[test]
    fn assigns_global_sequence_numbers_from_one() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let mut feed = FakeFeed::new();
        let service =
            OrderBookService::with_feed(repo.clone(), &mut feed, DEFAULT_SNAPSHOT_INTERVAL);

        feed.emit(snapshot()).unwrap();
        feed.emit(trade()).unwrap();

        let events = repo.events();
        assert_eq!(events[0].sequence_number(), 1);
        assert_eq!(events[1].sequence_number(), 2);
        assert_eq!(service.event_count(), 2);
    }

    #[test]
    fn applies_events_in_sequence() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);

        service.on_event(snapshot()).unwrap();
        service.on_event(delta()).unwrap();

        let book = service.current_book(&asset()).unwrap();
        assert_eq!(book.depth(), 3);
        assert_eq!(book.best_bid().unwrap(), Price::new(0.50).unwrap());
        assert_eq!(book.last_sequence_number(), 2);
    }

    #[test]
    fn tracks_latest_trade() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);

        service.on_event(snapshot()).unwrap();
        service.on_event(trade()).unwrap();

        let book = service.current_book(&asset()).unwrap();
        let latest = book.latest_trade().expect("trade recorded");
        assert_eq!(latest.price, Price::new(0.50).unwrap());
    }

    #[test]
    fn spread_and_midpoint_queries() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);
        service.on_event(snapshot()).unwrap();

        let spread = service.current_spread(&asset()).unwrap();
        assert_eq!(spread.best_bid, Price::new(0.49).unwrap());
        assert_eq!(spread.best_ask, Price::new(0.52).unwrap());
        assert!((service.midpoint(&asset()).unwrap().value() - 0.505).abs() < 1e-12);
    }

    #[test]
    fn unknown_asset_query_fails() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);
        let missing = MarketAsset::new("0xnope", "1").unwrap();
        assert!(matches!(
            service.current_book(&missing),
            Err(Error::UnknownAsset(_))
        ));
    }

    #[test]
    fn resolves_asset_by_token_id() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);
        service.on_event(snapshot()).unwrap();

        assert_eq!(service.resolve_asset("6581861"), Some(asset()));
        assert_eq!(service.resolve_asset("0000000"), None);
        assert_eq!(service.book_count(), 1);
    }

    #[test]
    fn snapshot_interval_checkpoints_every_nth_event() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo.clone(), 3);

        service.on_event(snapshot()).unwrap();
        service.on_event(delta()).unwrap();
        assert!(!repo.has_snapshot(&asset()));

        service.on_event(trade()).unwrap();
        assert!(repo.has_snapshot(&asset()));

        let checkpoint = repo.get_latest_snapshot(&asset()).unwrap().unwrap();
        assert_eq!(checkpoint.last_sequence_number(), 3);
    }

    #[test]
    fn zero_interval_never_snapshots() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo.clone(), 0);

        for _ in 0..10 {
            service.on_event(delta()).unwrap();
        }
        assert!(!repo.has_snapshot(&asset()));
        assert_eq!(service.event_count(), 10);
    }

    #[test]
    fn lazily_creates_books_per_asset() {
        let repo = Arc::new(InMemoryOrderBookRepository::new());
        let service = OrderBookService::new(repo, DEFAULT_SNAPSHOT_INTERVAL);

        let other = MarketAsset::new("0xother", "999").unwrap();
        let mut event = trade();
        event.header_mut().asset = other.clone();

        service.on_event(snapshot()).unwrap();
        service.on_event(event).unwrap();

        assert_eq!(service.book_count(), 2);
        // The trade landed on a fresh empty book for the other asset.
        let book = service.current_book(&other).unwrap();
        assert_eq!(book.depth(), 0);
        assert!(book.latest_trade().is_some());
    }
}
