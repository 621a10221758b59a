//! Persistence port for the ingestion service.
//!
//! Two independent stores behind one contract: the append-only event log
//! (source of truth) and the per-asset book checkpoint (bounded replay).

pub mod columnar;

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::book::OrderBook;
use crate::error::Result;
use crate::events::OrderBookEvent;
use crate::market::MarketAsset;

pub use columnar::ColumnarOrderBookRepository;

pub trait OrderBookRepository: Send + Sync {
    /// Durable append. Events for an asset must read back in sequence order.
    fn append_event(&self, event: &OrderBookEvent) -> Result<()>;

    /// Every event for `asset` with sequence strictly greater than
    /// `sequence_number`, ascending, including any buffered but unflushed
    /// events.
    fn get_events_since(
        &self,
        asset: &MarketAsset,
        sequence_number: u64,
    ) -> Result<Vec<OrderBookEvent>>;

    /// Overwrite the single checkpoint for `book.asset()`.
    fn store_snapshot(&self, book: &OrderBook) -> Result<()>;

    /// The last stored checkpoint, or `None` if one was never written.
    fn get_latest_snapshot(&self, asset: &MarketAsset) -> Result<Option<OrderBook>>;
}

/// Reference implementation: a vector and a map. Used by the service tests
/// and by deployments that only want the live projection.
#[derive(Default)]
pub struct InMemoryOrderBookRepository {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    events: Vec<OrderBookEvent>,
    snapshots: BTreeMap<MarketAsset, OrderBook>,
}

impl InMemoryOrderBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().expect("repository lock").events.len()
    }

    pub fn events(&self) -> Vec<OrderBookEvent> {
        self.inner.lock().expect("repository lock").events.clone()
    }

    pub fn has_snapshot(&self, asset: &MarketAsset) -> bool {
        self.inner
            .lock()
            .expect("repository lock")
            .snapshots
            .contains_key(asset)
    }
}

impl OrderBookRepository for InMemoryOrderBookRepository {
    fn append_event(&self, event: &OrderBookEvent) -> Result<()> {
        self.inner
            .lock()
            .expect("repository lock")
            .events
            .push(event.clone());
        Ok(())
    }

    fn get_events_since(
        &self,
        asset: &MarketAsset,
        sequence_number: u64,
    ) -> Result<Vec<OrderBookEvent>> {
        let inner = self.inner.lock().expect("repository lock");
        let mut result: Vec<OrderBookEvent> = inner
            .events
            .iter()
            .filter(|event| event.asset() == asset && event.sequence_number() > sequence_number)
            .cloned()
            .collect();
        result.sort_by_key(|event| event.sequence_number());
        Ok(result)
    }

    fn store_snapshot(&self, book: &OrderBook) -> Result<()> {
        self.inner
            .lock()
            .expect("repository lock")
            .snapshots
            .insert(book.asset().clone(), book.clone());
        Ok(())
    }

    fn get_latest_snapshot(&self, asset: &MarketAsset) -> Result<Option<OrderBook>> {
        Ok(self
            .inner
            .lock()
            .expect("repository lock")
            .snapshots
            .get(asset)
            .cloned())
    }
}
