//! Cold-start reconstruction.
//!
//! A restart does not replay history from sequence 1: it loads the latest
//! checkpoint for an asset and folds only the events the log holds after it.

use crate::book::OrderBook;
use crate::error::Result;
use crate::market::MarketAsset;
use crate::repository::OrderBookRepository;

/// Rebuild the current book for `asset` from the repository: latest snapshot
/// (or an empty book) plus every event logged after it.
pub fn reconstruct_book(
    repository: &dyn OrderBookRepository,
    asset: &MarketAsset,
) -> Result<OrderBook> {
    let mut book = match repository.get_latest_snapshot(asset)? {
        Some(snapshot) => snapshot,
        None => OrderBook::empty(asset.clone()),
    };

    let events = repository.get_events_since(asset, book.last_sequence_number())?;
    log::debug!(
        "reconstructing {} from sequence {} with {} events",
        asset.token_id(),
        book.last_sequence_number(),
        events.len()
    );

    for event in &events {
        book = book.apply(event);
    }
    Ok(book)
}
