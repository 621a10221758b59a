use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use polybook::replay::reconstruct_book;
use polybook::repository::columnar::DEFAULT_WRITE_BUFFER_SIZE;
use polybook::repository::{ColumnarOrderBookRepository, OrderBookRepository};
use polybook::MarketAsset;

/// Rebuild an order book from a captured data directory and print it.
#[derive(Parser, Debug)]
#[command(name = "polybook-replay")]
#[command(about = "Reconstruct order books from a polybook data directory")]
struct Args {
    /// Data directory holding events/ and snapshots/
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Market condition id of the asset
    #[arg(long)]
    condition_id: String,

    /// Token id of the asset
    #[arg(long)]
    token_id: String,

    /// Also list events with sequence numbers greater than this value
    #[arg(long)]
    since: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let asset = MarketAsset::new(args.condition_id.clone(), args.token_id.clone())
        .context("invalid asset")?;

    let repository = ColumnarOrderBookRepository::open_local(&args.data_dir, DEFAULT_WRITE_BUFFER_SIZE)
        .with_context(|| format!("open data directory {}", args.data_dir.display()))?;

    info!(
        "reconstructing {}/{} from {}",
        asset.condition_id(),
        asset.token_id(),
        args.data_dir.display()
    );

    let book = reconstruct_book(&repository, &asset).context("reconstruct book")?;

    println!(
        "book {}/{}  sequence {}  depth {}",
        book.asset().condition_id(),
        book.asset().token_id(),
        book.last_sequence_number(),
        book.depth()
    );
    match (book.best_bid(), book.best_ask()) {
        (Ok(bid), Ok(ask)) => {
            let spread = book.spread().context("spread")?;
            println!("bbo {bid} / {ask}  spread {:.4}", spread.value());
        }
        _ => println!("bbo unavailable (one or both sides empty)"),
    }
    if let Some(trade) = book.latest_trade() {
        println!(
            "last trade {} @ {} ({:?})",
            trade.size, trade.price, trade.side
        );
    }
    println!("tick size {}", book.tick_size());

    if let Some(since) = args.since {
        let events = repository
            .get_events_since(&asset, since)
            .context("read events")?;
        println!("{} events after sequence {since}:", events.len());
        for event in events {
            println!(
                "  seq {:>8}  ts {:>13}  {}",
                event.sequence_number(),
                event.timestamp().millis(),
                event.kind().as_str()
            );
        }
    }

    Ok(())
}
