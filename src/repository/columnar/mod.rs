//! Partitioned columnar event log and per-asset checkpoint files.
//!
//! Inbound events collect in four in-process buffers, one per event kind.
//! A flush drains every non-empty buffer into one parquet file apiece, filed
//! under the first buffered event's token prefix and UTC date with the
//! buffered sequence range in the filename. The read path prunes whole files
//! by that range and filters the surviving rows, so partition placement never
//! decides correctness.

mod decode;
mod encode;
mod schema;

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::book::OrderBook;
use crate::error::{Error, Result};
use crate::events::{EventKind, OrderBookEvent};
use crate::fs::{FileSystem, LocalFileSystem, PathKind};
use crate::layout;
use crate::market::MarketAsset;
use crate::repository::OrderBookRepository;
use crate::settings::StorageSettings;

pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

pub struct ColumnarOrderBookRepository {
    fs: Arc<dyn FileSystem>,
    write_buffer_size: usize,
    flush_interval: Duration,
    buffers: Mutex<WriteBuffers>,
}

struct WriteBuffers {
    snapshots: Vec<OrderBookEvent>,
    deltas: Vec<OrderBookEvent>,
    trades: Vec<OrderBookEvent>,
    tick_sizes: Vec<OrderBookEvent>,
    last_flush: Instant,
}

impl WriteBuffers {
    fn new() -> Self {
        WriteBuffers {
            snapshots: Vec::new(),
            deltas: Vec::new(),
            trades: Vec::new(),
            tick_sizes: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    fn buffer_mut(&mut self, kind: EventKind) -> &mut Vec<OrderBookEvent> {
        match kind {
            EventKind::BookSnapshot => &mut self.snapshots,
            EventKind::BookDelta => &mut self.deltas,
            EventKind::TradeEvent => &mut self.trades,
            EventKind::TickSizeChange => &mut self.tick_sizes,
        }
    }

    fn total(&self) -> usize {
        self.snapshots.len() + self.deltas.len() + self.trades.len() + self.tick_sizes.len()
    }
}

impl ColumnarOrderBookRepository {
    pub fn new(fs: Arc<dyn FileSystem>, write_buffer_size: usize) -> Self {
        ColumnarOrderBookRepository {
            fs,
            write_buffer_size,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            buffers: Mutex::new(WriteBuffers::new()),
        }
    }

    /// Open a repository over a local data directory.
    pub fn open_local(data_dir: impl AsRef<Path>, write_buffer_size: usize) -> Result<Self> {
        let fs = LocalFileSystem::create(data_dir.as_ref())?;
        Ok(Self::new(Arc::new(fs), write_buffer_size))
    }

    /// Open a local repository configured from [`StorageSettings`].
    pub fn from_settings(settings: &StorageSettings) -> Result<Self> {
        Ok(
            Self::open_local(&settings.data_directory, settings.write_buffer_size)?
                .with_flush_interval(settings.flush_interval()),
        )
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Drain every non-empty buffer to storage.
    pub fn flush(&self) -> Result<()> {
        let mut buffers = self.lock();
        self.flush_locked(&mut buffers)
    }

    fn lock(&self) -> MutexGuard<'_, WriteBuffers> {
        self.buffers.lock().expect("columnar repository lock")
    }

    fn maybe_flush(&self, buffers: &mut WriteBuffers) -> Result<()> {
        if buffers.total() >= self.write_buffer_size
            || buffers.last_flush.elapsed() >= self.flush_interval
        {
            self.flush_locked(buffers)?;
        }
        Ok(())
    }

    fn flush_locked(&self, buffers: &mut WriteBuffers) -> Result<()> {
        for kind in EventKind::ALL {
            if buffers.buffer_mut(kind).is_empty() {
                continue;
            }
            // Clear only after the write lands; a failed flush keeps the
            // events buffered.
            self.flush_buffer(kind, buffers.buffer_mut(kind))?;
            buffers.buffer_mut(kind).clear();
        }
        buffers.last_flush = Instant::now();
        Ok(())
    }

    /// Write one buffer as one file. The first event is the representative
    /// for placement: its token id picks the asset partition and its
    /// timestamp the date and hour. A buffer spanning assets or days is
    /// therefore filed under the first event's partition; the read path's
    /// row filter makes that safe.
    fn flush_buffer(&self, kind: EventKind, events: &[OrderBookEvent]) -> Result<()> {
        let first = &events[0];
        let token_id = first.asset().token_id();
        let timestamp_ms = first.timestamp().millis();

        let dir = layout::partition_dir(kind.as_str(), token_id, timestamp_ms);
        self.fs.create_dir_all(&dir)?;

        let seq_start = first.sequence_number();
        let seq_end = events[events.len() - 1].sequence_number();
        let file_name = layout::event_file_name(kind.as_str(), timestamp_ms, seq_start, seq_end);

        let batch = encode::events_batch(kind, events)?;
        let data = write_parquet(batch)?;
        self.fs.write(&dir.join(file_name), &data)?;

        log::debug!(
            "flushed {} {} events, sequences {}..={}",
            events.len(),
            kind.as_str(),
            seq_start,
            seq_end
        );
        Ok(())
    }

    fn read_event_files(
        &self,
        kind: EventKind,
        asset: &MarketAsset,
        min_sequence: u64,
        out: &mut Vec<OrderBookEvent>,
    ) -> Result<()> {
        let dir = layout::events_dir(kind.as_str(), asset.token_id());
        let files = match self.fs.list_files(&dir) {
            Ok(files) => files,
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        for path in files {
            if path.extension().and_then(|ext| ext.to_str()) != Some(layout::PARQUET_EXT) {
                continue;
            }

            // Prune by the sequence range in the filename; unparseable names
            // fall through to a content read.
            if let Some((_, seq_end)) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(layout::parse_sequence_range)
            {
                if seq_end <= min_sequence {
                    continue;
                }
            }

            let data = self.fs.read(&path)?;
            let reader = match ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
                .and_then(|builder| builder.build())
            {
                Ok(reader) => reader,
                Err(err) => {
                    log::warn!("skipping unreadable event file {}: {err}", path.display());
                    continue;
                }
            };

            for batch in reader {
                let batch = match batch {
                    Ok(batch) => batch,
                    Err(err) => {
                        log::warn!("truncated event file {}: {err}", path.display());
                        break;
                    }
                };
                decode::events_from_batch(kind, &batch, asset, min_sequence, out)?;
            }
        }

        Ok(())
    }
}

impl OrderBookRepository for ColumnarOrderBookRepository {
    fn append_event(&self, event: &OrderBookEvent) -> Result<()> {
        let mut buffers = self.lock();
        buffers.buffer_mut(event.kind()).push(event.clone());
        self.maybe_flush(&mut buffers)
    }

    fn get_events_since(
        &self,
        asset: &MarketAsset,
        sequence_number: u64,
    ) -> Result<Vec<OrderBookEvent>> {
        let buffers = self.lock();

        let mut result = Vec::new();
        for kind in EventKind::ALL {
            self.read_event_files(kind, asset, sequence_number, &mut result)?;
        }

        for buffer in [
            &buffers.snapshots,
            &buffers.deltas,
            &buffers.trades,
            &buffers.tick_sizes,
        ] {
            for event in buffer {
                if event.asset() == asset && event.sequence_number() > sequence_number {
                    result.push(event.clone());
                }
            }
        }

        result.sort_by_key(|event| event.sequence_number());
        Ok(result)
    }

    fn store_snapshot(&self, book: &OrderBook) -> Result<()> {
        let _buffers = self.lock();

        let batch = encode::book_state(book)?;
        let data = write_parquet(batch)?;

        self.fs.create_dir_all(Path::new(layout::SNAPSHOTS_ROOT))?;
        self.fs
            .write(&layout::snapshot_path(book.asset().token_id()), &data)
    }

    fn get_latest_snapshot(&self, asset: &MarketAsset) -> Result<Option<OrderBook>> {
        let _buffers = self.lock();

        let path = layout::snapshot_path(asset.token_id());
        if self.fs.kind(&path)? != PathKind::File {
            return Ok(None);
        }

        let data = self.fs.read(&path)?;
        let reader = match ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
            .and_then(|builder| builder.build())
        {
            Ok(reader) => reader,
            Err(err) => {
                log::warn!("unreadable snapshot file {}: {err}", path.display());
                return Ok(None);
            }
        };

        for batch in reader {
            let batch = batch?;
            if let Some(book) = decode::book_from_state(&batch, asset)? {
                return Ok(Some(book));
            }
        }
        Ok(None)
    }
}

impl Drop for ColumnarOrderBookRepository {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::error!("flush on shutdown failed: {err}");
        }
    }
}

fn write_parquet(batch: RecordBatch) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(cursor.into_inner())
}
