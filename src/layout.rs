//! On-disk layout for the columnar store.
//!
//! Events land under
//! `events/<event_type>/<token_prefix>/<YYYY-MM-DD>/<event_type>_<HH>_<seq_start>_<seq_end>.parquet`
//! and the single per-asset checkpoint under `snapshots/<token_hash>.parquet`.
//! Dates and hours are UTC. The sequence range in the filename lets the read
//! path skip whole files without opening them.

use std::path::PathBuf;

use time::OffsetDateTime;

pub const EVENTS_ROOT: &str = "events";
pub const SNAPSHOTS_ROOT: &str = "snapshots";
pub const PARQUET_EXT: &str = "parquet";

const TOKEN_PREFIX_LEN: usize = 8;
const TOKEN_HASH_LEN: usize = 16;

/// First 8 characters of the token id (the whole id if shorter); the
/// filesystem bucket events for this asset are filed under.
pub fn token_prefix(token_id: &str) -> &str {
    head(token_id, TOKEN_PREFIX_LEN)
}

/// First 16 characters of the token id; names the per-asset snapshot file.
pub fn token_hash(token_id: &str) -> &str {
    head(token_id, TOKEN_HASH_LEN)
}

fn head(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `events/<event_type>/<token_prefix>`: the per-type, per-asset bucket the
/// read path lists recursively.
pub fn events_dir(event_type: &str, token_id: &str) -> PathBuf {
    PathBuf::from(EVENTS_ROOT)
        .join(event_type)
        .join(token_prefix(token_id))
}

/// Full partition directory for a flush, dated by the representative event.
pub fn partition_dir(event_type: &str, token_id: &str, timestamp_ms: i64) -> PathBuf {
    events_dir(event_type, token_id).join(date_string(timestamp_ms))
}

/// `<event_type>_<HH>_<seq_start>_<seq_end>.parquet`
pub fn event_file_name(event_type: &str, timestamp_ms: i64, seq_start: u64, seq_end: u64) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        event_type,
        hour_string(timestamp_ms),
        seq_start,
        seq_end,
        PARQUET_EXT
    )
}

/// `snapshots/<token_hash>.parquet`
pub fn snapshot_path(token_id: &str) -> PathBuf {
    PathBuf::from(SNAPSHOTS_ROOT).join(format!("{}.{}", token_hash(token_id), PARQUET_EXT))
}

/// Recover the `(seq_start, seq_end)` range from an event file name.
///
/// Returns `None` for names that do not follow the layout; callers fall back
/// to reading the file contents.
pub fn parse_sequence_range(file_name: &str) -> Option<(u64, u64)> {
    let stem = file_name.strip_suffix(".parquet")?;
    let mut parts = stem.rsplitn(3, '_');
    let seq_end: u64 = parts.next()?.parse().ok()?;
    let seq_start: u64 = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((seq_start, seq_end))
}

/// UTC calendar date (`YYYY-MM-DD`) of a millisecond timestamp.
pub fn date_string(timestamp_ms: i64) -> String {
    let date = datetime(timestamp_ms).date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Two-digit UTC hour of a millisecond timestamp.
pub fn hour_string(timestamp_ms: i64) -> String {
    format!("{:02}", datetime(timestamp_ms).hour())
}

fn datetime(timestamp_ms: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(timestamp_ms / 1_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
