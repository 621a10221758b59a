use std::fmt;

use crate::market::MarketAsset;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Arrow(arrow::error::ArrowError),
    Parquet(parquet::errors::ParquetError),
    /// Value outside its validated domain (price range, negative size, ...).
    OutOfRange { what: &'static str, value: String },
    /// Malformed numeric or literal input to a string constructor.
    Parse { what: &'static str, value: String },
    InvalidSide(String),
    EmptyAssetField(&'static str),
    /// Query against an asset the projection has never seen.
    UnknownAsset(MarketAsset),
    /// `best_bid`/`best_ask` against a side with no levels.
    EmptyBookSide(&'static str),
    /// Persisted column missing or of an unexpected type.
    Schema(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Arrow(err) => write!(f, "arrow error: {err}"),
            Error::Parquet(err) => write!(f, "parquet error: {err}"),
            Error::OutOfRange { what, value } => {
                write!(f, "{what} out of range: {value}")
            }
            Error::Parse { what, value } => write!(f, "cannot parse {what}: {value}"),
            Error::InvalidSide(value) => write!(f, "invalid side: {value}"),
            Error::EmptyAssetField(field) => {
                write!(f, "market asset {field} must not be empty")
            }
            Error::UnknownAsset(asset) => {
                write!(
                    f,
                    "no book for asset {}/{}",
                    asset.condition_id(),
                    asset.token_id()
                )
            }
            Error::EmptyBookSide(side) => write!(f, "order book has no {side}"),
            Error::Schema(msg) => write!(f, "schema error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Arrow(err) => Some(err),
            Error::Parquet(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(value: arrow::error::ArrowError) -> Self {
        Error::Arrow(value)
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(value: parquet::errors::ParquetError) -> Self {
        Error::Parquet(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
