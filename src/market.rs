//! Value types for the prediction-market domain.
//!
//! Every scalar is constructor-validated; once built, a value is always inside
//! its domain. Prices and quantities keep the exact f64 the upstream decimal
//! string parsed to, so level lookups in the delta fold can match on equality.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Probability-space price in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price(f64);

impl Price {
    pub const ZERO: Price = Price(0.0);

    /// The default minimum price increment for a freshly listed market.
    pub const DEFAULT_TICK: Price = Price(0.01);

    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::OutOfRange {
                what: "price",
                value: value.to_string(),
            });
        }
        // Normalize -0.0 so ordering stays consistent with equality.
        Ok(Price(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Eq for Price {}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        // Valid prices are finite and never -0.0, so total_cmp agrees with ==.
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Price {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: f64 = s.parse().map_err(|_| Error::Parse {
            what: "price",
            value: s.to_string(),
        })?;
        Price::new(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative order size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity(f64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0.0);

    pub fn new(size: f64) -> Result<Self> {
        if !(size >= 0.0) {
            return Err(Error::OutOfRange {
                what: "quantity",
                value: size.to_string(),
            });
        }
        Ok(Quantity(if size == 0.0 { 0.0 } else { size }))
    }

    pub fn size(self) -> f64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl Eq for Quantity {}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let size: f64 = s.parse().map_err(|_| Error::Parse {
            what: "quantity",
            value: s.to_string(),
        })?;
        Quantity::new(size)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch, non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn new(milliseconds: i64) -> Result<Self> {
        if milliseconds < 0 {
            return Err(Error::OutOfRange {
                what: "timestamp",
                value: milliseconds.to_string(),
            });
        }
        Ok(Timestamp(milliseconds))
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let ms: i64 = s.parse().map_err(|_| Error::Parse {
            what: "timestamp",
            value: s.to_string(),
        })?;
        Timestamp::new(ms)
    }
}

/// Order side. The discriminants are the persisted wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(Error::InvalidSide(other.to_string())),
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(Error::InvalidSide(other.to_string())),
        }
    }
}

/// One tradeable outcome token inside a market condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarketAsset {
    condition_id: String,
    token_id: String,
}

impl MarketAsset {
    pub fn new(condition_id: impl Into<String>, token_id: impl Into<String>) -> Result<Self> {
        let condition_id = condition_id.into();
        let token_id = token_id.into();
        if condition_id.is_empty() {
            return Err(Error::EmptyAssetField("condition_id"));
        }
        if token_id.is_empty() {
            return Err(Error::EmptyAssetField("token_id"));
        }
        Ok(MarketAsset {
            condition_id,
            token_id,
        })
    }

    pub fn condition_id(&self) -> &str {
        &self.condition_id
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }
}

/// A (price, size) pair on one side of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriceLevel {
    price: Price,
    size: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price, size: Quantity) -> Self {
        PriceLevel { price, size }
    }

    pub fn from_strs(price: &str, size: &str) -> Result<Self> {
        Ok(PriceLevel {
            price: price.parse()?,
            size: size.parse()?,
        })
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn size(&self) -> Quantity {
        self.size
    }
}

/// Top-of-book pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub best_bid: Price,
    pub best_ask: Price,
}

impl Spread {
    /// Ask minus bid; negative on a crossed book.
    pub fn value(&self) -> f64 {
        self.best_ask.value() - self.best_bid.value()
    }
}
