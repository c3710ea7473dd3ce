//! Fare-transaction records.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Deserialize;

/// Fare-product attributes joined onto a transaction by ticket type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FareProduct {
    pub tariff: String,
    pub service_brand: String,
    pub user_type: String,
    /// Commuter-rail fare zone; only used to detect commuter-rail riders.
    pub zone: String,
}

/// One validated station entry, joined with its origin zipcode and fare product.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub rider_id: String,
    pub timestamp: NaiveDateTime,
    pub zipcode: String,
    pub fare: FareProduct,
}

impl Transaction {
    /// Day of week with Monday = 0.
    pub fn day_of_week(&self) -> usize {
        self.timestamp.weekday().num_days_from_monday() as usize
    }

    pub fn hour(&self) -> usize {
        self.timestamp.hour() as usize
    }
}

/// A row of a raw `afc_odx` month file.
#[derive(Debug, Deserialize)]
pub(crate) struct AfcRecord {
    pub(crate) deviceclassid: Option<i64>,
    pub(crate) trxtime: String,
    pub(crate) tickettypeid: Option<String>,
    pub(crate) card: String,
    pub(crate) origin: Option<String>,
    pub(crate) movementtype: Option<i64>,
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses a transaction timestamp in any of the formats seen in AFC exports.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
