//! Stop and fare-product reference tables.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::transaction::FareProduct;
use crate::error::{Result, open_input};

const MISSING: &str = "N/A";

/// Maps stop ids to the zipcode they sit in.
#[derive(Debug, Default)]
pub struct StopZipcodes {
    entries: HashMap<String, String>,
}

#[derive(Deserialize)]
struct StopRow {
    stop_id: String,
    zipcode: Option<String>,
}

impl StopZipcodes {
    pub fn load(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(open_input(path)?);
        let mut entries = HashMap::new();
        for row in rdr.deserialize() {
            let row: StopRow = row?;
            if let Some(zip) = row.zipcode.filter(|z| !z.trim().is_empty()) {
                entries.insert(row.stop_id.trim().to_string(), zip.trim().to_string());
            }
        }
        Ok(Self { entries })
    }

    pub fn zipcode(&self, stop_id: &str) -> Option<&str> {
        self.entries.get(stop_id.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for StopZipcodes {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Maps ticket type ids to fare-product attributes.
#[derive(Debug, Default)]
pub struct FareProducts {
    entries: HashMap<String, FareProduct>,
}

#[derive(Deserialize)]
struct FareProductRow {
    tickettypeid: String,
    tariff: Option<String>,
    servicebrand: Option<String>,
    usertype: Option<String>,
    zonecr: Option<String>,
}

fn or_missing(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

impl FareProducts {
    /// Loads the `;`-separated fare-product table. Empty attributes become `N/A`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_reader(open_input(path)?);
        let mut entries = HashMap::new();
        for row in rdr.deserialize() {
            let row: FareProductRow = row?;
            entries.insert(
                row.tickettypeid.trim().to_string(),
                FareProduct {
                    tariff: or_missing(row.tariff),
                    service_brand: or_missing(row.servicebrand),
                    user_type: or_missing(row.usertype),
                    zone: or_missing(row.zonecr),
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, ticket_type: &str) -> Option<&FareProduct> {
        self.entries.get(ticket_type.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FareProduct)> for FareProducts {
    fn from_iter<T: IntoIterator<Item = (String, FareProduct)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
