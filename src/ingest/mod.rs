//! Raw fare-transaction loading.
//!
//! Month files are read, reduced to validated station entries, and joined with
//! the stop → zipcode and ticket type → fare product lookups. A missing month
//! aborts the whole window: partial windows are never returned.

mod lookup;
mod transaction;

pub use lookup::{FareProducts, StopZipcodes};
pub use transaction::{FareProduct, Transaction, parse_timestamp};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::error::{Error, Result, open_input};
use crate::params::{MonthCode, MonthWindow};
use transaction::AfcRecord;

/// Locations of the raw inputs under the configured input directory.
#[derive(Debug, Clone)]
pub struct InputSources {
    input_dir: PathBuf,
}

impl InputSources {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    pub fn month_file(&self, month: MonthCode) -> PathBuf {
        self.input_dir
            .join("afc_odx")
            .join(format!("afc_odx_{month}.csv"))
    }

    pub fn stops_file(&self) -> PathBuf {
        self.input_dir.join("stops").join("stops_withzip.csv")
    }

    pub fn fareprod_file(&self) -> PathBuf {
        self.input_dir.join("fareprod").join("fareprod_ttj.csv")
    }

    pub fn census_file(&self) -> PathBuf {
        self.input_dir.join("census").join("MA_census.csv")
    }

    /// Loads every transaction of `window`.
    ///
    /// # Errors
    ///
    /// [`Error::DataNotFound`] if any month file or lookup table is missing.
    #[tracing::instrument(skip(self, cfg), fields(month = %window.start, duration = window.duration))]
    pub fn load_transactions(
        &self,
        window: &MonthWindow,
        cfg: &IngestConfig,
    ) -> Result<Vec<Transaction>> {
        // Check every month up front so a late missing file does not waste a full parse.
        for month in window.months() {
            let path = self.month_file(month);
            if !path.exists() {
                return Err(Error::DataNotFound { path });
            }
        }

        let stops = StopZipcodes::load(&self.stops_file())?;
        let fares = FareProducts::load(&self.fareprod_file())?;
        debug!(stops = stops.len(), fare_products = fares.len(), "Lookups loaded");

        let loader = TransactionLoader::new(cfg, &stops, &fares);
        let mut transactions = Vec::new();
        for month in window.months() {
            let before = transactions.len();
            loader.load_month(&self.month_file(month), &mut transactions)?;
            info!(%month, kept = transactions.len() - before, "Month loaded");
        }
        Ok(transactions)
    }
}

/// Filters and joins raw AFC rows.
pub struct TransactionLoader<'a> {
    device_classes: HashSet<i64>,
    movement_types: HashSet<i64>,
    stops: &'a StopZipcodes,
    fares: &'a FareProducts,
}

impl<'a> TransactionLoader<'a> {
    pub fn new(cfg: &IngestConfig, stops: &'a StopZipcodes, fares: &'a FareProducts) -> Self {
        Self {
            device_classes: cfg.station_device_classes.iter().copied().collect(),
            movement_types: cfg.validation_movement_types.iter().copied().collect(),
            stops,
            fares,
        }
    }

    /// Appends the kept transactions of one month file to `out`.
    pub fn load_month(&self, path: &Path, out: &mut Vec<Transaction>) -> Result<()> {
        let mut rdr = csv::Reader::from_reader(open_input(path)?);
        for (line, row) in rdr.deserialize().enumerate() {
            let record: AfcRecord = row?;
            if let Some(tx) = self.join(record, path, line)? {
                out.push(tx);
            }
        }
        Ok(())
    }

    fn join(&self, record: AfcRecord, path: &Path, line: usize) -> Result<Option<Transaction>> {
        let Some(origin) = record.origin.filter(|o| !o.trim().is_empty()) else {
            return Ok(None);
        };
        let is_station_entry = record
            .deviceclassid
            .is_some_and(|d| self.device_classes.contains(&d))
            && record
                .movementtype
                .is_some_and(|m| self.movement_types.contains(&m));
        if !is_station_entry {
            return Ok(None);
        }

        let Some(zipcode) = self.stops.zipcode(&origin) else {
            return Ok(None);
        };
        let Some(fare) = record
            .tickettypeid
            .as_deref()
            .and_then(|t| self.fares.get(t))
        else {
            return Ok(None);
        };

        let timestamp = parse_timestamp(&record.trxtime).ok_or_else(|| {
            Error::parse(
                path,
                format!("row {}: bad trxtime {:?}", line + 1, record.trxtime),
            )
        })?;

        Ok(Some(Transaction {
            rider_id: record.card.trim().to_string(),
            timestamp,
            zipcode: zipcode.to_string(),
            fare: fare.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rider_segmentation_ingest_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("afc_odx")).unwrap();
        fs::create_dir_all(dir.join("stops")).unwrap();
        fs::create_dir_all(dir.join("fareprod")).unwrap();
        fs::write(
            dir.join("stops/stops_withzip.csv"),
            "stop_id,zipcode\n100,02139\n200,02108\n",
        )
        .unwrap();
        fs::write(
            dir.join("fareprod/fareprod_ttj.csv"),
            "tickettypeid;tariff;servicebrand;usertype;zonecr\n1;Monthly;Subway;Adult;\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_filters_non_station_and_unjoinable_rows() {
        let dir = scratch_dir("filters");
        fs::write(
            dir.join("afc_odx/afc_odx_1710.csv"),
            "deviceclassid,trxtime,tickettypeid,card,origin,movementtype\n\
             411,2017-10-02 08:00:00,1,A,100,7\n\
             999,2017-10-02 08:00:00,1,A,100,7\n\
             411,2017-10-02 08:00:00,1,A,100,3\n\
             411,2017-10-02 08:00:00,1,A,,7\n\
             411,2017-10-02 08:00:00,1,A,300,7\n\
             411,2017-10-02 08:00:00,9,A,100,7\n\
             501,2017-10-03 17:30:00,1,B,200,20\n",
        )
        .unwrap();

        let sources = InputSources::new(&dir);
        let window = MonthWindow::new("1710".parse().unwrap(), 1).unwrap();
        let txs = sources
            .load_transactions(&window, &IngestConfig::default())
            .unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].rider_id, "A");
        assert_eq!(txs[0].zipcode, "02139");
        assert_eq!(txs[1].rider_id, "B");
        assert_eq!(txs[1].zipcode, "02108");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_month_aborts_window() {
        let dir = scratch_dir("missing");
        fs::write(
            dir.join("afc_odx/afc_odx_1710.csv"),
            "deviceclassid,trxtime,tickettypeid,card,origin,movementtype\n",
        )
        .unwrap();

        let sources = InputSources::new(&dir);
        let window = MonthWindow::new("1710".parse().unwrap(), 2).unwrap();
        let err = sources
            .load_transactions(&window, &IngestConfig::default())
            .unwrap_err();
        match err {
            Error::DataNotFound { path } => assert!(path.ends_with("afc_odx_1711.csv")),
            other => panic!("unexpected error: {other}"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
