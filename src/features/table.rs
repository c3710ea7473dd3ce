//! The per-rider feature table and its CSV form.

use ndarray::{Array2, ArrayView1, ArrayView2};
use std::path::Path;

use super::schema::{ColumnSpec, FeatureSchema};
use crate::error::{Error, Result, open_input};

const RIDER_COLUMN: &str = "riderID";
const FREQUENCY_COLUMN: &str = "group_by_frequency";

/// One row per qualifying rider: identity, feature values, frequency tier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    riders: Vec<String>,
    values: Array2<f64>,
    frequency: Vec<u8>,
}

impl FeatureTable {
    pub fn new(
        schema: FeatureSchema,
        riders: Vec<String>,
        values: Array2<f64>,
        frequency: Vec<u8>,
    ) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != riders.len() || rows != frequency.len() || cols != schema.len() {
            return Err(Error::Inconsistent(format!(
                "feature table shape {rows}x{cols} does not match {} riders / {} tiers / {} columns",
                riders.len(),
                frequency.len(),
                schema.len()
            )));
        }
        Ok(Self {
            schema,
            riders,
            values,
            frequency,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn riders(&self) -> &[String] {
        &self.riders
    }

    /// Trip-frequency tier (1 or 2) per rider.
    pub fn frequency(&self) -> &[u8] {
        &self.frequency
    }

    /// Feature values, excluding identifier and tier.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.riders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.riders.is_empty()
    }

    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(idx)
    }

    /// Value of column `name` for rider row `idx`.
    pub fn get(&self, idx: usize, name: &str) -> Option<f64> {
        self.schema.position(name).map(|c| self.values[[idx, c]])
    }

    pub fn rider_index(&self, rider_id: &str) -> Option<usize> {
        self.riders.iter().position(|r| r == rider_id)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = Vec::with_capacity(self.schema.len() + 2);
        header.push(RIDER_COLUMN.to_string());
        header.extend(self.schema.names().map(str::to_string));
        header.push(FREQUENCY_COLUMN.to_string());
        writer.write_record(&header)?;

        for (i, rider) in self.riders.iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(rider.clone());
            record.extend(self.values.row(i).iter().map(|v| v.to_string()));
            record.push(self.frequency[i].to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(open_input(path)?);
        let headers = rdr.headers()?.clone();
        let n = headers.len();
        if n < 2 || &headers[0] != RIDER_COLUMN || &headers[n - 1] != FREQUENCY_COLUMN {
            return Err(Error::parse(path, "unexpected feature table header"));
        }
        let columns = headers
            .iter()
            .skip(1)
            .take(n - 2)
            .map(|name| {
                ColumnSpec::from_name(name)
                    .ok_or_else(|| Error::parse(path, format!("unknown feature column {name:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let schema = FeatureSchema::new(columns);

        let mut riders = Vec::new();
        let mut frequency = Vec::new();
        let mut flat = Vec::new();
        for record in rdr.records() {
            let record = record?;
            riders.push(record[0].to_string());
            for field in record.iter().skip(1).take(n - 2) {
                flat.push(
                    field
                        .parse::<f64>()
                        .map_err(|e| Error::parse(path, format!("{field:?}: {e}")))?,
                );
            }
            frequency.push(
                record[n - 1]
                    .parse::<u8>()
                    .map_err(|e| Error::parse(path, e.to_string()))?,
            );
        }

        let values = Array2::from_shape_vec((riders.len(), schema.len()), flat)
            .map_err(|e| Error::parse(path, e.to_string()))?;
        Self::new(schema, riders, values, frequency)
    }
}
