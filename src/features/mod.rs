//! Rider feature extraction.
//!
//! Temporal (168 hourly bins and their summaries), geographic (trips per
//! zipcode) and purchasing (trips per fare category) blocks, plus frequency
//! labeling and filtering.

mod builder;
mod schema;
mod table;

pub use builder::{FeatureTableBuilder, FilterSummary, RiderLabel, top_indices};
pub use schema::{
    ColumnSpec, DAYS, FeatureGroup, FeatureSchema, HOURLY_BINS, HOURS, PEAK_COLUMNS, WEEKDAYS,
};
pub use table::FeatureTable;
