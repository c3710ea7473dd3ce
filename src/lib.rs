pub mod cache;
pub mod census;
pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod ingest;
pub mod normalize;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod segmentation;

pub use error::{Error, Result};
