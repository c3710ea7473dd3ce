//! Parameter types accepted by the pipeline entry points.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A calendar month encoded the way the fare files are named: `YYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthCode {
    year: i32,
    month: u32,
}

impl MonthCode {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(2000..=2099).contains(&year) {
            return Err(Error::InvalidArgument(format!(
                "month code out of range: {year}-{month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month `n` months after this one, rolling over years.
    pub fn offset(&self, n: u32) -> Self {
        let zero_based = (self.year * 12) + (self.month as i32 - 1) + n as i32;
        Self {
            year: zero_based / 12,
            month: (zero_based % 12) as u32 + 1,
        }
    }

    /// Human-readable label such as `2017-Oct`.
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%Y-%b").to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for MonthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.year % 100, self.month)
    }
}

impl FromStr for MonthCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidArgument(format!(
                "month code must be YYMM, got {s:?}"
            )));
        }
        let yy: i32 = s[..2]
            .parse()
            .map_err(|_| Error::InvalidArgument(s.to_string()))?;
        let mm: u32 = s[2..]
            .parse()
            .map_err(|_| Error::InvalidArgument(s.to_string()))?;
        Self::new(2000 + yy, mm)
    }
}

impl TryFrom<String> for MonthCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthCode> for String {
    fn from(value: MonthCode) -> Self {
        value.to_string()
    }
}

/// A run of consecutive months starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthWindow {
    pub start: MonthCode,
    pub duration: u32,
}

impl MonthWindow {
    pub fn new(start: MonthCode, duration: u32) -> Result<Self> {
        if duration == 0 {
            return Err(Error::InvalidArgument("duration must be at least 1 month".into()));
        }
        Ok(Self { start, duration })
    }

    pub fn months(&self) -> impl Iterator<Item = MonthCode> + '_ {
        (0..self.duration).map(|n| self.start.offset(n))
    }

    pub fn end(&self) -> MonthCode {
        self.start.offset(self.duration - 1)
    }

    /// `2017-Oct` for a single month, `2017-Oct_to_2017-Dec` for longer windows.
    pub fn label(&self) -> String {
        if self.duration > 1 {
            format!("{}_to_{}", self.start.label(), self.end().label())
        } else {
            self.start.label()
        }
    }
}

/// Final-phase clustering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    KMeans,
    Lda,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::KMeans, Algorithm::Lda];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::KMeans => "kmeans",
            Algorithm::Lda => "lda",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" => Ok(Algorithm::KMeans),
            "lda" => Ok(Algorithm::Lda),
            other => Err(Error::InvalidArgument(format!(
                "algorithm must be \"kmeans\" or \"lda\", got {other:?}"
            ))),
        }
    }
}

/// Parameters of a segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterParams {
    pub window: MonthWindow,
    pub hierarchical: bool,
    /// Percentage (1..=100) of phase-2 emphasis on temporal features.
    /// `None` and `Some(0)` both mean "unset".
    pub time_weight: Option<u8>,
}

impl ClusterParams {
    pub fn new(window: MonthWindow, hierarchical: bool, time_weight: Option<u8>) -> Result<Self> {
        if let Some(w) = time_weight {
            if w > 100 {
                return Err(Error::InvalidArgument(format!(
                    "time weight must be within 0..=100, got {w}"
                )));
            }
        }
        Ok(Self {
            window,
            hierarchical,
            time_weight: time_weight.filter(|w| *w > 0),
        })
    }

    /// Time weight as it appears in cache keys (`0` when unset).
    pub fn time_weight_key(&self) -> u8 {
        self.time_weight.unwrap_or(0)
    }
}

/// The three profile views served downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    Overview,
    Hierarchical,
    NonHierarchical,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Overview => "overview",
            View::Hierarchical => "hierarchical",
            View::NonHierarchical => "non-hierarchical",
        }
    }

    pub fn for_mode(hierarchical: bool) -> Self {
        if hierarchical {
            View::Hierarchical
        } else {
            View::NonHierarchical
        }
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "overview" => Ok(View::Overview),
            "hierarchical" => Ok(View::Hierarchical),
            "non-hierarchical" => Ok(View::NonHierarchical),
            other => Err(Error::InvalidArgument(format!("unknown view {other:?}"))),
        }
    }
}

/// Parameters of a profiling run.
///
/// `by_cluster == false` is the population overview, which only depends on the
/// month window: the other fields are ignored for caching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileParams {
    pub cluster: ClusterParams,
    pub algorithm: Algorithm,
    pub by_cluster: bool,
}

impl ProfileParams {
    pub fn by_cluster(cluster: ClusterParams, algorithm: Algorithm) -> Self {
        Self {
            cluster,
            algorithm,
            by_cluster: true,
        }
    }

    /// Overview profile for `window`; clustering is still needed for the
    /// rider population, so a hierarchical K-means run backs it.
    pub fn overview(window: MonthWindow) -> Self {
        Self {
            cluster: ClusterParams {
                window,
                hierarchical: true,
                time_weight: None,
            },
            algorithm: Algorithm::KMeans,
            by_cluster: false,
        }
    }

    pub fn view(&self) -> View {
        if self.by_cluster {
            View::for_mode(self.cluster.hierarchical)
        } else {
            View::Overview
        }
    }
}
