//! The cluster profile table and its CSV form.

use std::path::Path;

use crate::census::{self, CensusGroup};
use crate::error::{Error, Result, open_input};
use crate::features::{ColumnSpec, FeatureGroup, PEAK_COLUMNS};

const CLUSTER_COLUMN: &str = "cluster";
const RIDER_TYPE_COLUMN: &str = "rider_type";
const REPORT_COLUMN: &str = "report";

/// Demographic base counts of a cluster, renamed from the census base columns.
pub const DEMO_BASE_COLUMNS: [(&str, &str); 7] = [
    ("race_pop_nb", "cluster_demo_pop"),
    ("inc_med", "cluster_demo_med_income"),
    ("inc_hh_nb", "cluster_demo_hh"),
    ("edu_pop_25_nb", "cluster_demo_pop_25"),
    ("pov_fam_nb", "cluster_demo_fam"),
    ("emp_pop_16_nb", "cluster_demo_pop_16"),
    ("hu_house_units_nb", "cluster_demo_house_unit"),
];

pub const VIZ_COLUMNS: [&str; 4] = ["viz_pca1", "viz_pca2", "viz_size", "viz_grp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileGroup {
    /// `cluster_size`, `cluster_avg_num_trips`.
    ClusterInfo,
    /// Rider-feature group, renormalized to 100 (or the peak-hour modes).
    Feature(FeatureGroup),
    /// `cluster_demo_*` base counts.
    DemoBase,
    /// Census shares, renormalized to 100 within the group.
    Demographic(CensusGroup),
    /// 2D projection and scatter attributes.
    Projection,
}

impl ProfileGroup {
    /// Groups whose columns are percentage distributions.
    pub fn is_distribution(self) -> bool {
        match self {
            ProfileGroup::Feature(g) => matches!(
                g,
                FeatureGroup::Hourly
                    | FeatureGroup::Zipcode
                    | FeatureGroup::Tariff
                    | FeatureGroup::UserType
                    | FeatureGroup::ServiceBrand
            ),
            ProfileGroup::Demographic(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileColumn {
    pub group: ProfileGroup,
    pub name: String,
}

impl ProfileColumn {
    pub fn new(group: ProfileGroup, name: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
        }
    }

    /// The zipcode, fare category or census suffix of the column.
    pub fn key(&self) -> &str {
        match self.group {
            ProfileGroup::Feature(g) => g
                .value_prefix()
                .and_then(|p| self.name.strip_prefix(p))
                .unwrap_or(&self.name),
            ProfileGroup::Demographic(g) => self.name.strip_prefix(g.prefix()).unwrap_or(&self.name),
            ProfileGroup::DemoBase | ProfileGroup::ClusterInfo => {
                self.name.strip_prefix("cluster_").unwrap_or(&self.name)
            }
            ProfileGroup::Projection => self.name.strip_prefix("viz_").unwrap_or(&self.name),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let group = if name == "cluster_size" || name == "cluster_avg_num_trips" {
            ProfileGroup::ClusterInfo
        } else if name.starts_with("cluster_demo_") {
            ProfileGroup::DemoBase
        } else if VIZ_COLUMNS.contains(&name) {
            ProfileGroup::Projection
        } else if let Some(i) = census::column_index(name) {
            ProfileGroup::Demographic(census::COLUMNS[i].group)
        } else {
            ProfileGroup::Feature(ColumnSpec::from_name(name)?.group)
        };
        Some(Self::new(group, name))
    }
}

/// One row per cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub cluster: u32,
    /// One value per table column.
    pub values: Vec<f64>,
    pub rider_type: u8,
    pub report: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileTable {
    columns: Vec<ProfileColumn>,
    rows: Vec<ClusterProfile>,
}

impl ProfileTable {
    pub fn new(columns: Vec<ProfileColumn>, rows: Vec<ClusterProfile>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(Error::Inconsistent(format!(
                "profile row for cluster {} has {} values for {} columns",
                bad.cluster,
                bad.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[ProfileColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[ClusterProfile] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [ClusterProfile] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn indices_of(&self, group: ProfileGroup) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group == group)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        self.position(name).map(|c| self.rows[row].values[c])
    }

    pub fn row_for(&self, cluster: u32) -> Option<&ClusterProfile> {
        self.rows.iter().find(|r| r.cluster == cluster)
    }

    /// Weekday-by-hour matrix of a row's hourly distribution (Monday = 0).
    pub fn hourly_matrix(&self, row: usize) -> [[f64; 24]; 7] {
        let mut out = [[0.0; 24]; 7];
        for (day, hours) in out.iter_mut().enumerate() {
            for (hour, v) in hours.iter_mut().enumerate() {
                if let Some(c) = self.position(&ColumnSpec::hourly(day, hour).name) {
                    *v = self.rows[row].values[c];
                }
            }
        }
        out
    }

    pub fn peak_positions(&self) -> [Option<usize>; 3] {
        PEAK_COLUMNS.map(|name| self.position(name))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = Vec::with_capacity(self.columns.len() + 3);
        header.push(CLUSTER_COLUMN.to_string());
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        header.push(RIDER_TYPE_COLUMN.to_string());
        header.push(REPORT_COLUMN.to_string());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.cluster.to_string());
            record.extend(row.values.iter().map(|v| v.to_string()));
            record.push(row.rider_type.to_string());
            record.push(row.report.clone());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(open_input(path)?);
        let headers = rdr.headers()?.clone();
        let n = headers.len();
        if n < 3
            || &headers[0] != CLUSTER_COLUMN
            || &headers[n - 2] != RIDER_TYPE_COLUMN
            || &headers[n - 1] != REPORT_COLUMN
        {
            return Err(Error::parse(path, "unexpected profile header"));
        }
        let columns = headers
            .iter()
            .skip(1)
            .take(n - 3)
            .map(|name| {
                ProfileColumn::from_name(name)
                    .ok_or_else(|| Error::parse(path, format!("unknown profile column {name:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let num = |field: &str| {
                field
                    .parse::<f64>()
                    .map_err(|e| Error::parse(path, format!("{field:?}: {e}")))
            };
            rows.push(ClusterProfile {
                cluster: record[0]
                    .parse()
                    .map_err(|e| Error::parse(path, format!("cluster id: {e}")))?,
                values: record.iter().skip(1).take(n - 3).map(num).collect::<Result<_>>()?,
                rider_type: record[n - 2]
                    .parse()
                    .map_err(|e| Error::parse(path, format!("rider type: {e}")))?,
                report: record[n - 1].to_string(),
            });
        }
        Self::new(columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_classifies_columns() {
        let cases = [
            ("cluster_size", ProfileGroup::ClusterInfo),
            ("cluster_demo_pop_25", ProfileGroup::DemoBase),
            ("hr_2_7", ProfileGroup::Feature(FeatureGroup::Hourly)),
            ("zipcode_02139", ProfileGroup::Feature(FeatureGroup::Zipcode)),
            ("max_wkend_24_1", ProfileGroup::Feature(FeatureGroup::PeakHour)),
            ("hu_unocc", ProfileGroup::Demographic(CensusGroup::HousingUnits)),
            ("hstat_mcf", ProfileGroup::Demographic(CensusGroup::Household)),
            ("inc_br3", ProfileGroup::Demographic(CensusGroup::Income)),
            ("viz_grp", ProfileGroup::Projection),
        ];
        for (name, group) in cases {
            assert_eq!(ProfileColumn::from_name(name).unwrap().group, group, "{name}");
        }
        assert!(ProfileColumn::from_name("nonsense").is_none());
    }

    #[test]
    fn test_keys() {
        let zip = ProfileColumn::from_name("zipcode_02139").unwrap();
        assert_eq!(zip.key(), "02139");
        let race = ProfileColumn::from_name("race_asn").unwrap();
        assert_eq!(race.key(), "asn");
        let info = ProfileColumn::from_name("cluster_avg_num_trips").unwrap();
        assert_eq!(info.key(), "avg_num_trips");
    }

    #[test]
    fn test_csv_round_trip_with_quoted_report() {
        let columns = vec![
            ProfileColumn::from_name("cluster_size").unwrap(),
            ProfileColumn::from_name("zipcode_02139").unwrap(),
            ProfileColumn::from_name("viz_pca1").unwrap(),
        ];
        let table = ProfileTable::new(
            columns,
            vec![ClusterProfile {
                cluster: 101,
                values: vec![12.0, 100.0 / 3.0, -0.1234567890123],
                rider_type: 4,
                report: "Cluster 101, \"quoted\", text.".into(),
            }],
        )
        .unwrap();
        let path = std::env::temp_dir().join("rider_segmentation_profile_table_test.csv");
        table.write_csv(&path).unwrap();
        assert_eq!(ProfileTable::read_csv(&path).unwrap(), table);
        std::fs::remove_file(&path).unwrap();
    }
}
