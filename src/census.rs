//! Zipcode census reference data.
//!
//! The raw file has a fixed positional layout (one header row, then one row
//! per zipcode). Some groups are reported as counts and others as percentages
//! of a base column; loading converts everything to counts, and the percent
//! and proportion views are derived from there.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result, open_input};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CensusGroup {
    Race,
    AgeSex,
    Income,
    Education,
    Poverty,
    Employment,
    HousingUnits,
    Household,
}

impl CensusGroup {
    pub const ALL: [CensusGroup; 8] = [
        CensusGroup::Race,
        CensusGroup::AgeSex,
        CensusGroup::Income,
        CensusGroup::Education,
        CensusGroup::Poverty,
        CensusGroup::Employment,
        CensusGroup::HousingUnits,
        CensusGroup::Household,
    ];

    /// Column-name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            CensusGroup::Race => "race_",
            CensusGroup::AgeSex => "as_",
            CensusGroup::Income => "inc_",
            CensusGroup::Education => "edu_",
            CensusGroup::Poverty => "pov_",
            CensusGroup::Employment => "emp_",
            CensusGroup::HousingUnits => "hu_",
            CensusGroup::Household => "hstat_",
        }
    }

    /// The column every other column of the group is a share of.
    pub fn base_column(self) -> &'static str {
        match self {
            CensusGroup::Race => "race_pop_nb",
            CensusGroup::AgeSex => "as_pop_nb",
            CensusGroup::Income => "inc_hh_nb",
            CensusGroup::Education => "edu_pop_25_nb",
            CensusGroup::Poverty => "pov_fam_nb",
            CensusGroup::Employment => "emp_pop_16_nb",
            CensusGroup::HousingUnits => "hu_house_units_nb",
            CensusGroup::Household => "hstat_hh_nb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Population or unit count a group is normalized by (`*_nb`).
    Base,
    /// Median household income; never rescaled.
    Median,
    /// A count that is a share of the group base.
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CensusColumn {
    pub name: &'static str,
    pub group: CensusGroup,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, group: CensusGroup, kind: ColumnKind) -> CensusColumn {
    CensusColumn { name, group, kind }
}

use CensusGroup as G;
use ColumnKind::{Base, Median, Share};

/// Numeric columns in file order (after zipcode and state), followed by the
/// four derived columns.
pub const COLUMNS: [CensusColumn; 61] = [
    col("race_pop_nb", G::Race, Base),
    col("race_wht", G::Race, Share),
    col("race_blk", G::Race, Share),
    col("race_ntv", G::Race, Share),
    col("race_asn", G::Race, Share),
    col("race_isld", G::Race, Share),
    col("race_othr", G::Race, Share),
    col("race_two", G::Race, Share),
    col("race_hisp", G::Race, Share),
    col("as_pop_nb", G::AgeSex, Base),
    col("as_f_br0", G::AgeSex, Share),
    col("as_f_br1", G::AgeSex, Share),
    col("as_f_br2", G::AgeSex, Share),
    col("as_f_br3", G::AgeSex, Share),
    col("as_f_br4", G::AgeSex, Share),
    col("as_f_br5", G::AgeSex, Share),
    col("as_f_br6", G::AgeSex, Share),
    col("as_f_br7", G::AgeSex, Share),
    col("as_m_br0", G::AgeSex, Share),
    col("as_m_br1", G::AgeSex, Share),
    col("as_m_br2", G::AgeSex, Share),
    col("as_m_br3", G::AgeSex, Share),
    col("as_m_br4", G::AgeSex, Share),
    col("as_m_br5", G::AgeSex, Share),
    col("as_m_br6", G::AgeSex, Share),
    col("as_m_br7", G::AgeSex, Share),
    col("inc_med", G::Income, Median),
    col("inc_hh_nb", G::Income, Base),
    col("inc_br0", G::Income, Share),
    col("inc_br1", G::Income, Share),
    col("inc_br2", G::Income, Share),
    col("inc_br3", G::Income, Share),
    col("inc_br4", G::Income, Share),
    col("inc_br5", G::Income, Share),
    col("inc_br6", G::Income, Share),
    col("edu_pop_25_nb", G::Education, Base),
    col("edu_nd", G::Education, Share),
    col("edu_hs", G::Education, Share),
    col("edu_sc", G::Education, Share),
    col("edu_bd", G::Education, Share),
    col("edu_gd", G::Education, Share),
    col("pov_fam_nb", G::Poverty, Base),
    col("pov_fam_in_pov", G::Poverty, Share),
    col("emp_pop_16_nb", G::Employment, Base),
    col("emp_unemployed", G::Employment, Share),
    col("hu_house_units_nb", G::HousingUnits, Base),
    col("hstat_hh_nb", G::Household, Base),
    col("hstat_fam", G::Household, Share),
    col("hstat_mcf", G::Household, Share),
    col("hstat_mcf_ychild", G::Household, Share),
    col("hstat_mcf_nchild", G::Household, Share),
    col("hstat_spf", G::Household, Share),
    col("hstat_spf_ychild", G::Household, Share),
    col("hstat_spf_nchild", G::Household, Share),
    col("hstat_nf", G::Household, Share),
    col("hstat_nf_alone", G::Household, Share),
    col("hstat_nf_with_ui", G::Household, Share),
    // derived
    col("hu_occ_hh", G::HousingUnits, Share),
    col("hu_unocc", G::HousingUnits, Share),
    col("pov_fam_not_in_pov", G::Poverty, Share),
    col("emp_employed", G::Employment, Share),
];

/// Number of numeric columns present in the raw file.
const RAW_NUMERIC: usize = 57;

/// Groups whose share columns are published as percentages of the base.
const PERCENT_GROUPS: [CensusGroup; 3] = [G::Education, G::Poverty, G::Employment];

pub fn column_index(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| c.name == name)
}

fn idx(name: &str) -> usize {
    column_index(name).unwrap_or_else(|| unreachable!("{name} is in COLUMNS"))
}

/// Rounds half-way values to the nearest even integer.
pub(crate) fn round_half_even(v: f64) -> f64 {
    v.round_ties_even()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusType {
    Counts,
    Percents,
    Proportions,
}

impl CensusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CensusType::Counts => "counts",
            CensusType::Percents => "percents",
            CensusType::Proportions => "proportions",
        }
    }
}

impl fmt::Display for CensusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CensusType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "counts" => Ok(CensusType::Counts),
            "percents" => Ok(CensusType::Percents),
            "proportions" => Ok(CensusType::Proportions),
            other => Err(Error::InvalidArgument(format!(
                "census type must be \"percents\", \"counts\" or \"proportions\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CensusRecord {
    pub zipcode: String,
    pub state: String,
    /// One value per entry of [`COLUMNS`].
    pub values: Vec<f64>,
}

impl CensusRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        column_index(name).map(|i| self.values[i])
    }

    /// Builds a record from the raw file's numeric columns, deriving the
    /// complement columns and converting percentages to counts.
    pub fn from_raw(zipcode: String, state: String, raw: &[f64]) -> Result<Self> {
        if raw.len() != RAW_NUMERIC {
            return Err(Error::InvalidArgument(format!(
                "census row for {zipcode} has {} numeric columns, expected {RAW_NUMERIC}",
                raw.len()
            )));
        }
        let mut values = raw.to_vec();
        let households = values[idx("hstat_hh_nb")];
        values.push(households);
        values.push(values[idx("hu_house_units_nb")] - households);
        values.push(100.0 - values[idx("pov_fam_in_pov")]);
        values.push(100.0 - values[idx("emp_unemployed")]);

        for group in PERCENT_GROUPS {
            let base = values[idx(group.base_column())];
            for (i, c) in COLUMNS.iter().enumerate() {
                if c.group == group && c.kind == Share {
                    values[i] = round_half_even(values[i] * base / 100.0);
                }
            }
        }
        Ok(Self {
            zipcode,
            state,
            values,
        })
    }

    /// Rescales share columns by their group base: `scale = 100.0` for
    /// percentages, `1.0` for proportions. `0 / 0` is 0.
    fn rescaled(&self, scale: f64) -> Self {
        let mut values = self.values.clone();
        for group in CensusGroup::ALL {
            let base = self.values[idx(group.base_column())];
            for (i, c) in COLUMNS.iter().enumerate() {
                if c.group == group && c.kind == Share {
                    let v = self.values[i] / base * scale;
                    values[i] = if v.is_finite() { v } else { 0.0 };
                }
            }
        }
        Self {
            values,
            ..self.clone()
        }
    }
}

/// Census records in counts, indexed by zipcode.
#[derive(Debug, Clone, Default)]
pub struct Census {
    records: Vec<CensusRecord>,
    by_zip: HashMap<String, usize>,
}

/// Pads purely numeric zipcodes that lost their leading zeros.
pub fn normalize_zipcode(raw: &str) -> String {
    let z = raw.trim();
    if !z.is_empty() && z.len() < 5 && z.bytes().all(|b| b.is_ascii_digit()) {
        format!("{z:0>5}")
    } else {
        z.to_string()
    }
}

impl FromIterator<CensusRecord> for Census {
    fn from_iter<T: IntoIterator<Item = CensusRecord>>(iter: T) -> Self {
        let records: Vec<CensusRecord> = iter.into_iter().collect();
        let by_zip = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.zipcode.clone(), i))
            .collect();
        Self { records, by_zip }
    }
}

impl Census {
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(open_input(path)?);
        let mut records = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            let row = row?;
            if row.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let raw = row
                .iter()
                .skip(2)
                .map(|f| {
                    let f = f.trim().replace(',', "");
                    if f.is_empty() || f == "-" {
                        Ok(0.0)
                    } else {
                        f.parse::<f64>()
                            .map_err(|e| Error::parse(path, format!("line {}: {f:?}: {e}", line + 2)))
                    }
                })
                .collect::<Result<Vec<f64>>>()?;
            let record = CensusRecord::from_raw(
                normalize_zipcode(&row[0]),
                row.get(1).unwrap_or_default().trim().to_string(),
                &raw,
            )
            .map_err(|e| Error::parse(path, e.to_string()))?;
            records.push(record);
        }
        info!(zipcodes = records.len(), "census loaded");
        Ok(records.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, zipcode: &str) -> Option<&CensusRecord> {
        self.by_zip.get(zipcode).map(|i| &self.records[*i])
    }

    pub fn records(&self) -> &[CensusRecord] {
        &self.records
    }

    pub fn view(&self, census_type: CensusType) -> Census {
        match census_type {
            CensusType::Counts => self.clone(),
            CensusType::Percents => self.records.iter().map(|r| r.rescaled(100.0)).collect(),
            CensusType::Proportions => self.records.iter().map(|r| r.rescaled(1.0)).collect(),
        }
    }

    /// Writes the requested view with a `zipcode,state,<columns>` header.
    pub fn to_csv(&self, path: &Path, census_type: CensusType) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let view = self.view(census_type);
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["zipcode", "state"];
        header.extend(COLUMNS.iter().map(|c| c.name));
        writer.write_record(&header)?;
        for r in &view.records {
            let mut record = vec![r.zipcode.clone(), r.state.clone()];
            record.extend(r.values.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
