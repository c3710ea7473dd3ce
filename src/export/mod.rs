//! Dashboard document built from a cluster profile table.
//!
//! One entry per cluster id, holding every chart's data with display labels
//! already applied. Written as JSON locally and optionally published to S3.

pub mod s3;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::census::CensusGroup;
use crate::error::Result;
use crate::features::{DAYS, FeatureGroup, HOURS};
use crate::profile::{ProfileGroup, ProfileTable};

/// Label -> value for one chart.
pub type GroupMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemporalPoint {
    /// 1 = Monday.
    pub day: u8,
    /// 1 = the midnight hour.
    pub hour: u8,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterView {
    pub usertype: GroupMap,
    pub tariff: GroupMap,
    pub servicebrand: GroupMap,
    pub clust_info: GroupMap,
    pub viz: GroupMap,
    pub race: GroupMap,
    pub agesex: GroupMap,
    pub income: GroupMap,
    pub edu: GroupMap,
    pub pov: GroupMap,
    pub emp: GroupMap,
    pub hu: GroupMap,
    pub hstat: GroupMap,
    pub report: String,
    pub temporal_patterns: Vec<TemporalPoint>,
    pub geographical_patterns: GroupMap,
}

/// Dashboard payload keyed by cluster id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Dashboard {
    pub clusters: BTreeMap<u32, ClusterView>,
}

const USERTYPES_KEPT: [&str; 2] = ["Adult", "Student"];
const SENIOR_USERTYPES: [&str; 2] = ["Senior", "Senior/TAP"];
const RACES_KEPT: [&str; 4] = ["asn", "blk", "hisp", "wht"];

fn display_label(section: &str, key: &str) -> Option<&'static str> {
    let label = match (section, key) {
        ("race", "asn") => "Asian",
        ("race", "blk") => "Black",
        ("race", "hisp") => "Hispanic",
        ("race", "othr") => "Other",
        ("race", "wht") => "White",
        ("agesex", "f_br0") => "Female Age 0-9",
        ("agesex", "f_br1") => "Female Age 10-19",
        ("agesex", "f_br2") => "Female Age 20-29",
        ("agesex", "f_br3") => "Female Age 30-39",
        ("agesex", "f_br4") => "Female Age 40-49",
        ("agesex", "f_br5") => "Female Age 50-59",
        ("agesex", "f_br6") => "Female Age 60-69",
        ("agesex", "f_br7") => "Female Age 70+",
        ("agesex", "m_br0") => "Male Age 0-9",
        ("agesex", "m_br1") => "Male Age 10-19",
        ("agesex", "m_br2") => "Male Age 20-29",
        ("agesex", "m_br3") => "Male Age 30-39",
        ("agesex", "m_br4") => "Male Age 40-49",
        ("agesex", "m_br5") => "Male Age 50-59",
        ("agesex", "m_br6") => "Male Age 60-69",
        ("agesex", "m_br7") => "Male Age 70+",
        ("clust_info", "id") => "ID",
        ("clust_info", "size") => "Size",
        ("clust_info", "avg_num_trips") => "Average # of Trips",
        ("clust_info", "demo_fam") => "Number of Families",
        ("clust_info", "demo_hh") => "Number of Households",
        ("clust_info", "demo_house_unit") => "Number of House Units",
        ("clust_info", "demo_med_income") => "Median House Income",
        ("clust_info", "demo_pop") => "Population",
        ("clust_info", "demo_pop_16") => "Population over 16 (Labor Force)",
        ("clust_info", "demo_pop_25") => "Population over 25",
        ("edu", "nd") => "1: No Degree",
        ("edu", "hs") => "2: High School",
        ("edu", "sc") => "3: Some College",
        ("edu", "bd") => "4: Bachelor",
        ("edu", "gd") => "5: Graduate",
        ("emp", "employed") => "Employed",
        ("emp", "unemployed") => "Unemployed",
        ("hstat", "fam") => "Family Households",
        ("hstat", "mcf") => "Married Couple Families",
        ("hstat", "mcf_nchild") => "Married Couple Families - No Children",
        ("hstat", "mcf_ychild") => "Married Couple Families - With Children",
        ("hstat", "nf") => "Not Family Households",
        ("hstat", "nf_alone") => "Not Family Living Alone",
        ("hstat", "nf_with_ui") => "Not Family Living with Unrelated Individuals",
        ("hstat", "spf") => "Single Parent Family Households",
        ("hstat", "spf_nchild") => "Single Parent Families - No Children",
        ("hstat", "spf_ychild") => "Single Parent Families - With Children",
        ("hu", "occ_hh") => "Occupied Households",
        ("hu", "unocc") => "Unoccupied Households",
        ("income", "br0") => "1: <$25K",
        ("income", "br1") => "2: $25K-$50K",
        ("income", "br2") => "3: $50K-$75K",
        ("income", "br3") => "4: $75K-$100K",
        ("income", "br4") => "5: $100K-$150K",
        ("income", "br5") => "6: $150K-$200K",
        ("income", "br6") => "7: $200K+",
        ("pov", "fam_in_pov") => "Families in Poverty",
        ("pov", "fam_not_in_pov") => "Families Not in Poverty",
        _ => return None,
    };
    Some(label)
}

fn section(group: CensusGroup) -> &'static str {
    match group {
        CensusGroup::Race => "race",
        CensusGroup::AgeSex => "agesex",
        CensusGroup::Income => "income",
        CensusGroup::Education => "edu",
        CensusGroup::Poverty => "pov",
        CensusGroup::Employment => "emp",
        CensusGroup::HousingUnits => "hu",
        CensusGroup::Household => "hstat",
    }
}

/// Applies display labels to `map`; keys without one are kept as is.
fn relabel(section: &str, map: GroupMap) -> GroupMap {
    map.into_iter()
        .map(|(k, v)| match display_label(section, &k) {
            Some(label) => (label.to_string(), v),
            None => (k, v),
        })
        .collect()
}

/// Adult and Student kept, both senior products merged, everything else
/// summed into `Others`.
fn collapse_usertypes(map: GroupMap) -> GroupMap {
    let mut out = GroupMap::new();
    let (mut seniors, mut others) = (0.0, 0.0);
    for (k, v) in map {
        if USERTYPES_KEPT.contains(&k.as_str()) {
            out.insert(k, v);
        } else if SENIOR_USERTYPES.contains(&k.as_str()) {
            seniors += v;
        } else {
            others += v;
        }
    }
    out.insert("Senior/TAP".to_string(), seniors);
    out.insert("Others".to_string(), others);
    out
}

fn collapse_races(map: GroupMap) -> GroupMap {
    let mut out = GroupMap::new();
    let mut others = 0.0;
    for (k, v) in map {
        if RACES_KEPT.contains(&k.as_str()) {
            out.insert(k, v);
        } else {
            others += v;
        }
    }
    out.insert("othr".to_string(), others);
    out
}

impl Dashboard {
    pub fn from_profile(table: &ProfileTable) -> Self {
        let group_map = |row: usize, group: ProfileGroup| -> GroupMap {
            table
                .indices_of(group)
                .into_iter()
                .map(|c| (table.columns()[c].key().to_string(), table.rows()[row].values[c]))
                .collect()
        };

        let clusters = table
            .rows()
            .iter()
            .enumerate()
            .map(|(r, profile)| {
                let feature = |g: FeatureGroup| group_map(r, ProfileGroup::Feature(g));
                let census = |g: CensusGroup| {
                    let map = group_map(r, ProfileGroup::Demographic(g));
                    let map = if g == CensusGroup::Race { collapse_races(map) } else { map };
                    relabel(section(g), map)
                };

                let mut clust_info = group_map(r, ProfileGroup::ClusterInfo);
                clust_info.extend(group_map(r, ProfileGroup::DemoBase));
                clust_info.insert("id".to_string(), f64::from(profile.cluster));

                let hourly = table.hourly_matrix(r);
                let temporal_patterns = (0..DAYS)
                    .flat_map(|d| (0..HOURS).map(move |h| (d, h)))
                    .map(|(d, h)| TemporalPoint {
                        day: d as u8 + 1,
                        hour: h as u8 + 1,
                        value: hourly[d][h],
                    })
                    .collect();

                let view = ClusterView {
                    usertype: collapse_usertypes(feature(FeatureGroup::UserType)),
                    tariff: feature(FeatureGroup::Tariff),
                    servicebrand: feature(FeatureGroup::ServiceBrand),
                    clust_info: relabel("clust_info", clust_info),
                    viz: group_map(r, ProfileGroup::Projection),
                    race: census(CensusGroup::Race),
                    agesex: census(CensusGroup::AgeSex),
                    income: census(CensusGroup::Income),
                    edu: census(CensusGroup::Education),
                    pov: census(CensusGroup::Poverty),
                    emp: census(CensusGroup::Employment),
                    hu: census(CensusGroup::HousingUnits),
                    hstat: census(CensusGroup::Household),
                    report: profile.report.clone(),
                    temporal_patterns,
                    geographical_patterns: feature(FeatureGroup::Zipcode),
                };
                (profile.cluster, view)
            })
            .collect();
        Self { clusters }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
