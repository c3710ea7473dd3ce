//! Per-cluster feature summaries.

use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeMap, HashMap};

use super::table::{ProfileColumn, ProfileGroup};
use crate::features::{FeatureGroup, FeatureTable, PEAK_COLUMNS};

/// Feature groups reported as percentage distributions, in output order.
const DISTRIBUTIONS: [FeatureGroup; 5] = [
    FeatureGroup::Hourly,
    FeatureGroup::Zipcode,
    FeatureGroup::UserType,
    FeatureGroup::Tariff,
    FeatureGroup::ServiceBrand,
];

/// Column sums, size and average trips per cluster, with every distribution
/// group rescaled to sum to 100.
#[derive(Debug, Clone)]
pub struct FeatureSummary {
    pub clusters: Vec<u32>,
    pub columns: Vec<ProfileColumn>,
    pub values: Array2<f64>,
}

/// Rescales `values` so they sum to 100; an all-zero group stays all zero.
pub fn to_percentages(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    for v in values.iter_mut() {
        let p = *v / total * 100.0;
        *v = if p.is_finite() { p } else { 0.0 };
    }
}

/// Most frequent value; ties go to the smallest.
pub fn mode(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().collect();
    sorted.sort_by(f64::total_cmp);
    let mut best = (f64::NAN, 0usize);
    let mut i = 0;
    while i < sorted.len() {
        let run = sorted[i..].iter().take_while(|v| **v == sorted[i]).count().max(1);
        if run > best.1 {
            best = (sorted[i], run);
        }
        i += run;
    }
    if best.1 == 0 { 0.0 } else { best.0 }
}

/// Summarizes rider rows grouped by `labels`, clusters ascending.
pub fn summarize(features: &FeatureTable, labels: &[u32]) -> FeatureSummary {
    let schema = features.schema();
    let mut members: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (row, label) in labels.iter().enumerate() {
        members.entry(*label).or_default().push(row);
    }

    let mut columns = vec![
        ProfileColumn::new(ProfileGroup::ClusterInfo, "cluster_size"),
        ProfileColumn::new(ProfileGroup::ClusterInfo, "cluster_avg_num_trips"),
    ];
    let mut blocks: Vec<Vec<usize>> = Vec::with_capacity(DISTRIBUTIONS.len());
    for group in DISTRIBUTIONS {
        let idx = schema.indices_of(group);
        columns.extend(
            idx.iter()
                .map(|c| ProfileColumn::new(ProfileGroup::Feature(group), &schema.column(*c).name)),
        );
        blocks.push(idx);
    }
    let peaks: Vec<Option<usize>> = PEAK_COLUMNS.iter().map(|n| schema.position(n)).collect();
    columns.extend(
        PEAK_COLUMNS
            .iter()
            .map(|n| ProfileColumn::new(ProfileGroup::Feature(FeatureGroup::PeakHour), *n)),
    );
    let total_col = schema
        .indices_of(FeatureGroup::TotalTrips)
        .first()
        .copied();

    let values = features.values();
    let mut out = Array2::<f64>::zeros((members.len(), columns.len()));
    for (r, rows) in members.values().enumerate() {
        let sum = |c: usize| rows.iter().map(|i| values[[*i, c]]).sum::<f64>();
        let size = rows.len() as f64;
        let mut record = Vec::with_capacity(columns.len());
        record.push(size);
        record.push(total_col.map_or(0.0, |c| sum(c) / size));
        for block in &blocks {
            let mut group: Vec<f64> = block.iter().map(|c| sum(*c)).collect();
            to_percentages(&mut group);
            record.extend(group);
        }
        for peak in &peaks {
            record.push(peak.map_or(0.0, |c| mode(rows.iter().map(|i| values[[*i, c]]))));
        }
        out.row_mut(r).assign(&ArrayView1::from(&record));
    }

    FeatureSummary {
        clusters: members.into_keys().collect(),
        columns,
        values: out,
    }
}

/// Column indices of each distribution group in `columns`.
pub fn distribution_blocks(columns: &[ProfileColumn]) -> HashMap<ProfileGroup, Vec<usize>> {
    let mut out: HashMap<ProfileGroup, Vec<usize>> = HashMap::new();
    for (i, c) in columns.iter().enumerate() {
        if c.group.is_distribution() {
            out.entry(c.group).or_default().push(i);
        }
    }
    out
}
