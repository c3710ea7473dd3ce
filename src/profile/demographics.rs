//! Expected demographics of a cluster from its geographic distribution.
//!
//! The zipcode percentages of a cluster go through a softmax and the result
//! weights each zipcode's census counts. Base counts are rounded and reported
//! as `cluster_demo_*`; every census group is then rescaled to 100.

use ndarray::{Array2, ArrayView2};

use super::summary::to_percentages;
use super::table::{DEMO_BASE_COLUMNS, ProfileColumn, ProfileGroup};
use crate::census::{COLUMNS, Census, CensusGroup, ColumnKind, column_index, round_half_even};

pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.iter()
        .map(|e| if total > 0.0 { e / total } else { 0.0 })
        .collect()
}

/// Output columns: the renamed base counts, then census shares per group.
pub fn demographic_columns() -> Vec<ProfileColumn> {
    let mut columns: Vec<ProfileColumn> = DEMO_BASE_COLUMNS
        .iter()
        .map(|(_, name)| ProfileColumn::new(ProfileGroup::DemoBase, *name))
        .collect();
    for group in CensusGroup::ALL {
        columns.extend(
            COLUMNS
                .iter()
                .filter(|c| c.group == group && c.kind == ColumnKind::Share)
                .map(|c| ProfileColumn::new(ProfileGroup::Demographic(group), c.name)),
        );
    }
    columns
}

/// One row per cluster. `zipcodes[j]` names column `j` of `geo`, whose rows
/// are each cluster's zipcode percentages. Zipcodes absent from the census
/// contribute nothing.
pub fn summarize_demographics(
    census: &Census,
    zipcodes: &[&str],
    geo: ArrayView2<'_, f64>,
) -> (Vec<ProfileColumn>, Array2<f64>) {
    let columns = demographic_columns();
    let mut out = Array2::<f64>::zeros((geo.nrows(), columns.len()));

    for (r, pattern) in geo.outer_iter().enumerate() {
        let weights = softmax(&pattern.to_vec());
        let mut expected = vec![0.0; COLUMNS.len()];
        for (zip, w) in zipcodes.iter().zip(&weights) {
            if let Some(record) = census.get(zip) {
                for (e, v) in expected.iter_mut().zip(&record.values) {
                    *e += w * v;
                }
            }
        }
        for (e, c) in expected.iter_mut().zip(COLUMNS.iter()) {
            if c.kind == ColumnKind::Base {
                *e = round_half_even(*e);
            }
        }

        let mut record = Vec::with_capacity(columns.len());
        record.extend(DEMO_BASE_COLUMNS.iter().map(|(source, _)| {
            column_index(source).map_or(0.0, |i| expected[i])
        }));
        for group in CensusGroup::ALL {
            let mut shares: Vec<f64> = COLUMNS
                .iter()
                .zip(&expected)
                .filter(|(c, _)| c.group == group && c.kind == ColumnKind::Share)
                .map(|(_, v)| *v)
                .collect();
            to_percentages(&mut shares);
            record.extend(shares);
        }
        for (dst, v) in out.row_mut(r).iter_mut().zip(record) {
            *dst = v;
        }
    }
    (columns, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::CensusRecord;
    use crate::census::tests::raw_row;
    use ndarray::array;

    fn census() -> Census {
        let a = CensusRecord::from_raw("02139".into(), "MA".into(), &raw_row()).unwrap();
        let mut raw = raw_row();
        raw[0] = 3000.0;
        raw[1] = 3000.0;
        let b = CensusRecord::from_raw("02140".into(), "MA".into(), &raw).unwrap();
        [a, b].into_iter().collect()
    }

    fn value(columns: &[ProfileColumn], row: ndarray::ArrayView1<'_, f64>, name: &str) -> f64 {
        row[columns.iter().position(|c| c.name == name).unwrap()]
    }

    #[test]
    fn test_softmax() {
        let w = softmax(&[0.0, 0.0]);
        assert_eq!(w, vec![0.5, 0.5]);
        let w = softmax(&[100.0, 0.0]);
        assert!(w[0] > 0.999_999);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_zipcode_cluster_matches_census() {
        let (columns, out) =
            summarize_demographics(&census(), &["02139", "02140"], array![[100.0, 0.0]].view());
        let row = out.row(0);
        assert_eq!(value(&columns, row, "cluster_demo_pop"), 1000.0);
        assert_eq!(value(&columns, row, "cluster_demo_med_income"), 55000.0);
        assert!((value(&columns, row, "race_wht") - 50.0).abs() < 1e-9);
        for group in CensusGroup::ALL {
            let total: f64 = columns
                .iter()
                .zip(row.iter())
                .filter(|(c, _)| c.group == ProfileGroup::Demographic(group))
                .map(|(_, v)| v)
                .sum();
            assert!((total - 100.0).abs() < 1e-9, "{group:?}");
        }
    }

    #[test]
    fn test_even_split_averages_zipcodes() {
        let (columns, out) =
            summarize_demographics(&census(), &["02139", "02140"], array![[50.0, 50.0]].view());
        assert_eq!(value(&columns, out.row(0), "cluster_demo_pop"), 2000.0);
    }

    #[test]
    fn test_unknown_zipcodes_give_zero_demographics() {
        let (columns, out) = summarize_demographics(&census(), &["99999"], array![[100.0]].view());
        assert_eq!(value(&columns, out.row(0), "cluster_demo_pop"), 0.0);
        assert_eq!(value(&columns, out.row(0), "race_wht"), 0.0);
        assert!(!columns.iter().any(|c| c.name == "as_pop_nb" || c.name == "hstat_hh_nb"));
    }
}
