//! Per-column weights for the clustering phases.
//!
//! Each feature block gets a base weight of `100 / columns in block`, so every
//! block carries the same total emphasis regardless of its width. A caller's
//! time weight `W` then rescales the blocks used in the final phase.

use ndarray::{Array2, ArrayView2};

use crate::features::{FeatureGroup, FeatureSchema};

/// Columns selected for one clustering phase and the factor applied to each.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedColumns {
    pub columns: Vec<usize>,
    pub factors: Vec<f64>,
}

impl WeightedColumns {
    fn push_block(&mut self, columns: &[usize], factor: f64) {
        self.columns.extend_from_slice(columns);
        self.factors.extend(std::iter::repeat_n(factor, columns.len()));
    }

    /// Copies `rows` of `x` restricted to the selected columns, each scaled by
    /// its factor.
    pub fn apply(&self, x: ArrayView2<'_, f64>, rows: &[usize]) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), self.columns.len()), |(r, c)| {
            x[[rows[r], self.columns[c]]] * self.factors[c]
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeatureWeights {
    time: Vec<usize>,
    geo: Vec<usize>,
    purchase: Vec<usize>,
    week: Vec<usize>,
}

fn base(columns: &[usize]) -> f64 {
    if columns.is_empty() {
        0.0
    } else {
        100.0 / columns.len() as f64
    }
}

impl FeatureWeights {
    pub fn new(schema: &FeatureSchema) -> Self {
        Self {
            time: schema.indices_where(FeatureGroup::is_temporal),
            geo: schema.indices_of(FeatureGroup::Zipcode),
            purchase: schema.indices_where(FeatureGroup::is_purchasing),
            week: schema.indices_of(FeatureGroup::WeekPartTotal),
        }
    }

    /// Purchasing categories plus weekday/weekend totals, used to pre-split
    /// each frequency tier in hierarchical mode.
    pub fn initial_phase(&self) -> WeightedColumns {
        let mut out = WeightedColumns {
            columns: Vec::new(),
            factors: Vec::new(),
        };
        out.push_block(&self.purchase, base(&self.purchase));
        out.push_block(&self.week, base(&self.week));
        out
    }

    /// Columns for the final phase.
    ///
    /// Hierarchical runs use time and geography, giving geography the whole
    /// remainder `100 - W`. Flat runs add purchasing and split the remainder
    /// evenly between geography and purchasing.
    pub fn final_phase(&self, hierarchical: bool, time_weight: Option<u8>) -> WeightedColumns {
        let mut out = WeightedColumns {
            columns: Vec::new(),
            factors: Vec::new(),
        };
        let w = time_weight.filter(|w| *w > 0).map(f64::from);
        let time = base(&self.time) * w.unwrap_or(1.0);

        if hierarchical {
            let geo = base(&self.geo) * w.map_or(1.0, |w| 100.0 - w);
            out.push_block(&self.time, time);
            out.push_block(&self.geo, geo);
        } else {
            let rest = w.map_or(1.0, |w| (100.0 - w) / 2.0);
            out.push_block(&self.time, time);
            out.push_block(&self.geo, base(&self.geo) * rest);
            out.push_block(&self.purchase, base(&self.purchase) * rest);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn schema() -> FeatureSchema {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        FeatureSchema::for_riders(&s(&["02139", "02140", "02141", "02142"]), &s(&["A"]), &s(&["B"]), &s(&[]))
    }

    #[test]
    fn test_base_weights_equalize_blocks() {
        let w = FeatureWeights::new(&schema());
        let flat = w.final_phase(false, None);
        // 173 temporal + 4 zipcode + 2 purchasing
        assert_eq!(flat.columns.len(), 179);
        assert!((flat.factors[0] - 100.0 / 173.0).abs() < 1e-12);
        assert_eq!(flat.factors[173], 25.0);
        assert_eq!(flat.factors[178], 50.0);
    }

    #[test]
    fn test_time_weight_reallocates_emphasis() {
        let w = FeatureWeights::new(&schema());
        let flat = w.final_phase(false, Some(40));
        assert!((flat.factors[0] - 40.0 * 100.0 / 173.0).abs() < 1e-9);
        assert_eq!(flat.factors[173], 25.0 * 30.0);
        assert_eq!(flat.factors[178], 50.0 * 30.0);

        let hier = w.final_phase(true, Some(40));
        assert_eq!(hier.columns.len(), 177);
        assert_eq!(hier.factors[173], 25.0 * 60.0);
    }

    #[test]
    fn test_weights_are_not_compounded() {
        let w = FeatureWeights::new(&schema());
        assert_eq!(w.final_phase(true, Some(70)), w.final_phase(true, Some(70)));
    }

    #[test]
    fn test_initial_phase_columns() {
        let schema = schema();
        let phase = FeatureWeights::new(&schema).initial_phase();
        let names: Vec<&str> = phase.columns.iter().map(|c| schema.column(*c).name.as_str()).collect();
        assert_eq!(names, vec!["tariff_A", "usertype_B", "weekday", "weekend"]);
        assert_eq!(phase.factors, vec![50.0, 50.0, 50.0, 50.0]);
    }

    #[test]
    fn test_apply_selects_rows_and_scales() {
        let phase = WeightedColumns {
            columns: vec![2, 0],
            factors: vec![10.0, 2.0],
        };
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(phase.apply(x.view(), &[1]), array![[60.0, 8.0]]);
    }
}
