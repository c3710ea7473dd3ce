//! Transactions → one [`FeatureTable`] row per qualifying rider.

use ndarray::{Array2, Axis};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use super::schema::{DAYS, FeatureGroup, FeatureSchema, HOURS, PEAK_COLUMNS, WEEKDAYS};
use super::table::FeatureTable;
use crate::config::FilterConfig;
use crate::error::{Error, Result};
use crate::ingest::Transaction;

/// Why a rider did or did not make it into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderLabel {
    /// Frequency tier 0, 1 or 2.
    Tier(u8),
    /// Commuter-rail pass holder outside the exempt zone.
    CommuterRail,
}

/// Counts of riders at each filtering step, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub riders_seen: usize,
    pub infrequent: usize,
    pub commuter_rail: usize,
    pub kept: usize,
}

pub struct FeatureTableBuilder<'a> {
    cfg: &'a FilterConfig,
    duration: u32,
}

struct Categories {
    zipcodes: Vec<String>,
    tariffs: Vec<String>,
    user_types: Vec<String>,
    service_brands: Vec<String>,
}

fn sorted_unique<'t>(values: impl Iterator<Item = &'t str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn position_map(values: &[String]) -> HashMap<&str, usize> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (v.as_str(), i))
        .collect()
}

/// Indices of the `n` largest values; ties keep the lowest index first.
pub fn top_indices(values: &[f64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so equal counts stay in ascending index order
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order.truncate(n);
    order
}

impl<'a> FeatureTableBuilder<'a> {
    pub fn new(cfg: &'a FilterConfig, duration: u32) -> Self {
        Self { cfg, duration }
    }

    /// Labels a rider from its trip total and commuter-rail flag, in filter order.
    pub fn label(&self, total_trips: f64, commuter_rail: bool) -> RiderLabel {
        let min = f64::from(self.cfg.min_trips_per_month * self.duration);
        let frequent = f64::from(self.cfg.frequent_trips_per_month * self.duration);
        if total_trips <= min {
            RiderLabel::Tier(0)
        } else if commuter_rail {
            RiderLabel::CommuterRail
        } else if total_trips <= frequent {
            RiderLabel::Tier(1)
        } else {
            RiderLabel::Tier(2)
        }
    }

    #[tracing::instrument(skip_all, fields(transactions = transactions.len(), duration = self.duration))]
    pub fn build(&self, transactions: &[Transaction]) -> Result<(FeatureTable, FilterSummary)> {
        let riders = sorted_unique(transactions.iter().map(|t| t.rider_id.as_str()));
        let categories = Categories {
            zipcodes: sorted_unique(transactions.iter().map(|t| t.zipcode.as_str())),
            tariffs: sorted_unique(transactions.iter().map(|t| t.fare.tariff.as_str())),
            user_types: sorted_unique(transactions.iter().map(|t| t.fare.user_type.as_str())),
            service_brands: sorted_unique(
                transactions.iter().map(|t| t.fare.service_brand.as_str()),
            ),
        };
        let schema = FeatureSchema::for_riders(
            &categories.zipcodes,
            &categories.tariffs,
            &categories.user_types,
            &categories.service_brands,
        );
        debug!(riders = riders.len(), columns = schema.len(), "Feature schema built");

        let mut values = Array2::<f64>::zeros((riders.len(), schema.len()));
        let commuter_rail = self.count_trips(transactions, &riders, &categories, &schema, &mut values);
        derive_temporal_summaries(&schema, &mut values)?;
        check_totals(&schema, &riders, &mut values)?;

        let total_col = schema.indices_of(FeatureGroup::TotalTrips)[0];
        let mut summary = FilterSummary {
            riders_seen: riders.len(),
            ..Default::default()
        };
        let mut kept_rows = Vec::new();
        let mut kept_riders = Vec::new();
        let mut tiers = Vec::new();
        for (i, rider) in riders.iter().enumerate() {
            match self.label(values[[i, total_col]], commuter_rail[i]) {
                RiderLabel::Tier(tier @ (1 | 2)) => {
                    kept_rows.push(i);
                    kept_riders.push(rider.clone());
                    tiers.push(tier);
                }
                RiderLabel::Tier(_) => summary.infrequent += 1,
                RiderLabel::CommuterRail => summary.commuter_rail += 1,
            }
        }
        summary.kept = kept_rows.len();
        info!(
            seen = summary.riders_seen,
            infrequent = summary.infrequent,
            commuter_rail = summary.commuter_rail,
            kept = summary.kept,
            "Riders labeled and filtered"
        );

        let values = values.select(Axis(0), &kept_rows);
        Ok((FeatureTable::new(schema, kept_riders, values, tiers)?, summary))
    }

    /// Fills hourly, zipcode and purchasing counts; returns the commuter-rail flag per rider.
    fn count_trips(
        &self,
        transactions: &[Transaction],
        riders: &[String],
        categories: &Categories,
        schema: &FeatureSchema,
        values: &mut Array2<f64>,
    ) -> Vec<bool> {
        let rider_pos = position_map(riders);
        let hourly_cols = schema.indices_of(FeatureGroup::Hourly);
        let zip_cols = schema.indices_of(FeatureGroup::Zipcode);
        let tariff_cols = schema.indices_of(FeatureGroup::Tariff);
        let user_cols = schema.indices_of(FeatureGroup::UserType);
        let brand_cols = schema.indices_of(FeatureGroup::ServiceBrand);
        let zip_pos = position_map(&categories.zipcodes);
        let tariff_pos = position_map(&categories.tariffs);
        let user_pos = position_map(&categories.user_types);
        let brand_pos = position_map(&categories.service_brands);

        // Fare-zone counts only live long enough to flag commuter-rail riders.
        let mut brand_trips = vec![0usize; riders.len()];
        let mut exempt_zone_trips = vec![0usize; riders.len()];

        for tx in transactions {
            let r = rider_pos[tx.rider_id.as_str()];
            values[[r, hourly_cols[tx.day_of_week() * HOURS + tx.hour()]]] += 1.0;
            values[[r, zip_cols[zip_pos[tx.zipcode.as_str()]]]] += 1.0;
            values[[r, tariff_cols[tariff_pos[tx.fare.tariff.as_str()]]]] += 1.0;
            values[[r, user_cols[user_pos[tx.fare.user_type.as_str()]]]] += 1.0;
            values[[r, brand_cols[brand_pos[tx.fare.service_brand.as_str()]]]] += 1.0;

            if tx.fare.service_brand == self.cfg.commuter_rail_brand {
                brand_trips[r] += 1;
            }
            if tx
                .fare
                .zone
                .eq_ignore_ascii_case(&self.cfg.commuter_rail_exempt_zone)
            {
                exempt_zone_trips[r] += 1;
            }
        }

        brand_trips
            .iter()
            .zip(&exempt_zone_trips)
            .map(|(&cr, &exempt)| cr > 0 && exempt == 0)
            .collect()
    }
}

/// Computes week-part totals, 24-hour profiles, flexibility and peak hours
/// from the hourly block of every row.
fn derive_temporal_summaries(schema: &FeatureSchema, values: &mut Array2<f64>) -> Result<()> {
    let col = |name: &str| {
        schema
            .position(name)
            .ok_or_else(|| Error::Inconsistent(format!("schema lacks column {name}")))
    };
    let weekday_col = col("weekday")?;
    let weekend_col = col("weekend")?;
    let flex_wkday_col = col("flex_wkday_24")?;
    let flex_wkend_col = col("flex_wkend_24")?;
    let peak_cols = [
        col(PEAK_COLUMNS[0])?,
        col(PEAK_COLUMNS[1])?,
        col(PEAK_COLUMNS[2])?,
    ];
    let hourly_cols = schema.indices_of(FeatureGroup::Hourly);
    let wkday_cols = schema.indices_of(FeatureGroup::WeekdayHourly);
    let wkend_cols = schema.indices_of(FeatureGroup::WeekendHourly);

    for mut row in values.rows_mut() {
        let mut wkday = [0.0; HOURS];
        let mut wkend = [0.0; HOURS];
        for day in 0..DAYS {
            let target = if day < WEEKDAYS { &mut wkday } else { &mut wkend };
            for (hour, slot) in target.iter_mut().enumerate() {
                *slot += row[hourly_cols[day * HOURS + hour]];
            }
        }
        let weekday_total: f64 = wkday.iter().sum();
        let weekend_total: f64 = wkend.iter().sum();
        let total = weekday_total + weekend_total;

        row[weekday_col] = weekday_total;
        row[weekend_col] = weekend_total;
        for hour in 0..HOURS {
            row[wkday_cols[hour]] = wkday[hour];
            row[wkend_cols[hour]] = wkend[hour];
        }

        let wkday_top = top_indices(&wkday, 2);
        let wkend_top = top_indices(&wkend, 1);
        row[flex_wkday_col] = flexibility(wkday[wkday_top[0]], total);
        row[flex_wkend_col] = flexibility(wkend[wkend_top[0]], total);
        row[peak_cols[0]] = wkday_top[0] as f64;
        row[peak_cols[1]] = wkday_top[1] as f64;
        row[peak_cols[2]] = wkend_top[0] as f64;
    }
    Ok(())
}

fn flexibility(max_bin: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { max_bin / total }
}

/// Geographic and temporal totals both count trips; they must agree before
/// one of them becomes `total_num_trips`.
fn check_totals(schema: &FeatureSchema, riders: &[String], values: &mut Array2<f64>) -> Result<()> {
    let hourly_cols = schema.indices_of(FeatureGroup::Hourly);
    let zip_cols = schema.indices_of(FeatureGroup::Zipcode);
    let total_col = schema.indices_of(FeatureGroup::TotalTrips)[0];
    for (i, mut row) in values.rows_mut().into_iter().enumerate() {
        let hourly: f64 = hourly_cols.iter().map(|&c| row[c]).sum();
        let geographic: f64 = zip_cols.iter().map(|&c| row[c]).sum();
        if hourly != geographic {
            return Err(Error::Inconsistent(format!(
                "rider {}: {hourly} hourly trips vs {geographic} geographic trips",
                riders[i]
            )));
        }
        row[total_col] = geographic;
    }
    Ok(())
}
