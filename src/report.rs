//! Report Assembler: rider-type label and summary text per cluster profile.
//!
//! The rider-type classifier is pluggable; [`RuleBasedClassifier`] reads the
//! shape of the weekly pattern and is used when no trained model is supplied.

use crate::features::{DAYS, FeatureGroup, HOURS, WEEKDAYS};
use crate::profile::{ProfileGroup, ProfileTable};

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiderType {
    WeekdayCommuter = 0,
    WeekdayDaytime = 1,
    EveningNight = 2,
    Weekend = 3,
    AllWeekRegular = 4,
    EarlyMorningShift = 5,
    Irregular = 6,
}

impl RiderType {
    pub const ALL: [RiderType; 7] = [
        RiderType::WeekdayCommuter,
        RiderType::WeekdayDaytime,
        RiderType::EveningNight,
        RiderType::Weekend,
        RiderType::AllWeekRegular,
        RiderType::EarlyMorningShift,
        RiderType::Irregular,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            RiderType::WeekdayCommuter => "a weekday commuter with morning and evening peaks",
            RiderType::WeekdayDaytime => "a weekday daytime rider",
            RiderType::EveningNight => "an evening and late-night rider",
            RiderType::Weekend => "a mostly weekend rider",
            RiderType::AllWeekRegular => "a regular rider throughout the week",
            RiderType::EarlyMorningShift => "an early-morning shift worker",
            RiderType::Irregular => "an irregular rider",
        }
    }
}

/// Maps a cluster's 7x24 trip distribution (Monday = 0) to a rider-type id in
/// `0..7`.
pub trait RiderTypeClassifier: Send + Sync {
    fn classify(&self, pattern: &[[f64; HOURS]; DAYS]) -> u8;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

fn share(pattern: &[[f64; HOURS]; DAYS], days: std::ops::Range<usize>, hours: &[usize]) -> f64 {
    days.map(|d| hours.iter().map(|h| pattern[d][*h]).sum::<f64>())
        .sum()
}

impl RiderTypeClassifier for RuleBasedClassifier {
    fn classify(&self, pattern: &[[f64; HOURS]; DAYS]) -> u8 {
        let all: Vec<usize> = (0..HOURS).collect();
        let total = share(pattern, 0..DAYS, &all);
        if total <= 0.0 {
            return RiderType::Irregular.id();
        }
        let frac = |days: std::ops::Range<usize>, hours: &[usize]| share(pattern, days, hours) / total;

        let weekend = frac(WEEKDAYS..DAYS, &all);
        let early = frac(0..WEEKDAYS, &[3, 4, 5]);
        let am = frac(0..WEEKDAYS, &[6, 7, 8, 9]);
        let pm = frac(0..WEEKDAYS, &[16, 17, 18, 19]);
        let midday = frac(0..WEEKDAYS, &[10, 11, 12, 13, 14, 15]);
        let night = frac(0..DAYS, &[20, 21, 22, 23, 0, 1, 2]);

        let kind = if weekend >= 0.5 {
            RiderType::Weekend
        } else if early >= 0.3 {
            RiderType::EarlyMorningShift
        } else if am >= 0.2 && pm >= 0.2 && am + pm >= 0.6 {
            RiderType::WeekdayCommuter
        } else if night >= 0.35 {
            RiderType::EveningNight
        } else if midday >= 0.4 {
            RiderType::WeekdayDaytime
        } else if weekend >= 0.2 {
            RiderType::AllWeekRegular
        } else {
            RiderType::Irregular
        };
        kind.id()
    }
}

/// Day (within `days`) with the largest share at `hour`; ties go to the
/// earlier day.
fn busiest_day(pattern: &[[f64; HOURS]; DAYS], days: std::ops::Range<usize>, hour: usize) -> usize {
    let hour = hour.min(HOURS - 1);
    days.fold(None::<(usize, f64)>, |best, d| match best {
        Some((_, v)) if v >= pattern[d][hour] => best,
        _ => Some((d, pattern[d][hour])),
    })
    .map_or(0, |(d, _)| d)
}

/// Two-decimal rounding for display.
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Classifies every row and renders its report.
pub fn annotate(table: &mut ProfileTable, classifier: &dyn RiderTypeClassifier) {
    let peaks = table.peak_positions();
    let size = table.position("cluster_size");
    let avg = table.position("cluster_avg_num_trips");
    let zips: Vec<(usize, String)> = table
        .indices_of(ProfileGroup::Feature(FeatureGroup::Zipcode))
        .into_iter()
        .map(|i| (i, table.columns()[i].key().to_string()))
        .collect();
    let patterns: Vec<[[f64; HOURS]; DAYS]> = (0..table.len()).map(|r| table.hourly_matrix(r)).collect();

    for (row, pattern) in table.rows_mut().iter_mut().zip(patterns) {
        let rider_type = classifier.classify(&pattern);
        let kind = RiderType::from_id(rider_type).unwrap_or(RiderType::Irregular);
        let value = |pos: Option<usize>| pos.map_or(0.0, |c| row.values[c]);
        let hour = |i: usize| value(peaks[i]).max(0.0) as usize;

        let (wd1, wd2, we1) = (hour(0), hour(1), hour(2));
        let top_zip = zips
            .iter()
            .fold(None::<(&str, f64)>, |best, (c, zip)| match best {
                Some((_, v)) if v >= row.values[*c] => best,
                _ => Some((zip.as_str(), row.values[*c])),
            })
            .map_or("N/A", |(z, _)| z);

        let report = format!(
            "Cluster {}'s predicted type of rider is {}. \
             There are {} riders in the cluster, taking on average {} trips. \
             The top 2 most frequent trip time during weekday is {} {}:00 and {} {}:00. \
             The top 1 most frequent trip time during weekend is {} {}:00. \
             The top 1 most frequent trip origin is at zipcode {}.",
            row.cluster,
            kind.description(),
            value(size) as u64,
            round2(value(avg)),
            DAY_NAMES[busiest_day(&pattern, 0..WEEKDAYS, wd1)],
            wd1,
            DAY_NAMES[busiest_day(&pattern, 0..WEEKDAYS, wd2)],
            wd2,
            DAY_NAMES[busiest_day(&pattern, WEEKDAYS..DAYS, we1)],
            we1,
            top_zip,
        );
        row.rider_type = rider_type;
        row.report = report;
    }
}
