//! Typed feature-column schema.
//!
//! Every column carries its [`FeatureGroup`] from the moment it is created, so
//! downstream weighting and aggregation look groups up instead of scanning
//! column names. Names only matter at the CSV boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DAYS: usize = 7;
pub const HOURS: usize = 24;
pub const WEEKDAYS: usize = 5;
pub const HOURLY_BINS: usize = DAYS * HOURS;

/// Peak-hour indicator columns, in table order.
pub const PEAK_COLUMNS: [&str; 3] = ["max_wkday_24_1", "max_wkday_24_2", "max_wkend_24_1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureGroup {
    /// Trip counts per (day of week, hour of day).
    Hourly,
    /// Weekday and weekend trip totals.
    WeekPartTotal,
    /// Weekday trips collapsed to 24 hours.
    WeekdayHourly,
    /// Weekend trips collapsed to 24 hours.
    WeekendHourly,
    /// Largest 24-hour bin over total trips.
    Flexibility,
    /// Hour-of-day index of the busiest bins.
    PeakHour,
    Zipcode,
    TotalTrips,
    Tariff,
    UserType,
    ServiceBrand,
}

impl FeatureGroup {
    /// Columns weighted as "time" in clustering.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FeatureGroup::Hourly | FeatureGroup::PeakHour | FeatureGroup::Flexibility
        )
    }

    pub fn is_purchasing(self) -> bool {
        matches!(
            self,
            FeatureGroup::Tariff | FeatureGroup::UserType | FeatureGroup::ServiceBrand
        )
    }

    /// Name prefix of columns that carry a value (hour, zipcode, category).
    pub fn value_prefix(self) -> Option<&'static str> {
        match self {
            FeatureGroup::Hourly => Some("hr_"),
            FeatureGroup::WeekdayHourly => Some("wkday_24_"),
            FeatureGroup::WeekendHourly => Some("wkend_24_"),
            FeatureGroup::Zipcode => Some("zipcode_"),
            FeatureGroup::Tariff => Some("tariff_"),
            FeatureGroup::UserType => Some("usertype_"),
            FeatureGroup::ServiceBrand => Some("servicebrand_"),
            _ => None,
        }
    }
}

const FIXED_NAMES: &[(&str, FeatureGroup)] = &[
    ("weekday", FeatureGroup::WeekPartTotal),
    ("weekend", FeatureGroup::WeekPartTotal),
    ("flex_wkday_24", FeatureGroup::Flexibility),
    ("flex_wkend_24", FeatureGroup::Flexibility),
    ("max_wkday_24_1", FeatureGroup::PeakHour),
    ("max_wkday_24_2", FeatureGroup::PeakHour),
    ("max_wkend_24_1", FeatureGroup::PeakHour),
    ("total_num_trips", FeatureGroup::TotalTrips),
];

const PREFIXED_GROUPS: &[FeatureGroup] = &[
    FeatureGroup::WeekdayHourly,
    FeatureGroup::WeekendHourly,
    FeatureGroup::Hourly,
    FeatureGroup::Zipcode,
    FeatureGroup::Tariff,
    FeatureGroup::UserType,
    FeatureGroup::ServiceBrand,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub group: FeatureGroup,
    pub name: String,
}

impl ColumnSpec {
    fn fixed(name: &str, group: FeatureGroup) -> Self {
        Self {
            group,
            name: name.to_string(),
        }
    }

    fn valued(group: FeatureGroup, value: &str) -> Self {
        let prefix = group.value_prefix().unwrap_or_default();
        Self {
            group,
            name: format!("{prefix}{value}"),
        }
    }

    pub fn hourly(day: usize, hour: usize) -> Self {
        Self::valued(FeatureGroup::Hourly, &format!("{day}_{hour}"))
    }

    pub fn zipcode(zip: &str) -> Self {
        Self::valued(FeatureGroup::Zipcode, zip)
    }

    pub fn category(group: FeatureGroup, value: &str) -> Self {
        debug_assert!(group.is_purchasing());
        Self::valued(group, value)
    }

    /// The part of the name after the group prefix: the zipcode, the fare
    /// category, or the full name for fixed columns.
    pub fn key(&self) -> &str {
        self.group
            .value_prefix()
            .and_then(|p| self.name.strip_prefix(p))
            .unwrap_or(&self.name)
    }

    /// Recovers a column from its CSV header.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some((fixed, group)) = FIXED_NAMES.iter().find(|(n, _)| *n == name) {
            return Some(Self::fixed(fixed, *group));
        }
        PREFIXED_GROUPS.iter().find_map(|group| {
            let prefix = group.value_prefix()?;
            name.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|_| Self {
                    group: *group,
                    name: name.to_string(),
                })
        })
    }
}

/// Ordered column list with name and group lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self { columns, index }
    }

    /// Builds the rider feature schema: the fixed temporal block, one column per
    /// zipcode, the trip total, then the purchasing categories.
    pub fn for_riders(
        zipcodes: &[String],
        tariffs: &[String],
        user_types: &[String],
        service_brands: &[String],
    ) -> Self {
        let mut columns = Vec::with_capacity(
            HOURLY_BINS + 2 + 2 * HOURS + 2 + 3 + zipcodes.len() + 1
                + tariffs.len()
                + user_types.len()
                + service_brands.len(),
        );
        for day in 0..DAYS {
            for hour in 0..HOURS {
                columns.push(ColumnSpec::hourly(day, hour));
            }
        }
        columns.push(ColumnSpec::fixed("weekday", FeatureGroup::WeekPartTotal));
        columns.push(ColumnSpec::fixed("weekend", FeatureGroup::WeekPartTotal));
        for hour in 0..HOURS {
            columns.push(ColumnSpec::valued(FeatureGroup::WeekdayHourly, &hour.to_string()));
        }
        for hour in 0..HOURS {
            columns.push(ColumnSpec::valued(FeatureGroup::WeekendHourly, &hour.to_string()));
        }
        columns.push(ColumnSpec::fixed("flex_wkday_24", FeatureGroup::Flexibility));
        columns.push(ColumnSpec::fixed("flex_wkend_24", FeatureGroup::Flexibility));
        for name in PEAK_COLUMNS {
            columns.push(ColumnSpec::fixed(name, FeatureGroup::PeakHour));
        }
        columns.extend(zipcodes.iter().map(|z| ColumnSpec::zipcode(z)));
        columns.push(ColumnSpec::fixed("total_num_trips", FeatureGroup::TotalTrips));
        columns.extend(tariffs.iter().map(|v| ColumnSpec::category(FeatureGroup::Tariff, v)));
        columns.extend(user_types.iter().map(|v| ColumnSpec::category(FeatureGroup::UserType, v)));
        columns.extend(
            service_brands
                .iter()
                .map(|v| ColumnSpec::category(FeatureGroup::ServiceBrand, v)),
        );
        Self::new(columns)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> &ColumnSpec {
        &self.columns[idx]
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Column index of the hourly bin for (`day`, `hour`), Monday = 0.
    pub fn hourly_position(&self, day: usize, hour: usize) -> Option<usize> {
        self.position(&ColumnSpec::hourly(day, hour).name)
    }

    pub fn indices_of(&self, group: FeatureGroup) -> Vec<usize> {
        self.indices_where(|g| g == group)
    }

    pub fn indices_where(&self, pred: impl Fn(FeatureGroup) -> bool) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c.group))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rider_schema_layout() {
        let schema = FeatureSchema::for_riders(
            &strings(&["02139", "02140"]),
            &strings(&["Monthly"]),
            &strings(&["Adult", "Student"]),
            &strings(&["Subway"]),
        );
        assert_eq!(schema.indices_of(FeatureGroup::Hourly).len(), HOURLY_BINS);
        assert_eq!(schema.indices_of(FeatureGroup::Zipcode).len(), 2);
        assert_eq!(schema.indices_where(FeatureGroup::is_purchasing).len(), 4);
        // 168 hourly + 3 peak + 2 flex
        assert_eq!(schema.indices_where(FeatureGroup::is_temporal).len(), 173);
        assert_eq!(schema.hourly_position(0, 8), Some(8));
        assert_eq!(schema.hourly_position(6, 23), Some(167));
    }

    #[test]
    fn test_from_name_recovers_group() {
        let cases = [
            ("hr_3_17", FeatureGroup::Hourly),
            ("wkday_24_5", FeatureGroup::WeekdayHourly),
            ("max_wkday_24_1", FeatureGroup::PeakHour),
            ("zipcode_02139", FeatureGroup::Zipcode),
            ("usertype_Senior/TAP", FeatureGroup::UserType),
            ("total_num_trips", FeatureGroup::TotalTrips),
        ];
        for (name, group) in cases {
            let col = ColumnSpec::from_name(name).unwrap();
            assert_eq!(col.group, group, "{name}");
            assert_eq!(col.name, name);
        }
        assert!(ColumnSpec::from_name("riderID").is_none());
        assert!(ColumnSpec::from_name("zipcode_").is_none());
    }

    #[test]
    fn test_key_strips_prefix() {
        assert_eq!(ColumnSpec::zipcode("02139").key(), "02139");
        assert_eq!(
            ColumnSpec::category(FeatureGroup::ServiceBrand, "Commuter Rail").key(),
            "Commuter Rail"
        );
        assert_eq!(ColumnSpec::from_name("weekday").unwrap().key(), "weekday");
    }
}
