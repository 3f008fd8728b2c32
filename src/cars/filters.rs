//! Record filtering and ranking
//!
//! Selects the records matching a [`FilterCriteria`] and orders them by price.

use std::cmp::Ordering;

use crate::cars::dataset::Dataset;
use crate::cars::types::{FilterCriteria, SortOrder, VehicleRecord};

/// Case-insensitive, trimmed string equality
fn same_text(value: &str, wanted: &str) -> bool {
    value.trim().to_lowercase() == wanted.trim().to_lowercase()
}

/// Blank criteria values impose no constraint
fn text_matches(value: &str, wanted: Option<&str>) -> bool {
    match wanted {
        Some(wanted) if !wanted.trim().is_empty() => same_text(value, wanted),
        _ => true,
    }
}

impl FilterCriteria {
    /// Whether a record satisfies every predicate present
    pub fn matches(&self, record: &VehicleRecord) -> bool {
        text_matches(&record.make, self.make.as_deref())
            && text_matches(&record.model, self.model.as_deref())
            && text_matches(&record.fuel_type, self.fuel_type.as_deref())
            && text_matches(&record.transmission, self.transmission.as_deref())
            && text_matches(&record.condition, self.condition.as_deref())
            && text_matches(&record.accident, self.accident.map(|a| a.as_str()))
            && self.year_min.map_or(true, |min| i64::from(record.year) >= min)
            && self.year_max.map_or(true, |max| i64::from(record.year) <= max)
            && self.price_max.map_or(true, |max| record.price <= max)
            && self.mileage_max.map_or(true, |max| record.mileage <= max)
    }
}

impl Dataset {
    /// Records satisfying `criteria`, in dataset order
    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<&VehicleRecord> {
        self.records()
            .iter()
            .filter(|record| criteria.matches(record))
            .collect()
    }
}

/// Price ascending, newer year first among equal prices
pub fn by_price_then_newest(a: &VehicleRecord, b: &VehicleRecord) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| b.year.cmp(&a.year))
}

/// Sort for `filter_cars` and `recommend`, then keep the first `limit`
pub fn cheapest_first(mut records: Vec<&VehicleRecord>, limit: usize) -> Vec<&VehicleRecord> {
    records.sort_by(|a, b| by_price_then_newest(a, b));
    records.truncate(limit);
    records
}

/// Sort by price in the requested direction, then keep the first `n`
pub fn rank_by_price(
    mut records: Vec<&VehicleRecord>,
    order: SortOrder,
    n: usize,
) -> Vec<&VehicleRecord> {
    match order {
        SortOrder::Cheap => records.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortOrder::Expensive => records.sort_by(|a, b| b.price.total_cmp(&a.price)),
    }
    records.truncate(n);
    records
}

/// Mean price, `None` for an empty subset
pub fn mean_price(records: &[&VehicleRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let total: f64 = records.iter().map(|r| r.price).sum();
    Some(total / records.len() as f64)
}
