//! Vehicle sales type definitions
//!
//! Records loaded from the sales table plus the query and estimation inputs
//! that tools build from their arguments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One cleaned vehicle sale entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    #[serde(rename = "Make")]
    pub make: String,

    #[serde(rename = "Model")]
    pub model: String,

    #[serde(rename = "Year")]
    pub year: i32,

    #[serde(rename = "Mileage")]
    pub mileage: f64,

    #[serde(rename = "Price")]
    pub price: f64,

    #[serde(rename = "FuelType")]
    pub fuel_type: String,

    #[serde(rename = "Color")]
    pub color: String,

    #[serde(rename = "Transmission")]
    pub transmission: String,

    #[serde(rename = "Options")]
    pub options: String,

    #[serde(rename = "Condition")]
    pub condition: String,

    #[serde(rename = "Accident")]
    pub accident: String,
}

/// Whether the vehicle was involved in an accident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum Accident {
    Yes,
    #[default]
    No,
}

impl Accident {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accident::Yes => "Yes",
            Accident::No => "No",
        }
    }
}

/// Price ordering for `top_cars`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Cheap,
    Expensive,
}

/// Predicates selecting a subset of records.
///
/// String fields match case-insensitively after trimming; bounds are inclusive.
/// A `None` field imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub make: Option<String>,
    pub model: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub condition: Option<String>,
    pub accident: Option<Accident>,
    pub year_min: Option<i64>,
    pub year_max: Option<i64>,
    pub price_max: Option<f64>,
    pub mileage_max: Option<f64>,
}

/// Normalized input for a single price estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationInput {
    #[serde(rename = "Make")]
    pub make: String,

    #[serde(rename = "Model")]
    pub model: String,

    #[serde(rename = "Year")]
    pub year: i32,

    #[serde(rename = "Mileage")]
    pub mileage: f64,

    #[serde(rename = "FuelType")]
    pub fuel_type: String,

    #[serde(rename = "Transmission")]
    pub transmission: String,

    #[serde(rename = "Condition")]
    pub condition: String,

    #[serde(rename = "Accident")]
    pub accident: Accident,
}

/// Condition assumed when the caller gives none
pub const DEFAULT_CONDITION: &str = "Used";
