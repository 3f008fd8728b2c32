//! Vehicle sales module
//!
//! Contains the record types, dataset loading, filtering, and the price model.

pub mod dataset;
pub mod estimator;
pub mod filters;
pub mod report;
pub mod types;
