//! Shared service state
//!
//! The cleaned dataset and the fitted price model, built together once and
//! only read afterwards.

use std::path::Path;

use crate::cars::dataset::Dataset;
use crate::cars::estimator::{self, Feature, PriceModel};
use crate::error::Result;

/// Everything a tool handler reads
#[derive(Debug, Clone)]
pub struct AdvisorContext {
    dataset: Dataset,
    model: PriceModel,
    feature_columns: Vec<Feature>,
}

impl AdvisorContext {
    /// Load and clean the table at `path`, then fit the price model
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_dataset(Dataset::load(path)?)
    }

    /// Fit the price model against an already-cleaned dataset
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        let (model, feature_columns) = estimator::build(&dataset)?;
        Ok(Self {
            dataset,
            model,
            feature_columns,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn model(&self) -> &PriceModel {
        &self.model
    }

    pub fn feature_columns(&self) -> &[Feature] {
        &self.feature_columns
    }
}
