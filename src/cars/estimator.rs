//! Price estimation pipeline
//!
//! Year and Mileage pass through unchanged; the categorical features are
//! one-hot encoded over the vocabulary seen at fit time. Categories that were
//! never seen encode as an all-zero block. The encoded rows are standardized
//! and fed to a ridge regressor fitted once against the cleaned dataset.

use std::collections::BTreeSet;

use aprender::linear_model::Ridge;
use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::{Estimator, Transformer};

use crate::cars::dataset::Dataset;
use crate::cars::types::{EstimationInput, VehicleRecord};
use crate::error::{ModelError, Result};

/// A model input column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Year,
    Mileage,
    FuelType,
    Transmission,
    Condition,
    Accident,
    Make,
    Model,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Year => "Year",
            Feature::Mileage => "Mileage",
            Feature::FuelType => "FuelType",
            Feature::Transmission => "Transmission",
            Feature::Condition => "Condition",
            Feature::Accident => "Accident",
            Feature::Make => "Make",
            Feature::Model => "Model",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Feature::Year | Feature::Mileage)
    }
}

/// Numeric passthrough features
pub const NUMERIC_FEATURES: [Feature; 2] = [Feature::Year, Feature::Mileage];

/// One-hot encoded features
pub const CATEGORICAL_FEATURES: [Feature; 6] = [
    Feature::FuelType,
    Feature::Transmission,
    Feature::Condition,
    Feature::Accident,
    Feature::Make,
    Feature::Model,
];

/// Feature columns in encoding order: numeric first, then categorical
pub fn feature_columns() -> Vec<Feature> {
    NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .copied()
        .collect()
}

/// A single raw feature value
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

/// Anything a feature row can be read from
pub trait FeatureSource {
    fn feature(&self, feature: Feature) -> FeatureValue;

    /// Values for `columns`, in that order
    fn feature_row(&self, columns: &[Feature]) -> Vec<FeatureValue> {
        columns.iter().map(|f| self.feature(*f)).collect()
    }
}

impl FeatureSource for VehicleRecord {
    fn feature(&self, feature: Feature) -> FeatureValue {
        match feature {
            Feature::Year => FeatureValue::Number(f64::from(self.year)),
            Feature::Mileage => FeatureValue::Number(self.mileage),
            Feature::FuelType => FeatureValue::Category(self.fuel_type.clone()),
            Feature::Transmission => FeatureValue::Category(self.transmission.clone()),
            Feature::Condition => FeatureValue::Category(self.condition.clone()),
            Feature::Accident => FeatureValue::Category(self.accident.clone()),
            Feature::Make => FeatureValue::Category(self.make.clone()),
            Feature::Model => FeatureValue::Category(self.model.clone()),
        }
    }
}

impl FeatureSource for EstimationInput {
    fn feature(&self, feature: Feature) -> FeatureValue {
        match feature {
            Feature::Year => FeatureValue::Number(f64::from(self.year)),
            Feature::Mileage => FeatureValue::Number(self.mileage),
            Feature::FuelType => FeatureValue::Category(self.fuel_type.trim().to_string()),
            Feature::Transmission => FeatureValue::Category(self.transmission.trim().to_string()),
            Feature::Condition => FeatureValue::Category(self.condition.trim().to_string()),
            Feature::Accident => FeatureValue::Category(self.accident.as_str().to_string()),
            Feature::Make => FeatureValue::Category(self.make.trim().to_string()),
            Feature::Model => FeatureValue::Category(self.model.trim().to_string()),
        }
    }
}

/// How one feature column turns into model inputs
#[derive(Debug, Clone, PartialEq)]
enum ColumnEncoding {
    Passthrough,
    /// Sorted vocabulary observed at fit time
    OneHot { categories: Vec<String> },
}

/// Numeric passthrough plus one-hot encoding with unknown categories ignored
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    columns: Vec<(Feature, ColumnEncoding)>,
}

impl FeatureEncoder {
    /// Learn the categorical vocabularies from `rows`
    pub fn fit(columns: &[Feature], rows: &[Vec<FeatureValue>]) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(j, feature)| {
                if feature.is_numeric() {
                    return (*feature, ColumnEncoding::Passthrough);
                }
                let vocabulary: BTreeSet<&str> = rows
                    .iter()
                    .filter_map(|row| match row.get(j) {
                        Some(FeatureValue::Category(c)) => Some(c.as_str()),
                        _ => None,
                    })
                    .collect();
                let categories = vocabulary.into_iter().map(str::to_string).collect();
                (*feature, ColumnEncoding::OneHot { categories })
            })
            .collect();

        Self { columns }
    }

    /// Number of encoded model inputs
    pub fn width(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, encoding)| match encoding {
                ColumnEncoding::Passthrough => 1,
                ColumnEncoding::OneHot { categories } => categories.len(),
            })
            .sum()
    }

    /// Encode one row of raw values
    pub fn transform(&self, row: &[FeatureValue]) -> std::result::Result<Vec<f64>, ModelError> {
        if row.len() != self.columns.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        let mut encoded = Vec::with_capacity(self.width());
        for ((feature, encoding), value) in self.columns.iter().zip(row) {
            match (encoding, value) {
                (ColumnEncoding::Passthrough, FeatureValue::Number(v)) => encoded.push(*v),
                (ColumnEncoding::OneHot { categories }, FeatureValue::Category(c)) => {
                    let hit = categories.binary_search(c).ok();
                    encoded.extend((0..categories.len()).map(|i| {
                        if Some(i) == hit {
                            1.0
                        } else {
                            0.0
                        }
                    }));
                }
                _ => {
                    return Err(ModelError::FeatureKindMismatch {
                        feature: feature.name().to_string(),
                    })
                }
            }
        }
        Ok(encoded)
    }
}

/// Ridge strength per training sample, applied to standardized columns.
/// Keeps the collinear one-hot blocks solvable.
const RIDGE_ALPHA_PER_SAMPLE: f32 = 1e-3;

/// Fitted encoder, scaler and ridge regressor
#[derive(Debug, Clone)]
pub struct PriceModel {
    encoder: FeatureEncoder,
    scaler: StandardScaler,
    regressor: Ridge,
}

impl PriceModel {
    /// Fit against already-encoded rows
    fn fit(
        encoder: FeatureEncoder,
        design: &[Vec<f64>],
        targets: &[f64],
    ) -> std::result::Result<Self, ModelError> {
        if design.len() != targets.len() {
            return Err(ModelError::SampleMismatch {
                samples: design.len(),
                targets: targets.len(),
            });
        }
        if design.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let x = to_matrix(design, encoder.width())?;
        let y = Vector::from_vec(targets.iter().map(|&t| t as f32).collect());

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x)?;

        let mut regressor = Ridge::new(RIDGE_ALPHA_PER_SAMPLE * design.len() as f32);
        regressor.fit(&scaled, &y)?;

        Ok(Self {
            encoder,
            scaler,
            regressor,
        })
    }

    /// Predict a price for one raw feature row
    pub fn predict(&self, row: &[FeatureValue]) -> Result<f64> {
        let encoded = self.encoder.transform(row)?;
        Ok(self.predict_encoded(&encoded)?)
    }

    fn predict_encoded(&self, encoded: &[f64]) -> std::result::Result<f64, ModelError> {
        let x = to_matrix(&[encoded.to_vec()], self.encoder.width())?;
        let scaled = self.scaler.transform(&x)?;
        Ok(f64::from(self.regressor.predict(&scaled)[0]))
    }

    /// Regression weights on standardized columns
    pub fn coefficients(&self) -> &[f32] {
        self.regressor.coefficients().as_slice()
    }
}

/// Row-major `f32` matrix from encoded rows of equal width
fn to_matrix(rows: &[Vec<f64>], width: usize) -> std::result::Result<Matrix<f32>, ModelError> {
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        data.extend(row.iter().map(|&v| v as f32));
    }
    Matrix::from_vec(rows.len(), width, data).map_err(|e| ModelError::Fit(e.into()))
}

/// Fit the price model against every record, targeting Price.
///
/// Returns the model together with the feature columns it expects.
pub fn build(dataset: &Dataset) -> Result<(PriceModel, Vec<Feature>)> {
    let columns = feature_columns();
    let rows: Vec<Vec<FeatureValue>> = dataset
        .records()
        .iter()
        .map(|record| record.feature_row(&columns))
        .collect();
    let targets: Vec<f64> = dataset.records().iter().map(|r| r.price).collect();

    let encoder = FeatureEncoder::fit(&columns, &rows);
    let design = rows
        .iter()
        .map(|row| encoder.transform(row))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let model = PriceModel::fit(encoder, &design, &targets)?;

    tracing::info!(
        samples = targets.len(),
        width = model.encoder.width(),
        "Price model fitted"
    );

    Ok((model, columns))
}

/// Predict the price for a normalized input
pub fn estimate(model: &PriceModel, feature_columns: &[Feature], input: &EstimationInput) -> Result<f64> {
    model.predict(&input.feature_row(feature_columns))
}
