//! MCP Tool definitions and handlers
//!
//! Defines all available tools, their argument schemas, and their implementations.

use std::path::PathBuf;
use std::sync::Arc;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::cars::estimator;
use crate::cars::filters::{cheapest_first, mean_price, rank_by_price};
use crate::cars::types::{
    Accident, EstimationInput, FilterCriteria, SortOrder, VehicleRecord, DEFAULT_CONDITION,
};
use crate::error::{AdvisorError, McpError, Result, ValidationError};
use crate::mcp::context::AdvisorContext;
use crate::mcp::payload;
use crate::mcp::types::{CallToolResult, Tool};

// ==================== Tool Arguments ====================

/// Integer fields accept any JSON number with no fractional part, so `2015.0`
/// reads as `2015` while `2015.5` is rejected.
mod whole_number {
    use serde::de::{Deserializer, Error, Unexpected};
    use serde::Deserialize;
    use serde_json::Number;

    fn integral<E: Error>(number: Number) -> Result<i64, E> {
        if let Some(value) = number.as_i64() {
            return Ok(value);
        }
        match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
            Some(f) => Err(E::invalid_value(Unexpected::Float(f), &"an integer")),
            None => Err(E::custom(format!("integer out of range: {}", number))),
        }
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Number>::deserialize(deserializer)?
            .map(integral)
            .transpose()
    }

    pub fn int32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        let value = integral::<D::Error>(Number::deserialize(deserializer)?)?;
        i32::try_from(value)
            .map_err(|_| D::Error::invalid_value(Unexpected::Signed(value), &"a 32-bit integer"))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        let value = integral::<D::Error>(Number::deserialize(deserializer)?)?;
        usize::try_from(value)
            .map_err(|_| D::Error::invalid_value(Unexpected::Signed(value), &"a non-negative integer"))
    }
}

fn default_filter_limit() -> usize {
    20
}

fn default_recommend_limit() -> usize {
    10
}

fn default_top_n() -> usize {
    10
}

fn default_condition() -> String {
    DEFAULT_CONDITION.to_string()
}

/// Arguments for `filter_cars`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FilterCarsArgs {
    /// Manufacturer, e.g. "Toyota"
    #[serde(rename = "Make", default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    /// Model name, e.g. "Corolla"
    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Earliest model year (inclusive)
    #[serde(
        rename = "Year_min",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub year_min: Option<i64>,

    /// Latest model year (inclusive)
    #[serde(
        rename = "Year_max",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub year_max: Option<i64>,

    /// Highest price (inclusive)
    #[serde(rename = "Price_max", default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,

    /// Highest mileage (inclusive)
    #[serde(rename = "Mileage_max", default, skip_serializing_if = "Option::is_none")]
    pub mileage_max: Option<f64>,

    #[serde(rename = "FuelType", default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(rename = "Transmission", default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Accident", default, skip_serializing_if = "Option::is_none")]
    pub accident: Option<Accident>,

    /// Maximum number of results
    #[serde(default = "default_filter_limit", deserialize_with = "whole_number::count")]
    pub limit: usize,
}

/// Arguments for `recommend`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RecommendArgs {
    /// Highest acceptable price (inclusive)
    pub budget_max: f64,

    #[serde(rename = "Make", default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(rename = "FuelType", default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(rename = "Transmission", default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Accident", default, skip_serializing_if = "Option::is_none")]
    pub accident: Option<Accident>,

    /// Earliest model year (inclusive)
    #[serde(
        rename = "Year_min",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub year_min: Option<i64>,

    /// Maximum number of recommendations
    #[serde(default = "default_recommend_limit", deserialize_with = "whole_number::count")]
    pub limit: usize,
}

/// Arguments for `estimate_price`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EstimatePriceArgs {
    #[serde(rename = "Make", default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(rename = "Year", deserialize_with = "whole_number::int32")]
    pub year: i32,

    #[serde(rename = "Mileage")]
    pub mileage: f64,

    #[serde(rename = "FuelType")]
    pub fuel_type: String,

    #[serde(rename = "Transmission")]
    pub transmission: String,

    #[serde(rename = "Condition", default = "default_condition")]
    pub condition: String,

    #[serde(rename = "Accident", default)]
    pub accident: Accident,
}

/// Arguments for `average_price`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AveragePriceArgs {
    #[serde(rename = "Make", default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(rename = "FuelType", default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(rename = "Transmission", default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Accident", default, skip_serializing_if = "Option::is_none")]
    pub accident: Option<Accident>,

    #[serde(
        rename = "Year_min",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub year_min: Option<i64>,

    #[serde(
        rename = "Year_max",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub year_max: Option<i64>,
}

/// Arguments for `top_cars`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TopCarsArgs {
    /// Number of results
    #[serde(default = "default_top_n", deserialize_with = "whole_number::count")]
    pub n: usize,

    /// "cheap" sorts ascending by price, "expensive" descending
    #[serde(default)]
    pub sort_order: SortOrder,

    #[serde(rename = "Make", default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(rename = "FuelType", default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(rename = "Transmission", default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Accident", default, skip_serializing_if = "Option::is_none")]
    pub accident: Option<Accident>,
}

impl From<&FilterCarsArgs> for FilterCriteria {
    fn from(args: &FilterCarsArgs) -> Self {
        Self {
            make: args.make.clone(),
            model: args.model.clone(),
            fuel_type: args.fuel_type.clone(),
            transmission: args.transmission.clone(),
            condition: args.condition.clone(),
            accident: args.accident,
            year_min: args.year_min,
            year_max: args.year_max,
            price_max: args.price_max,
            mileage_max: args.mileage_max,
        }
    }
}

impl From<&RecommendArgs> for FilterCriteria {
    fn from(args: &RecommendArgs) -> Self {
        Self {
            make: args.make.clone(),
            fuel_type: args.fuel_type.clone(),
            transmission: args.transmission.clone(),
            condition: args.condition.clone(),
            accident: args.accident,
            year_min: args.year_min,
            price_max: Some(args.budget_max),
            ..Default::default()
        }
    }
}

impl From<&AveragePriceArgs> for FilterCriteria {
    fn from(args: &AveragePriceArgs) -> Self {
        Self {
            make: args.make.clone(),
            model: args.model.clone(),
            fuel_type: args.fuel_type.clone(),
            transmission: args.transmission.clone(),
            condition: args.condition.clone(),
            accident: args.accident,
            year_min: args.year_min,
            year_max: args.year_max,
            ..Default::default()
        }
    }
}

impl From<&TopCarsArgs> for FilterCriteria {
    fn from(args: &TopCarsArgs) -> Self {
        Self {
            make: args.make.clone(),
            fuel_type: args.fuel_type.clone(),
            transmission: args.transmission.clone(),
            condition: args.condition.clone(),
            accident: args.accident,
            ..Default::default()
        }
    }
}

impl From<EstimatePriceArgs> for EstimationInput {
    fn from(args: EstimatePriceArgs) -> Self {
        Self {
            make: args.make.unwrap_or_default(),
            model: args.model.unwrap_or_default(),
            year: args.year,
            mileage: args.mileage,
            fuel_type: args.fuel_type,
            transmission: args.transmission,
            condition: args.condition,
            accident: args.accident,
        }
    }
}

// ==================== Tool Results ====================

/// Projection of a record returned by the listing tools
#[derive(Debug, Serialize)]
pub struct CarRow<'a> {
    #[serde(rename = "Make")]
    pub make: &'a str,
    #[serde(rename = "Model")]
    pub model: &'a str,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Mileage")]
    pub mileage: f64,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "FuelType")]
    pub fuel_type: &'a str,
    #[serde(rename = "Transmission")]
    pub transmission: &'a str,
    #[serde(rename = "Condition")]
    pub condition: &'a str,
    #[serde(rename = "Accident")]
    pub accident: &'a str,
    #[serde(rename = "Color", skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
}

impl<'a> CarRow<'a> {
    fn project(record: &'a VehicleRecord, with_color: bool) -> Self {
        Self {
            make: &record.make,
            model: &record.model,
            year: record.year,
            mileage: record.mileage,
            price: record.price,
            fuel_type: &record.fuel_type,
            transmission: &record.transmission,
            condition: &record.condition,
            accident: &record.accident,
            color: with_color.then_some(record.color.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FilterCarsResult<'a> {
    pub count: usize,
    pub results: Vec<CarRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResult<'a> {
    pub budget_max: f64,
    pub count: usize,
    pub recommendations: Vec<CarRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EstimatePriceResult {
    pub input: EstimationInput,
    pub estimated_price: f64,
}

#[derive(Debug, Serialize)]
pub struct AveragePriceResult {
    pub filters: AveragePriceArgs,
    pub average_price: Option<f64>,
    pub samples: usize,
}

#[derive(Debug, Serialize)]
pub struct TopCarsResult<'a> {
    pub order: SortOrder,
    pub results: Vec<CarRow<'a>>,
}

// ==================== Tool Registry ====================

/// The tools this server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    FilterCars,
    Recommend,
    EstimatePrice,
    AveragePrice,
    TopCars,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::FilterCars,
        ToolKind::Recommend,
        ToolKind::EstimatePrice,
        ToolKind::AveragePrice,
        ToolKind::TopCars,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::FilterCars => "filter_cars",
            ToolKind::Recommend => "recommend",
            ToolKind::EstimatePrice => "estimate_price",
            ToolKind::AveragePrice => "average_price",
            ToolKind::TopCars => "top_cars",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::FilterCars => "Filter cars by criteria (make/model, year, price, mileage, fuel, transmission, condition, accident).",
            ToolKind::Recommend => "Recommend cars within a budget and preferences (fuel, transmission, condition, accident-free). Sorted by ascending price.",
            ToolKind::EstimatePrice => "Estimate the price of a car (linear regression trained with Year, Mileage, FuelType, Transmission, Condition, Accident, Make/Model).",
            ToolKind::AveragePrice => "Average price with filters (make/model, fuel, transmission, year range, condition, accident).",
            ToolKind::TopCars => "Top N by price (cheap/expensive) with optional filters.",
        }
    }

    /// JSON Schema for the tool's arguments
    pub fn input_schema(&self) -> Result<Value> {
        match self {
            ToolKind::FilterCars => input_schema::<FilterCarsArgs>(),
            ToolKind::Recommend => input_schema::<RecommendArgs>(),
            ToolKind::EstimatePrice => input_schema::<EstimatePriceArgs>(),
            ToolKind::AveragePrice => input_schema::<AveragePriceArgs>(),
            ToolKind::TopCars => input_schema::<TopCarsArgs>(),
        }
    }
}

/// Generate a self-contained schema: subschemas inlined, `Option<T>` as `T`
pub fn input_schema<T: JsonSchema>() -> Result<Value> {
    let generator = SchemaSettings::draft07()
        .with(|settings| {
            settings.inline_subschemas = true;
            settings.option_nullable = false;
            settings.option_add_null_type = false;
        })
        .into_generator();
    let mut schema = serde_json::to_value(generator.into_root_schema_for::<T>())?;
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    Ok(schema)
}

/// Check `args` against a declared schema, then build the typed arguments.
///
/// Absent or `null` arguments count as an empty object. Required properties
/// are checked first so the error names the missing field; type, enum, and
/// unexpected-property checks come from deserialization.
pub fn validate_arguments<A: DeserializeOwned>(schema: &Value, args: &Value) -> Result<A> {
    let object = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(ValidationError::InvalidArguments {
                message: format!("arguments must be an object, got {}", other),
            }
            .into())
        }
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for field in required {
        if !object.contains_key(field) {
            return Err(ValidationError::MissingField {
                field: field.to_string(),
            }
            .into());
        }
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| {
        ValidationError::InvalidArguments {
            message: e.to_string(),
        }
        .into()
    })
}

// ==================== Tool Handlers ====================

fn handle_filter_cars(ctx: &AdvisorContext, args: FilterCarsArgs) -> Result<FilterCarsResult<'_>> {
    let subset = ctx.dataset().filter(&FilterCriteria::from(&args));
    let results: Vec<CarRow<'_>> = cheapest_first(subset, args.limit)
        .into_iter()
        .map(|record| CarRow::project(record, true))
        .collect();
    Ok(FilterCarsResult {
        count: results.len(),
        results,
    })
}

fn handle_recommend(ctx: &AdvisorContext, args: RecommendArgs) -> Result<RecommendResult<'_>> {
    let subset = ctx.dataset().filter(&FilterCriteria::from(&args));
    let recommendations: Vec<CarRow<'_>> = cheapest_first(subset, args.limit)
        .into_iter()
        .map(|record| CarRow::project(record, false))
        .collect();
    Ok(RecommendResult {
        budget_max: args.budget_max,
        count: recommendations.len(),
        recommendations,
    })
}

fn handle_estimate_price(ctx: &AdvisorContext, args: EstimatePriceArgs) -> Result<EstimatePriceResult> {
    let input = EstimationInput::from(args);
    let estimated_price = estimator::estimate(ctx.model(), ctx.feature_columns(), &input)?;
    if !estimated_price.is_finite() {
        return Err(AdvisorError::Internal {
            message: format!("estimate for {:?} is not a finite number", input),
        });
    }
    Ok(EstimatePriceResult {
        input,
        estimated_price,
    })
}

fn handle_average_price(ctx: &AdvisorContext, args: AveragePriceArgs) -> Result<AveragePriceResult> {
    let subset = ctx.dataset().filter(&FilterCriteria::from(&args));
    Ok(AveragePriceResult {
        average_price: mean_price(&subset),
        samples: subset.len(),
        filters: args,
    })
}

fn handle_top_cars(ctx: &AdvisorContext, args: TopCarsArgs) -> Result<TopCarsResult<'_>> {
    let subset = ctx.dataset().filter(&FilterCriteria::from(&args));
    let results = rank_by_price(subset, args.sort_order, args.n)
        .into_iter()
        .map(|record| CarRow::project(record, false))
        .collect();
    Ok(TopCarsResult {
        order: args.sort_order,
        results,
    })
}

// ==================== Dispatcher ====================

/// Tool handler
pub struct ToolHandler {
    /// Sales table loaded on first use
    data_path: PathBuf,

    /// Dataset and model, built at most once
    context: OnceCell<Arc<AdvisorContext>>,
}

impl ToolHandler {
    /// Create a tool handler that loads `data_path` on the first tool call
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            context: OnceCell::new(),
        }
    }

    /// Create a tool handler around an already-built context
    pub fn with_context(context: AdvisorContext) -> Self {
        Self {
            data_path: PathBuf::new(),
            context: OnceCell::from(Arc::new(context)),
        }
    }

    /// Whether the dataset and model have been built
    pub fn is_initialized(&self) -> bool {
        self.context.initialized()
    }

    /// The shared context, loading the dataset and fitting the model if needed.
    ///
    /// Concurrent first callers wait on the same initialization. A failed
    /// initialization leaves the handler uninitialized so the next call retries.
    pub async fn context(&self) -> Result<Arc<AdvisorContext>> {
        let context = self
            .context
            .get_or_try_init(|| {
                let path = self.data_path.clone();
                async move {
                    tracing::info!(path = %path.display(), "Initializing dataset and price model");
                    tokio::task::spawn_blocking(move || AdvisorContext::load(&path))
                        .await
                        .map_err(|e| AdvisorError::Internal {
                            message: format!("initialization task failed: {}", e),
                        })?
                        .map(Arc::new)
                }
            })
            .await?;
        Ok(Arc::clone(context))
    }

    /// List all available tools
    pub fn list_tools(&self) -> Result<Vec<Tool>> {
        ToolKind::ALL
            .into_iter()
            .map(|tool| {
                Ok(Tool {
                    name: tool.name().to_string(),
                    description: Some(tool.description().to_string()),
                    input_schema: tool.input_schema()?,
                })
            })
            .collect()
    }

    /// Call a tool by name.
    ///
    /// Tool failures come back as an `{error, args}` payload. Only a failure to
    /// build the shared context or the tool's schema is returned as `Err`.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult> {
        let Some(tool) = ToolKind::from_name(name) else {
            let unknown = McpError::UnknownTool {
                name: name.to_string(),
            };
            tracing::warn!(tool = name, "Unknown tool requested");
            return Ok(CallToolResult::error_text(payload::render(
                &json!({ "error": unknown.to_string() }),
            )?));
        };

        let context = self.context().await?;
        let schema = tool.input_schema()?;
        tracing::debug!(tool = name, "Dispatching tool call");

        let outcome = match tool {
            ToolKind::FilterCars => invoke(&context, &schema, &args, handle_filter_cars),
            ToolKind::Recommend => invoke(&context, &schema, &args, handle_recommend),
            ToolKind::EstimatePrice => invoke(&context, &schema, &args, handle_estimate_price),
            ToolKind::AveragePrice => invoke(&context, &schema, &args, handle_average_price),
            ToolKind::TopCars => invoke(&context, &schema, &args, handle_top_cars),
        };

        match outcome {
            Ok(result) => Ok(CallToolResult::text(payload::render(&result)?)),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool call failed");
                let error = payload::error_payload(e.to_string(), &args);
                Ok(CallToolResult::error_text(payload::render(&error)?))
            }
        }
    }

}

/// Validate arguments, run the handler, and normalize its result
fn invoke<'c, A, R, F>(
    context: &'c AdvisorContext,
    schema: &Value,
    args: &Value,
    handler: F,
) -> Result<Value>
where
    A: DeserializeOwned,
    R: Serialize,
    F: FnOnce(&'c AdvisorContext, A) -> Result<R>,
{
    let parsed: A = validate_arguments(schema, args)?;
    let result = handler(context, parsed)?;
    payload::to_payload(&result)
}
