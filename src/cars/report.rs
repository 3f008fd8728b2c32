//! Diagnostic report over a raw sales table
//!
//! Inspects the table as-is (no cleaning) and summarizes column presence,
//! blank cells, categorical cardinality, and numeric ranges.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::cars::dataset::{
    parse_number, Column, ACCIDENT, COLOR, CONDITION, FUEL_TYPE, MAKE, MILEAGE, MODEL, PRICE,
    REQUIRED_COLUMNS, TRANSMISSION, YEAR,
};
use crate::error::Result;

/// Categorical columns whose distinct values are listed
const CATEGORICAL_COLUMNS: [Column; 7] = [MAKE, MODEL, FUEL_TYPE, COLOR, TRANSMISSION, CONDITION, ACCIDENT];

/// Numeric columns that get a percentile summary
const NUMERIC_COLUMNS: [Column; 3] = [YEAR, MILEAGE, PRICE];

/// Distinct values shown per categorical column
const SAMPLE_VALUES: usize = 10;

/// Distinct-value summary for a categorical column
#[derive(Debug, Clone, PartialEq)]
pub struct Cardinality {
    pub column: String,
    pub distinct: usize,
    /// First distinct values in table order
    pub sample: Vec<String>,
}

/// Percentile summary for a numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub p1: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

/// Inspection results for a sales table
#[derive(Debug, Clone, PartialEq)]
pub struct DataReport {
    pub headers: Vec<String>,
    pub missing_columns: Vec<String>,
    pub rows: usize,
    /// Blank cells per header, in header order
    pub blank_cells: Vec<(String, usize)>,
    pub cardinality: Vec<Cardinality>,
    pub numeric: Vec<NumericSummary>,
}

/// Linear-interpolated percentile of sorted values, `q` in `[0, 1]`
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn summarize(column: &str, mut values: Vec<f64>) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let count = values.len();
    Some(NumericSummary {
        column: column.to_string(),
        count,
        mean: values.iter().sum::<f64>() / count as f64,
        min: values[0],
        p1: percentile(&values, 0.01),
        p5: percentile(&values, 0.05),
        p50: percentile(&values, 0.50),
        p95: percentile(&values, 0.95),
        p99: percentile(&values, 0.99),
        max: values[count - 1],
    })
}

impl DataReport {
    /// Inspect the table at `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Inspect a table from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

        let position = |column: &Column| headers.iter().position(|h| column.matches(h));

        let missing_columns = REQUIRED_COLUMNS
            .iter()
            .filter(|c| position(c).is_none())
            .map(|c| c.name.to_string())
            .collect();

        let blank_cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let blanks = rows
                    .iter()
                    .filter(|row| row.get(i).map_or(true, |cell| cell.trim().is_empty()))
                    .count();
                (header.clone(), blanks)
            })
            .collect();

        let cardinality = CATEGORICAL_COLUMNS
            .iter()
            .filter_map(|column| {
                let i = position(column)?;
                let mut seen = HashSet::new();
                let mut sample = Vec::new();
                for cell in rows.iter().filter_map(|row| row.get(i)) {
                    let value = cell.trim();
                    if value.is_empty() || !seen.insert(value.to_string()) {
                        continue;
                    }
                    if sample.len() < SAMPLE_VALUES {
                        sample.push(value.to_string());
                    }
                }
                Some(Cardinality {
                    column: column.name.to_string(),
                    distinct: seen.len(),
                    sample,
                })
            })
            .collect();

        let numeric = NUMERIC_COLUMNS
            .iter()
            .filter_map(|column| {
                let i = position(column)?;
                let values = rows
                    .iter()
                    .filter_map(|row| row.get(i).and_then(parse_number))
                    .collect();
                summarize(column.name, values)
            })
            .collect();

        Ok(Self {
            headers,
            missing_columns,
            rows: rows.len(),
            blank_cells,
            cardinality,
            numeric,
        })
    }
}

impl fmt::Display for DataReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.missing_columns.is_empty() {
            writeln!(f, "[OK] All expected columns are present.")?;
        } else {
            writeln!(f, "[WARN] Missing expected columns: {}", self.missing_columns.join(", "))?;
        }

        writeln!(f, "\n=== General summary ===")?;
        writeln!(f, "{} rows x {} columns", self.rows, self.headers.len())?;
        writeln!(f, "Columns: {}", self.headers.join(", "))?;

        writeln!(f, "\n=== Null values per column ===")?;
        for (header, blanks) in &self.blank_cells {
            writeln!(f, "{:<20} {}", header, blanks)?;
        }

        writeln!(f, "\n=== Cardinality of categorical columns ===")?;
        for c in &self.cardinality {
            writeln!(f, "- {}: {} unique values -> [{}]", c.column, c.distinct, c.sample.join(", "))?;
        }

        writeln!(f, "\n=== Numerical statistics ===")?;
        writeln!(
            f,
            "{:<10} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "column", "count", "mean", "min", "1%", "5%", "50%", "95%", "99%", "max"
        )?;
        for s in &self.numeric {
            writeln!(
                f,
                "{:<10} {:>8} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                s.column, s.count, s.mean, s.min, s.p1, s.p5, s.p50, s.p95, s.p99, s.max
            )?;
        }

        writeln!(f, "\n=== Possible outliers ===")?;
        for s in &self.numeric {
            writeln!(
                f,
                "- {}: expected range ~ [{}, {}], min={}, max={}",
                s.column, s.p1, s.p99, s.min, s.max
            )?;
        }

        Ok(())
    }
}
