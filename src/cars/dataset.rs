//! Vehicle sales dataset loading and cleaning
//!
//! The table is read once, checked against the expected column set, cleaned,
//! and then only ever read.

use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;

use csv::StringRecord;

use crate::cars::types::VehicleRecord;
use crate::error::{Result, SchemaError};

/// Plausible model years
pub const YEAR_RANGE: RangeInclusive<i32> = 2010..=2025;

/// Upper bound on odometer readings
pub const MILEAGE_MAX: f64 = 300_000.0;

/// Upper bound on sale prices (prices must also be positive)
pub const PRICE_MAX: f64 = 400_000.0;

/// A logical column and the header spellings accepted for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl Column {
    const fn new(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }

    /// Whether a header cell names this column
    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        header == self.name || self.aliases.contains(&header)
    }
}

pub const MAKE: Column = Column::new("Make", &["Car Make"]);
pub const MODEL: Column = Column::new("Model", &["Car Model"]);
pub const YEAR: Column = Column::new("Year", &[]);
pub const MILEAGE: Column = Column::new("Mileage", &[]);
pub const PRICE: Column = Column::new("Price", &[]);
pub const FUEL_TYPE: Column = Column::new("FuelType", &["Fuel Type"]);
pub const COLOR: Column = Column::new("Color", &[]);
pub const TRANSMISSION: Column = Column::new("Transmission", &[]);
pub const OPTIONS: Column = Column::new("Options", &["Options/Features"]);
pub const CONDITION: Column = Column::new("Condition", &[]);
pub const ACCIDENT: Column = Column::new("Accident", &[]);

/// Every column the sales table must carry, in table order
pub const REQUIRED_COLUMNS: [Column; 11] = [
    MAKE,
    MODEL,
    YEAR,
    MILEAGE,
    PRICE,
    FUEL_TYPE,
    COLOR,
    TRANSMISSION,
    OPTIONS,
    CONDITION,
    ACCIDENT,
];

/// Header positions of the required columns
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: [usize; 11],
}

impl ColumnIndex {
    /// Resolve every required column against a header row
    pub fn resolve(headers: &StringRecord) -> std::result::Result<Self, SchemaError> {
        let mut positions = [0usize; 11];
        let mut missing = Vec::new();

        for (slot, column) in REQUIRED_COLUMNS.iter().enumerate() {
            match headers.iter().position(|h| column.matches(h)) {
                Some(pos) => positions[slot] = pos,
                None => missing.push(column.name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns { columns: missing });
        }

        Ok(Self { positions })
    }

    /// Raw cell for a column, empty when the row is short
    pub fn cell<'r>(&self, row: &'r StringRecord, column: Column) -> &'r str {
        REQUIRED_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|slot| row.get(self.positions[slot]))
            .unwrap_or("")
    }
}

/// Parse a numeric cell; blanks and unparseable text are missing
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a model year; fractional years are missing
fn parse_year(cell: &str) -> Option<i32> {
    parse_number(cell)
        .filter(|v| v.fract() == 0.0 && *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
        .map(|v| v as i32)
}

/// Trimmed categorical value, `None` when blank
fn required_text(cell: &str) -> Option<String> {
    let value = cell.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether a record satisfies the year, mileage, and price invariants
pub fn within_ranges(record: &VehicleRecord) -> bool {
    YEAR_RANGE.contains(&record.year)
        && (0.0..=MILEAGE_MAX).contains(&record.mileage)
        && record.price > 0.0
        && record.price <= PRICE_MAX
}

/// Build a cleaned record from a raw row, or `None` if the row is dropped
fn clean_row(row: &StringRecord, index: &ColumnIndex) -> Option<VehicleRecord> {
    let record = VehicleRecord {
        make: index.cell(row, MAKE).trim().to_string(),
        model: index.cell(row, MODEL).trim().to_string(),
        year: parse_year(index.cell(row, YEAR))?,
        mileage: parse_number(index.cell(row, MILEAGE))?,
        price: parse_number(index.cell(row, PRICE))?,
        fuel_type: required_text(index.cell(row, FUEL_TYPE))?,
        color: index.cell(row, COLOR).trim().to_string(),
        transmission: required_text(index.cell(row, TRANSMISSION))?,
        options: index.cell(row, OPTIONS).trim().to_string(),
        condition: required_text(index.cell(row, CONDITION))?,
        accident: required_text(index.cell(row, ACCIDENT))?,
    };

    within_ranges(&record).then_some(record)
}

/// Immutable, cleaned collection of vehicle records
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<VehicleRecord>,
}

impl Dataset {
    /// Load and clean the sales table at `path`
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading vehicle sales table");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load and clean a sales table from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().from_reader(reader);
        let index = ColumnIndex::resolve(reader.headers()?)?;

        let mut raw = 0usize;
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            raw += 1;
            if let Some(record) = clean_row(&row, &index) {
                records.push(record);
            }
        }

        tracing::info!(
            raw,
            kept = records.len(),
            dropped = raw - records.len(),
            "Vehicle sales table cleaned"
        );

        Ok(Self { records })
    }

    /// Build a dataset from already-typed records, dropping range violators
    pub fn from_records(records: Vec<VehicleRecord>) -> Self {
        Self {
            records: records.into_iter().filter(within_ranges).collect(),
        }
    }

    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
