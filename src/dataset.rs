//! Columnar Dataset - Struct of Arrays (SoA) Implementation
//!
//! The collision table is stored column-wise with one nullable vector per
//! column. Filters and aggregates only ever touch the handful of columns they
//! need, and a filtered view is just the same columns re-materialized at a
//! subset of row indices.
//!
//! Column *roles* (see [`roles`]) decouple the engine from the literal CSV
//! headers: the load stage renames whatever the source file calls its fields
//! into these names before the dataset reaches this crate. A dataset is never
//! guaranteed to carry every role.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Well-known column roles used by the filter engine and aggregates.
pub mod roles {
    pub const BOROUGH: &str = "borough";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const HOUR: &str = "hour";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const COLLISION_ID: &str = "collision_id";
    pub const PERSON_INJURY: &str = "person_injury";
    pub const PERSON_TYPE: &str = "person_type";
    pub const VEHICLE_TYPE: &str = "vehicle_type";
    pub const CONTRIBUTING_FACTOR: &str = "contributing_factor";

    /// Categorical roles searched by the free-text filter step.
    pub const FREE_TEXT_ROLES: &[&str] = &[
        BOROUGH,
        PERSON_TYPE,
        PERSON_INJURY,
        VEHICLE_TYPE,
        CONTRIBUTING_FACTOR,
    ];
}

/// Physical column kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Str,
    Int,
    Float,
}

/// One nullable column of cells, all of the same kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Str(Vec<Option<String>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::Str(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Str(_) => ColumnKind::Str,
            Self::Int(_) => ColumnKind::Int,
            Self::Float(_) => ColumnKind::Float,
        }
    }

    /// String cell at `idx`, `None` for nulls and non-string columns
    pub fn str_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Str(v) => v.get(idx)?.as_deref(),
            _ => None,
        }
    }

    /// Integer cell at `idx`, coercing where the cell is numeric
    ///
    /// Float cells coerce only when they carry a whole number (a year column
    /// that arrived as 2022.0 still matches the filter value 2022). String
    /// cells parse if they are plain integers.
    pub fn int_at(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Int(v) => *v.get(idx)?,
            Self::Float(v) => {
                let f = (*v.get(idx)?)?;
                (f.fract() == 0.0).then_some(f as i64)
            }
            Self::Str(v) => v.get(idx)?.as_deref()?.trim().parse().ok(),
        }
    }

    /// Float cell at `idx`, `None` for nulls and non-numeric columns
    pub fn float_at(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Float(v) => *v.get(idx)?,
            Self::Int(v) => v.get(idx)?.map(|i| i as f64),
            Self::Str(_) => None,
        }
    }

    /// True when the cell at `idx` holds a value
    pub fn is_present(&self, idx: usize) -> bool {
        match self {
            Self::Str(v) => v.get(idx).is_some_and(|c| c.is_some()),
            Self::Int(v) => v.get(idx).is_some_and(|c| c.is_some()),
            Self::Float(v) => v.get(idx).is_some_and(|c| c.is_some()),
        }
    }

    /// Count of distinct non-null values
    pub fn distinct_count(&self) -> usize {
        match self {
            Self::Str(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
            Self::Int(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
            // Bit pattern is fine here: identical floats hash identically
            Self::Float(v) => v
                .iter()
                .flatten()
                .map(|f| f.to_bits())
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    /// New column holding the cells at `indices`, in the given order
    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Self::Str(v) => Self::Str(
                indices
                    .iter()
                    .map(|&i| v.get(i).cloned().flatten())
                    .collect(),
            ),
            Self::Int(v) => Self::Int(indices.iter().map(|&i| v.get(i).copied().flatten()).collect()),
            Self::Float(v) => {
                Self::Float(indices.iter().map(|&i| v.get(i).copied().flatten()).collect())
            }
        }
    }
}

/// In-memory collision table
///
/// Loaded once per process by the acquisition stage, then shared read-only
/// with every filter and aggregate call. All operations that narrow the table
/// return a brand-new `Dataset`; the source is never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    rows: usize,
}

impl Dataset {
    /// Empty dataset with no columns
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            columns: HashMap::new(),
            rows: 0,
        }
    }

    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::new()
    }

    /// Number of rows (person-records, not collisions)
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// New dataset holding the rows at `indices`, same columns, given order
    pub fn take(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .names
            .iter()
            .map(|n| (n.clone(), self.columns[n].take(indices)))
            .collect();
        Dataset {
            names: self.names.clone(),
            columns,
            rows: indices.len(),
        }
    }

    /// Distinct non-null values of a string column, in first-seen order
    ///
    /// This is how the search parser's vocabularies are derived: the set of
    /// person-type and injury labels actually present in the loaded data.
    pub fn vocabulary(&self, name: &str) -> Vec<String> {
        let Some(Column::Str(cells)) = self.columns.get(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for value in cells.iter().flatten() {
            if seen.insert(value.as_str()) {
                out.push(value.clone());
            }
        }
        out
    }

    /// Build a dataset carrying every role column from person-records.
    ///
    /// Mirrors the load stage's derivations: `year`/`month`/`hour` come from
    /// the crash timestamp (null when it is missing or unparseable upstream),
    /// and borough is title-cased with missing values filled as `"Unknown"`.
    pub fn from_records(records: Vec<CrashRecord>) -> Dataset {
        let n = records.len();
        let mut borough = Vec::with_capacity(n);
        let mut year = Vec::with_capacity(n);
        let mut month = Vec::with_capacity(n);
        let mut hour = Vec::with_capacity(n);
        let mut latitude = Vec::with_capacity(n);
        let mut longitude = Vec::with_capacity(n);
        let mut collision_id = Vec::with_capacity(n);
        let mut person_injury = Vec::with_capacity(n);
        let mut person_type = Vec::with_capacity(n);
        let mut vehicle_type = Vec::with_capacity(n);
        let mut contributing_factor = Vec::with_capacity(n);

        for record in records {
            borough.push(Some(
                record
                    .borough
                    .as_deref()
                    .map(title_case)
                    .unwrap_or_else(|| "Unknown".to_string()),
            ));
            year.push(record.crash_time.map(|t| i64::from(t.year())));
            month.push(record.crash_time.map(|t| i64::from(t.month())));
            hour.push(record.crash_time.map(|t| i64::from(t.hour())));
            latitude.push(record.latitude);
            longitude.push(record.longitude);
            collision_id.push(record.collision_id);
            person_injury.push(record.person_injury);
            person_type.push(record.person_type);
            vehicle_type.push(record.vehicle_type);
            contributing_factor.push(record.contributing_factor);
        }

        // Construction from parallel vectors of identical length cannot fail
        Dataset::builder()
            .with_str_column(roles::BOROUGH, borough)
            .and_then(|b| b.with_int_column(roles::YEAR, year))
            .and_then(|b| b.with_int_column(roles::MONTH, month))
            .and_then(|b| b.with_int_column(roles::HOUR, hour))
            .and_then(|b| b.with_float_column(roles::LATITUDE, latitude))
            .and_then(|b| b.with_float_column(roles::LONGITUDE, longitude))
            .and_then(|b| b.with_int_column(roles::COLLISION_ID, collision_id))
            .and_then(|b| b.with_str_column(roles::PERSON_INJURY, person_injury))
            .and_then(|b| b.with_str_column(roles::PERSON_TYPE, person_type))
            .and_then(|b| b.with_str_column(roles::VEHICLE_TYPE, vehicle_type))
            .and_then(|b| b.with_str_column(roles::CONTRIBUTING_FACTOR, contributing_factor))
            .map(DatasetBuilder::build)
            .unwrap_or_else(|_| Dataset::empty())
    }
}

/// One person-in-collision record, as handed over by the load stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrashRecord {
    /// Combined crash date + time; `None` when the source timestamp failed
    /// to parse upstream
    pub crash_time: Option<NaiveDateTime>,
    pub borough: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Groups the persons involved in one collision event
    pub collision_id: Option<i64>,
    pub person_injury: Option<String>,
    pub person_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub contributing_factor: Option<String>,
}

/// Validating dataset builder
///
/// The first column fixes the row count; later columns must match it.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    rows: Option<usize>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_str_column(
        self,
        name: impl Into<String>,
        cells: Vec<Option<String>>,
    ) -> crate::Result<Self> {
        self.with_column(name, Column::Str(cells))
    }

    pub fn with_int_column(
        self,
        name: impl Into<String>,
        cells: Vec<Option<i64>>,
    ) -> crate::Result<Self> {
        self.with_column(name, Column::Int(cells))
    }

    pub fn with_float_column(
        self,
        name: impl Into<String>,
        cells: Vec<Option<f64>>,
    ) -> crate::Result<Self> {
        self.with_column(name, Column::Float(cells))
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> crate::Result<Self> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(crate::CrashlensError::DuplicateColumn(name));
        }
        let expected = *self.rows.get_or_insert(column.len());
        if column.len() != expected {
            return Err(crate::CrashlensError::ColumnLength {
                column: name,
                expected,
                got: column.len(),
            });
        }
        self.names.push(name.clone());
        self.columns.insert(name, column);
        Ok(self)
    }

    pub fn build(self) -> Dataset {
        Dataset {
            names: self.names,
            columns: self.columns,
            rows: self.rows.unwrap_or(0),
        }
    }
}

/// Title-case per word, matching the load stage's borough normalization
/// ("STATEN ISLAND" → "Staten Island")
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
