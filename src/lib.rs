//! # crashlens
//!
//! Filter and aggregation core for interactive traffic-collision dashboards.
//!
//! A dashboard session loads a collision person-record table once, then every
//! user action (dropdown change, free-text search, "generate report") runs the
//! same pipeline over the shared, read-only table:
//!
//! ```text
//! Search text
//!     ↓
//! Query Parser → ParsedQuery (borough / year / person type / injury / keywords)
//!     ↓ merged under explicit widget selections
//! FilterSpec → Filter Engine → filtered Dataset
//!     ↓
//! Aggregates (KPI totals, time series, distributions, heatmap, map sample)
//! ```
//!
//! The engine never mutates the source table: every filter produces a new
//! [`Dataset`] holding the matching rows in their original order. Missing
//! columns and malformed filter values narrow functionality instead of
//! failing, so a half-loaded table still yields a usable report.
//!
//! ## Example
//!
//! ```rust
//! use crashlens::{CrashRecord, Dataset, Explorer, FilterSpec};
//!
//! let dataset = Dataset::from_records(vec![
//!     CrashRecord {
//!         borough: Some("BROOKLYN".into()),
//!         person_type: Some("Pedestrian".into()),
//!         person_injury: Some("Injured".into()),
//!         ..CrashRecord::default()
//!     },
//! ]);
//!
//! let explorer = Explorer::new(dataset);
//! let parsed = explorer.parse("brooklyn pedestrian");
//! let spec = FilterSpec::new().merge_parsed(&parsed);
//! let report = explorer.report(&spec);
//! assert_eq!(report.summary.total_persons, 1);
//! ```

// --- Global Allocator: mimalloc (Microsoft's high-performance allocator) ---
#[cfg(not(target_env = "msvc"))]
use mimalloc::MiMalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod aggregate;
pub mod dataset;
pub mod explorer;
pub mod filter;
pub mod query;

pub use aggregate::{
    borough_distribution, geo_sample, geo_sample_seeded, heatmap, injury_distribution, summarize,
    time_series, DistributionEntry, HeatmapCell, Report, Summary, TimeBucket, GEO_SAMPLE_CAP,
};
pub use dataset::{roles, Column, ColumnKind, CrashRecord, Dataset, DatasetBuilder};
pub use explorer::Explorer;
pub use filter::{apply_filters, FilterSpec};
pub use query::{parse_query, ParsedQuery};

use thiserror::Error;

/// Error types for crashlens operations
///
/// Only dataset construction can fail. Parsing, filtering and aggregation
/// degrade silently (missing column → no-op, bad numeric value → dropped)
/// because a broken filter must narrow an exploratory session, not end it.
#[derive(Error, Debug)]
pub enum CrashlensError {
    #[error("Column length mismatch for '{column}': expected {expected} rows, got {got}")]
    ColumnLength {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrashlensError>;
