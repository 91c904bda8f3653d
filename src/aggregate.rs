//! Derived Aggregates
//!
//! Everything the dashboard renders from one filtered view: the KPI totals,
//! the time series, the borough and injury distributions, the hour × borough
//! heatmap counts, and the capped geographic sample for the map.
//!
//! All aggregates tolerate missing columns (empty grouping / zero total) and
//! degrade to zeros on an empty dataset.

use crate::dataset::{roles, Column, Dataset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound on rows handed to the map renderer
pub const GEO_SAMPLE_CAP: usize = 3000;

/// KPI card totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Distinct collision events (falls back to the row count when the
    /// grouping id column is missing)
    pub total_collisions: usize,
    /// Person-records, one per involved person
    pub total_persons: usize,
    /// Rows whose injury label contains "injur" (case-insensitive)
    pub total_injuries: usize,
    /// Rows whose injury label contains "fatal" or "kill" (case-insensitive)
    pub total_fatalities: usize,
}

/// One time-series bucket; `month` is `None` when the dataset has no month
/// column and counting falls back to whole years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub year: i64,
    pub month: Option<i64>,
    pub count: usize,
}

/// One label of a categorical distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub label: String,
    pub count: usize,
}

/// One heatmap cell: collisions recorded in `borough` during `hour`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub borough: String,
    pub hour: i64,
    pub count: usize,
}

/// Full per-report payload computed from one filtered view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub time_series: Vec<TimeBucket>,
    pub borough_distribution: Vec<DistributionEntry>,
    pub injury_distribution: Vec<DistributionEntry>,
    pub heatmap: Vec<HeatmapCell>,
    /// Coordinate-complete rows, uniformly sampled down to
    /// [`GEO_SAMPLE_CAP`]; nondeterministic when sampling kicks in
    pub geo_sample: Dataset,
}

impl Report {
    /// Compute every aggregate over an already-filtered dataset
    pub fn build(dataset: &Dataset) -> Report {
        Report {
            summary: summarize(dataset),
            time_series: time_series(dataset),
            borough_distribution: borough_distribution(dataset),
            injury_distribution: injury_distribution(dataset),
            heatmap: heatmap(dataset),
            geo_sample: geo_sample(dataset),
        }
    }

    /// Serialize for the presentation layer, which consumes reports as JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// KPI totals over a (filtered) dataset
pub fn summarize(dataset: &Dataset) -> Summary {
    let total_collisions = match dataset.column(roles::COLLISION_ID) {
        Some(column) => column.distinct_count(),
        None => dataset.len(),
    };

    let mut total_injuries = 0;
    let mut total_fatalities = 0;
    if let Some(column) = dataset.column(roles::PERSON_INJURY) {
        for idx in 0..dataset.len() {
            if let Some(label) = column.str_at(idx) {
                let label = label.to_lowercase();
                if label.contains("injur") {
                    total_injuries += 1;
                }
                if label.contains("fatal") || label.contains("kill") {
                    total_fatalities += 1;
                }
            }
        }
    }

    Summary {
        total_collisions,
        total_persons: dataset.len(),
        total_injuries,
        total_fatalities,
    }
}

/// Row counts per (year, month), or per year when no month column exists.
///
/// Rows with a null grouping cell are skipped; buckets come back in
/// ascending time order.
pub fn time_series(dataset: &Dataset) -> Vec<TimeBucket> {
    let Some(year_col) = dataset.column(roles::YEAR) else {
        return Vec::new();
    };
    let month_col = dataset.column(roles::MONTH);

    let mut counts: HashMap<(i64, Option<i64>), usize> = HashMap::new();
    for idx in 0..dataset.len() {
        let Some(year) = year_col.int_at(idx) else {
            continue;
        };
        match month_col {
            Some(months) => {
                let Some(month) = months.int_at(idx) else {
                    continue;
                };
                *counts.entry((year, Some(month))).or_default() += 1;
            }
            None => *counts.entry((year, None)).or_default() += 1,
        }
    }

    let mut buckets: Vec<TimeBucket> = counts
        .into_iter()
        .map(|((year, month), count)| TimeBucket { year, month, count })
        .collect();
    buckets.sort_by_key(|b| (b.year, b.month));
    buckets
}

pub fn borough_distribution(dataset: &Dataset) -> Vec<DistributionEntry> {
    value_counts(dataset, roles::BOROUGH)
}

pub fn injury_distribution(dataset: &Dataset) -> Vec<DistributionEntry> {
    value_counts(dataset, roles::PERSON_INJURY)
}

/// Non-null label counts, descending, label as the tiebreak
fn value_counts(dataset: &Dataset, role: &str) -> Vec<DistributionEntry> {
    let Some(column) = dataset.column(role) else {
        return Vec::new();
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for idx in 0..dataset.len() {
        if let Some(label) = column.str_at(idx) {
            *counts.entry(label).or_default() += 1;
        }
    }

    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(label, count)| DistributionEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

/// Row counts per (borough, hour); empty when the hour column is missing
pub fn heatmap(dataset: &Dataset) -> Vec<HeatmapCell> {
    let (Some(borough_col), Some(hour_col)) =
        (dataset.column(roles::BOROUGH), dataset.column(roles::HOUR))
    else {
        return Vec::new();
    };

    let mut counts: HashMap<(&str, i64), usize> = HashMap::new();
    for idx in 0..dataset.len() {
        let (Some(borough), Some(hour)) = (borough_col.str_at(idx), hour_col.int_at(idx)) else {
            continue;
        };
        *counts.entry((borough, hour)).or_default() += 1;
    }

    let mut cells: Vec<HeatmapCell> = counts
        .into_iter()
        .map(|((borough, hour), count)| HeatmapCell {
            borough: borough.to_string(),
            hour,
            count,
        })
        .collect();
    cells.sort_by(|a, b| a.borough.cmp(&b.borough).then_with(|| a.hour.cmp(&b.hour)));
    cells
}

/// Rows with both coordinates present, uniformly sampled down to
/// [`GEO_SAMPLE_CAP`] to bound map rendering cost.
///
/// Sampling uses the thread RNG and is intentionally nondeterministic; use
/// [`geo_sample_seeded`] when reproducibility matters.
pub fn geo_sample(dataset: &Dataset) -> Dataset {
    sample_rows(dataset, &mut rand::thread_rng())
}

/// Deterministic variant of [`geo_sample`] for tests and snapshots
pub fn geo_sample_seeded(dataset: &Dataset, seed: u64) -> Dataset {
    sample_rows(dataset, &mut StdRng::seed_from_u64(seed))
}

fn sample_rows<R: Rng>(dataset: &Dataset, rng: &mut R) -> Dataset {
    let (Some(lat_col), Some(lon_col)) = (
        dataset.column(roles::LATITUDE),
        dataset.column(roles::LONGITUDE),
    ) else {
        return dataset.take(&[]);
    };

    let located: Vec<usize> = (0..dataset.len())
        .filter(|&idx| has_float(lat_col, idx) && has_float(lon_col, idx))
        .collect();

    if located.len() <= GEO_SAMPLE_CAP {
        return dataset.take(&located);
    }

    // Uniform sample without replacement, re-sorted so the view keeps the
    // source row order
    let mut picked: Vec<usize> = rand::seq::index::sample(rng, located.len(), GEO_SAMPLE_CAP)
        .into_iter()
        .map(|i| located[i])
        .collect();
    picked.sort_unstable();
    dataset.take(&picked)
}

fn has_float(column: &Column, idx: usize) -> bool {
    column.float_at(idx).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::roles;

    fn injury_fixture(labels: &[&str]) -> Dataset {
        Dataset::builder()
            .with_str_column(
                roles::PERSON_INJURY,
                labels.iter().map(|l| Some((*l).to_string())).collect(),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_fatality_and_injury_totals() {
        let ds = injury_fixture(&["Injured", "No injury", "Killed", "Fatal - unrelated"]);
        let summary = summarize(&ds);
        assert_eq!(summary.total_fatalities, 2);
        // "No injury" still contains "injur"
        assert_eq!(summary.total_injuries, 2);
        assert_eq!(summary.total_persons, 4);
    }

    #[test]
    fn test_collisions_distinct_id_else_row_count() {
        let ds = Dataset::builder()
            .with_int_column(roles::COLLISION_ID, vec![Some(7), Some(7), Some(9), None])
            .unwrap()
            .build();
        assert_eq!(summarize(&ds).total_collisions, 2);

        let ds = injury_fixture(&["Injured", "Killed"]);
        assert_eq!(summarize(&ds).total_collisions, 2);
    }

    #[test]
    fn test_empty_dataset_zero_summary() {
        let summary = summarize(&Dataset::empty());
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_time_series_year_month_buckets_sorted() {
        let ds = Dataset::builder()
            .with_int_column(roles::YEAR, vec![Some(2023), Some(2022), Some(2022), None])
            .unwrap()
            .with_int_column(roles::MONTH, vec![Some(1), Some(12), Some(12), Some(3)])
            .unwrap()
            .build();

        let series = time_series(&ds);
        assert_eq!(
            series,
            vec![
                TimeBucket { year: 2022, month: Some(12), count: 2 },
                TimeBucket { year: 2023, month: Some(1), count: 1 },
            ]
        );
    }

    #[test]
    fn test_time_series_falls_back_to_year_without_month() {
        let ds = Dataset::builder()
            .with_int_column(roles::YEAR, vec![Some(2021), Some(2021), Some(2020)])
            .unwrap()
            .build();

        let series = time_series(&ds);
        assert_eq!(
            series,
            vec![
                TimeBucket { year: 2020, month: None, count: 1 },
                TimeBucket { year: 2021, month: None, count: 2 },
            ]
        );
    }

    #[test]
    fn test_distribution_sorted_by_count_then_label() {
        let ds = Dataset::builder()
            .with_str_column(
                roles::BOROUGH,
                vec![
                    Some("Queens".into()),
                    Some("Brooklyn".into()),
                    Some("Queens".into()),
                    Some("Bronx".into()),
                    None,
                ],
            )
            .unwrap()
            .build();

        let dist = borough_distribution(&ds);
        assert_eq!(
            dist,
            vec![
                DistributionEntry { label: "Queens".into(), count: 2 },
                DistributionEntry { label: "Bronx".into(), count: 1 },
                DistributionEntry { label: "Brooklyn".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_heatmap_counts_and_missing_hour() {
        let ds = Dataset::builder()
            .with_str_column(
                roles::BOROUGH,
                vec![Some("Bronx".into()), Some("Bronx".into()), Some("Queens".into())],
            )
            .unwrap()
            .with_int_column(roles::HOUR, vec![Some(8), Some(8), Some(17)])
            .unwrap()
            .build();

        assert_eq!(
            heatmap(&ds),
            vec![
                HeatmapCell { borough: "Bronx".into(), hour: 8, count: 2 },
                HeatmapCell { borough: "Queens".into(), hour: 17, count: 1 },
            ]
        );

        let no_hour = Dataset::builder()
            .with_str_column(roles::BOROUGH, vec![Some("Bronx".into())])
            .unwrap()
            .build();
        assert!(heatmap(&no_hour).is_empty());
    }

    fn geo_fixture(rows: usize, located: usize) -> Dataset {
        let lat: Vec<Option<f64>> = (0..rows)
            .map(|i| (i < located).then(|| 40.6 + i as f64 * 1e-4))
            .collect();
        let lon: Vec<Option<f64>> = (0..rows)
            .map(|i| (i < located).then(|| -73.9 - i as f64 * 1e-4))
            .collect();
        Dataset::builder()
            .with_float_column(roles::LATITUDE, lat)
            .unwrap()
            .with_float_column(roles::LONGITUDE, lon)
            .unwrap()
            .build()
    }

    #[test]
    fn test_geo_sample_caps_at_3000() {
        let ds = geo_fixture(5000, 5000);
        let sample = geo_sample_seeded(&ds, 42);
        assert_eq!(sample.len(), GEO_SAMPLE_CAP);
    }

    #[test]
    fn test_geo_sample_below_cap_untouched() {
        let ds = geo_fixture(100, 100);
        let sample = geo_sample_seeded(&ds, 42);
        assert_eq!(sample.len(), 100);
    }

    #[test]
    fn test_geo_sample_drops_incomplete_coordinates() {
        let ds = geo_fixture(10, 4);
        let sample = geo_sample_seeded(&ds, 7);
        assert_eq!(sample.len(), 4);
        let lat = sample.column(roles::LATITUDE).unwrap();
        for idx in 0..sample.len() {
            assert!(lat.float_at(idx).is_some());
        }
    }

    #[test]
    fn test_geo_sample_without_coordinate_columns_is_empty() {
        let ds = injury_fixture(&["Injured"]);
        assert!(geo_sample(&ds).is_empty());
    }
}
