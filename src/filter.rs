//! Filter Engine
//!
//! Applies a [`FilterSpec`] to a [`Dataset`] and returns the matching rows as
//! a new dataset (same columns, original order, source untouched).
//!
//! Each structured dimension narrows the working set to rows whose cell is a
//! member of that dimension's value set; dimensions AND together. The free
//! text step is different in kind: one lowercased substring OR-matched across
//! the categorical columns, ANDed in after the structured dimensions.
//!
//! Degradation rules, in order of appearance:
//! - a constrained dimension whose column is missing is a no-op (debug log)
//! - `""` / `"All"` single values never become constraints
//! - numeric values that fail coercion are dropped (debug log); a dimension
//!   whose value set ends up empty is unconstrained

use crate::dataset::{roles, Dataset};
use crate::query::ParsedQuery;
use log::debug;
use serde::{Deserialize, Serialize};

/// Dropdowns send this instead of no selection
const ALL_SENTINEL: &str = "All";

/// Multi-dimensional filter criteria
///
/// Every dimension is optional; an empty spec reproduces the input dataset
/// unchanged. Assembled with the consuming setters, then treated as
/// immutable. Single-value setters swallow the `""`/`"All"` widget
/// sentinels; numeric setters accept raw widget strings and drop whatever
/// does not coerce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    boroughs: Vec<String>,
    years: Vec<i64>,
    months: Vec<i64>,
    hours: Vec<i64>,
    injuries: Vec<String>,
    person_types: Vec<String>,
    vehicle_types: Vec<String>,
    contributing_factors: Vec<String>,
    free_text: Option<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no dimension carries a constraint
    pub fn is_unconstrained(&self) -> bool {
        self.boroughs.is_empty()
            && self.years.is_empty()
            && self.months.is_empty()
            && self.hours.is_empty()
            && self.injuries.is_empty()
            && self.person_types.is_empty()
            && self.vehicle_types.is_empty()
            && self.contributing_factors.is_empty()
            && self.free_text.is_none()
    }

    pub fn borough(self, value: impl AsRef<str>) -> Self {
        self.boroughs([value])
    }

    pub fn boroughs<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_labels(&mut self.boroughs, values);
        self
    }

    pub fn year(self, value: i64) -> Self {
        self.years([value])
    }

    pub fn years(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.years.extend(values);
        self
    }

    /// Year values as sent by a widget; non-numeric entries are dropped
    pub fn years_raw<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_numeric(&mut self.years, "year", values);
        self
    }

    pub fn month(self, value: i64) -> Self {
        self.months([value])
    }

    pub fn months(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.months.extend(values);
        self
    }

    pub fn months_raw<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_numeric(&mut self.months, "month", values);
        self
    }

    pub fn hour(self, value: i64) -> Self {
        self.hours([value])
    }

    pub fn hours(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.hours.extend(values);
        self
    }

    pub fn hours_raw<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_numeric(&mut self.hours, "hour", values);
        self
    }

    pub fn injury(self, value: impl AsRef<str>) -> Self {
        self.injuries([value])
    }

    pub fn injuries<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_labels(&mut self.injuries, values);
        self
    }

    pub fn person_type(self, value: impl AsRef<str>) -> Self {
        self.person_types([value])
    }

    pub fn person_types<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_labels(&mut self.person_types, values);
        self
    }

    pub fn vehicle_type(self, value: impl AsRef<str>) -> Self {
        self.vehicle_types([value])
    }

    pub fn vehicle_types<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        push_labels(&mut self.vehicle_types, values);
        self
    }

    pub fn contributing_factor(self, value: impl AsRef<str>) -> Self {
        self.contributing_factors([value])
    }

    pub fn contributing_factors<S: AsRef<str>>(
        mut self,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        push_labels(&mut self.contributing_factors, values);
        self
    }

    /// Free-text search, OR-matched as a lowercase substring across the
    /// categorical columns; blank text is ignored
    pub fn free_text(mut self, text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim();
        if !text.is_empty() {
            self.free_text = Some(text.to_string());
        }
        self
    }

    /// Auto-fill unset dimensions from a parsed search query.
    ///
    /// Explicit selections always win: a dimension that already carries a
    /// value is left alone, exactly as the dashboard only fills empty
    /// dropdowns after a search.
    pub fn merge_parsed(mut self, parsed: &ParsedQuery) -> Self {
        if self.boroughs.is_empty() {
            if let Some(borough) = &parsed.borough {
                self.boroughs.push(borough.clone());
            }
        }
        if self.years.is_empty() {
            if let Some(year) = parsed.year {
                self.years.push(year);
            }
        }
        if self.person_types.is_empty() {
            if let Some(person_type) = &parsed.person_type {
                self.person_types.push(person_type.clone());
            }
        }
        if self.injuries.is_empty() {
            if let Some(injury) = &parsed.injury {
                self.injuries.push(injury.clone());
            }
        }
        self
    }

    /// Human-readable recap of the active filters for the dashboard header
    pub fn summary_label(&self) -> String {
        let mut parts = Vec::new();
        if !self.boroughs.is_empty() {
            parts.push(format!("Borough: {}", self.boroughs.join(", ")));
        }
        if !self.years.is_empty() {
            let years: Vec<String> = self.years.iter().map(i64::to_string).collect();
            parts.push(format!("Year: {}", years.join(", ")));
        }
        if !self.person_types.is_empty() {
            parts.push(format!("Person: {}", self.person_types.join(", ")));
        }
        if !self.injuries.is_empty() {
            parts.push(format!("Injury: {}", self.injuries.join(", ")));
        }
        if let Some(text) = &self.free_text {
            parts.push(format!("Search: {text}"));
        }
        if parts.is_empty() {
            "No filters applied.".to_string()
        } else {
            parts.join(" | ")
        }
    }

    pub fn borough_values(&self) -> &[String] {
        &self.boroughs
    }

    pub fn year_values(&self) -> &[i64] {
        &self.years
    }

    pub fn person_type_values(&self) -> &[String] {
        &self.person_types
    }

    pub fn injury_values(&self) -> &[String] {
        &self.injuries
    }

    pub fn free_text_value(&self) -> Option<&str> {
        self.free_text.as_deref()
    }
}

/// Skip the widget sentinels, keep everything else
fn push_labels<S: AsRef<str>>(target: &mut Vec<String>, values: impl IntoIterator<Item = S>) {
    for value in values {
        let value = value.as_ref();
        if !value.trim().is_empty() && value != ALL_SENTINEL {
            target.push(value.to_string());
        }
    }
}

/// Coerce widget strings to integers, dropping failures
fn push_numeric<S: AsRef<str>>(
    target: &mut Vec<i64>,
    dimension: &str,
    values: impl IntoIterator<Item = S>,
) {
    for value in values {
        let value = value.as_ref();
        if value.trim().is_empty() || value == ALL_SENTINEL {
            continue;
        }
        match value.trim().parse::<i64>() {
            Ok(parsed) => target.push(parsed),
            Err(_) => debug!("dropping non-numeric {dimension} filter value: {value:?}"),
        }
    }
}

/// Apply every constraint of `spec` to `dataset`, returning the matching rows
/// as a new dataset in their original order.
///
/// Final predicate: AND of all structured dimension memberships, AND the
/// free-text OR-match when text is present. An unconstrained spec returns a
/// copy of the input.
pub fn apply_filters(dataset: &Dataset, spec: &FilterSpec) -> Dataset {
    let mut keep = vec![true; dataset.len()];

    retain_labels(&mut keep, dataset, roles::BOROUGH, &spec.boroughs, true);
    retain_numeric(&mut keep, dataset, roles::YEAR, &spec.years);
    retain_numeric(&mut keep, dataset, roles::MONTH, &spec.months);
    retain_numeric(&mut keep, dataset, roles::HOUR, &spec.hours);
    retain_labels(&mut keep, dataset, roles::PERSON_INJURY, &spec.injuries, false);
    retain_labels(&mut keep, dataset, roles::PERSON_TYPE, &spec.person_types, false);
    retain_labels(&mut keep, dataset, roles::VEHICLE_TYPE, &spec.vehicle_types, false);
    retain_labels(
        &mut keep,
        dataset,
        roles::CONTRIBUTING_FACTOR,
        &spec.contributing_factors,
        false,
    );

    if let Some(text) = &spec.free_text {
        retain_free_text(&mut keep, dataset, text);
    }

    let indices: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter(|(_, &kept)| kept)
        .map(|(i, _)| i)
        .collect();
    dataset.take(&indices)
}

/// Membership scan over one string dimension; missing column → no-op
fn retain_labels(
    keep: &mut [bool],
    dataset: &Dataset,
    role: &str,
    values: &[String],
    case_insensitive: bool,
) {
    if values.is_empty() {
        return;
    }
    let Some(column) = dataset.column(role) else {
        debug!("column '{role}' missing, skipping that filter dimension");
        return;
    };
    for (idx, kept) in keep.iter_mut().enumerate() {
        if !*kept {
            continue;
        }
        *kept = match column.str_at(idx) {
            Some(cell) => values.iter().any(|v| {
                if case_insensitive {
                    v.eq_ignore_ascii_case(cell)
                } else {
                    v == cell
                }
            }),
            // Null cells never match a constrained dimension
            None => false,
        };
    }
}

/// Membership scan over one numeric dimension; missing column → no-op
fn retain_numeric(keep: &mut [bool], dataset: &Dataset, role: &str, values: &[i64]) {
    // An empty post-coercion value set means unconstrained, not match-nothing
    if values.is_empty() {
        return;
    }
    let Some(column) = dataset.column(role) else {
        debug!("column '{role}' missing, skipping that filter dimension");
        return;
    };
    for (idx, kept) in keep.iter_mut().enumerate() {
        if !*kept {
            continue;
        }
        *kept = match column.int_at(idx) {
            Some(cell) => values.contains(&cell),
            None => false,
        };
    }
}

/// Lowercased substring OR across the categorical columns
fn retain_free_text(keep: &mut [bool], dataset: &Dataset, text: &str) {
    let needle = text.to_lowercase();
    let columns: Vec<_> = roles::FREE_TEXT_ROLES
        .iter()
        .filter_map(|role| dataset.column(role))
        .collect();

    for (idx, kept) in keep.iter_mut().enumerate() {
        if !*kept {
            continue;
        }
        *kept = columns.iter().any(|column| {
            column
                .str_at(idx)
                .is_some_and(|cell| cell.to_lowercase().contains(&needle))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::roles;

    fn fixture() -> Dataset {
        Dataset::builder()
            .with_str_column(
                roles::BOROUGH,
                vec![Some("Brooklyn".into()), Some("Brooklyn".into()), Some("Queens".into())],
            )
            .unwrap()
            .with_int_column(roles::YEAR, vec![Some(2022), Some(2022), Some(2023)])
            .unwrap()
            .with_str_column(
                roles::PERSON_TYPE,
                vec![Some("Pedestrian".into()), Some("Pedestrian".into()), Some("Driver".into())],
            )
            .unwrap()
            .with_str_column(
                roles::PERSON_INJURY,
                vec![Some("Injured".into()), Some("Killed".into()), Some("No injury".into())],
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_borough_and_year_conjunction() {
        let spec = FilterSpec::new().borough("Brooklyn").year(2022);
        let filtered = apply_filters(&fixture(), &spec);

        assert_eq!(filtered.len(), 2);
        let year = filtered.column(roles::YEAR).unwrap();
        for idx in 0..filtered.len() {
            assert_eq!(year.int_at(idx), Some(2022));
        }
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let ds = fixture();
        let filtered = apply_filters(&ds, &FilterSpec::new());
        assert_eq!(filtered, ds);
    }

    #[test]
    fn test_missing_column_is_noop() {
        let ds = Dataset::builder()
            .with_int_column(roles::YEAR, vec![Some(2022), Some(2023)])
            .unwrap()
            .build();

        let spec = FilterSpec::new().vehicle_type("Sedan");
        assert_eq!(apply_filters(&ds, &spec).len(), 2);
    }

    #[test]
    fn test_sentinels_mean_no_constraint() {
        let spec = FilterSpec::new().borough("All").injury("").person_type("  ");
        assert!(spec.is_unconstrained());
        assert_eq!(apply_filters(&fixture(), &spec).len(), 3);
    }

    #[test]
    fn test_non_numeric_year_values_dropped_to_noop() {
        let spec = FilterSpec::new().years_raw(["abc", ""]);
        assert!(spec.is_unconstrained());
        assert_eq!(apply_filters(&fixture(), &spec).len(), 3);

        // A mixed list keeps the coercible values
        let spec = FilterSpec::new().years_raw(["abc", "2023"]);
        assert_eq!(apply_filters(&fixture(), &spec).len(), 1);
    }

    #[test]
    fn test_borough_match_is_case_insensitive() {
        let spec = FilterSpec::new().borough("BROOKLYN");
        assert_eq!(apply_filters(&fixture(), &spec).len(), 2);
    }

    #[test]
    fn test_person_injury_match_is_exact() {
        let spec = FilterSpec::new().injury("killed");
        assert_eq!(apply_filters(&fixture(), &spec).len(), 0);

        let spec = FilterSpec::new().injury("Killed");
        assert_eq!(apply_filters(&fixture(), &spec).len(), 1);
    }

    fn timed_fixture() -> Dataset {
        Dataset::builder()
            .with_int_column(roles::MONTH, vec![Some(1), Some(6), Some(6), None])
            .unwrap()
            .with_int_column(roles::HOUR, vec![Some(8), Some(8), Some(23), Some(8)])
            .unwrap()
            .build()
    }

    #[test]
    fn test_month_dimension_membership() {
        let spec = FilterSpec::new().month(6);
        assert_eq!(apply_filters(&timed_fixture(), &spec).len(), 2);

        let spec = FilterSpec::new().months([1, 6]);
        assert_eq!(apply_filters(&timed_fixture(), &spec).len(), 3);

        let spec = FilterSpec::new().months_raw(["6", "junk"]);
        assert_eq!(apply_filters(&timed_fixture(), &spec).len(), 2);
    }

    #[test]
    fn test_hour_dimension_membership() {
        // Null month on the last row does not matter for an hour-only filter
        let spec = FilterSpec::new().hour(8);
        assert_eq!(apply_filters(&timed_fixture(), &spec).len(), 3);

        let spec = FilterSpec::new().hours_raw(["23"]);
        let filtered = apply_filters(&timed_fixture(), &spec);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.column(roles::MONTH).unwrap().int_at(0), Some(6));
    }

    #[test]
    fn test_month_and_hour_conjunction() {
        let spec = FilterSpec::new().month(6).hour(8);
        assert_eq!(apply_filters(&timed_fixture(), &spec).len(), 1);

        // Null month never matches a constrained month dimension
        let spec = FilterSpec::new().month(1).hour(8);
        let filtered = apply_filters(&timed_fixture(), &spec);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.column(roles::HOUR).unwrap().int_at(0), Some(8));
        assert_eq!(filtered.column(roles::MONTH).unwrap().int_at(0), Some(1));
    }

    #[test]
    fn test_multi_value_dimension_is_set_membership() {
        let spec = FilterSpec::new().years([2022, 2023]);
        assert_eq!(apply_filters(&fixture(), &spec).len(), 3);

        let spec = FilterSpec::new().boroughs(["Queens", "Bronx"]);
        assert_eq!(apply_filters(&fixture(), &spec).len(), 1);
    }

    #[test]
    fn test_null_cell_never_matches_constrained_dimension() {
        let ds = Dataset::builder()
            .with_str_column(roles::BOROUGH, vec![Some("Queens".into()), None])
            .unwrap()
            .build();

        let spec = FilterSpec::new().borough("Queens");
        assert_eq!(apply_filters(&ds, &spec).len(), 1);
    }

    #[test]
    fn test_free_text_is_or_across_columns() {
        // "ped" appears only in person_type; row 3 has it nowhere
        let spec = FilterSpec::new().free_text("ped");
        let filtered = apply_filters(&fixture(), &spec);
        assert_eq!(filtered.len(), 2);

        let spec = FilterSpec::new().free_text("queens");
        assert_eq!(apply_filters(&fixture(), &spec).len(), 1);

        let spec = FilterSpec::new().free_text("nowhere");
        assert_eq!(apply_filters(&fixture(), &spec).len(), 0);
    }

    #[test]
    fn test_free_text_composes_with_structured_filters() {
        let spec = FilterSpec::new().borough("Brooklyn").free_text("killed");
        let filtered = apply_filters(&fixture(), &spec);
        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered.column(roles::PERSON_INJURY).unwrap().str_at(0),
            Some("Killed")
        );
    }

    #[test]
    fn test_merge_parsed_fills_only_unset_dimensions() {
        let parsed = crate::query::parse_query(
            "Queens 2023 driver",
            &["Driver", "Pedestrian"],
            &["Killed"],
        );

        // Explicit borough wins; year and person type come from the search
        let spec = FilterSpec::new().borough("Brooklyn").merge_parsed(&parsed);
        assert_eq!(spec.borough_values(), ["Brooklyn"]);
        assert_eq!(spec.year_values(), [2023]);
        assert_eq!(spec.person_type_values(), ["Driver"]);
    }

    #[test]
    fn test_summary_label() {
        assert_eq!(FilterSpec::new().summary_label(), "No filters applied.");

        let spec = FilterSpec::new().borough("Brooklyn").year(2022).free_text("truck");
        assert_eq!(
            spec.summary_label(),
            "Borough: Brooklyn | Year: 2022 | Search: truck"
        );
    }

    #[test]
    fn test_filtered_rows_keep_original_order() {
        let spec = FilterSpec::new().borough("Brooklyn");
        let filtered = apply_filters(&fixture(), &spec);
        let injuries: Vec<_> = (0..filtered.len())
            .map(|i| filtered.column(roles::PERSON_INJURY).unwrap().str_at(i).unwrap().to_string())
            .collect();
        assert_eq!(injuries, ["Injured", "Killed"]);
    }
}
