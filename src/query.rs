//! Search Query Parser
//!
//! Turns a free-text search line into a sparse, structured filter extraction.
//! The scan is a greedy left-to-right cursor over whitespace tokens, consuming
//! one or two tokens per step:
//!
//! - `STATEN ISLAND` (two tokens, any case) → borough
//! - one of the other four borough names → borough
//! - a 4-digit number → year
//! - an exact (case-insensitive) person-type label from the dataset → person type
//! - an exact (case-insensitive) injury label from the dataset → injury
//! - anything else → residual keyword
//!
//! The first match per dimension wins; a later conflicting token falls through
//! to the keywords. Person-type and injury detection is exact single-token
//! matching against the dataset's vocabularies, so a multi-word label such as
//! "Motor Vehicle Occupant" is never detected from one token. Parsing never
//! fails: malformed input just ends up in `keywords`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::OnceLock;

/// Borough names detected without any vocabulary, uppercased token → stored value
const BOROUGHS: &[(&str, &str)] = &[
    ("MANHATTAN", "Manhattan"),
    ("BROOKLYN", "Brooklyn"),
    ("QUEENS", "Queens"),
    ("BRONX", "Bronx"),
];

fn year_regex() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only: `\d` also matches other Unicode digit scripts,
    // which i64::parse rejects
    YEAR.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("valid year regex"))
}

/// Structured extraction from one search line
///
/// At most one value per dimension; unrecognized tokens are kept verbatim, in
/// order, as `keywords`. Created fresh per search, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub borough: Option<String>,
    pub year: Option<i64>,
    pub person_type: Option<String>,
    pub injury: Option<String>,
    pub keywords: Vec<String>,
}

impl ParsedQuery {
    /// True when nothing was extracted and no keywords remain
    pub fn is_empty(&self) -> bool {
        self.borough.is_none()
            && self.year.is_none()
            && self.person_type.is_none()
            && self.injury.is_none()
            && self.keywords.is_empty()
    }
}

/// Parse a search line against the dataset's person-type and injury labels.
///
/// The vocabularies are the distinct values currently present in the data
/// (see [`Dataset::vocabulary`](crate::Dataset::vocabulary)); either may be
/// empty, which simply disables that dimension's detection. An empty or
/// blank query yields an empty [`ParsedQuery`].
pub fn parse_query<P, I>(query: &str, person_types: &[P], injuries: &[I]) -> ParsedQuery
where
    P: AsRef<str>,
    I: AsRef<str>,
{
    let mut parsed = ParsedQuery::default();
    let tokens: SmallVec<[&str; 16]> = query.split_whitespace().collect();

    let mut cursor = 0;
    while cursor < tokens.len() {
        let token = tokens[cursor];
        let upper = token.to_uppercase();

        // Two-token borough: STATEN ISLAND
        if parsed.borough.is_none()
            && upper == "STATEN"
            && tokens
                .get(cursor + 1)
                .is_some_and(|next| next.eq_ignore_ascii_case("ISLAND"))
        {
            parsed.borough = Some("Staten Island".to_string());
            cursor += 2;
            continue;
        }

        if parsed.borough.is_none() {
            if let Some((_, stored)) = BOROUGHS.iter().find(|(name, _)| *name == upper) {
                parsed.borough = Some((*stored).to_string());
                cursor += 1;
                continue;
            }
        }

        if parsed.year.is_none() && year_regex().is_match(token) {
            // 4 ASCII digits always parse; if they ever did not, the token
            // falls through to the keywords instead of vanishing
            if let Ok(year) = token.parse() {
                parsed.year = Some(year);
                cursor += 1;
                continue;
            }
        }

        if parsed.person_type.is_none() {
            if let Some(label) = match_label(&upper, person_types) {
                parsed.person_type = Some(label);
                cursor += 1;
                continue;
            }
        }

        if parsed.injury.is_none() {
            if let Some(label) = match_label(&upper, injuries) {
                parsed.injury = Some(label);
                cursor += 1;
                continue;
            }
        }

        parsed.keywords.push(token.to_string());
        cursor += 1;
    }

    parsed
}

/// Exact case-insensitive token match, returning the vocabulary's original casing
fn match_label<S: AsRef<str>>(upper_token: &str, vocabulary: &[S]) -> Option<String> {
    vocabulary
        .iter()
        .map(AsRef::as_ref)
        .find(|label| label.to_uppercase() == upper_token)
        .map(str::to_string)
}
