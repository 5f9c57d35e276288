//! Key and value matching shared by every fact query.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How a key filter is compared against fact keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive full-key equality
    #[default]
    Exact,
    /// Case-insensitive substring match in either direction
    Fuzzy,
}

impl MatchMode {
    /// `Fuzzy` when the flag is set, `Exact` otherwise
    pub fn from_fuzzy(fuzzy: bool) -> Self {
        if fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::Exact
        }
    }
}

/// Compare a candidate key against a filter under the given mode.
pub fn keys_match(candidate: &str, filter: &str, mode: MatchMode) -> bool {
    let candidate = candidate.to_lowercase();
    let filter = filter.to_lowercase();
    match mode {
        MatchMode::Exact => candidate == filter,
        MatchMode::Fuzzy => candidate.contains(&filter) || filter.contains(&candidate),
    }
}

/// Render a fact value for substring matching: strings verbatim, everything
/// else as compact JSON.
pub fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Match a target value against a fact value.
///
/// Lists yield their first element whose text contains the target; any other
/// value yields itself when its text contains the target.
pub fn match_value<'a>(fact_value: &'a JsonValue, target: &JsonValue) -> Option<&'a JsonValue> {
    let needle = value_text(target);
    match fact_value {
        JsonValue::Array(items) => items.iter().find(|item| value_text(item).contains(&needle)),
        other => value_text(other).contains(&needle).then_some(other),
    }
}

/// Interpret an operator-supplied value: JSON literal when it parses, plain
/// string otherwise.
pub fn parse_target_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}
