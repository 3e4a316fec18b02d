//! Attribute Resolver — schema-agnostic field lookup over raw resource JSON.
//!
//! Collector output has accumulated several incompatible shapes over time:
//! flat fields, ARM-style nested `properties`, and Terraform-plan-style
//! nested `values`. Controls stay shape-unaware by listing ordered candidate
//! keys; this module is the only place that knows where to look for them.
//! It also owns the single `truthy` coercion used by every "feature enabled"
//! check in the catalog.

use serde_json::{Map, Value};

/// Accepted spellings of "true" coming out of string-typed flags.
const TRUE_WORDS: &[&str] = &["true", "enabled", "yes", "1"];

/// Look up the first matching candidate key against the bag.
///
/// Search order: every candidate against the top level (dotted keys walk
/// nested objects), then every candidate inside a nested `properties`
/// object, then inside a nested `values` object. Candidate order encodes
/// schema precedence, newest spelling first.
pub fn resolve<'a>(bag: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    for key in candidates {
        if let Some(v) = lookup_path(bag, key) {
            return Some(v);
        }
    }
    for nested in ["properties", "values"] {
        if let Some(Value::Object(inner)) = bag.get(nested) {
            for key in candidates {
                if let Some(v) = lookup_path(inner, key) {
                    return Some(v);
                }
            }
        }
    }
    None
}

fn lookup_path<'a>(bag: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = bag.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// System-wide boolean coercion. JSON null and absent fields are false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            TRUE_WORDS.iter().any(|w| s.eq_ignore_ascii_case(w))
        }
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Whether a value is materially present. An explicit JSON null counts as
/// absent, matching how the collector encodes fields it could not read.
pub fn present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// Evidence-friendly rendering of an observed value. Strings render bare
/// (no quotes) so evidence reads `publicNetworkAccess=Enabled`.
pub fn display(value: Option<&Value>) -> String {
    match value {
        None => "absent".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
    }
}
