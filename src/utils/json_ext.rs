//! JSON hygiene helpers shared by the op generator and the session layer.
//!
//! Editor input arrives via copy/paste and rich-text fields, so node data is
//! scrubbed before it enters the document: strings are trimmed and stripped
//! of zero-width characters, and empty values are dropped entirely so that
//! "cleared" and "absent" are the same state on the wire.

use serde_json::Value;

/// Returns `true` for values that carry information: not null, and not an
/// empty string.
#[must_use]
pub fn is_something(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Strips zero-width characters and surrounding whitespace from a string.
#[must_use]
pub fn scrub_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{21B5}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Recursively sanitizes a JSON value.
///
/// Strings are scrubbed; object entries whose sanitized value is empty
/// (null, `""`, `{}`) are removed. Arrays are sanitized element-wise but
/// never shrunk — element positions are meaningful in edge lists.
#[must_use]
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(scrub_string(&s)),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let v = sanitize(v);
                let keep = match &v {
                    Value::Object(o) => !o.is_empty(),
                    other => is_something(other),
                };
                if keep {
                    out.insert(k, v);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

/// Dot-hierarchy test: is `longer` a strict descendant of `shorter`?
///
/// `"food.fruit.apple"` extends `"food.fruit"` and `"food"`, but not
/// `"food.fru"` — segment boundaries matter.
#[must_use]
pub fn extends_key(longer: &str, shorter: &str) -> bool {
    longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer[shorter.len()..].starts_with('.')
}

/// Number of dot-separated segments in a hierarchical key.
#[must_use]
pub fn granularity(key: &str) -> usize {
    key.split('.').count()
}
