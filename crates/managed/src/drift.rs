//! Drift detection and late-initialization helpers
//!
//! Drift is detected by overlay-then-diff: the desired parameters are
//! written onto a copy of the observed payload with the same generator used
//! for create, and the copy is compared with the observed payload. Fields
//! the generator never writes (output-only fields) cannot cause drift.
//!
//! The comparison treats empty and absent as equal: `null`, `""`, `[]` and
//! `{}` all compare equal to an unset field.

use serde::Serialize;
use serde_json::Value;

/// Compare two payloads structurally, treating empty values as unset
pub fn is_up_to_date<T: Serialize>(overlaid: &T, observed: &T) -> Result<bool, serde_json::Error> {
    let overlaid = prune(serde_json::to_value(overlaid)?);
    let observed = prune(serde_json::to_value(observed)?);
    Ok(overlaid == observed)
}

/// Overlay `desired` onto a copy of `observed` and compare with `observed`
pub fn overlay_is_up_to_date<T, F>(observed: &T, overlay: F) -> Result<bool, serde_json::Error>
where
    T: Serialize + Clone,
    F: FnOnce(&mut T),
{
    let mut overlaid = observed.clone();
    overlay(&mut overlaid);
    is_up_to_date(&overlaid, observed)
}

/// Recursively drop empty values; an empty result collapses to `Null`
pub fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: serde_json::Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                Value::Null
            } else {
                // Elements keep their positions; an empty element is still an element
                Value::Array(items.into_iter().map(prune).collect())
            }
        }
        Value::String(s) if s.is_empty() => Value::Null,
        other => other,
    }
}

/// Fill an unset desired field from the observed value.
///
/// Returns true when the field was filled. A value the user set is never
/// overwritten.
pub fn late_init<T: Clone>(desired: &mut Option<T>, observed: Option<&T>) -> bool {
    match (desired.as_ref(), observed) {
        (None, Some(value)) => {
            *desired = Some(value.clone());
            true
        }
        _ => false,
    }
}
