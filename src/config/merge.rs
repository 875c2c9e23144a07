//! Field-by-field merging of configuration tiers.
//!
//! Later tiers win on scalars and arrays; mappings merge recursively.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// A `null` in the overlay means "not specified" and keeps the base value.
///
/// ```
/// use serde_json::json;
/// use plan_graph::config::deep_merge;
///
/// let base = json!({"runner": {"max_cycles": 100, "max_attempts": 3}});
/// let overlay = json!({"runner": {"max_attempts": 5}});
/// assert_eq!(
///     deep_merge(base, overlay),
///     json!({"runner": {"max_cycles": 100, "max_attempts": 5}})
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold `deep_merge` over tiers, lowest priority first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}
