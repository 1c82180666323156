//! PropertyMap: the key-value store on vertices.

use std::collections::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Keys that are derived from the vertex itself and never stored as properties.
pub const RESERVED_KEYS: [&str; 2] = ["id", "type"];

/// Convert iterator of (key, value) pairs into a Value::Map.
impl<K, V> From<Vec<(K, V)>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Build a PropertyMap from `(key, value)` pairs.
///
/// ```
/// use syno::{props, Value};
/// let p = props([("name", Value::from("Ada")), ("age", Value::from(3))]);
/// assert_eq!(p.len(), 2);
/// ```
pub fn props<K, V, I>(pairs: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
