//! Node identity and raw-input fingerprinting.
//!
//! Ids come from the configured id field of a raw record (JSON string or
//! integer) or are generated when the record carries none. Ids must be unique
//! tree-wide: the node arena is keyed by [`NodeId`] and id-based lookup is
//! only well defined under that constraint.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a single tree node.
///
/// Raw records may use numeric or string ids; both are preserved as-is so
/// that `getNodeById`-style lookups match the source data exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Num(i64),
    Str(String),
}

impl NodeId {
    /// Extract an id from a raw record field, if the field holds one.
    ///
    /// Accepts JSON integers and strings; everything else (objects, arrays,
    /// floats, booleans, null) yields `None` and the caller falls back to a
    /// generated id.
    pub fn from_value(value: &Value) -> Option<NodeId> {
        match value {
            Value::Number(n) => n.as_i64().map(NodeId::Num),
            Value::String(s) => Some(NodeId::Str(s.clone())),
            _ => None,
        }
    }

    /// Parse a path segment into an id.
    ///
    /// All-digit segments become numeric ids so that `"1/2/5"` addresses
    /// records with integer ids; anything else is a string id.
    pub fn parse(segment: &str) -> NodeId {
        match segment.parse::<i64>() {
            Ok(n) => NodeId::Num(n),
            Err(_) => NodeId::Str(segment.to_string()),
        }
    }

    /// Generate a fresh unique id for a record that declares none.
    pub fn generate() -> NodeId {
        NodeId::Str(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a JSON value, for handler arguments and diagnostics.
    pub fn to_value(&self) -> Value {
        match self {
            NodeId::Num(n) => Value::from(*n),
            NodeId::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Num(n) => write!(f, "{n}"),
            NodeId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId::Num(n)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::Str(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::Str(s)
    }
}

/// Deep content hash of raw input data.
///
/// Used to decide whether a new input array actually differs from the one a
/// tree was last enhanced from; equal fingerprints skip the rebuild (a
/// rebuild would discard per-node open/selected state).
pub fn fingerprint(data: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for record in data {
        record.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_number_and_string() {
        assert_eq!(NodeId::from_value(&json!(7)), Some(NodeId::Num(7)));
        assert_eq!(
            NodeId::from_value(&json!("alpha")),
            Some(NodeId::Str("alpha".into()))
        );
        assert_eq!(NodeId::from_value(&json!(null)), None);
        assert_eq!(NodeId::from_value(&json!([1])), None);
    }

    #[test]
    fn test_parse_path_segment() {
        assert_eq!(NodeId::parse("42"), NodeId::Num(42));
        assert_eq!(NodeId::parse("node-42"), NodeId::Str("node-42".into()));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(NodeId::Num(3).to_string(), "3");
        assert_eq!(NodeId::Str("leaf".into()).to_string(), "leaf");
    }

    #[test]
    fn test_fingerprint_detects_change() {
        let a = vec![json!({"id": 1, "name": "a"})];
        let b = vec![json!({"id": 1, "name": "b"})];
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
