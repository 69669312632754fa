//! Topology snapshot aggregation
//!
//! The mesh transport reports its connection tree and its id-to-name map as
//! two independently fetched JSON documents. Consumers want one object, so
//! the snapshot merges them structurally: two explicit parse steps, then
//! one object with `mesh_tree` and `name_map` keys, each fragment's
//! internal structure untouched. String concatenation is never used; a
//! fragment that does not parse fails the whole merge and the caller
//! re-requests both fragments on the next trigger.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while merging topology fragments
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Connection tree fragment is not a JSON object
    #[error("connection tree fragment unparsable: {0}")]
    InvalidTree(String),

    /// Name map fragment is not a JSON object
    #[error("name map fragment unparsable: {0}")]
    InvalidNameMap(String),
}

/// One atomic view of the whole mesh: connection tree plus name map
///
/// Recomputed in full on every connectivity change and every explicit
/// request; never patched incrementally, never cached across triggers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    /// Parent/child links rooted at the bridge
    pub mesh_tree: Value,
    /// Numeric node id to assigned name
    pub name_map: Value,
}

fn parse_object(fragment: &str) -> std::result::Result<Value, String> {
    let value: Value = serde_json::from_str(fragment).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("expected a JSON object, got {value}"))
    }
}

impl TopologySnapshot {
    /// Merge two topology fragments into one snapshot
    ///
    /// Both fragments must come from the same connectivity-change moment;
    /// this function only guarantees it never produces a partial merge.
    pub fn aggregate(
        tree_json: &str,
        name_map_json: &str,
    ) -> std::result::Result<Self, AggregationError> {
        let mesh_tree = parse_object(tree_json).map_err(AggregationError::InvalidTree)?;
        let name_map = parse_object(name_map_json).map_err(AggregationError::InvalidNameMap)?;
        Ok(Self {
            mesh_tree,
            name_map,
        })
    }

    /// Serialized publish payload: `{"mesh_tree": .., "name_map": ..}`
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(serde_json::to_vec(self).expect("snapshot serialization"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{"nodeId": 1864632712, "subs": [{"nodeId": 3961246792}]}"#;
    const NAMES: &str = r#"{"1864632712": "bridge", "3961246792": "hen-house-3"}"#;

    #[test]
    fn test_aggregate_preserves_fragments() {
        let snapshot = TopologySnapshot::aggregate(TREE, NAMES).unwrap();
        assert_eq!(snapshot.mesh_tree["subs"][0]["nodeId"], 3961246792u32);
        assert_eq!(snapshot.name_map["1864632712"], "bridge");
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let a = TopologySnapshot::aggregate(TREE, NAMES).unwrap();
        let b = TopologySnapshot::aggregate(TREE, NAMES).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_publish_shape() {
        let snapshot = TopologySnapshot::aggregate("{}", "{}").unwrap();
        let json: Value = serde_json::from_slice(&snapshot.to_bytes()).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["mesh_tree", "name_map"]);
    }

    #[test]
    fn test_bad_tree_fails_whole_merge() {
        let err = TopologySnapshot::aggregate("{not json", NAMES).unwrap_err();
        assert!(matches!(err, AggregationError::InvalidTree(_)));
    }

    #[test]
    fn test_bad_name_map_fails_whole_merge() {
        let err = TopologySnapshot::aggregate(TREE, "[]").unwrap_err();
        assert!(matches!(err, AggregationError::InvalidNameMap(_)));
    }
}
