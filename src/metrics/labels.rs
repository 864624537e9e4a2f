//! Label types for Prometheus metrics

use prometheus_client::encoding::EncodeLabelSet;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct NodeLabels {
    pub node: String,
}

impl NodeLabels {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

/// Cache read outcome (`fresh`, `stale`, `miss`, `shared`)
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub cache: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheNameLabels {
    pub cache: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_labels_creation() {
        let labels = NodeLabels::new("de-fra-1");
        assert_eq!(labels.node, "de-fra-1");
    }

    #[test]
    fn test_node_labels_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(NodeLabels::new("node1"), 100);

        assert_eq!(map.get(&NodeLabels::new("node1")), Some(&100));
        assert_eq!(map.get(&NodeLabels::new("node2")), None);
    }

    #[test]
    fn test_cache_labels_inequality() {
        let fresh = CacheLabels {
            cache: "traffic".to_string(),
            outcome: "fresh".to_string(),
        };
        let stale = CacheLabels {
            cache: "traffic".to_string(),
            outcome: "stale".to_string(),
        };
        assert_ne!(fresh, stale);
    }

    #[test]
    fn test_labels_debug_format() {
        let labels = CacheNameLabels {
            cache: "online".to_string(),
        };
        let debug_str = format!("{:?}", labels);
        assert!(debug_str.contains("online"));
    }
}
