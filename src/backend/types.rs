use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiag {
    pub name: String,
    pub exe: String,
    pub ok: bool,
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Ready/total node counts from one `kubectl get nodes` observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReadiness {
    pub total: u32,
    pub ready: u32,
    #[serde(default)]
    pub not_ready: Vec<String>,
}

impl NodeReadiness {
    pub fn all_ready(&self, min_ready: u32) -> bool {
        self.ready >= min_ready.max(1) && self.not_ready.is_empty()
    }
}

impl fmt::Display for NodeReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ready", self.ready, self.total)?;
        if !self.not_ready.is_empty() {
            write!(f, " (waiting on {})", self.not_ready.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResult {
    Created,
    /// The name is taken elsewhere or held by a soft-deleted resource.
    NameConflict(String),
}

// `kubectl get nodes -o json`, trimmed to what readiness needs.

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Node {
    pub metadata: NodeMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NodeMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct NodeStatus {
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NodeCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

impl NodeList {
    pub(crate) fn readiness(&self) -> NodeReadiness {
        let mut out = NodeReadiness {
            total: u32::try_from(self.items.len()).unwrap_or(u32::MAX),
            ..Default::default()
        };
        for node in &self.items {
            let ready = node
                .status
                .conditions
                .iter()
                .any(|c| c.kind == "Ready" && c.status == "True");
            if ready {
                out.ready += 1;
            } else {
                out.not_ready.push(node.metadata.name.clone());
            }
        }
        out
    }
}

/// Parses `kubectl get nodes -o json` output.
pub fn parse_node_list(raw: &str) -> serde_json::Result<NodeReadiness> {
    let list: NodeList = serde_json::from_str(raw)?;
    Ok(list.readiness())
}
