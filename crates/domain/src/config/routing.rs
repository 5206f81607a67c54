use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Major version used when neither the turn nor the session memory
    /// supplies one. A request may override it with its own context version.
    #[serde(default = "d_default_major_version")]
    pub default_major_version: Option<String>,
    /// Shortest string accepted as a node id. 40 is canonical; anything
    /// shorter is accepted with a warning.
    #[serde(default = "d_node_id_min_len")]
    pub node_id_min_len: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_major_version: d_default_major_version(),
            node_id_min_len: d_node_id_min_len(),
        }
    }
}

fn d_default_major_version() -> Option<String> {
    Some("29a".into())
}
fn d_node_id_min_len() -> usize {
    16
}
