//! Pure query layer over the tree. Edges are always recomputed from the
//! node-local connection fields rather than cached, so they can never drift
//! from the model after a mutation.

use crate::tree::model::{ComboId, DecisionTree, NodeId, OptionId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    // Legacy free-form node-to-node edge
    Free,
    Option(OptionId),
    Combo(ComboId),
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub kind: EdgeKind,
    pub to: NodeId,
}

/// Mapped target for a single-option connection. Dangling or unknown ids
/// resolve to `None`, never an error.
pub fn target_of<'a>(tree: &'a DecisionTree, node_id: &str, option_id: &str) -> Option<&'a NodeId> {
    let node = tree.node(node_id)?;
    node.option_connections
        .iter()
        .find(|oc| oc.option_id == option_id)
        .map(|oc| &oc.target_node_id)
}

pub fn combo_target<'a>(tree: &'a DecisionTree, node_id: &str, combo_id: &str) -> Option<&'a NodeId> {
    let node = tree.node(node_id)?;
    node.combo_connections
        .iter()
        .find(|cc| cc.id == combo_id)
        .map(|cc| &cc.target_node_id)
}

/// Every derived edge, in node insertion order then per-node declaration
/// order. Stable within a render pass; recomputed on demand.
pub fn all_edges(tree: &DecisionTree) -> Vec<Edge> {
    let mut edges = Vec::new();
    for node in &tree.nodes {
        for to in &node.connections {
            edges.push(Edge {
                from: node.id.clone(),
                kind: EdgeKind::Free,
                to: to.clone(),
            });
        }
        for oc in &node.option_connections {
            edges.push(Edge {
                from: node.id.clone(),
                kind: EdgeKind::Option(oc.option_id.clone()),
                to: oc.target_node_id.clone(),
            });
        }
        for cc in &node.combo_connections {
            edges.push(Edge {
                from: node.id.clone(),
                kind: EdgeKind::Combo(cc.id.clone()),
                to: cc.target_node_id.clone(),
            });
        }
        if let Some(target) = &node.default_connection {
            edges.push(Edge {
                from: node.id.clone(),
                kind: EdgeKind::Default,
                to: target.clone(),
            });
        }
    }
    edges
}
