pub mod layered;
pub mod runner;

use crate::tree::model::{DecisionTree, NodeId, Position};
use crate::tree::resolve;

// Canvas card geometry: fixed width, height grows with the option count so
// taller nodes reserve enough vertical room in the layout.
pub const NODE_WIDTH: f32 = 320.0;
pub const NODE_BASE_HEIGHT: f32 = 150.0;
pub const NODE_OPTION_HEIGHT: f32 = 30.0;

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub id: NodeId,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutEdge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodePlacement {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
}

/// Opaque layered-layout capability. Any left-to-right layered algorithm
/// satisfies the contract; the built-in engine is [`layered::LayeredEngine`].
pub trait LayoutEngine: Send + Sync {
    fn compute(
        &self,
        nodes: &[LayoutNode],
        edges: &[LayoutEdge],
    ) -> anyhow::Result<Vec<NodePlacement>>;
}

pub fn node_height(option_count: usize) -> f32 {
    NODE_BASE_HEIGHT + NODE_OPTION_HEIGHT * option_count as f32
}

/// Snapshot the tree into a layout request.
pub fn layout_request(tree: &DecisionTree) -> (Vec<LayoutNode>, Vec<LayoutEdge>) {
    let nodes = tree
        .nodes
        .iter()
        .map(|n| LayoutNode {
            id: n.id.clone(),
            width: NODE_WIDTH,
            height: node_height(n.options.len()),
        })
        .collect();
    let edges = resolve::all_edges(tree)
        .into_iter()
        .map(|e| LayoutEdge {
            source: e.from,
            target: e.to,
        })
        .collect();
    (nodes, edges)
}

/// Reposition every node the result names; nodes absent from the result keep
/// their previous position.
pub fn apply_placements(tree: &mut DecisionTree, placements: &[NodePlacement]) {
    for p in placements {
        tree.set_position(&p.id, Position { x: p.x, y: p.y });
    }
}
