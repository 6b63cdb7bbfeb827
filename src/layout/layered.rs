//! Built-in left-to-right layered layout: Kahn ranking with longest-path
//! layering, barycenter ordering within each rank, then simple coordinate
//! assignment. Nodes caught in a cycle keep the deepest rank reached before
//! the cycle was detected.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{LayoutEdge, LayoutEngine, LayoutNode, NodePlacement};

pub struct LayeredEngine {
    // Vertical gap between nodes in a rank
    pub node_spacing: f32,
    // Horizontal gap between layers
    pub rank_spacing: f32,
    pub ordering_passes: usize,
}

impl Default for LayeredEngine {
    fn default() -> Self {
        Self {
            node_spacing: 80.0,
            rank_spacing: 100.0,
            ordering_passes: 4,
        }
    }
}

impl LayoutEngine for LayeredEngine {
    fn compute(
        &self,
        nodes: &[LayoutNode],
        edges: &[LayoutEdge],
    ) -> anyhow::Result<Vec<NodePlacement>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        // Dangling endpoints and self-loops don't participate in layering
        let usable: Vec<&LayoutEdge> = edges
            .iter()
            .filter(|e| {
                e.source != e.target
                    && known.contains(e.source.as_str())
                    && known.contains(e.target.as_str())
            })
            .collect();

        let ranks = compute_ranks(nodes, &usable);
        let max_rank = ranks.values().copied().max().unwrap_or(0);

        // Bucket per rank, initially in request (insertion) order
        let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
        for node in nodes {
            let r = *ranks.get(node.id.as_str()).unwrap_or(&0);
            rank_nodes[r].push(node.id.clone());
        }

        order_by_barycenter(&mut rank_nodes, &usable, self.ordering_passes);

        let sizes: HashMap<&str, (f32, f32)> = nodes
            .iter()
            .map(|n| (n.id.as_str(), (n.width, n.height)))
            .collect();

        let mut placements = Vec::with_capacity(nodes.len());
        let mut x_cursor = 0.0f32;
        for bucket in &rank_nodes {
            let mut y_cursor = 0.0f32;
            let mut rank_width = 0.0f32;
            for id in bucket {
                let (w, h) = sizes.get(id.as_str()).copied().unwrap_or((0.0, 0.0));
                placements.push(NodePlacement {
                    id: id.clone(),
                    x: x_cursor,
                    y: y_cursor,
                });
                y_cursor += h + self.node_spacing;
                rank_width = rank_width.max(w);
            }
            x_cursor += rank_width + self.rank_spacing;
        }
        Ok(placements)
    }
}

// Longest-path layering seeded by a Kahn topological order. Nodes left over
// by a cycle are appended in request order and ranked from wherever the
// acyclic prefix put their predecessors.
fn compute_ranks(nodes: &[LayoutNode], edges: &[&LayoutEdge]) -> HashMap<String, usize> {
    let mut indeg: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in edges {
        adj.entry(e.source.as_str()).or_default().push(e.target.as_str());
        *indeg.entry(e.target.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| indeg.get(id).copied().unwrap_or(0) == 0)
        .collect();

    let mut order: Vec<&str> = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(nexts) = adj.get(id) {
            for next in nexts {
                if let Some(deg) = indeg.get_mut(next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
    }
    if order.len() < nodes.len() {
        let seen: HashSet<&str> = order.iter().copied().collect();
        for node in nodes {
            if !seen.contains(node.id.as_str()) {
                order.push(node.id.as_str());
            }
        }
    }

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for id in &order {
        let rank = *ranks.entry(id.to_string()).or_insert(0);
        if let Some(nexts) = adj.get(id) {
            for next in nexts {
                let entry = ranks.entry(next.to_string()).or_insert(0);
                *entry = (*entry).max(rank + 1);
            }
        }
    }
    ranks
}

// Median-free barycenter sweep: order each rank by the mean index of its
// predecessors in the previous rank. Ties keep the prior order (stable sort).
fn order_by_barycenter(rank_nodes: &mut [Vec<String>], edges: &[&LayoutEdge], passes: usize) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in edges {
        incoming
            .entry(e.target.as_str())
            .or_default()
            .push(e.source.as_str());
    }

    for _ in 0..passes {
        for r in 1..rank_nodes.len() {
            let prev_index: HashMap<&str, usize> = rank_nodes[r - 1]
                .iter()
                .enumerate()
                .map(|(i, id)| (id.as_str(), i))
                .collect();
            let mut keyed: Vec<(f32, String)> = rank_nodes[r]
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    let preds: Vec<usize> = incoming
                        .get(id.as_str())
                        .map(|srcs| {
                            srcs.iter()
                                .filter_map(|s| prev_index.get(s).copied())
                                .collect()
                        })
                        .unwrap_or_default();
                    let key = if preds.is_empty() {
                        i as f32
                    } else {
                        preds.iter().sum::<usize>() as f32 / preds.len() as f32
                    };
                    (key, id.clone())
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            rank_nodes[r] = keyed.into_iter().map(|(_, id)| id).collect();
        }
    }
}
