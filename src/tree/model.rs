use serde::{Deserialize, Serialize};
use uuid::Uuid;

// String ids keep hand-written documents round-trippable; freshly created
// entities get a uuid-suffixed id so ids are never reused within a session.
pub type NodeId = String;
pub type OptionId = String;
pub type ComboId = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Single,
    Multi,
    End,
    Recursive,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Checkbox,
    Radio,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeOption {
    pub id: OptionId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionConnection {
    pub option_id: OptionId,
    pub target_node_id: NodeId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboConnection {
    pub id: ComboId,
    pub option_ids: Vec<OptionId>,
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

pub fn pos(x: f32, y: f32) -> Position {
    Position { x, y }
}

// Unknown fields are rejected so typos in hand-edited documents surface as
// import errors instead of loading silently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<NodeOption>,
    // Legacy free-form node-to-node edges; kept for document compatibility
    #[serde(default)]
    pub connections: Vec<NodeId>,
    #[serde(default)]
    pub option_connections: Vec<OptionConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combo_connections: Vec<ComboConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_connection: Option<NodeId>,
    #[serde(default)]
    pub position: Position,
}

impl DecisionNode {
    pub fn option(&self, option_id: &str) -> Option<&NodeOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// The canonical node collection. Nodes live in a plain `Vec` because the
/// exchange document is an ordered array and the edge projection must be
/// stable across a render pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<DecisionNode>,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in sample used when no autosaved state exists.
    pub fn sample() -> Self {
        let nodes = vec![
            DecisionNode {
                id: "node-1".into(),
                node_type: NodeType::Single,
                title: "CLINICAL PRESENTATION".into(),
                description: Some("Initial patient assessment".into()),
                options: vec![
                    NodeOption {
                        id: "opt-1".into(),
                        label: "Pedunculated or sessile polyp".into(),
                        kind: OptionKind::Radio,
                    },
                    NodeOption {
                        id: "opt-2".into(),
                        label: "Colon cancer for resection".into(),
                        kind: OptionKind::Radio,
                    },
                    NodeOption {
                        id: "opt-3".into(),
                        label: "Metastatic adenocarcinoma".into(),
                        kind: OptionKind::Radio,
                    },
                ],
                connections: vec![],
                option_connections: vec![],
                combo_connections: vec![],
                default_connection: None,
                position: pos(50.0, 150.0),
            },
            DecisionNode {
                id: "node-2".into(),
                node_type: NodeType::Multi,
                title: "FINDINGS".into(),
                description: None,
                options: vec![
                    NodeOption {
                        id: "opt-4".into(),
                        label: "Pathology review".into(),
                        kind: OptionKind::Checkbox,
                    },
                    NodeOption {
                        id: "opt-5".into(),
                        label: "Colonoscopy".into(),
                        kind: OptionKind::Checkbox,
                    },
                ],
                connections: vec![],
                option_connections: vec![],
                combo_connections: vec![],
                default_connection: None,
                position: pos(400.0, 150.0),
            },
            DecisionNode {
                id: "node-3".into(),
                node_type: NodeType::End,
                title: "TREATMENT PLAN".into(),
                description: Some("Final recommendation".into()),
                options: vec![],
                connections: vec![],
                option_connections: vec![],
                combo_connections: vec![],
                default_connection: None,
                position: pos(750.0, 150.0),
            },
        ];
        Self { nodes }
    }

    pub fn node(&self, id: &str) -> Option<&DecisionNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut DecisionNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // Add a node and return its new id; refused on a blank title
    pub fn add_node(
        &mut self,
        title: &str,
        description: Option<String>,
        node_type: NodeType,
        position: Position,
    ) -> Option<NodeId> {
        if title.trim().is_empty() {
            return None;
        }
        let id = format!("node-{}", Uuid::now_v7());
        self.nodes.push(DecisionNode {
            id: id.clone(),
            node_type,
            title: title.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            options: vec![],
            connections: vec![],
            option_connections: vec![],
            combo_connections: vec![],
            default_connection: None,
            position,
        });
        Some(id)
    }

    pub fn update_node(
        &mut self,
        id: &str,
        title: &str,
        description: Option<String>,
        node_type: NodeType,
    ) -> bool {
        if title.trim().is_empty() {
            return false;
        }
        if let Some(node) = self.node_mut(id) {
            node.title = title.trim().to_string();
            node.description = description.filter(|d| !d.trim().is_empty());
            node.node_type = node_type;
            true
        } else {
            false
        }
    }

    // Delete a node and every connection elsewhere that targets it. Idempotent.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        // Second phase: sweep all referencing structures
        for node in &mut self.nodes {
            node.connections.retain(|c| c != id);
            node.option_connections.retain(|oc| oc.target_node_id != id);
            node.combo_connections.retain(|cc| cc.target_node_id != id);
            if node.default_connection.as_deref() == Some(id) {
                node.default_connection = None;
            }
        }
        true
    }

    pub fn add_option(&mut self, node_id: &str, label: &str, kind: OptionKind) -> Option<OptionId> {
        let node = self.node_mut(node_id)?;
        let id = format!("opt-{}", Uuid::now_v7());
        node.options.push(NodeOption {
            id: id.clone(),
            label: label.to_string(),
            kind,
        });
        Some(id)
    }

    pub fn update_option_label(&mut self, node_id: &str, option_id: &str, label: &str) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        if let Some(opt) = node.options.iter_mut().find(|o| o.id == option_id) {
            opt.label = label.to_string();
            true
        } else {
            false
        }
    }

    // Remove an option and cascade: its option connection goes with it, and
    // every combo rule drops the id. A combo left empty is removed entirely.
    pub fn remove_option(&mut self, node_id: &str, option_id: &str) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        let before = node.options.len();
        node.options.retain(|o| o.id != option_id);
        if node.options.len() == before {
            return false;
        }
        node.option_connections.retain(|oc| oc.option_id != option_id);
        for combo in &mut node.combo_connections {
            combo.option_ids.retain(|o| o != option_id);
        }
        node.combo_connections.retain(|c| !c.option_ids.is_empty());
        true
    }

    // Upsert: a later write replaces, never appends, the prior mapping.
    // Self-loops are allowed by the model.
    pub fn connect_option(&mut self, node_id: &str, option_id: &str, target_id: &str) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        if !node.options.iter().any(|o| o.id == option_id) {
            return false;
        }
        if let Some(existing) = node
            .option_connections
            .iter_mut()
            .find(|oc| oc.option_id == option_id)
        {
            existing.target_node_id = target_id.to_string();
        } else {
            node.option_connections.push(OptionConnection {
                option_id: option_id.to_string(),
                target_node_id: target_id.to_string(),
            });
        }
        true
    }

    pub fn disconnect_option(&mut self, node_id: &str, option_id: &str) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        let before = node.option_connections.len();
        node.option_connections.retain(|oc| oc.option_id != option_id);
        node.option_connections.len() != before
    }

    // Legacy free-form edge: present once toggles it off, absent toggles it on
    pub fn toggle_connection(&mut self, from: &str, to: &str) -> bool {
        let Some(node) = self.node_mut(from) else {
            return false;
        };
        if let Some(idx) = node.connections.iter().position(|c| c == to) {
            node.connections.remove(idx);
        } else {
            node.connections.push(to.to_string());
        }
        true
    }

    // Silent no-op on an empty selection; ids unknown to the node are dropped
    // and duplicates keep their first occurrence, so the stored set matches a
    // checked set by plain length comparison.
    pub fn add_combo_connection(
        &mut self,
        node_id: &str,
        option_ids: &[OptionId],
        target_id: &str,
        label: Option<String>,
    ) -> Option<ComboId> {
        let node = self.node_mut(node_id)?;
        let mut kept: Vec<OptionId> = Vec::new();
        for id in option_ids {
            if node.options.iter().any(|o| &o.id == id) && !kept.contains(id) {
                kept.push(id.clone());
            }
        }
        if kept.is_empty() {
            return None;
        }
        let id = format!("combo-{}", Uuid::now_v7());
        node.combo_connections.push(ComboConnection {
            id: id.clone(),
            option_ids: kept,
            target_node_id: target_id.to_string(),
            label: label.filter(|l| !l.trim().is_empty()),
        });
        Some(id)
    }

    pub fn remove_combo_connection(&mut self, node_id: &str, combo_id: &str) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        let before = node.combo_connections.len();
        node.combo_connections.retain(|c| c.id != combo_id);
        node.combo_connections.len() != before
    }

    // Meaningful for recursive nodes; callers are expected to respect the type
    pub fn set_default_connection(&mut self, node_id: &str, target_id: Option<NodeId>) -> bool {
        if let Some(node) = self.node_mut(node_id) {
            node.default_connection = target_id;
            true
        } else {
            false
        }
    }

    pub fn set_position(&mut self, node_id: &str, position: Position) -> bool {
        if let Some(node) = self.node_mut(node_id) {
            node.position = position;
            true
        } else {
            false
        }
    }
}
