use std::collections::BTreeSet;

use crate::tree::model::{ComboConnection, ComboId, DecisionNode, NodeType, OptionId};

/// Live end-user selection state for one node. Owned by the frontend; the
/// model itself never stores selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub radio: Option<OptionId>,
    pub checked: BTreeSet<OptionId>,
}

impl SelectionState {
    pub fn has_selection(&self) -> bool {
        self.radio.is_some() || !self.checked.is_empty()
    }

    pub fn set_radio(&mut self, option_id: &str) {
        self.radio = Some(option_id.to_string());
    }

    pub fn toggle_checked(&mut self, option_id: &str) {
        if !self.checked.remove(option_id) {
            self.checked.insert(option_id.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.radio = None;
        self.checked.clear();
    }
}

/// An outgoing edge lit up by the current selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveEdge {
    Option(OptionId),
    Combo(ComboId),
    Default,
}

/// Which outgoing edges are active for `node` under `selection`.
///
/// - single: the chosen radio option, if any
/// - recursive: the default edge whenever one is defined, regardless of
///   selection, plus the chosen radio option
/// - multi: every combo whose option set is exactly the checked set
/// - end: none
pub fn active_edges(node: &DecisionNode, selection: &SelectionState) -> Vec<ActiveEdge> {
    match node.node_type {
        NodeType::End => Vec::new(),
        NodeType::Single => selection
            .radio
            .iter()
            .cloned()
            .map(ActiveEdge::Option)
            .collect(),
        NodeType::Recursive => {
            let mut active = Vec::new();
            if node.default_connection.is_some() {
                active.push(ActiveEdge::Default);
            }
            if let Some(id) = &selection.radio {
                active.push(ActiveEdge::Option(id.clone()));
            }
            active
        }
        NodeType::Multi => node
            .combo_connections
            .iter()
            .filter(|combo| combo_matches(combo, &selection.checked))
            .map(|combo| ActiveEdge::Combo(combo.id.clone()))
            .collect(),
    }
}

// Exact set equality, both directions: every combo id must be checked AND the
// counts must agree, so a superset never matches a smaller combo.
fn combo_matches(combo: &ComboConnection, checked: &BTreeSet<OptionId>) -> bool {
    combo.option_ids.len() == checked.len()
        && combo.option_ids.iter().all(|id| checked.contains(id))
}
