use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pathflow::layout::layered::LayeredEngine;
use pathflow::layout::runner::LayoutRunner;
use pathflow::layout::{
    self, LayoutEdge, LayoutEngine, LayoutNode, NodePlacement, node_height,
};
use pathflow::persistence::document;
use pathflow::tree::evaluate::{ActiveEdge, SelectionState, active_edges};
use pathflow::tree::model::{DecisionTree, NodeId, NodeType, OptionId, OptionKind, pos};
use pathflow::tree::resolve::{self, EdgeKind};

fn new_tree() -> DecisionTree {
    DecisionTree::new()
}

fn add(tree: &mut DecisionTree, title: &str, node_type: NodeType) -> NodeId {
    tree.add_node(title, None, node_type, pos(0.0, 0.0))
        .expect("node should be created")
}

fn add_opt(tree: &mut DecisionTree, node: &str, label: &str, kind: OptionKind) -> OptionId {
    tree.add_option(node, label, kind).expect("option should be created")
}

#[test]
fn add_node_refuses_blank_title() {
    let mut tree = new_tree();
    assert!(tree.add_node("", None, NodeType::Single, pos(0.0, 0.0)).is_none());
    assert!(tree.add_node("   ", None, NodeType::Single, pos(0.0, 0.0)).is_none());
    assert_eq!(tree.node_count(), 0);
}

#[test]
fn node_ids_are_unique_within_a_session() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let b = add(&mut tree, "B", NodeType::Single);
    assert_ne!(a, b);
    assert!(a.starts_with("node-"));
}

#[test]
fn remove_node_cascades_all_inbound_references() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let m = add(&mut tree, "M", NodeType::Multi);
    let r = add(&mut tree, "R", NodeType::Recursive);
    let t = add(&mut tree, "T", NodeType::End);

    let o1 = add_opt(&mut tree, &a, "go", OptionKind::Radio);
    assert!(tree.connect_option(&a, &o1, &t));
    let c1 = add_opt(&mut tree, &m, "x", OptionKind::Checkbox);
    tree.add_combo_connection(&m, &[c1.clone()], &t, None)
        .expect("combo should be created");
    assert!(tree.set_default_connection(&r, Some(t.clone())));
    assert!(tree.toggle_connection(&a, &t));

    assert!(tree.remove_node(&t));
    // No derived edge may still mention the removed node
    for edge in resolve::all_edges(&tree) {
        assert_ne!(edge.to, t);
        assert_ne!(edge.from, t);
    }
    assert!(tree.node(&r).unwrap().default_connection.is_none());
    assert!(tree.node(&m).unwrap().combo_connections.is_empty());
    // Deleting again is a no-op
    assert!(!tree.remove_node(&t));
}

#[test]
fn remove_option_shrinks_combos_and_drops_empty_ones() {
    let mut tree = new_tree();
    let m = add(&mut tree, "M", NodeType::Multi);
    let t = add(&mut tree, "T", NodeType::End);
    let a = add_opt(&mut tree, &m, "a", OptionKind::Checkbox);
    let b = add_opt(&mut tree, &m, "b", OptionKind::Checkbox);

    tree.add_combo_connection(&m, &[a.clone(), b.clone()], &t, None)
        .expect("pair combo");
    tree.add_combo_connection(&m, &[a.clone()], &t, None)
        .expect("solo combo");

    assert!(tree.remove_option(&m, &a));
    let node = tree.node(&m).unwrap();
    // The pair combo shrank to {b}; the solo combo was emptied and dropped
    assert_eq!(node.combo_connections.len(), 1);
    assert_eq!(node.combo_connections[0].option_ids, vec![b.clone()]);
    assert!(node.option_connections.iter().all(|oc| oc.option_id != a));
}

#[test]
fn connect_option_upserts_instead_of_appending() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let t1 = add(&mut tree, "T1", NodeType::End);
    let t2 = add(&mut tree, "T2", NodeType::End);
    let o = add_opt(&mut tree, &a, "go", OptionKind::Radio);

    assert!(tree.connect_option(&a, &o, &t1));
    assert!(tree.connect_option(&a, &o, &t2));
    let node = tree.node(&a).unwrap();
    assert_eq!(node.option_connections.len(), 1);
    assert_eq!(resolve::target_of(&tree, &a, &o), Some(&t2));

    assert!(tree.disconnect_option(&a, &o));
    assert_eq!(resolve::target_of(&tree, &a, &o), None);
    assert!(!tree.disconnect_option(&a, &o));
}

#[test]
fn connect_option_requires_an_existing_option() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let t = add(&mut tree, "T", NodeType::End);
    assert!(!tree.connect_option(&a, "opt-ghost", &t));
    assert!(tree.node(&a).unwrap().option_connections.is_empty());
}

#[test]
fn self_loop_connections_are_permitted() {
    let mut tree = new_tree();
    let r = add(&mut tree, "R", NodeType::Recursive);
    let o = add_opt(&mut tree, &r, "again", OptionKind::Radio);
    assert!(tree.connect_option(&r, &o, &r));
    assert_eq!(resolve::target_of(&tree, &r, &o), Some(&r));
}

#[test]
fn toggle_connection_flips_membership() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let b = add(&mut tree, "B", NodeType::End);
    assert!(tree.toggle_connection(&a, &b));
    assert_eq!(tree.node(&a).unwrap().connections, vec![b.clone()]);
    assert!(tree.toggle_connection(&a, &b));
    assert!(tree.node(&a).unwrap().connections.is_empty());
}

#[test]
fn imported_free_connection_can_be_toggled_away() {
    let json = r#"{
        "nodes": [
            {"id": "n1", "type": "single", "title": "Start", "connections": ["n2"]},
            {"id": "n2", "type": "end", "title": "Done"}
        ]
    }"#;
    let mut tree = document::import_json(json).expect("import ok").into_tree();
    let free: Vec<_> = resolve::all_edges(&tree)
        .into_iter()
        .filter(|e| e.kind == EdgeKind::Free)
        .collect();
    assert_eq!(free.len(), 1);
    assert_eq!((free[0].from.as_str(), free[0].to.as_str()), ("n1", "n2"));

    // The connect gesture completes through the same toggle, so re-targeting
    // an existing edge removes it without touching either node
    assert!(tree.toggle_connection("n1", "n2"));
    assert!(
        resolve::all_edges(&tree)
            .iter()
            .all(|e| e.kind != EdgeKind::Free)
    );
    assert_eq!(tree.node_count(), 2);
}

#[test]
fn combo_creation_filters_unknown_option_ids() {
    let mut tree = new_tree();
    let m = add(&mut tree, "M", NodeType::Multi);
    let t = add(&mut tree, "T", NodeType::End);
    let a = add_opt(&mut tree, &m, "a", OptionKind::Checkbox);

    let id = tree
        .add_combo_connection(&m, &[a.clone(), "opt-ghost".into()], &t, None)
        .expect("combo should survive the filter");
    let node = tree.node(&m).unwrap();
    let combo = node.combo_connections.iter().find(|c| c.id == id).unwrap();
    assert_eq!(combo.option_ids, vec![a]);

    // All ids unknown, nothing to match on
    assert!(
        tree.add_combo_connection(&m, &["opt-ghost".into()], &t, None)
            .is_none()
    );
}

#[test]
fn combo_creation_dedupes_option_ids() {
    let mut tree = new_tree();
    let m = add(&mut tree, "M", NodeType::Multi);
    let t = add(&mut tree, "T", NodeType::End);
    let a = add_opt(&mut tree, &m, "a", OptionKind::Checkbox);

    let combo = tree
        .add_combo_connection(&m, &[a.clone(), a.clone()], &t, None)
        .expect("combo should be created");
    let node = tree.node(&m).unwrap();
    let stored = node.combo_connections.iter().find(|c| c.id == combo).unwrap();
    assert_eq!(stored.option_ids, vec![a.clone()]);

    // A padded rule would compare lengths against the checked set and
    // never fire; the deduped one activates normally
    let mut sel = SelectionState::default();
    sel.toggle_checked(&a);
    assert_eq!(active_edges(node, &sel), vec![ActiveEdge::Combo(combo)]);
}

#[test]
fn single_node_activates_at_most_one_edge() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let b = add(&mut tree, "B", NodeType::End);
    let o1 = add_opt(&mut tree, &a, "one", OptionKind::Radio);
    let o2 = add_opt(&mut tree, &a, "two", OptionKind::Radio);
    tree.connect_option(&a, &o1, &b);

    let node = tree.node(&a).unwrap();
    let mut sel = SelectionState::default();
    assert!(active_edges(node, &sel).is_empty());

    sel.set_radio(&o1);
    assert_eq!(active_edges(node, &sel), vec![ActiveEdge::Option(o1.clone())]);

    // Picking the other option replaces, never adds
    sel.set_radio(&o2);
    let active = active_edges(node, &sel);
    assert_eq!(active.len(), 1);
    assert_eq!(active, vec![ActiveEdge::Option(o2.clone())]);
    // The second option has no connection, so nothing resolves for it
    assert_eq!(resolve::target_of(&tree, &a, &o2), None);
}

#[test]
fn end_node_never_activates_edges() {
    let mut tree = new_tree();
    let e = add(&mut tree, "E", NodeType::End);
    let mut sel = SelectionState::default();
    sel.set_radio("opt-anything");
    assert!(active_edges(tree.node(&e).unwrap(), &sel).is_empty());
}

#[test]
fn recursive_default_edge_is_always_active() {
    let mut tree = new_tree();
    let r = add(&mut tree, "R", NodeType::Recursive);
    let t = add(&mut tree, "T", NodeType::End);
    let o = add_opt(&mut tree, &r, "escape", OptionKind::Radio);
    tree.connect_option(&r, &o, &t);
    tree.set_default_connection(&r, Some(r.clone()));

    let node = tree.node(&r).unwrap();
    // Active with no selection at all
    let sel = SelectionState::default();
    assert_eq!(active_edges(node, &sel), vec![ActiveEdge::Default]);

    // A radio pick adds a second active edge alongside the default
    let mut sel = SelectionState::default();
    sel.set_radio(&o);
    let active = active_edges(node, &sel);
    assert!(active.contains(&ActiveEdge::Default));
    assert!(active.contains(&ActiveEdge::Option(o)));
    assert_eq!(active.len(), 2);
}

#[test]
fn multi_node_combo_requires_exact_set_match() {
    let mut tree = new_tree();
    let m = add(&mut tree, "M", NodeType::Multi);
    let t1 = add(&mut tree, "T1", NodeType::End);
    let a = add_opt(&mut tree, &m, "a", OptionKind::Checkbox);
    let b = add_opt(&mut tree, &m, "b", OptionKind::Checkbox);
    let c = add_opt(&mut tree, &m, "c", OptionKind::Checkbox);
    let combo = tree
        .add_combo_connection(&m, &[a.clone(), b.clone()], &t1, None)
        .unwrap();

    let node = tree.node(&m).unwrap();
    let mut sel = SelectionState::default();
    sel.toggle_checked(&a);
    // Subset: no match
    assert!(active_edges(node, &sel).is_empty());

    sel.toggle_checked(&b);
    assert_eq!(active_edges(node, &sel), vec![ActiveEdge::Combo(combo.clone())]);

    // Superset: adding c breaks the exact match
    sel.toggle_checked(&c);
    assert!(active_edges(node, &sel).is_empty());

    // Un-checking c restores it
    sel.toggle_checked(&c);
    assert_eq!(active_edges(node, &sel), vec![ActiveEdge::Combo(combo)]);
}

#[test]
fn selection_clear_resets_both_modes() {
    let mut sel = SelectionState::default();
    sel.set_radio("opt-r");
    sel.toggle_checked("opt-c");
    assert!(sel.has_selection());
    sel.clear();
    assert!(!sel.has_selection());
}

#[test]
fn all_edges_projects_every_connection_kind_in_order() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Recursive);
    let b = add(&mut tree, "B", NodeType::Multi);
    let t = add(&mut tree, "T", NodeType::End);

    let o = add_opt(&mut tree, &a, "opt", OptionKind::Radio);
    tree.toggle_connection(&a, &b);
    tree.connect_option(&a, &o, &t);
    tree.set_default_connection(&a, Some(t.clone()));
    let c = add_opt(&mut tree, &b, "c", OptionKind::Checkbox);
    let combo = tree.add_combo_connection(&b, &[c], &t, None).unwrap();

    let edges = resolve::all_edges(&tree);
    let kinds: Vec<&EdgeKind> = edges.iter().map(|e| &e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            &EdgeKind::Free,
            &EdgeKind::Option(o),
            &EdgeKind::Default,
            &EdgeKind::Combo(combo),
        ]
    );
    // First three come from node A, in its declaration order
    assert!(edges[..3].iter().all(|e| e.from == a));
    assert_eq!(edges[3].from, b);
}

#[test]
fn target_of_dangling_ids_resolves_to_none() {
    let tree = DecisionTree::sample();
    assert_eq!(resolve::target_of(&tree, "node-missing", "opt-1"), None);
    assert_eq!(resolve::target_of(&tree, "node-1", "opt-missing"), None);
    assert_eq!(resolve::combo_target(&tree, "node-2", "combo-missing"), None);
}

#[test]
fn document_round_trip_preserves_structure_and_positions() {
    let mut tree = DecisionTree::sample();
    let extra = add(&mut tree, "Extra", NodeType::Recursive);
    tree.set_default_connection(&extra, Some("node-1".into()));
    tree.set_position(&extra, pos(12.5, -40.0));
    tree.connect_option("node-1", "opt-1", "node-2");
    tree.add_combo_connection("node-2", &["opt-4".into(), "opt-5".into()], "node-3", Some("both".into()));

    let json = document::export_json("colon-cancer", &tree).expect("export ok");
    let doc = document::import_json(&json).expect("import ok");
    assert_eq!(doc.template, "colon-cancer");
    assert_eq!(doc.version, document::DOCUMENT_VERSION);

    let restored = doc.into_tree();
    assert_eq!(restored, tree);
}

#[test]
fn import_accepts_a_minimal_nodes_only_document() {
    let json = r#"{
        "nodes": [
            {"id": "n1", "type": "single", "title": "Start", "position": {"x": 1.0, "y": 2.0}}
        ]
    }"#;
    let doc = document::import_json(json).expect("minimal document ok");
    let tree = doc.into_tree();
    let node = tree.node("n1").expect("node restored");
    assert_eq!(node.node_type, NodeType::Single);
    assert!(node.options.is_empty());
    assert!(node.connections.is_empty());
    assert_eq!(node.position, pos(1.0, 2.0));
}

#[test]
fn import_rejects_documents_without_a_nodes_array() {
    assert!(document::import_json("{}").is_err());
    assert!(document::import_json(r#"{"nodes": 42}"#).is_err());
    assert!(document::import_json("not json at all").is_err());
}

#[test]
fn import_rejects_unknown_node_fields() {
    // "tittle" instead of "title" must surface as an error, not load silently
    let json = r#"{
        "nodes": [
            {"id": "n1", "type": "single", "title": "Start", "tittle": "oops"}
        ]
    }"#;
    assert!(document::import_json(json).is_err());
}

#[test]
fn layered_layout_orders_ranks_left_to_right() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let b = add(&mut tree, "B", NodeType::Single);
    let t = add(&mut tree, "T", NodeType::End);
    let o1 = add_opt(&mut tree, &a, "to b", OptionKind::Radio);
    let o2 = add_opt(&mut tree, &b, "to t", OptionKind::Radio);
    tree.connect_option(&a, &o1, &b);
    tree.connect_option(&b, &o2, &t);

    let (nodes, edges) = layout::layout_request(&tree);
    let placements = LayeredEngine::default()
        .compute(&nodes, &edges)
        .expect("layout ok");
    let by_id: HashMap<&str, &NodePlacement> =
        placements.iter().map(|p| (p.id.as_str(), p)).collect();

    assert!(by_id[a.as_str()].x < by_id[b.as_str()].x);
    assert!(by_id[b.as_str()].x < by_id[t.as_str()].x);
}

#[test]
fn layered_layout_handles_cycles_without_failing() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Recursive);
    let b = add(&mut tree, "B", NodeType::Recursive);
    tree.set_default_connection(&a, Some(b.clone()));
    tree.set_default_connection(&b, Some(a.clone()));
    // Plus a proper self-loop, which the engine must ignore
    tree.toggle_connection(&a, &a);

    let (nodes, edges) = layout::layout_request(&tree);
    let placements = LayeredEngine::default()
        .compute(&nodes, &edges)
        .expect("cyclic input still lays out");
    assert_eq!(placements.len(), 2);
}

#[test]
fn layered_layout_separates_siblings_vertically() {
    let mut tree = new_tree();
    let a = add(&mut tree, "A", NodeType::Single);
    let t1 = add(&mut tree, "T1", NodeType::End);
    let t2 = add(&mut tree, "T2", NodeType::End);
    let o1 = add_opt(&mut tree, &a, "one", OptionKind::Radio);
    let o2 = add_opt(&mut tree, &a, "two", OptionKind::Radio);
    tree.connect_option(&a, &o1, &t1);
    tree.connect_option(&a, &o2, &t2);

    let (nodes, edges) = layout::layout_request(&tree);
    let placements = LayeredEngine::default().compute(&nodes, &edges).unwrap();
    let by_id: HashMap<&str, &NodePlacement> =
        placements.iter().map(|p| (p.id.as_str(), p)).collect();
    let gap = (by_id[t1.as_str()].y - by_id[t2.as_str()].y).abs();
    assert!(gap >= node_height(0), "siblings must not overlap, gap was {gap}");
}

#[test]
fn apply_placements_leaves_unnamed_nodes_alone() {
    let mut tree = DecisionTree::sample();
    let before = tree.node("node-3").unwrap().position;
    layout::apply_placements(
        &mut tree,
        &[NodePlacement {
            id: "node-1".into(),
            x: 999.0,
            y: 111.0,
        }],
    );
    assert_eq!(tree.node("node-1").unwrap().position, pos(999.0, 111.0));
    assert_eq!(tree.node("node-3").unwrap().position, before);
}

struct SlowEngine;

impl LayoutEngine for SlowEngine {
    fn compute(
        &self,
        nodes: &[LayoutNode],
        _edges: &[LayoutEdge],
    ) -> anyhow::Result<Vec<NodePlacement>> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(nodes
            .iter()
            .map(|n| NodePlacement {
                id: n.id.clone(),
                x: 0.0,
                y: 0.0,
            })
            .collect())
    }
}

#[test]
fn layout_runner_ignores_requests_while_one_is_in_flight() {
    let tree = DecisionTree::sample();
    let (nodes, edges) = layout::layout_request(&tree);

    let mut runner = LayoutRunner::new(Arc::new(SlowEngine));
    assert!(runner.request(nodes.clone(), edges.clone()));
    assert!(runner.is_running());
    // Second request while the first runs must be refused
    assert!(!runner.request(nodes, edges));

    let mut result = None;
    for _ in 0..100 {
        if let Some(r) = runner.poll() {
            result = Some(r);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let placements = result.expect("runner should finish").expect("engine ok");
    assert_eq!(placements.len(), tree.node_count());
    assert!(!runner.is_running());
}

#[test]
fn layout_runner_refuses_an_empty_request() {
    let mut runner = LayoutRunner::new(Arc::new(LayeredEngine::default()));
    assert!(!runner.request(Vec::new(), Vec::new()));
    assert!(!runner.is_running());
}
