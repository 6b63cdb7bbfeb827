#![allow(clippy::collapsible_if)]
#![allow(clippy::too_many_lines)]
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, Vec2};

use crate::layout::layered::LayeredEngine;
use crate::layout::runner::LayoutRunner;
use crate::layout::{self, NODE_OPTION_HEIGHT, NODE_WIDTH, node_height};
use crate::persistence::document;
use crate::persistence::persist::{self, AUTOSAVE_DEBOUNCE, AppStateFile};
use crate::persistence::settings::AppSettings;
use crate::tree::evaluate::{self, ActiveEdge, SelectionState};
use crate::tree::model::{DecisionTree, NodeId, NodeType, OptionId, OptionKind, pos};
use crate::tree::resolve::{self, EdgeKind};

// Vertical offset of the first option row inside a card, world units
const OPTION_ROWS_TOP: f32 = 70.0;

// Style for toast notifications
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NoticeStyle {
    Subtle,
    Prominent,
    Error,
}

struct Template {
    id: &'static str,
    name: &'static str,
    category: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        id: "cancer-treatment",
        name: "Pedunculated or Sessile Polyp (Adenoma) with Invasive Cancer",
        category: "Oncology",
    },
    Template {
        id: "colon-cancer",
        name: "Workup for Colon Cancer Appropriate for Resection",
        category: "Oncology",
    },
    Template {
        id: "metastatic",
        name: "Workup for Suspected or Proven Metastatic Adenocarcinoma",
        category: "Oncology",
    },
];

pub struct PathflowApp {
    tree: DecisionTree,
    template: String,
    // Live interactive-mode selections, per node
    selections: HashMap<NodeId, SelectionState>,
    selected_node: Option<NodeId>,
    // Armed free-form connect gesture: the source card waiting for a target
    connecting_from: Option<NodeId>,
    dragging: Option<NodeId>,
    pan: Vec2,
    zoom: f32,
    // persistence
    dirty: bool,
    last_change: Instant,
    save_error: Option<String>,
    last_save_info: Option<String>,
    last_info_time: Option<Instant>,
    last_info_style: NoticeStyle,
    // layout
    layout_runner: LayoutRunner,
    // Sidebar visibility
    sidebar_open: bool,
    // Add Node dialog state
    show_add_node: bool,
    add_title: String,
    add_description: String,
    add_type: NodeType,
    // Edit Node dialog state
    editing_node: Option<NodeId>,
    edit_title: String,
    edit_description: String,
    edit_type: NodeType,
    option_label_edits: HashMap<OptionId, String>,
    new_option_label: String,
    new_option_kind: OptionKind,
    combo_picks: BTreeSet<OptionId>,
    combo_target: Option<NodeId>,
    combo_label: String,
    // Import/export modals
    show_import_window: bool,
    import_path: String,
    show_export_window: bool,
    export_path: String,
    // Confirm modal
    confirm_clear_all: bool,
    app_settings: AppSettings,
}

impl PathflowApp {
    pub fn new(tree: DecisionTree) -> Self {
        let settings = AppSettings::load().unwrap_or_default();
        let export_path = settings
            .export_dir()
            .join("pathflow-export.json")
            .display()
            .to_string();
        Self {
            tree,
            template: TEMPLATES[0].id.to_string(),
            selections: HashMap::new(),
            selected_node: None,
            connecting_from: None,
            dragging: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            dirty: false,
            last_change: Instant::now(),
            save_error: None,
            last_save_info: None,
            last_info_time: None,
            last_info_style: NoticeStyle::Prominent,
            layout_runner: LayoutRunner::new(Arc::new(LayeredEngine::default())),
            sidebar_open: settings.sidebar_open,
            show_add_node: false,
            add_title: String::new(),
            add_description: String::new(),
            add_type: NodeType::Single,
            editing_node: None,
            edit_title: String::new(),
            edit_description: String::new(),
            edit_type: NodeType::Single,
            option_label_edits: HashMap::new(),
            new_option_label: String::new(),
            new_option_kind: OptionKind::Checkbox,
            combo_picks: BTreeSet::new(),
            combo_target: None,
            combo_label: String::new(),
            show_import_window: false,
            import_path: String::new(),
            show_export_window: false,
            export_path,
            confirm_clear_all: false,
            app_settings: settings,
        }
    }

    pub fn from_state(state: AppStateFile) -> Self {
        let (template, tree, pan, zoom) = state.into_runtime();
        let mut app = Self::new(tree);
        if !template.is_empty() {
            app.template = template;
        }
        app.pan = pan;
        app.zoom = zoom;
        app
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.last_change = Instant::now();
    }

    fn notify(&mut self, msg: impl Into<String>, style: NoticeStyle) {
        self.last_save_info = Some(msg.into());
        self.last_info_time = Some(Instant::now());
        self.last_info_style = style;
    }

    fn save_now(&mut self) {
        let state = AppStateFile::from_runtime(&self.template, &self.tree, self.pan, self.zoom);
        match persist::save_active(&state) {
            Ok(_) => {
                self.dirty = false;
                self.save_error = None;
                self.notify("Saved", NoticeStyle::Subtle);
            }
            Err(e) => {
                log::warn!("autosave failed: {e:#}");
                self.save_error = Some(format!("Save failed: {e}"));
                self.notify(format!("Save failed: {e}"), NoticeStyle::Error);
            }
        }
    }

    fn request_auto_layout(&mut self) {
        let (nodes, edges) = layout::layout_request(&self.tree);
        // A request while one is in flight is a no-op
        if !self.layout_runner.request(nodes, edges) && !self.layout_runner.is_running() {
            self.notify("Nothing to lay out", NoticeStyle::Subtle);
        }
    }

    fn poll_layout(&mut self, ctx: &egui::Context) {
        if self.layout_runner.is_running() {
            // keep polling without user input
            ctx.request_repaint_after(Duration::from_millis(50));
        }
        if let Some(result) = self.layout_runner.poll() {
            match result {
                Ok(placements) => {
                    layout::apply_placements(&mut self.tree, &placements);
                    self.mark_dirty();
                    self.notify("Layout applied successfully", NoticeStyle::Prominent);
                }
                Err(e) => {
                    log::warn!("layout failed: {e:#}");
                    self.notify(format!("Layout failed: {e}"), NoticeStyle::Error);
                }
            }
        }
    }

    fn open_edit_dialog(&mut self, id: &str) {
        let Some(node) = self.tree.node(id) else {
            return;
        };
        self.edit_title = node.title.clone();
        self.edit_description = node.description.clone().unwrap_or_default();
        self.edit_type = node.node_type;
        self.option_label_edits = node
            .options
            .iter()
            .map(|o| (o.id.clone(), o.label.clone()))
            .collect();
        self.new_option_label.clear();
        self.new_option_kind = match node.node_type {
            NodeType::Multi => OptionKind::Checkbox,
            _ => OptionKind::Radio,
        };
        self.combo_picks.clear();
        self.combo_target = None;
        self.combo_label.clear();
        self.editing_node = Some(id.to_string());
    }

    fn import_from_path(&mut self) {
        let path = self.import_path.trim().to_string();
        if path.is_empty() {
            self.notify("Enter a file path to import", NoticeStyle::Error);
            return;
        }
        let loaded = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|data| document::import_json(&data));
        match loaded {
            Ok(doc) => {
                let count = doc.nodes.len();
                if !doc.template.is_empty() {
                    self.template = doc.template.clone();
                }
                self.tree = doc.into_tree();
                self.selections.clear();
                self.selected_node = None;
                self.mark_dirty();
                self.show_import_window = false;
                self.notify(format!("Imported {count} nodes"), NoticeStyle::Prominent);
            }
            Err(e) => {
                // Existing in-memory state is left untouched
                log::warn!("import failed: {e:#}");
                self.notify(format!("Import failed: {e}"), NoticeStyle::Error);
            }
        }
    }

    fn export_to_path(&mut self) {
        let path = std::path::PathBuf::from(self.export_path.trim());
        let result = document::export_json(&self.template, &self.tree).and_then(|json| {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)?;
            Ok(())
        });
        match result {
            Ok(()) => {
                self.show_export_window = false;
                self.notify(
                    format!("Exported to {}", path.display()),
                    NoticeStyle::Prominent,
                );
            }
            Err(e) => {
                log::warn!("export failed: {e:#}");
                self.notify(format!("Export failed: {e}"), NoticeStyle::Error);
            }
        }
    }

    // Where an edge of the given kind leaves its source card, world coords
    fn edge_anchor_out(
        node: &crate::tree::model::DecisionNode,
        kind: &EdgeKind,
    ) -> Pos2 {
        if let EdgeKind::Option(opt_id) = kind {
            if let Some(idx) = node.options.iter().position(|o| &o.id == opt_id) {
                let y = node.position.y
                    + OPTION_ROWS_TOP
                    + idx as f32 * NODE_OPTION_HEIGHT
                    + NODE_OPTION_HEIGHT * 0.5;
                return Pos2::new(node.position.x + NODE_WIDTH, y);
            }
        }
        Pos2::new(
            node.position.x + NODE_WIDTH,
            node.position.y + node_height(node.options.len()) * 0.5,
        )
    }

    fn type_accent(node_type: NodeType) -> Color32 {
        match node_type {
            NodeType::Single => Color32::from_rgb(59, 130, 246),
            NodeType::Multi => Color32::from_rgb(168, 85, 247),
            NodeType::End => Color32::from_rgb(239, 68, 68),
            NodeType::Recursive => Color32::from_rgb(20, 184, 166),
        }
    }

    fn type_label(node_type: NodeType) -> &'static str {
        match node_type {
            NodeType::Single => "single",
            NodeType::Multi => "multi",
            NodeType::End => "end",
            NodeType::Recursive => "recursive",
        }
    }
}

impl eframe::App for PathflowApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_layout(ctx);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            if ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(
                    egui::Modifiers::COMMAND,
                    egui::Key::S,
                ))
            }) {
                self.save_now();
            }
            ui.horizontal(|ui| {
                let toggle = if self.sidebar_open { "⏴" } else { "⏵" };
                if ui.button(toggle).on_hover_text("Toggle sidebar").clicked() {
                    self.sidebar_open = !self.sidebar_open;
                    self.app_settings.sidebar_open = self.sidebar_open;
                    let _ = self.app_settings.save();
                }
                ui.heading("Pathflow");
                ui.separator();
                if ui.button("Add Node").clicked() {
                    self.add_title.clear();
                    self.add_description.clear();
                    self.add_type = NodeType::Single;
                    self.show_add_node = true;
                }
                if self.connecting_from.is_some() {
                    if ui.button("Cancel Connect").clicked() {
                        self.connecting_from = None;
                    }
                } else if ui
                    .add_enabled(self.selected_node.is_some(), egui::Button::new("Connect"))
                    .on_hover_text("Arm a free connection from the selected node")
                    .clicked()
                {
                    self.connecting_from = self.selected_node.clone();
                }
                let layout_label = if self.layout_runner.is_running() {
                    "Layouting…"
                } else {
                    "Auto Layout"
                };
                if ui
                    .add_enabled(
                        !self.layout_runner.is_running(),
                        egui::Button::new(layout_label),
                    )
                    .clicked()
                {
                    self.request_auto_layout();
                }
                if ui.button("Import JSON").clicked() {
                    self.show_import_window = true;
                }
                if ui.button("Export JSON").clicked() {
                    self.show_export_window = true;
                }
                if ui.button("Clear All").clicked() {
                    self.confirm_clear_all = true;
                }
                if ui.button("Reset View").clicked() {
                    self.pan = Vec2::ZERO;
                    self.zoom = 1.0;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(err) = &self.save_error {
                        ui.colored_label(Color32::RED, err);
                    } else if self.dirty {
                        ui.weak("unsaved changes");
                    }
                });
            });
        });

        if self.sidebar_open {
            egui::SidePanel::left("template_sidebar")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    ui.heading("Table of Contents");
                    ui.separator();
                    let mut picked: Option<&str> = None;
                    for t in TEMPLATES {
                        let selected = self.template == t.id;
                        if ui.selectable_label(selected, t.name).clicked() && !selected {
                            picked = Some(t.id);
                        }
                        ui.small(t.category);
                        ui.add_space(4.0);
                    }
                    if let Some(id) = picked {
                        self.template = id.to_string();
                        self.mark_dirty();
                    }
                    ui.separator();
                    ui.small(format!("{} nodes", self.tree.node_count()));
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_rect_before_wrap();

            // Background gets what the node cards leave over
            let bg_resp = ui.allocate_rect(available, Sense::click_and_drag());

            let center = available.center();
            let zoom = self.zoom;
            let pan = self.pan;
            let to_screen = move |p: Pos2| -> Pos2 {
                Pos2::new(
                    (p.x - center.x) * zoom + center.x + pan.x,
                    (p.y - center.y) * zoom + center.y + pan.y,
                )
            };

            if bg_resp.hovered() {
                let scroll = ui.input(|i| i.raw_scroll_delta.y);
                if scroll != 0.0 {
                    let factor = (1.0 + scroll * 0.001).clamp(0.9, 1.1);
                    self.zoom = (self.zoom * factor).clamp(0.25, 2.0);
                }
            }
            if bg_resp.dragged() && self.dragging.is_none() {
                self.pan += bg_resp.drag_delta();
            }
            if bg_resp.clicked() {
                if self.connecting_from.take().is_none() {
                    self.selected_node = None;
                }
            }

            let painter = ui.painter_at(available);

            // Active edge sets under the current live selections, one per node
            let mut active: HashMap<NodeId, Vec<ActiveEdge>> = HashMap::new();
            for node in &self.tree.nodes {
                let selection = self.selections.get(&node.id).cloned().unwrap_or_default();
                active.insert(node.id.clone(), evaluate::active_edges(node, &selection));
            }

            // Draw edges first so cards sit on top
            for edge in resolve::all_edges(&self.tree) {
                let Some(from_node) = self.tree.node(&edge.from) else {
                    continue;
                };
                // Dangling targets resolve to "no edge"
                let Some(to_node) = self.tree.node(&edge.to) else {
                    continue;
                };
                let a = to_screen(Self::edge_anchor_out(from_node, &edge.kind));
                let b = to_screen(Pos2::new(
                    to_node.position.x,
                    to_node.position.y + node_height(to_node.options.len()) * 0.5,
                ));

                let is_active = match &edge.kind {
                    EdgeKind::Free => {
                        self.selected_node.as_deref() == Some(edge.from.as_str())
                            || self.selected_node.as_deref() == Some(edge.to.as_str())
                    }
                    EdgeKind::Option(opt) => active
                        .get(&edge.from)
                        .is_some_and(|set| set.contains(&ActiveEdge::Option(opt.clone()))),
                    EdgeKind::Combo(cid) => active
                        .get(&edge.from)
                        .is_some_and(|set| set.contains(&ActiveEdge::Combo(cid.clone()))),
                    EdgeKind::Default => active
                        .get(&edge.from)
                        .is_some_and(|set| set.contains(&ActiveEdge::Default)),
                };
                let stroke = if is_active {
                    Stroke::new(3.0, Color32::from_rgb(14, 165, 233))
                } else {
                    Stroke::new(2.0, Color32::from_rgb(148, 163, 184))
                };
                painter.line_segment([a, b], stroke);
                draw_arrowhead(&painter, a, b, stroke);
            }

            // Draw and interact with node cards
            let node_ids: Vec<NodeId> = self.tree.nodes.iter().map(|n| n.id.clone()).collect();
            let mut open_editor: Option<NodeId> = None;
            for id in node_ids {
                let Some(node) = self.tree.node(&id).cloned() else {
                    continue;
                };
                let size =
                    Vec2::new(NODE_WIDTH, node_height(node.options.len())) * self.zoom;
                let top_left = to_screen(Pos2::new(node.position.x, node.position.y));
                let rect = Rect::from_min_size(top_left, size);
                let resp = ui.allocate_rect(rect, Sense::click_and_drag());

                if resp.dragged() {
                    if self.dragging.is_none() {
                        self.dragging = Some(id.clone());
                    }
                    let delta = resp.drag_delta() / self.zoom;
                    self.tree.set_position(
                        &id,
                        pos(node.position.x + delta.x, node.position.y + delta.y),
                    );
                    self.mark_dirty();
                } else if self.dragging.as_deref() == Some(id.as_str()) {
                    self.dragging = None;
                }
                if resp.double_clicked() {
                    open_editor = Some(id.clone());
                }

                let is_selected = self.selected_node.as_deref() == Some(id.as_str());
                let is_connect_source = self.connecting_from.as_deref() == Some(id.as_str());
                let accent = Self::type_accent(node.node_type);
                let fill = Color32::from_gray(30);
                let stroke = if is_connect_source {
                    Stroke::new(2.0, Color32::from_rgb(245, 158, 11))
                } else if is_selected {
                    Stroke::new(2.0, Color32::from_rgb(120, 200, 255))
                } else {
                    Stroke::new(1.0, Color32::from_gray(90))
                };
                painter.rect_filled(rect, 8.0 * self.zoom, fill);
                painter.rect_stroke(rect, 8.0 * self.zoom, stroke, egui::StrokeKind::Inside);
                // Accent strip along the left edge hints at the node type
                let strip =
                    Rect::from_min_size(rect.min, Vec2::new(5.0 * self.zoom, rect.height()));
                painter.rect_filled(strip, 2.0 * self.zoom, accent);

                let pad = 14.0 * self.zoom;
                let title_font = egui::FontId::proportional((13.0 * self.zoom).clamp(8.0, 20.0));
                let small_font = egui::FontId::proportional((11.0 * self.zoom).clamp(7.0, 17.0));
                let wrap_w = rect.width() - pad * 2.0;
                let title = painter.layout(
                    node.title.to_uppercase(),
                    title_font.clone(),
                    Color32::from_gray(230),
                    wrap_w,
                );
                painter.galley(rect.min + Vec2::new(pad, pad), title, Color32::WHITE);
                painter.text(
                    rect.min + Vec2::new(pad, pad + 20.0 * self.zoom),
                    egui::Align2::LEFT_TOP,
                    Self::type_label(node.node_type),
                    small_font.clone(),
                    accent,
                );
                if let Some(desc) = &node.description {
                    let galley = painter.layout(
                        desc.clone(),
                        small_font.clone(),
                        Color32::from_gray(150),
                        wrap_w,
                    );
                    painter.galley(
                        rect.min + Vec2::new(pad, pad + 34.0 * self.zoom),
                        galley,
                        Color32::from_gray(150),
                    );
                }

                let selection = self.selections.get(&id).cloned().unwrap_or_default();
                let has_selection = selection.has_selection();
                let active_set = active.get(&id).cloned().unwrap_or_default();
                let mut click_pos = resp
                    .clicked()
                    .then(|| resp.interact_pointer_pos())
                    .flatten();
                let mut toggle_hit = false;

                // An armed connect gesture completes on any card click and
                // takes priority over the option toggles
                if click_pos.is_some() {
                    if let Some(from) = self.connecting_from.take() {
                        let existed = self
                            .tree
                            .node(&from)
                            .is_some_and(|n| n.connections.contains(&id));
                        if self.tree.toggle_connection(&from, &id) {
                            self.mark_dirty();
                            let msg = if existed {
                                "Connection removed"
                            } else {
                                "Connection added"
                            };
                            self.notify(msg, NoticeStyle::Prominent);
                        }
                        click_pos = None;
                    }
                }

                // Option rows with live radio/checkbox toggles
                for (idx, option) in node.options.iter().enumerate() {
                    let row_top =
                        node.position.y + OPTION_ROWS_TOP + idx as f32 * NODE_OPTION_HEIGHT;
                    let row_center = to_screen(Pos2::new(
                        node.position.x,
                        row_top + NODE_OPTION_HEIGHT * 0.5,
                    ))
                    .y;
                    let toggle_c = Pos2::new(rect.min.x + pad + 7.0 * self.zoom, row_center);
                    let toggle_r = 7.0 * self.zoom;
                    let toggle_rect =
                        Rect::from_center_size(toggle_c, Vec2::splat(toggle_r * 2.0));

                    let is_radio = option.kind == OptionKind::Radio;
                    let is_on = if is_radio {
                        selection.radio.as_deref() == Some(option.id.as_str())
                    } else {
                        selection.checked.contains(&option.id)
                    };
                    if is_radio {
                        painter.circle_stroke(
                            toggle_c,
                            toggle_r,
                            Stroke::new(1.2, Color32::from_gray(150)),
                        );
                        if is_on {
                            painter.circle_filled(toggle_c, toggle_r * 0.55, accent);
                        }
                    } else {
                        painter.rect_stroke(
                            toggle_rect,
                            2.0 * self.zoom,
                            Stroke::new(1.2, Color32::from_gray(150)),
                            egui::StrokeKind::Inside,
                        );
                        if is_on {
                            painter.rect_filled(toggle_rect.shrink(3.0 * self.zoom), 1.0, accent);
                        }
                    }

                    let connected = resolve::target_of(&self.tree, &id, &option.id).is_some();
                    let option_active =
                        active_set.contains(&ActiveEdge::Option(option.id.clone()));
                    // Only connected options dim once a selection exists
                    let dimmed = connected
                        && has_selection
                        && !option_active
                        && matches!(node.node_type, NodeType::Single | NodeType::Recursive);
                    let text_color = if dimmed {
                        Color32::from_gray(90)
                    } else {
                        Color32::from_gray(200)
                    };
                    painter.text(
                        Pos2::new(toggle_rect.max.x + 6.0 * self.zoom, row_center),
                        egui::Align2::LEFT_CENTER,
                        &option.label,
                        small_font.clone(),
                        text_color,
                    );
                    if connected {
                        let marker = Pos2::new(rect.max.x - pad * 0.6, row_center);
                        let color = if option_active {
                            Color32::from_rgb(14, 165, 233)
                        } else {
                            Color32::from_gray(110)
                        };
                        painter.text(
                            marker,
                            egui::Align2::RIGHT_CENTER,
                            "→",
                            small_font.clone(),
                            color,
                        );
                    }

                    if let Some(p) = click_pos {
                        let hit = Rect::from_min_max(
                            Pos2::new(rect.min.x, toggle_rect.min.y - 3.0),
                            Pos2::new(rect.max.x, toggle_rect.max.y + 3.0),
                        );
                        if hit.contains(p) {
                            toggle_hit = true;
                            let entry = self.selections.entry(id.clone()).or_default();
                            if is_radio {
                                entry.set_radio(&option.id);
                            } else {
                                entry.toggle_checked(&option.id);
                            }
                        }
                    }
                }

                // Combo rules listed below the options on multi nodes
                if node.node_type == NodeType::Multi && !node.combo_connections.is_empty() {
                    let base = node.position.y
                        + OPTION_ROWS_TOP
                        + node.options.len() as f32 * NODE_OPTION_HEIGHT
                        + 8.0;
                    for (idx, combo) in node.combo_connections.iter().enumerate() {
                        let y =
                            to_screen(Pos2::new(node.position.x, base + idx as f32 * 18.0)).y;
                        let combo_active =
                            active_set.contains(&ActiveEdge::Combo(combo.id.clone()));
                        let caption = combo.label.clone().unwrap_or_else(|| {
                            let names: Vec<&str> = combo
                                .option_ids
                                .iter()
                                .filter_map(|oid| node.option(oid).map(|o| o.label.as_str()))
                                .collect();
                            names.join(" + ")
                        });
                        let color = if combo_active {
                            Color32::from_rgb(14, 165, 233)
                        } else if has_selection {
                            Color32::from_gray(90)
                        } else {
                            Color32::from_gray(160)
                        };
                        painter.text(
                            Pos2::new(rect.min.x + pad, y),
                            egui::Align2::LEFT_CENTER,
                            format!("◇ {caption}"),
                            small_font.clone(),
                            color,
                        );
                    }
                }

                // Default edge badge on recursive nodes
                if node.node_type == NodeType::Recursive && node.default_connection.is_some() {
                    painter.text(
                        Pos2::new(rect.max.x - pad, rect.min.y + pad),
                        egui::Align2::RIGHT_TOP,
                        "default ⇒",
                        small_font.clone(),
                        Color32::from_rgb(14, 165, 233),
                    );
                }

                if click_pos.is_some() && !toggle_hit {
                    self.selected_node = Some(id.clone());
                }
            }
            if let Some(id) = open_editor {
                self.open_edit_dialog(&id);
            }
        });

        self.show_add_node_dialog(ctx);
        self.show_edit_node_dialog(ctx);
        self.show_import_dialog(ctx);
        self.show_export_dialog(ctx);
        self.show_clear_all_dialog(ctx);

        // Debounced autosave: rapid edits coalesce into one write
        let now = Instant::now();
        if self.dirty && now.duration_since(self.last_change) >= AUTOSAVE_DEBOUNCE {
            self.save_now();
        } else if self.dirty {
            ctx.request_repaint_after(AUTOSAVE_DEBOUNCE);
        }

        // Bottom-right transient info toast (visible for 3 seconds)
        if let (Some(msg), Some(when)) = (&self.last_save_info, self.last_info_time) {
            if Instant::now().duration_since(when) <= Duration::from_secs(3) {
                let margin = egui::vec2(12.0, 12.0);
                egui::Area::new("bottom_right_toast".into())
                    .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-margin.x, -margin.y))
                    .interactable(false)
                    .show(ctx, |ui| {
                        let (fill, stroke_col, stroke_w, text_col) = match self.last_info_style {
                            NoticeStyle::Subtle => (
                                Color32::from_rgba_premultiplied(20, 20, 20, 170),
                                Color32::from_gray(60),
                                0.5,
                                Color32::from_gray(200),
                            ),
                            NoticeStyle::Prominent => (
                                Color32::from_rgba_premultiplied(30, 30, 30, 230),
                                Color32::from_gray(100),
                                1.5,
                                Color32::LIGHT_GREEN,
                            ),
                            NoticeStyle::Error => (
                                Color32::from_rgba_premultiplied(40, 20, 20, 230),
                                Color32::from_rgb(160, 60, 60),
                                1.5,
                                Color32::from_rgb(255, 140, 140),
                            ),
                        };
                        egui::Frame::popup(ui.style())
                            .corner_radius(egui::CornerRadius::same(8))
                            .stroke(Stroke {
                                width: stroke_w,
                                color: stroke_col,
                            })
                            .fill(fill)
                            .inner_margin(egui::Margin::symmetric(12, 8))
                            .show(ui, |ui| {
                                ui.colored_label(text_col, msg);
                            });
                    });
            }
        }
    }
}

impl PathflowApp {
    fn show_add_node_dialog(&mut self, ctx: &egui::Context) {
        if !self.show_add_node {
            return;
        }
        let mut open = true;
        let mut do_create = false;
        egui::Window::new("Add Node")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Title:");
                    ui.text_edit_singleline(&mut self.add_title);
                });
                ui.horizontal(|ui| {
                    ui.label("Description:");
                    ui.text_edit_singleline(&mut self.add_description);
                });
                ui.horizontal(|ui| {
                    ui.label("Type:");
                    for t in [
                        NodeType::Single,
                        NodeType::Multi,
                        NodeType::End,
                        NodeType::Recursive,
                    ] {
                        ui.selectable_value(&mut self.add_type, t, Self::type_label(t));
                    }
                });
                ui.separator();
                if ui.button("Create").clicked() {
                    do_create = true;
                }
            });
        if do_create {
            let description = (!self.add_description.trim().is_empty())
                .then(|| self.add_description.trim().to_string());
            match self.tree.add_node(
                &self.add_title,
                description,
                self.add_type,
                pos(400.0, 300.0),
            ) {
                Some(id) => {
                    self.selected_node = Some(id);
                    self.mark_dirty();
                    self.show_add_node = false;
                    self.notify("Node created successfully", NoticeStyle::Prominent);
                }
                None => {
                    self.notify("Please enter a title", NoticeStyle::Error);
                }
            }
        } else if !open {
            self.show_add_node = false;
        }
    }

    fn show_edit_node_dialog(&mut self, ctx: &egui::Context) {
        let Some(id) = self.editing_node.clone() else {
            return;
        };
        let Some(node) = self.tree.node(&id).cloned() else {
            self.editing_node = None;
            return;
        };
        let node_choices: Vec<(NodeId, String)> = self
            .tree
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.title.clone()))
            .collect();
        let title_of = |target: &str| -> String {
            node_choices
                .iter()
                .find(|(nid, _)| nid == target)
                .map(|(_, t)| t.clone())
                .unwrap_or_else(|| "<missing>".to_string())
        };

        let mut open = true;
        let mut do_save = false;
        let mut do_delete = false;
        let mut option_saves: Vec<(OptionId, String)> = Vec::new();
        let mut option_removals: Vec<OptionId> = Vec::new();
        let mut option_retargets: Vec<(OptionId, Option<NodeId>)> = Vec::new();
        let mut add_option = false;
        let mut combo_removals: Vec<String> = Vec::new();
        let mut add_combo = false;
        let mut new_default: Option<Option<NodeId>> = None;

        egui::Window::new(format!("Edit: {}", node.title))
            .id(egui::Id::new(("edit_node", id.as_str())))
            .open(&mut open)
            .resizable(true)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Title:");
                    ui.text_edit_singleline(&mut self.edit_title);
                });
                ui.horizontal(|ui| {
                    ui.label("Description:");
                    ui.text_edit_singleline(&mut self.edit_description);
                });
                ui.horizontal(|ui| {
                    ui.label("Type:");
                    for t in [
                        NodeType::Single,
                        NodeType::Multi,
                        NodeType::End,
                        NodeType::Recursive,
                    ] {
                        ui.selectable_value(&mut self.edit_type, t, Self::type_label(t));
                    }
                });
                if ui.button("Save").clicked() {
                    do_save = true;
                }
                ui.separator();

                ui.heading("Options");
                for option in &node.options {
                    let buf = self
                        .option_label_edits
                        .entry(option.id.clone())
                        .or_insert_with(|| option.label.clone());
                    ui.horizontal(|ui| {
                        ui.text_edit_singleline(buf);
                        if ui.button("Save").clicked() {
                            option_saves.push((option.id.clone(), buf.clone()));
                        }
                        // Per-option outgoing connection selector
                        let current = resolve::target_of(&self.tree, &id, &option.id).cloned();
                        let mut pick = current.clone();
                        egui::ComboBox::from_id_salt(("opt_target", option.id.as_str()))
                            .selected_text(
                                current
                                    .as_deref()
                                    .map(title_of)
                                    .unwrap_or_else(|| "(no connection)".into()),
                            )
                            .show_ui(ui, |ui| {
                                ui.selectable_value(&mut pick, None, "(no connection)");
                                for (nid, title) in &node_choices {
                                    ui.selectable_value(&mut pick, Some(nid.clone()), title);
                                }
                            });
                        if pick != current {
                            option_retargets.push((option.id.clone(), pick));
                        }
                        if ui.button("Remove").clicked() {
                            option_removals.push(option.id.clone());
                        }
                    });
                }
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.new_option_label)
                            .hint_text("new option label"),
                    );
                    for k in [OptionKind::Radio, OptionKind::Checkbox] {
                        ui.selectable_value(
                            &mut self.new_option_kind,
                            k,
                            match k {
                                OptionKind::Radio => "radio",
                                OptionKind::Checkbox => "checkbox",
                            },
                        );
                    }
                    if ui.button("Add Option").clicked()
                        && !self.new_option_label.trim().is_empty()
                    {
                        add_option = true;
                    }
                });

                if self.edit_type == NodeType::Multi {
                    ui.separator();
                    ui.heading("Combination Rules");
                    for combo in &node.combo_connections {
                        ui.horizontal(|ui| {
                            let names: Vec<&str> = combo
                                .option_ids
                                .iter()
                                .filter_map(|oid| node.option(oid).map(|o| o.label.as_str()))
                                .collect();
                            ui.label(format!(
                                "{} → {}",
                                names.join(" + "),
                                title_of(&combo.target_node_id)
                            ));
                            if ui.button("Remove").clicked() {
                                combo_removals.push(combo.id.clone());
                            }
                        });
                    }
                    ui.label("New combination:");
                    for option in &node.options {
                        let mut on = self.combo_picks.contains(&option.id);
                        if ui.checkbox(&mut on, &option.label).changed() {
                            if on {
                                self.combo_picks.insert(option.id.clone());
                            } else {
                                self.combo_picks.remove(&option.id);
                            }
                        }
                    }
                    ui.horizontal(|ui| {
                        egui::ComboBox::from_id_salt(("combo_target", id.as_str()))
                            .selected_text(
                                self.combo_target
                                    .as_deref()
                                    .map(title_of)
                                    .unwrap_or_else(|| "(pick target)".into()),
                            )
                            .show_ui(ui, |ui| {
                                for (nid, title) in &node_choices {
                                    ui.selectable_value(
                                        &mut self.combo_target,
                                        Some(nid.clone()),
                                        title,
                                    );
                                }
                            });
                        ui.add(
                            egui::TextEdit::singleline(&mut self.combo_label)
                                .hint_text("label (optional)"),
                        );
                        let valid = !self.combo_picks.is_empty() && self.combo_target.is_some();
                        if ui
                            .add_enabled(valid, egui::Button::new("Add Combination"))
                            .clicked()
                        {
                            add_combo = true;
                        }
                    });
                }

                if self.edit_type == NodeType::Recursive {
                    ui.separator();
                    ui.heading("Default Connection");
                    let current = node.default_connection.clone();
                    let mut pick = current.clone();
                    egui::ComboBox::from_id_salt(("default_target", id.as_str()))
                        .selected_text(
                            current
                                .as_deref()
                                .map(title_of)
                                .unwrap_or_else(|| "(none)".into()),
                        )
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut pick, None, "(none)");
                            for (nid, title) in &node_choices {
                                ui.selectable_value(&mut pick, Some(nid.clone()), title);
                            }
                        });
                    if pick != current {
                        new_default = Some(pick);
                    }
                }

                ui.separator();
                if ui
                    .button(egui::RichText::new("Delete Node").color(Color32::RED))
                    .clicked()
                {
                    do_delete = true;
                }
            });

        // Apply actions after the window closure
        if do_save {
            let description = (!self.edit_description.trim().is_empty())
                .then(|| self.edit_description.trim().to_string());
            if self
                .tree
                .update_node(&id, &self.edit_title, description, self.edit_type)
            {
                self.mark_dirty();
                self.notify("Node updated successfully", NoticeStyle::Prominent);
            } else {
                self.notify("Please enter a title", NoticeStyle::Error);
            }
        }
        for (oid, label) in option_saves {
            if self.tree.update_option_label(&id, &oid, label.trim()) {
                self.mark_dirty();
            }
        }
        for (oid, target) in option_retargets {
            let changed = match target {
                Some(t) => self.tree.connect_option(&id, &oid, &t),
                None => self.tree.disconnect_option(&id, &oid),
            };
            if changed {
                self.mark_dirty();
            }
        }
        for oid in option_removals {
            if self.tree.remove_option(&id, &oid) {
                self.option_label_edits.remove(&oid);
                self.combo_picks.remove(&oid);
                if let Some(sel) = self.selections.get_mut(&id) {
                    sel.clear();
                }
                self.mark_dirty();
            }
        }
        if add_option {
            let label = self.new_option_label.trim().to_string();
            if let Some(oid) = self.tree.add_option(&id, &label, self.new_option_kind) {
                self.option_label_edits.insert(oid, label);
                self.new_option_label.clear();
                self.mark_dirty();
            }
        }
        for cid in combo_removals {
            if self.tree.remove_combo_connection(&id, &cid) {
                self.mark_dirty();
            }
        }
        if add_combo {
            if let Some(target) = self.combo_target.clone() {
                let picks: Vec<OptionId> = self.combo_picks.iter().cloned().collect();
                let label = (!self.combo_label.trim().is_empty())
                    .then(|| self.combo_label.trim().to_string());
                if self
                    .tree
                    .add_combo_connection(&id, &picks, &target, label)
                    .is_some()
                {
                    self.combo_picks.clear();
                    self.combo_label.clear();
                    self.combo_target = None;
                    self.mark_dirty();
                }
            }
        }
        if let Some(target) = new_default {
            if self.tree.set_default_connection(&id, target) {
                self.mark_dirty();
            }
        }
        if do_delete {
            if self.tree.remove_node(&id) {
                self.selections.remove(&id);
                if self.selected_node.as_deref() == Some(id.as_str()) {
                    self.selected_node = None;
                }
                self.mark_dirty();
                self.notify("Node deleted", NoticeStyle::Prominent);
            }
            self.editing_node = None;
        } else if !open {
            self.editing_node = None;
        }
    }

    fn show_import_dialog(&mut self, ctx: &egui::Context) {
        if !self.show_import_window {
            return;
        }
        let mut open = true;
        let mut do_import = false;
        egui::Window::new("Import JSON")
            .collapsible(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Path to a decision-tree document:");
                ui.text_edit_singleline(&mut self.import_path);
                ui.small("Replaces the current tree entirely.");
                if ui.button("Load").clicked() {
                    do_import = true;
                }
            });
        if do_import {
            self.import_from_path();
        } else if !open {
            self.show_import_window = false;
        }
    }

    fn show_export_dialog(&mut self, ctx: &egui::Context) {
        if !self.show_export_window {
            return;
        }
        let mut open = true;
        let mut do_export = false;
        egui::Window::new("Export JSON")
            .collapsible(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Destination file:");
                ui.text_edit_singleline(&mut self.export_path);
                if ui.button("Save").clicked() {
                    do_export = true;
                }
            });
        if do_export {
            self.export_to_path();
        } else if !open {
            self.show_export_window = false;
        }
    }

    fn show_clear_all_dialog(&mut self, ctx: &egui::Context) {
        if !self.confirm_clear_all {
            return;
        }
        let mut open = true;
        let mut do_clear = false;
        let mut do_cancel = false;
        egui::Window::new("Clear All")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Remove every node? This cannot be undone.");
                ui.horizontal(|ui| {
                    if ui
                        .button(egui::RichText::new("Clear").color(Color32::RED))
                        .clicked()
                    {
                        do_clear = true;
                    }
                    if ui.button("Cancel").clicked() {
                        do_cancel = true;
                    }
                });
            });
        if do_cancel {
            open = false;
        }
        if do_clear {
            self.tree = DecisionTree::new();
            self.selections.clear();
            self.selected_node = None;
            self.mark_dirty();
            self.confirm_clear_all = false;
            self.notify("Cleared", NoticeStyle::Prominent);
        } else if !open {
            self.confirm_clear_all = false;
        }
    }
}

// Two short strokes at the tip, angled off the edge direction
fn draw_arrowhead(painter: &egui::Painter, a: Pos2, b: Pos2, stroke: Stroke) {
    let dir = Vec2::new(b.x - a.x, b.y - a.y);
    let len = (dir.x * dir.x + dir.y * dir.y).sqrt();
    if len <= f32::EPSILON {
        return;
    }
    let d = dir / len;
    let n = Vec2::new(-d.y, d.x);
    let size = 8.0;
    let left = b - d * size + n * (size * 0.5);
    let right = b - d * size - n * (size * 0.5);
    painter.line_segment([b, left], stroke);
    painter.line_segment([b, right], stroke);
}
