use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::AppSettings;
use crate::tree::model::DecisionTree;

/// How long after the last mutation the coalesced autosave write fires.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize, Deserialize)]
pub struct AppStateFile {
    pub template: String,
    pub tree: DecisionTree,
    pub pan: (f32, f32),
    pub zoom: f32,
}

impl AppStateFile {
    pub fn from_runtime(template: &str, tree: &DecisionTree, pan: egui::Vec2, zoom: f32) -> Self {
        Self {
            template: template.to_string(),
            tree: tree.clone(),
            pan: (pan.x, pan.y),
            zoom,
        }
    }

    /// Convert a persisted AppStateFile into runtime structures.
    ///
    /// Consumes `self` to avoid cloning the node collection.
    pub fn into_runtime(self) -> (String, DecisionTree, egui::Vec2, f32) {
        let pan = egui::vec2(self.pan.0, self.pan.1);
        (self.template, self.tree, pan, self.zoom)
    }
}

static SETTINGS_OVERRIDE: OnceLock<AppSettings> = OnceLock::new();

pub fn set_settings_override(settings: AppSettings) {
    let _ = SETTINGS_OVERRIDE.set(settings);
}

fn autosave_dir() -> PathBuf {
    // If an override is set (e.g. from main.rs), use it.
    if let Some(settings) = SETTINGS_OVERRIDE.get() {
        return settings.autosave_dir();
    }
    // Load settings if present; else use defaults
    let settings = AppSettings::load().unwrap_or_default();
    settings.autosave_dir()
}

/// The single named autosave slot.
pub fn active_state_path() -> PathBuf {
    autosave_dir().join("pathflow.json")
}

fn ensure_autosave_dir() -> std::io::Result<()> {
    fs::create_dir_all(autosave_dir())
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn save_active(state: &AppStateFile) -> anyhow::Result<PathBuf> {
    ensure_autosave_dir()?;
    let s = serde_json::to_string_pretty(state)?;
    let path = active_state_path();
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}

pub fn load_active() -> anyhow::Result<Option<AppStateFile>> {
    let path = active_state_path();
    if !path.exists() {
        return Ok(None);
    }
    load_from_path(&path).map(Some)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppStateFile> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let state: AppStateFile = serde_json::from_str(&buf)?;
    Ok(state)
}
