//! The exchanged JSON document: the full node collection plus metadata.
//! Import accepts the minimal contract of a present `nodes` array; the
//! envelope fields fall back to defaults so hand-trimmed documents load.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::tree::model::{DecisionNode, DecisionTree};

pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub template: String,
    pub nodes: Vec<DecisionNode>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl TreeDocument {
    pub fn from_tree(template: &str, tree: &DecisionTree) -> Self {
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            created_at,
            template: template.to_string(),
            nodes: tree.nodes.clone(),
        }
    }

    /// Imported nodes fully replace the in-memory collection; no merge.
    pub fn into_tree(self) -> DecisionTree {
        DecisionTree { nodes: self.nodes }
    }
}

pub fn export_json(template: &str, tree: &DecisionTree) -> anyhow::Result<String> {
    let doc = TreeDocument::from_tree(template, tree);
    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}

pub fn import_json(data: &str) -> anyhow::Result<TreeDocument> {
    let value: serde_json::Value = serde_json::from_str(data).context("not valid JSON")?;
    match value.get("nodes") {
        Some(serde_json::Value::Array(_)) => {}
        _ => bail!("document has no nodes array"),
    }
    let doc: TreeDocument = serde_json::from_value(value).context("malformed node entry")?;
    Ok(doc)
}
