// src/core/transcript.rs — Ordered, deduplicated conversation log
//
// The remote thread history is re-fetched after every turn, so most turns are
// observed many times. The transcript keeps the first sighting of each
// {role, content} pair and ignores the rest.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::Turn;
use crate::infra::errors::ParleyError;

/// Display order for the transcript view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    seen: HashSet<Turn>,
    order: RenderOrder,
}

#[derive(Serialize)]
struct TranscriptFile<'a> {
    exported_at: chrono::DateTime<chrono::Utc>,
    turns: &'a [Turn],
}

impl Transcript {
    pub fn new(order: RenderOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    /// Append `turn` unless an identical pair is already recorded.
    pub fn append_if_new(&mut self, turn: Turn) -> bool {
        if self.seen.contains(&turn) {
            return false;
        }
        self.seen.insert(turn.clone());
        self.turns.push(turn);
        true
    }

    /// Merge a fetched history (oldest first). Returns the turns that were new.
    pub fn reconcile(&mut self, history: &[Turn]) -> Vec<Turn> {
        let mut added = Vec::new();
        for turn in history {
            if self.append_if_new(turn.clone()) {
                added.push(turn.clone());
            }
        }
        if !added.is_empty() {
            tracing::debug!(added = added.len(), total = self.turns.len(), "Transcript reconciled");
        }
        added
    }

    /// Turns in display order.
    pub fn render_order(&self) -> Vec<&Turn> {
        match self.order {
            RenderOrder::OldestFirst => self.turns.iter().collect(),
            RenderOrder::NewestFirst => self.turns.iter().rev().collect(),
        }
    }

    /// Turns in insertion order, regardless of the display order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn order(&self) -> RenderOrder {
        self.order
    }

    pub fn set_order(&mut self, order: RenderOrder) {
        self.order = order;
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Write the transcript as JSON. Parent directories are created.
    pub fn save_json(&self, path: &Path) -> Result<(), ParleyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = TranscriptFile {
            exported_at: chrono::Utc::now(),
            turns: &self.turns,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ParleyError::Other(anyhow::anyhow!(e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Default export location: transcripts dir, one file per timestamp.
    pub fn default_export_path() -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        crate::infra::paths::transcripts_dir().join(format!("transcript-{stamp}.json"))
    }
}

/// One display line for a turn.
pub fn render_turn(turn: &Turn) -> String {
    format!("{}: {}", turn.role().label(), turn.content())
}
