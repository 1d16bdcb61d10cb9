//! Session configuration, passed from the page to `init_tally` as JSON.

use serde::{Deserialize, Serialize};

use crate::tally::error::{Result, TallyError};

pub const DEFAULT_UNDO_WINDOW_MS: u32 = 5000;

/// What the tracked entities are called in the UI. Also picks the default storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Player,
    Counter,
}

impl EntityKind {
    pub fn storage_key(self) -> &'static str {
        match self {
            EntityKind::Player => "players",
            EntityKind::Counter => "counters",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Player => "Player",
            EntityKind::Counter => "Counter",
        }
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            EntityKind::Player => "Players",
            EntityKind::Counter => "Counters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub kind: EntityKind,
    /// Overrides the kind's default key.
    pub storage_key: Option<String>,
    /// Length of the undo window after a remove or delete-all. 0 disables undo.
    pub undo_window_ms: u32,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            kind: EntityKind::Player,
            storage_key: None,
            undo_window_ms: DEFAULT_UNDO_WINDOW_MS,
        }
    }
}

impl TallyConfig {
    /// Parse config JSON. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: TallyConfig =
            serde_json::from_str(json).map_err(|e| TallyError::Config(e.to_string()))?;
        if let Some(key) = &config.storage_key {
            if key.trim().is_empty() {
                return Err(TallyError::Config("storage_key must not be empty".to_string()));
            }
        }
        Ok(config)
    }

    pub fn storage_key(&self) -> &str {
        self.storage_key
            .as_deref()
            .unwrap_or_else(|| self.kind.storage_key())
    }

    pub fn undo_enabled(&self) -> bool {
        self.undo_window_ms > 0
    }
}
