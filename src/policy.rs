use crate::model::HistoryNode;
use serde::Serialize;

pub const MAX_EDITS: u32 = 2;
pub const EDIT_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Whether a saved session may still be amended, and why not otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EditWindow {
    Open {
        #[serde(rename = "editsLeft")]
        edits_left: u32,
    },
    /// No usable save instant: none recorded (migrated bare maps) or one
    /// later than now.
    Untimed,
    LimitReached,
    Expired,
}

impl EditWindow {
    pub fn is_open(self) -> bool {
        matches!(self, EditWindow::Open { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPolicy {
    pub max_edits: u32,
    pub window_ms: i64,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self {
            max_edits: MAX_EDITS,
            window_ms: EDIT_WINDOW_MS,
        }
    }
}

impl EditPolicy {
    /// Evaluated lazily against `now_ms`; nothing closes a window in the background.
    pub fn evaluate(&self, node: &HistoryNode, now_ms: i64) -> EditWindow {
        if node.timestamp <= 0 || node.timestamp > now_ms {
            return EditWindow::Untimed;
        }
        if node.mod_count >= self.max_edits {
            return EditWindow::LimitReached;
        }
        if now_ms - node.timestamp >= self.window_ms {
            return EditWindow::Expired;
        }
        EditWindow::Open {
            edits_left: self.max_edits - node.mod_count,
        }
    }

    pub fn edits_left(&self, node: &HistoryNode) -> u32 {
        self.max_edits.saturating_sub(node.mod_count)
    }
}
