use crate::legacy;
use crate::policy::EditWindow;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Status::Present),
            "absent" => Some(Status::Absent),
            _ => None,
        }
    }

    /// Requesting the status a student already has clears it.
    pub fn toggle(current: Option<Status>, requested: Status) -> Option<Status> {
        if current == Some(requested) {
            None
        } else {
            Some(requested)
        }
    }

    pub fn report_code(self) -> &'static str {
        match self {
            Status::Present => "P",
            Status::Absent => "A",
        }
    }
}

/// Frozen per-student statuses of one saved session. Unset students have no entry.
pub type StatusMap = BTreeMap<String, Status>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<Status>,
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(Status::parse))
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(legacy::epoch_millis).unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNode {
    pub data: StatusMap,
    pub mod_count: u32,
    /// Epoch milliseconds of the save. Anchors the edit window; never rewritten.
    pub timestamp: i64,
}

/// Saved sessions of a section, keyed by session label, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<(String, HistoryNode)>,
}

impl History {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&HistoryNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut HistoryNode> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, n)| n)
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HistoryNode)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Inserts under `label`, or under `label (2)`, `label (3)`, ... when the
    /// label is taken. Returns the key actually used.
    pub fn insert_unique(&mut self, label: String, node: HistoryNode) -> String {
        let mut key = label.clone();
        let mut n = 2;
        while self.contains_key(&key) {
            key = format!("{} ({})", label, n);
            n += 1;
        }
        self.entries.push((key.clone(), node));
        key
    }

    /// Last write wins for a repeated key; the original position is kept.
    fn put(&mut self, key: String, node: HistoryNode) {
        match self.get_mut(&key) {
            Some(existing) => *existing = node,
            None => self.entries.push((key, node)),
        }
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, node) in &self.entries {
            map.serialize_entry(k, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for History {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HistoryVisitor;

        impl<'de> Visitor<'de> for HistoryVisitor {
            type Value = History;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of session keys to history entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<History, A::Error> {
                let mut history = History::default();
                while let Some((key, raw)) = access.next_entry::<String, serde_json::Value>()? {
                    history.put(key, legacy::migrate_history_entry(raw));
                }
                Ok(history)
            }
        }

        deserializer.deserialize_map(HistoryVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub last_saved_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub created_at: i64,
}

impl Section {
    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    /// Status shown for `student`: from `snapshot` when viewing history, else live.
    pub fn resolved_status(&self, student: &Student, snapshot: Option<&StatusMap>) -> Option<Status> {
        match snapshot {
            Some(data) => data.get(&student.id).copied(),
            None => student.status,
        }
    }

    /// `total` is always the current roster size, even for a historical snapshot.
    pub fn stats(&self, snapshot: Option<&StatusMap>) -> Stats {
        let mut stats = Stats {
            total: self.students.len(),
            present: 0,
            absent: 0,
        };
        for s in &self.students {
            match self.resolved_status(s, snapshot) {
                Some(Status::Present) => stats.present += 1,
                Some(Status::Absent) => stats.absent += 1,
                None => {}
            }
        }
        stats
    }

    pub fn sorted_students(&self) -> Vec<&Student> {
        let mut out: Vec<&Student> = self.students.iter().collect();
        out.sort_by(|a, b| compare_names(&a.name, &b.name));
        out
    }
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
}

/// Process-level navigation state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub current_section_id: Option<String>,
    pub viewing_date: Option<String>,
    pub is_editing_history: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCard {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub student_count: usize,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViewMode {
    Live {
        #[serde(rename = "isLocked")]
        is_locked: bool,
    },
    History {
        #[serde(rename = "sessionKey")]
        session_key: String,
        #[serde(rename = "isEditing")]
        is_editing: bool,
        /// Absent while editing; the window was checked on entry.
        #[serde(rename = "editWindow", skip_serializing_if = "Option::is_none")]
        edit_window: Option<EditWindow>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub mode: ViewMode,
    pub students: Vec<StudentRow>,
    pub stats: Stats,
}
