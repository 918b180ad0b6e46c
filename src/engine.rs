//! Session lifecycle controller.
//!
//! Owns the section store and the navigation flags, and applies user intents
//! to them. Every intent either completes or is rejected without touching
//! state; persistence is the caller's concern.

use crate::clock::{self, Clock, SystemClock};
use crate::model::{
    compare_names, DashboardCard, HistoryNode, Lifecycle, Section, SectionView, Stats, Status,
    StatusMap, Student, StudentRow, ViewMode,
};
use crate::policy::{EditPolicy, EditWindow};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Why an intent was a no-op. These are stale or out-of-mode requests, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("no section is open")]
    NoOpenSection,
    #[error("section not found: {0}")]
    SectionNotFound(String),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("history session not found: {0}")]
    SessionNotFound(String),
    #[error("name must not be empty")]
    BlankName,
    #[error("the live session is saved and locked")]
    Locked,
    #[error("the live session is not locked")]
    NotLocked,
    #[error("not available while viewing history")]
    ViewingHistory,
    #[error("no history session is being viewed")]
    NotViewingHistory,
    #[error("history session is read-only")]
    HistoryReadOnly,
    #[error("history edit already in progress")]
    AlreadyEditing,
    #[error("history session is not being edited")]
    NotEditing,
    #[error("history session can no longer be edited ({0:?})")]
    EditWindowClosed(EditWindow),
}

impl Rejected {
    pub fn code(&self) -> &'static str {
        match self {
            Rejected::NoOpenSection => "no_open_section",
            Rejected::SectionNotFound(_) => "section_not_found",
            Rejected::StudentNotFound(_) => "student_not_found",
            Rejected::SessionNotFound(_) => "session_not_found",
            Rejected::BlankName => "blank_name",
            Rejected::Locked => "locked",
            Rejected::NotLocked => "not_locked",
            Rejected::ViewingHistory => "viewing_history",
            Rejected::NotViewingHistory => "not_viewing_history",
            Rejected::HistoryReadOnly => "history_read_only",
            Rejected::AlreadyEditing => "already_editing",
            Rejected::NotEditing => "not_editing",
            Rejected::EditWindowClosed(_) => "edit_window_closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub student_id: String,
    pub status: Option<Status>,
    /// False when the change went to a history draft rather than the live board.
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub session_key: String,
    pub recorded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCommit {
    pub session_key: String,
    pub mod_count: u32,
    pub edits_left: u32,
    pub permanently_locked: bool,
}

pub struct Engine {
    sections: Vec<Section>,
    flags: Lifecycle,
    /// Pending history edits; `Some` exactly while `flags.is_editing_history`.
    draft: Option<StatusMap>,
    policy: EditPolicy,
    clock: Box<dyn Clock>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EditPolicy::default(), Box::new(SystemClock))
    }
}

impl Engine {
    pub fn new(policy: EditPolicy, clock: Box<dyn Clock>) -> Self {
        Self {
            sections: Vec::new(),
            flags: Lifecycle::default(),
            draft: None,
            policy,
            clock,
        }
    }

    /// Replaces the store wholesale and returns to the dashboard.
    pub fn load(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.flags = Lifecycle::default();
        self.draft = None;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.flags
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn current_section(&self) -> Option<&Section> {
        let id = self.flags.current_section_id.as_deref()?;
        self.section(id)
    }

    fn current_section_mut(&mut self) -> Result<&mut Section, Rejected> {
        let id = self
            .flags
            .current_section_id
            .as_deref()
            .ok_or(Rejected::NoOpenSection)?;
        self.sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Rejected::NoOpenSection)
    }

    fn leave_history(&mut self) -> bool {
        self.flags.viewing_date = None;
        self.flags.is_editing_history = false;
        self.draft.take().is_some()
    }

    // --- section store ---

    pub fn create_section(&mut self, name: &str, subject: &str) -> Result<String, Rejected> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejected::BlankName);
        }
        let id = Uuid::new_v4().to_string();
        self.sections.push(Section {
            id: id.clone(),
            name: name.to_string(),
            subject: subject.trim().to_string(),
            students: Vec::new(),
            history: Default::default(),
            is_locked: false,
            last_saved_date: None,
            created_at: self.clock.now_ms(),
        });
        self.flags.current_section_id = Some(id.clone());
        self.leave_history();
        Ok(id)
    }

    /// Removes the section with its roster and history.
    pub fn delete_section(&mut self, section_id: &str) -> Result<(), Rejected> {
        let idx = self
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| Rejected::SectionNotFound(section_id.to_string()))?;
        self.sections.remove(idx);
        if self.flags.current_section_id.as_deref() == Some(section_id) {
            self.flags.current_section_id = None;
            self.leave_history();
        }
        Ok(())
    }

    pub fn switch_section(&mut self, section_id: &str) -> Result<(), Rejected> {
        if self.section(section_id).is_none() {
            return Err(Rejected::SectionNotFound(section_id.to_string()));
        }
        self.flags.current_section_id = Some(section_id.to_string());
        self.leave_history();
        Ok(())
    }

    pub fn close_section(&mut self) {
        self.flags.current_section_id = None;
        self.leave_history();
    }

    /// Adds sections whose ids are not already present. Returns how many were added.
    pub fn import_sections(&mut self, incoming: Vec<Section>) -> usize {
        let mut added = 0;
        for sec in incoming {
            if self.section(&sec.id).is_some() {
                continue;
            }
            self.sections.push(sec);
            added += 1;
        }
        added
    }

    // --- roster ---

    pub fn add_student(&mut self, name: &str) -> Result<String, Rejected> {
        if self.flags.viewing_date.is_some() {
            return Err(Rejected::ViewingHistory);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejected::BlankName);
        }
        let section = self.current_section_mut()?;
        let id = Uuid::new_v4().to_string();
        section.students.push(Student {
            id: id.clone(),
            name: name.to_string(),
            status: None,
        });
        Ok(id)
    }

    /// Only from the unlocked live board. Saved sessions keep the student's entries.
    pub fn remove_student(&mut self, student_id: &str) -> Result<(), Rejected> {
        if self.flags.viewing_date.is_some() {
            return Err(Rejected::ViewingHistory);
        }
        let section = self.current_section_mut()?;
        if section.is_locked {
            return Err(Rejected::Locked);
        }
        let idx = section
            .students
            .iter()
            .position(|s| s.id == student_id)
            .ok_or_else(|| Rejected::StudentNotFound(student_id.to_string()))?;
        section.students.remove(idx);
        Ok(())
    }

    pub fn set_status(&mut self, student_id: &str, status: Status) -> Result<StatusChange, Rejected> {
        let viewing = self.flags.viewing_date.is_some();
        let editing = self.flags.is_editing_history;
        let section = self.current_section_mut()?;

        if viewing {
            if !editing {
                return Err(Rejected::HistoryReadOnly);
            }
            if section.student(student_id).is_none() {
                return Err(Rejected::StudentNotFound(student_id.to_string()));
            }
            let draft = self.draft.get_or_insert_with(StatusMap::new);
            let next = Status::toggle(draft.get(student_id).copied(), status);
            match next {
                Some(s) => draft.insert(student_id.to_string(), s),
                None => draft.remove(student_id),
            };
            return Ok(StatusChange {
                student_id: student_id.to_string(),
                status: next,
                live: false,
            });
        }

        if section.is_locked {
            return Err(Rejected::Locked);
        }
        let student = section
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| Rejected::StudentNotFound(student_id.to_string()))?;
        student.status = Status::toggle(student.status, status);
        Ok(StatusChange {
            student_id: student_id.to_string(),
            status: student.status,
            live: true,
        })
    }

    // --- live session ---

    /// Freezes the live board into a new history node, clears it and locks it.
    pub fn save_session(&mut self) -> Result<SavedSession, Rejected> {
        if self.flags.viewing_date.is_some() {
            return Err(Rejected::ViewingHistory);
        }
        let now = self.clock.now();
        let section = self.current_section_mut()?;
        if section.is_locked {
            return Err(Rejected::Locked);
        }

        let data: StatusMap = section
            .students
            .iter()
            .filter_map(|s| s.status.map(|st| (s.id.clone(), st)))
            .collect();
        let recorded = data.len();
        let node = HistoryNode {
            data,
            mod_count: 0,
            timestamp: now.timestamp_millis(),
        };
        let session_key = section
            .history
            .insert_unique(clock::session_label(now), node);

        section.last_saved_date = Some(session_key.clone());
        for s in &mut section.students {
            s.status = None;
        }
        section.is_locked = true;

        Ok(SavedSession {
            session_key,
            recorded,
        })
    }

    /// The caller is expected to have confirmed with the user.
    pub fn unlock(&mut self) -> Result<(), Rejected> {
        if self.flags.viewing_date.is_some() {
            return Err(Rejected::ViewingHistory);
        }
        let section = self.current_section_mut()?;
        if !section.is_locked {
            return Err(Rejected::NotLocked);
        }
        section.is_locked = false;
        Ok(())
    }

    // --- history ---

    /// Session keys of the open section, newest first.
    pub fn history_log(&self) -> Result<Vec<String>, Rejected> {
        let section = self.current_section().ok_or(Rejected::NoOpenSection)?;
        Ok(section.history.keys().rev().map(str::to_string).collect())
    }

    pub fn edit_window(&self, session_key: &str) -> Result<EditWindow, Rejected> {
        let section = self.current_section().ok_or(Rejected::NoOpenSection)?;
        let node = section
            .history
            .get(session_key)
            .ok_or_else(|| Rejected::SessionNotFound(session_key.to_string()))?;
        Ok(self.policy.evaluate(node, self.clock.now_ms()))
    }

    pub fn view_history(&mut self, session_key: &str) -> Result<(), Rejected> {
        let section = self.current_section().ok_or(Rejected::NoOpenSection)?;
        if !section.history.contains_key(session_key) {
            return Err(Rejected::SessionNotFound(session_key.to_string()));
        }
        self.leave_history();
        self.flags.viewing_date = Some(session_key.to_string());
        Ok(())
    }

    /// Opens the viewed session for edits. Returns the edits left.
    pub fn enable_history_edit(&mut self) -> Result<u32, Rejected> {
        let key = self
            .flags
            .viewing_date
            .clone()
            .ok_or(Rejected::NotViewingHistory)?;
        if self.flags.is_editing_history {
            return Err(Rejected::AlreadyEditing);
        }
        let section = self.current_section().ok_or(Rejected::NoOpenSection)?;
        let node = section
            .history
            .get(&key)
            .ok_or_else(|| Rejected::SessionNotFound(key.clone()))?;
        let verdict = self.policy.evaluate(node, self.clock.now_ms());
        let EditWindow::Open { edits_left } = verdict else {
            return Err(Rejected::EditWindowClosed(verdict));
        };
        let data = node.data.clone();
        self.draft = Some(data);
        self.flags.is_editing_history = true;
        Ok(edits_left)
    }

    /// Commits the draft, spends one edit and returns to viewing.
    /// The node's save instant is left alone.
    pub fn save_history_changes(&mut self) -> Result<HistoryCommit, Rejected> {
        if !self.flags.is_editing_history {
            return Err(Rejected::NotEditing);
        }
        let key = self
            .flags
            .viewing_date
            .clone()
            .ok_or(Rejected::NotViewingHistory)?;
        let section_id = self
            .flags
            .current_section_id
            .clone()
            .ok_or(Rejected::NoOpenSection)?;
        let node = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .and_then(|s| s.history.get_mut(&key))
            .ok_or_else(|| Rejected::SessionNotFound(key.clone()))?;
        if let Some(data) = self.draft.take() {
            node.data = data;
        }
        node.mod_count = node.mod_count.saturating_add(1);
        self.flags.is_editing_history = false;

        let edits_left = self.policy.edits_left(node);
        Ok(HistoryCommit {
            session_key: key,
            mod_count: node.mod_count,
            edits_left,
            permanently_locked: edits_left == 0,
        })
    }

    /// Back to the live board. Uncommitted history edits are dropped;
    /// returns whether there were any.
    pub fn exit_history(&mut self) -> bool {
        self.leave_history()
    }

    // --- read side ---

    pub fn dashboard(&self) -> Vec<DashboardCard> {
        self.sections
            .iter()
            .map(|s| DashboardCard {
                id: s.id.clone(),
                name: s.name.clone(),
                subject: s.subject.clone(),
                student_count: s.students.len(),
                record_count: s.history.len(),
            })
            .collect()
    }

    /// Statuses shown for the current view: draft, saved node, or `None` for live.
    fn viewed_snapshot<'a>(&'a self, section: &'a Section) -> Option<&'a StatusMap> {
        let key = self.flags.viewing_date.as_deref()?;
        if let Some(draft) = self.draft.as_ref() {
            return Some(draft);
        }
        static EMPTY: StatusMap = StatusMap::new();
        Some(section.history.get(key).map(|n| &n.data).unwrap_or(&EMPTY))
    }

    pub fn stats(&self) -> Option<Stats> {
        let section = self.current_section()?;
        Some(section.stats(self.viewed_snapshot(section)))
    }

    pub fn section_view(&self) -> Option<SectionView> {
        let section = self.current_section()?;
        let snapshot = self.viewed_snapshot(section);

        let mode = match self.flags.viewing_date.as_ref() {
            None => ViewMode::Live {
                is_locked: section.is_locked,
            },
            Some(key) => ViewMode::History {
                session_key: key.clone(),
                is_editing: self.flags.is_editing_history,
                edit_window: if self.flags.is_editing_history {
                    None
                } else {
                    section
                        .history
                        .get(key)
                        .map(|n| self.policy.evaluate(n, self.clock.now_ms()))
                },
            },
        };

        let mut students: Vec<StudentRow> = section
            .students
            .iter()
            .map(|s| StudentRow {
                id: s.id.clone(),
                name: s.name.clone(),
                status: section.resolved_status(s, snapshot),
            })
            .collect();
        students.sort_by(|a, b| compare_names(&a.name, &b.name));

        Some(SectionView {
            id: section.id.clone(),
            name: section.name.clone(),
            subject: section.subject.clone(),
            mode,
            students,
            stats: section.stats(snapshot),
        })
    }
}
