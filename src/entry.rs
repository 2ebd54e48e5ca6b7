//! Row model: plain `Entry` values in a slot map, addressed by versioned keys.
//!
//! Display order is kept apart from storage so sorting never invalidates a
//! `RowId`; a removed row's key stops resolving even if its slot is reused.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::collision::full_name;
use crate::filter::is_well_formed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Unhandled,
    Divider,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub original_name: String,
    pub candidate_name: String,
    pub extension: String,
    pub title: String,
    pub artist: String,
    pub state: RowState,
    pub well_formed: bool,
    /// Candidate as planned when it needed a ` (n)` suffix; that exact text stays flagged.
    #[serde(skip)]
    pub suffixed_candidate: Option<String>,
}

impl Entry {
    pub fn new(original_name: String, candidate_name: String, extension: String) -> Self {
        let well_formed = is_well_formed(&candidate_name);
        Self {
            original_name,
            candidate_name,
            extension,
            title: String::new(),
            artist: String::new(),
            state: RowState::Unhandled,
            well_formed,
            suffixed_candidate: None,
        }
    }

    pub fn divider() -> Self {
        Self {
            original_name: String::new(),
            candidate_name: String::new(),
            extension: String::new(),
            title: String::new(),
            artist: String::new(),
            state: RowState::Divider,
            well_formed: true,
            suffixed_candidate: None,
        }
    }

    /// Flag the current candidate as one the planner had to disambiguate.
    pub fn mark_suffixed(&mut self) {
        self.suffixed_candidate = Some(self.candidate_name.clone());
        self.well_formed = false;
    }

    pub fn is_divider(&self) -> bool {
        self.state == RowState::Divider
    }

    pub fn original_file(&self) -> String {
        full_name(&self.original_name, &self.extension)
    }

    pub fn candidate_file(&self) -> String {
        full_name(&self.candidate_name, &self.extension)
    }

    pub fn text(&self, column: Column) -> &str {
        match column {
            Column::Candidate => &self.candidate_name,
            Column::Title => &self.title,
            Column::Artist => &self.artist,
        }
    }

    fn set_text(&mut self, column: Column, text: String) {
        match column {
            Column::Candidate => {
                self.well_formed = is_well_formed(&text)
                    && self.suffixed_candidate.as_deref() != Some(text.as_str());
                self.candidate_name = text;
            }
            Column::Title => self.title = text,
            Column::Artist => self.artist = text,
        }
    }
}

new_key_type! {
    pub struct RowId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Candidate,
    Title,
    Artist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: RowId,
    pub column: Column,
}

impl CellRef {
    pub fn new(row: RowId, column: Column) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Default)]
pub struct RowStore {
    rows: SlotMap<RowId, Entry>,
    order: Vec<RowId>,
}

impl RowStore {
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut store = Self::default();
        for entry in entries {
            store.push(entry);
        }
        store
    }

    pub fn push(&mut self, entry: Entry) -> RowId {
        let id = self.rows.insert(entry);
        self.order.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn get(&self, id: RowId) -> Option<&Entry> {
        self.rows.get(id)
    }

    /// Row at a display position (0-based).
    pub fn id_at(&self, position: usize) -> Option<RowId> {
        self.order.get(position).copied()
    }

    pub fn ids(&self) -> &[RowId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Entry)> {
        self.order
            .iter()
            .filter_map(|id| self.get(*id).map(|entry| (*id, entry)))
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.iter().map(|(_, entry)| entry.clone()).collect()
    }

    pub fn text(&self, cell: CellRef) -> Option<&str> {
        self.get(cell.row).map(|entry| entry.text(cell.column))
    }

    /// Raw write used by edits and history replay; dividers are immune.
    pub fn set_text(&mut self, cell: CellRef, text: String) -> bool {
        match self.rows.get_mut(cell.row) {
            Some(entry) if !entry.is_divider() => {
                entry.set_text(cell.column, text);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, id: RowId) -> Option<RowState> {
        self.get(id).map(|entry| entry.state)
    }

    pub fn set_state(&mut self, id: RowId, state: RowState) -> bool {
        match self.rows.get_mut(id) {
            Some(entry) if !entry.is_divider() && state != RowState::Divider => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    /// Stable sort of the display order by row state: unhandled, divider, checked out.
    pub fn sort_by_state(&mut self) {
        let rows = &self.rows;
        self.order
            .sort_by_key(|id| rows.get(*id).map(|entry| entry.state));
    }

    /// Reinstate a saved display order. Ids that went stale are dropped and rows
    /// the saved order does not know keep their relative order at the end.
    pub fn restore_order(&mut self, saved: &[RowId]) {
        let mut order: Vec<RowId> = saved
            .iter()
            .copied()
            .filter(|id| self.rows.contains_key(*id))
            .collect();
        for id in &self.order {
            if !order.contains(id) {
                order.push(*id);
            }
        }
        self.order = order;
    }

    pub fn remove(&mut self, id: RowId) -> Option<Entry> {
        let entry = self.rows.remove(id)?;
        self.order.retain(|other| *other != id);
        Some(entry)
    }

    /// True when another non-divider row already uses `name.extension`.
    pub fn name_in_use(&self, except: RowId, name: &str, extension: &str) -> bool {
        self.iter().any(|(id, entry)| {
            id != except
                && !entry.is_divider()
                && entry.extension == extension
                && entry.candidate_name == name
        })
    }
}
