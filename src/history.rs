//! Linear undo/redo log.
//!
//! Records only remember what the cells held *before* a change. Replaying a record
//! produces its mirror image (the values it overwrote), which goes on the other stack.
//! Pushing a fresh record clears the redo stack. State records also carry the
//! display order from before the change, so undoing a checkout puts rows back in place.

use crate::entry::{CellRef, RowId, RowState, RowStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRecord {
    Cells {
        targets: Vec<CellRef>,
        previous: Vec<String>,
    },
    States {
        targets: Vec<RowId>,
        previous: Vec<RowState>,
        order: Vec<RowId>,
    },
}

impl EditRecord {
    pub fn is_empty(&self) -> bool {
        match self {
            EditRecord::Cells { targets, .. } => targets.is_empty(),
            EditRecord::States { targets, .. } => targets.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EditRecord::Cells { targets, .. } => targets.len(),
            EditRecord::States { targets, .. } => targets.len(),
        }
    }

    /// Write the stored values back into `rows`, returning the record that undoes this one.
    ///
    /// Rows that no longer exist are skipped; an all-stale record yields an empty one.
    pub fn apply(&self, rows: &mut RowStore) -> EditRecord {
        match self {
            EditRecord::Cells { targets, previous } => {
                let mut forward_targets = Vec::with_capacity(targets.len());
                let mut forward_values = Vec::with_capacity(targets.len());
                for (cell, text) in targets.iter().zip(previous) {
                    let Some(current) = rows.text(*cell).map(str::to_owned) else {
                        continue;
                    };
                    if rows.set_text(*cell, text.clone()) {
                        forward_targets.push(*cell);
                        forward_values.push(current);
                    }
                }
                EditRecord::Cells {
                    targets: forward_targets,
                    previous: forward_values,
                }
            }
            EditRecord::States {
                targets,
                previous,
                order,
            } => {
                let current_order = rows.ids().to_vec();
                let mut forward_targets = Vec::with_capacity(targets.len());
                let mut forward_states = Vec::with_capacity(targets.len());
                for (row, state) in targets.iter().zip(previous) {
                    let Some(current) = rows.state(*row) else {
                        continue;
                    };
                    if rows.set_state(*row, *state) {
                        forward_targets.push(*row);
                        forward_states.push(current);
                    }
                }
                if !forward_targets.is_empty() {
                    rows.restore_order(order);
                    rows.sort_by_state();
                }
                EditRecord::States {
                    targets: forward_targets,
                    previous: forward_states,
                    order: current_order,
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct EditHistory {
    undo: Vec<EditRecord>,
    redo: Vec<EditRecord>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change that already happened. Empty records are dropped.
    pub fn push(&mut self, record: EditRecord) -> bool {
        if record.is_empty() {
            return false;
        }
        self.undo.push(record);
        self.redo.clear();
        true
    }

    pub fn undo(&mut self, rows: &mut RowStore) -> Option<EditRecord> {
        let record = self.undo.pop()?;
        let forward = record.apply(rows);
        if !forward.is_empty() {
            self.redo.push(forward);
        }
        Some(record)
    }

    pub fn redo(&mut self, rows: &mut RowStore) -> Option<EditRecord> {
        let record = self.redo.pop()?;
        let backward = record.apply(rows);
        if !backward.is_empty() {
            self.undo.push(backward);
        }
        Some(record)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Column, Entry};

    fn rows() -> RowStore {
        RowStore::from_entries(vec![
            Entry::new("a".into(), "A".into(), "mp3".into()),
            Entry::new("b".into(), "B".into(), "mp3".into()),
            Entry::divider(),
        ])
    }

    fn set(rows: &mut RowStore, history: &mut EditHistory, position: usize, text: &str) {
        let cell = CellRef::new(rows.id_at(position).expect("row"), Column::Candidate);
        let previous = rows.text(cell).expect("text").to_string();
        rows.set_text(cell, text.to_string());
        history.push(EditRecord::Cells {
            targets: vec![cell],
            previous: vec![previous],
        });
    }

    fn candidates(rows: &RowStore) -> Vec<String> {
        rows.iter().map(|(_, e)| e.candidate_name.clone()).collect()
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut rows = rows();
        let mut history = EditHistory::new();
        assert!(history.undo(&mut rows).is_none());
        assert!(history.redo(&mut rows).is_none());
        assert!(!history.push(EditRecord::Cells {
            targets: vec![],
            previous: vec![],
        }));
    }

    #[test]
    fn undo_all_then_redo_all_restores_state() {
        let mut rows = rows();
        let mut history = EditHistory::new();
        set(&mut rows, &mut history, 0, "A1");
        set(&mut rows, &mut history, 1, "B1");
        set(&mut rows, &mut history, 0, "A2");
        let after_edits = candidates(&rows);

        for _ in 0..3 {
            assert!(history.undo(&mut rows).is_some());
        }
        assert_eq!(candidates(&rows), ["A", "B", ""]);
        for _ in 0..3 {
            assert!(history.redo(&mut rows).is_some());
        }
        assert_eq!(candidates(&rows), after_edits);
        assert_eq!(history.undo_len(), 3);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut rows = rows();
        let mut history = EditHistory::new();
        set(&mut rows, &mut history, 0, "A1");
        history.undo(&mut rows);
        assert_eq!(history.redo_len(), 1);
        set(&mut rows, &mut history, 1, "B1");
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn state_records_resort_rows() {
        let mut rows = rows();
        let mut history = EditHistory::new();
        let a = rows.id_at(0).expect("row a");
        let order = rows.ids().to_vec();
        rows.set_state(a, RowState::Renamed);
        rows.sort_by_state();
        history.push(EditRecord::States {
            targets: vec![a],
            previous: vec![RowState::Unhandled],
            order: order.clone(),
        });
        assert_eq!(rows.id_at(2), Some(a));

        history.undo(&mut rows);
        assert_eq!(rows.ids(), order.as_slice());
        assert_eq!(rows.state(a), Some(RowState::Unhandled));

        history.redo(&mut rows);
        assert_eq!(rows.id_at(2), Some(a));
    }

    #[test]
    fn removed_rows_are_skipped_on_replay() {
        let mut rows = rows();
        let mut history = EditHistory::new();
        set(&mut rows, &mut history, 0, "A1");
        let a = rows.id_at(0).expect("row a");
        rows.remove(a);
        let record = history.undo(&mut rows).expect("record");
        assert_eq!(record.len(), 1);
        assert_eq!(history.redo_len(), 0);
        assert_eq!(candidates(&rows), ["B", ""]);
    }
}
