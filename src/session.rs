//! Working set of planned rows plus the edits made to it.

use crate::actions::{BatchAction, split_artist_title};
use crate::collision::full_name;
use crate::entry::{CellRef, Column, Entry, RowId, RowState, RowStore};
use crate::error::EditError;
use crate::filter::tidy;
use crate::history::{EditHistory, EditRecord};
use crate::logging::Journal;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub changed: usize,
    pub rejected: Vec<(RowId, EditError)>,
}

#[derive(Debug)]
pub struct Session {
    rows: RowStore,
    history: EditHistory,
    journal: Journal,
    locked: bool,
}

impl Session {
    pub fn new(entries: Vec<Entry>, journal: &Journal) -> Self {
        Self {
            rows: RowStore::from_entries(entries),
            history: EditHistory::new(),
            journal: journal.scoped("session"),
            locked: false,
        }
    }

    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Row at a 1-based display position, as typed by a user.
    pub fn row_at(&self, position: usize) -> Result<RowId, EditError> {
        position
            .checked_sub(1)
            .and_then(|index| self.rows.id_at(index))
            .ok_or(EditError::UnknownRow(position))
    }

    fn ensure_unlocked(&self) -> Result<(), EditError> {
        if self.locked {
            Err(EditError::Locked)
        } else {
            Ok(())
        }
    }

    /// Run a batch action over `targets`. At most one history record is pushed.
    pub fn apply_action(
        &mut self,
        action: BatchAction,
        targets: &[RowId],
    ) -> Result<ActionOutcome, EditError> {
        self.ensure_unlocked()?;
        let outcome = match action {
            BatchAction::MarkCheckedOut => self.mark_checked_out(targets),
            BatchAction::TagFromCandidate => self.tag_from_candidate(targets),
            _ => self.rewrite_candidates(action, targets),
        };
        self.journal.info(format!(
            "{action}: {} changed, {} rejected",
            outcome.changed,
            outcome.rejected.len()
        ));
        Ok(outcome)
    }

    fn rewrite_candidates(&mut self, action: BatchAction, targets: &[RowId]) -> ActionOutcome {
        let mut outcome = ActionOutcome::default();
        let mut cells = Vec::new();
        let mut previous = Vec::new();

        for &id in targets {
            let Some(entry) = self.rows.get(id).filter(|entry| !entry.is_divider()) else {
                continue;
            };
            let current = entry.candidate_name.clone();
            let extension = entry.extension.clone();
            let rewritten = tidy(&action.rewrite(&current, &entry.original_name));
            if rewritten == current {
                continue;
            }
            if rewritten.is_empty() {
                outcome.rejected.push((id, EditError::Blank));
                continue;
            }
            if self.rows.name_in_use(id, &rewritten, &extension) {
                self.journal
                    .info(format!("Kept '{current}': '{rewritten}' is already in use"));
                outcome
                    .rejected
                    .push((id, EditError::Duplicate(full_name(&rewritten, &extension))));
                continue;
            }

            let cell = CellRef::new(id, Column::Candidate);
            self.rows.set_text(cell, rewritten);
            cells.push(cell);
            previous.push(current);
        }

        outcome.changed = cells.len();
        self.history.push(EditRecord::Cells {
            targets: cells,
            previous,
        });
        outcome
    }

    fn tag_from_candidate(&mut self, targets: &[RowId]) -> ActionOutcome {
        let mut cells = Vec::new();
        let mut previous = Vec::new();
        let mut changed_rows = 0;

        for &id in targets {
            let Some(entry) = self.rows.get(id).filter(|entry| !entry.is_divider()) else {
                continue;
            };
            let Some((artist, title)) = split_artist_title(&entry.candidate_name) else {
                continue;
            };
            let updates = [(Column::Artist, artist.to_string()), (Column::Title, title.to_string())];
            let mut row_changed = false;
            for (column, text) in updates {
                let cell = CellRef::new(id, column);
                let current = self.rows.text(cell).unwrap_or_default().to_string();
                if current == text {
                    continue;
                }
                self.rows.set_text(cell, text);
                cells.push(cell);
                previous.push(current);
                row_changed = true;
            }
            if row_changed {
                changed_rows += 1;
            }
        }

        self.history.push(EditRecord::Cells {
            targets: cells,
            previous,
        });
        ActionOutcome {
            changed: changed_rows,
            rejected: Vec::new(),
        }
    }

    fn mark_checked_out(&mut self, targets: &[RowId]) -> ActionOutcome {
        let order = self.rows.ids().to_vec();
        let mut rows = Vec::new();
        let mut previous = Vec::new();
        for &id in targets {
            let Some(state) = self.rows.state(id) else {
                continue;
            };
            if state != RowState::Unhandled {
                continue;
            }
            if self.rows.set_state(id, RowState::Renamed) {
                rows.push(id);
                previous.push(state);
            }
        }
        self.rows.sort_by_state();

        let changed = rows.len();
        self.history.push(EditRecord::States {
            targets: rows,
            previous,
            order,
        });
        ActionOutcome {
            changed,
            rejected: Vec::new(),
        }
    }

    /// Manual edit of one cell. The text is tidied first; a rejected edit leaves the cell as it was.
    pub fn edit_cell(&mut self, cell: CellRef, text: &str) -> Result<bool, EditError> {
        self.ensure_unlocked()?;
        let entry = self
            .rows
            .get(cell.row)
            .filter(|entry| !entry.is_divider())
            .ok_or(EditError::NotEditable)?;

        let text = tidy(text);
        let current = entry.text(cell.column).to_string();
        if text == current {
            return Ok(false);
        }
        if cell.column == Column::Candidate {
            if text.is_empty() {
                return Err(EditError::Blank);
            }
            if self.rows.name_in_use(cell.row, &text, &entry.extension) {
                return Err(EditError::Duplicate(full_name(&text, &entry.extension)));
            }
        }

        self.journal
            .debug(format!("Edited {:?} from '{current}' to '{text}'", cell.column));
        self.rows.set_text(cell, text);
        self.history.push(EditRecord::Cells {
            targets: vec![cell],
            previous: vec![current],
        });
        Ok(true)
    }

    pub fn undo(&mut self) -> Result<Option<EditRecord>, EditError> {
        self.ensure_unlocked()?;
        let record = self.history.undo(&mut self.rows);
        if let Some(record) = &record {
            self.journal.debug(format!("Undid {} change(s)", record.len()));
        }
        Ok(record)
    }

    pub fn redo(&mut self) -> Result<Option<EditRecord>, EditError> {
        self.ensure_unlocked()?;
        let record = self.history.redo(&mut self.rows);
        if let Some(record) = &record {
            self.journal.debug(format!("Redid {} change(s)", record.len()));
        }
        Ok(record)
    }

    /// Drop rows from the working set. Files on disk are untouched and history is not recorded.
    pub fn dismiss(&mut self, targets: &[RowId]) -> Result<usize, EditError> {
        self.ensure_unlocked()?;
        let mut removed = 0;
        for &id in targets {
            if self.rows.get(id).is_some_and(Entry::is_divider) {
                continue;
            }
            if let Some(entry) = self.rows.remove(id) {
                self.journal
                    .info(format!("Removed {} from the list", entry.original_file()));
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Snapshot the rows for a commit and lock the session until [`Session::rebuild`].
    pub fn begin_commit(&mut self) -> Result<Vec<Entry>, EditError> {
        self.ensure_unlocked()?;
        self.locked = true;
        Ok(self.rows.entries())
    }

    /// Replace the working set with freshly planned rows and unlock.
    pub fn rebuild(&mut self, entries: Vec<Entry>) {
        self.rows = RowStore::from_entries(entries);
        self.history.clear();
        self.locked = false;
    }
}
