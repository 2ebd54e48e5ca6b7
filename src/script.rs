//! Scripted edits: a YAML or JSON list of steps replayed against a session.
//!
//! Rows are addressed by their 1-based display position at the moment the step
//! runs, so a checkout that re-sorts the list shifts later positions.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::actions::BatchAction;
use crate::entry::{CellRef, Column, RowId};
use crate::error::EditError;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Action {
        name: BatchAction,
        /// Every row when omitted.
        #[serde(default)]
        rows: Option<Vec<usize>>,
    },
    Edit {
        row: usize,
        #[serde(default = "default_column")]
        column: Column,
        text: String,
    },
    Undo,
    Redo,
    Dismiss {
        rows: Vec<usize>,
    },
}

fn default_column() -> Column {
    Column::Candidate
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Action { .. } => "action",
            Step::Edit { .. } => "edit",
            Step::Undo => "undo",
            Step::Redo => "redo",
            Step::Dismiss { .. } => "dismiss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub message: String,
    pub errors: Vec<String>,
}

pub fn load_script(path: &Path) -> Result<Script> {
    let data = fs::read(path).with_context(|| format!("reading script {}", path.display()))?;
    if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    } else {
        serde_yaml::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Run every step; a failing step is reported and the rest still run.
pub fn run_script(script: &Script, session: &mut Session) -> Vec<StepReport> {
    script
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut report = StepReport {
                step: index + 1,
                op: step.kind(),
                message: String::new(),
                errors: Vec::new(),
            };
            match run_step(step, session) {
                Ok((message, rejected)) => {
                    report.message = message;
                    report.errors = rejected.iter().map(ToString::to_string).collect();
                }
                Err(err) => report.errors.push(err.to_string()),
            }
            report
        })
        .collect()
}

fn run_step(step: &Step, session: &mut Session) -> Result<(String, Vec<EditError>), EditError> {
    match step {
        Step::Action { name, rows } => {
            let targets = match rows {
                Some(rows) => resolve_rows(session, rows)?,
                None => session.rows().ids().to_vec(),
            };
            let outcome = session.apply_action(*name, &targets)?;
            let rejected = outcome.rejected.into_iter().map(|(_, err)| err).collect();
            Ok((format!("{name}: {} row(s) changed", outcome.changed), rejected))
        }
        Step::Edit { row, column, text } => {
            let cell = CellRef::new(session.row_at(*row)?, *column);
            let changed = session.edit_cell(cell, text)?;
            let message = if changed {
                format!("row {row} {column:?} set")
            } else {
                format!("row {row} {column:?} unchanged")
            };
            Ok((message.to_lowercase(), Vec::new()))
        }
        Step::Undo => {
            let message = match session.undo()? {
                Some(record) => format!("undid {} change(s)", record.len()),
                None => "nothing to undo".to_string(),
            };
            Ok((message, Vec::new()))
        }
        Step::Redo => {
            let message = match session.redo()? {
                Some(record) => format!("redid {} change(s)", record.len()),
                None => "nothing to redo".to_string(),
            };
            Ok((message, Vec::new()))
        }
        Step::Dismiss { rows } => {
            let targets = resolve_rows(session, rows)?;
            let removed = session.dismiss(&targets)?;
            Ok((format!("{removed} row(s) removed from the list"), Vec::new()))
        }
    }
}

fn resolve_rows(session: &Session, rows: &[usize]) -> Result<Vec<RowId>, EditError> {
    rows.iter().map(|row| session.row_at(*row)).collect()
}
