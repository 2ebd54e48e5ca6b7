use serde::Serialize;
use similar::{Algorithm, ChangeTag, TextDiff};

use crate::entry::{Entry, RowState, RowStore};

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[1;33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Character-level diff of two names. Without color, removals read `[-..-]` and insertions `{+..+}`.
pub fn name_diff(old: &str, new: &str, color: bool) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);

    let mut runs: Vec<(ChangeTag, String)> = Vec::new();
    for change in diff.iter_all_changes() {
        match runs.last_mut() {
            Some((tag, text)) if *tag == change.tag() => text.push_str(change.value()),
            _ => runs.push((change.tag(), change.value().to_string())),
        }
    }

    let mut out = String::with_capacity(old.len() + new.len());
    for (tag, text) in runs {
        push_run(&mut out, tag, &text, color);
    }
    out
}

fn push_run(out: &mut String, tag: ChangeTag, text: &str, color: bool) {
    match (tag, color) {
        (ChangeTag::Equal, _) => out.push_str(text),
        (ChangeTag::Delete, true) => out.push_str(&format!("{RED}{text}{RESET}")),
        (ChangeTag::Insert, true) => out.push_str(&format!("{GREEN}{text}{RESET}")),
        (ChangeTag::Delete, false) => out.push_str(&format!("[-{text}-]")),
        (ChangeTag::Insert, false) => out.push_str(&format!("{{+{text}+}}")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView<'a> {
    pub position: usize,
    pub original: &'a str,
    pub candidate: &'a str,
    pub extension: &'a str,
    pub title: &'a str,
    pub artist: &'a str,
    pub state: RowState,
    pub well_formed: bool,
}

pub fn row_views(rows: &RowStore) -> Vec<RowView<'_>> {
    rows.iter()
        .enumerate()
        .map(|(index, (_, entry))| RowView {
            position: index + 1,
            original: &entry.original_name,
            candidate: &entry.candidate_name,
            extension: &entry.extension,
            title: &entry.title,
            artist: &entry.artist,
            state: entry.state,
            well_formed: entry.well_formed,
        })
        .collect()
}

pub fn render_row(position: usize, entry: &Entry, color: bool) -> String {
    if entry.is_divider() {
        let rule = "-".repeat(12);
        let line = format!("{rule} checked out {rule}");
        return if color {
            format!("{DIM}{line}{RESET}")
        } else {
            line
        };
    }

    let marker = match (entry.state, entry.well_formed) {
        (RowState::Renamed, _) => "✓",
        (_, false) => "!",
        _ => " ",
    };
    let marker = if color && marker == "!" {
        format!("{YELLOW}!{RESET}")
    } else {
        marker.to_string()
    };
    let name = if entry.original_name == entry.candidate_name {
        entry.candidate_name.clone()
    } else {
        name_diff(&entry.original_name, &entry.candidate_name, color)
    };
    let mut line = format!("{position:>4} {marker} {name}.{}", entry.extension);
    if !entry.artist.is_empty() || !entry.title.is_empty() {
        let tags = format!("artist={:?} title={:?}", entry.artist, entry.title);
        if color {
            line.push_str(&format!("  {YELLOW}{tags}{RESET}"));
        } else {
            line.push_str(&format!("  {tags}"));
        }
    }
    line
}

pub fn render_rows(rows: &RowStore, color: bool) -> Vec<String> {
    rows.iter()
        .enumerate()
        .map(|(index, (_, entry))| render_row(index + 1, entry, color))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreviewStats {
    pub rows: usize,
    pub renames: usize,
    pub tagged: usize,
    pub malformed: usize,
}

pub fn stats(rows: &RowStore) -> PreviewStats {
    let mut stats = PreviewStats::default();
    for (_, entry) in rows.iter().filter(|(_, e)| !e.is_divider()) {
        stats.rows += 1;
        if entry.original_name != entry.candidate_name {
            stats.renames += 1;
        }
        if !entry.title.is_empty() || !entry.artist.is_empty() {
            stats.tagged += 1;
        }
        if !entry.well_formed {
            stats.malformed += 1;
        }
    }
    stats
}
