//! Applies a snapshot of the working set to disk: tag writes first, then renames.
//!
//! Every item is attempted independently; failures are collected into the
//! [`CommitResult`] rather than aborting the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::entry::Entry;
use crate::error::{TagError, describe_io};
use crate::logging::Journal;
use crate::store::Store;
use crate::tags::{TagPair, TagUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPhase {
    Tags,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitFailure {
    pub phase: CommitPhase,
    pub original_path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another row already claimed the target name.
    Taken,
    BlankName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRename {
    pub original: String,
    pub target: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub listed: usize,
    pub tags_planned: usize,
    pub tags_written: usize,
    pub renames_planned: usize,
    pub files_renamed: usize,
    pub errors: usize,
    pub failures: Vec<CommitFailure>,
    pub skipped: Vec<SkippedRename>,
    pub cancelled: bool,
}

impl CommitResult {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} of {} planned renames done, out of {} listed.\n{} of {} tag updates applied. Encountered a total of {} errors.",
            self.files_renamed,
            self.renames_planned,
            self.listed,
            self.tags_written,
            self.tags_planned,
            self.errors
        );
        let taken = self.skipped_for(SkipReason::Taken);
        if taken > 0 {
            text.push_str(&format!(
                "\n{taken} renames skipped because the name was already taken."
            ));
        }
        let blank = self.skipped_for(SkipReason::BlankName);
        if blank > 0 {
            text.push_str(&format!("\n{blank} renames skipped because the new name was blank."));
        }
        if self.cancelled {
            text.push_str("\nCancelled before all items were attempted.");
        }
        text
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|skip| skip.reason == reason).count()
    }

    fn fail(&mut self, failure: CommitFailure) {
        self.errors += 1;
        self.failures.push(failure);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommitEvent {
    Started { total: usize },
    Step { done: usize, total: usize },
    Finished(CommitResult),
}

struct TagJob {
    path: PathBuf,
    update: TagUpdate,
}

struct RenameJob {
    from: PathBuf,
    to: PathBuf,
}

pub struct CommitEngine {
    journal: Journal,
}

impl CommitEngine {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.scoped("commit"),
        }
    }

    /// Run the commit on the calling thread. `progress` sees every event, `Finished` last.
    pub fn commit<S>(
        &self,
        entries: &[Entry],
        folder: &Path,
        store: &S,
        progress: &mut dyn FnMut(CommitEvent),
        cancel: &AtomicBool,
    ) -> CommitResult
    where
        S: Store + ?Sized,
    {
        self.journal
            .info(format!("Starting commit in {}", folder.display()));
        let mut result = CommitResult {
            listed: entries.iter().filter(|e| !e.is_divider()).count(),
            ..CommitResult::default()
        };

        let tag_jobs = self.plan_tags(entries, folder, store, &mut result);
        let rename_jobs = self.plan_renames(entries, folder, &mut result);
        result.tags_planned = tag_jobs.len();
        result.renames_planned = rename_jobs.len();

        let total = tag_jobs.len() + rename_jobs.len();
        progress(CommitEvent::Started { total });
        let mut done = 0;

        for job in &tag_jobs {
            if cancel.load(Ordering::Relaxed) {
                result.cancelled = true;
                break;
            }
            match store.write_tags(&job.path, &job.update) {
                Ok(()) => {
                    result.tags_written += 1;
                    self.journal
                        .info(format!("Tags written to {}", job.path.display()));
                }
                Err(err) => {
                    self.journal.warn(format!(
                        "Error: writing tags to {} failed: {}",
                        job.path.display(),
                        describe_tag_error(&err)
                    ));
                    result.fail(CommitFailure {
                        phase: CommitPhase::Tags,
                        original_path: job.path.clone(),
                        new_path: None,
                        reason: describe_tag_error(&err),
                    });
                }
            }
            done += 1;
            progress(CommitEvent::Step { done, total });
        }

        for job in &rename_jobs {
            if result.cancelled || cancel.load(Ordering::Relaxed) {
                result.cancelled = true;
                break;
            }
            match store.rename(&job.from, &job.to) {
                Ok(()) => {
                    result.files_renamed += 1;
                    self.journal.info(format!(
                        "File successfully renamed: {} renamed to {}",
                        job.from.display(),
                        job.to.display()
                    ));
                }
                Err(err) => {
                    let reason = describe_io(&err);
                    self.journal.warn(format!(
                        "Error: renaming {} to {} failed: {reason}",
                        job.from.display(),
                        job.to.display()
                    ));
                    result.fail(CommitFailure {
                        phase: CommitPhase::Rename,
                        original_path: job.from.clone(),
                        new_path: Some(job.to.clone()),
                        reason,
                    });
                }
            }
            done += 1;
            progress(CommitEvent::Step { done, total });
        }

        self.journal.info(format!(
            "Commit complete, {} of {} files renamed, {} of {} tag updates applied. Errors: {}",
            result.files_renamed,
            result.renames_planned,
            result.tags_written,
            result.tags_planned,
            result.errors
        ));
        progress(CommitEvent::Finished(result.clone()));
        result
    }

    /// Run the commit on a worker thread, streaming events over a channel.
    pub fn spawn<S>(
        self,
        entries: Vec<Entry>,
        folder: PathBuf,
        store: S,
        cancel: Arc<AtomicBool>,
    ) -> (JoinHandle<CommitResult>, Receiver<CommitEvent>)
    where
        S: Store + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel::<CommitEvent>();
        let handle = thread::spawn(move || {
            let mut forward = |event: CommitEvent| {
                let _ = event_tx.send(event);
            };
            self.commit(&entries, &folder, &store, &mut forward, &cancel)
        });
        (handle, event_rx)
    }

    fn plan_tags<S>(
        &self,
        entries: &[Entry],
        folder: &Path,
        store: &S,
        result: &mut CommitResult,
    ) -> Vec<TagJob>
    where
        S: Store + ?Sized,
    {
        let mut jobs = Vec::new();
        for entry in entries.iter().filter(|e| !e.is_divider()) {
            if entry.title.is_empty() && entry.artist.is_empty() {
                continue;
            }
            let path = folder.join(entry.original_file());
            let current = match store.read_tags(&path) {
                Ok(pair) => pair,
                Err(TagError::NoHeader) => TagPair::default(),
                Err(err) => {
                    let reason = describe_tag_error(&err);
                    self.journal
                        .warn(format!("Could not read tags of {}: {reason}", path.display()));
                    result.fail(CommitFailure {
                        phase: CommitPhase::Tags,
                        original_path: path,
                        new_path: None,
                        reason,
                    });
                    continue;
                }
            };
            let desired = TagPair::new(entry.title.as_str(), entry.artist.as_str());
            if let Some(update) = current.changes_toward(&desired) {
                jobs.push(TagJob { path, update });
            }
        }
        jobs
    }

    fn plan_renames(
        &self,
        entries: &[Entry],
        folder: &Path,
        result: &mut CommitResult,
    ) -> Vec<RenameJob> {
        let rows: Vec<&Entry> = entries.iter().filter(|e| !e.is_divider()).collect();
        let mut claimed: HashSet<String> = rows.iter().map(|e| e.original_file()).collect();

        let mut jobs = Vec::new();
        for entry in rows {
            let original = entry.original_file();
            let target = entry.candidate_file();
            if entry.candidate_name.trim().is_empty() {
                self.journal
                    .warn(format!("File \"{original}\" has a blank new name, not renamed"));
                result.skipped.push(SkippedRename {
                    original,
                    target,
                    reason: SkipReason::BlankName,
                });
                continue;
            }
            if target == original {
                continue;
            }
            if !claimed.insert(target.clone()) {
                self.journal.info(format!(
                    "File \"{original}\" can't be renamed to \"{target}\" since that name already exists"
                ));
                result.skipped.push(SkippedRename {
                    original,
                    target,
                    reason: SkipReason::Taken,
                });
                continue;
            }
            jobs.push(RenameJob {
                from: folder.join(&original),
                to: folder.join(&target),
            });
        }
        jobs
    }
}

fn describe_tag_error(err: &TagError) -> String {
    match err {
        TagError::Io(io_err) => describe_io(io_err),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::store::memory::MemoryStore;

    fn entry(original: &str, candidate: &str) -> Entry {
        Entry::new(original.into(), candidate.into(), "mp3".into())
    }

    fn tagged(original: &str, candidate: &str, title: &str, artist: &str) -> Entry {
        let mut entry = entry(original, candidate);
        entry.title = title.into();
        entry.artist = artist.into();
        entry
    }

    fn run(entries: &[Entry], store: &MemoryStore) -> (CommitResult, Vec<CommitEvent>) {
        let engine = CommitEngine::new(&Journal::memory());
        let mut events = Vec::new();
        let mut record = |event: CommitEvent| events.push(event);
        let result = engine.commit(
            entries,
            Path::new("music"),
            store,
            &mut record,
            &AtomicBool::new(false),
        );
        (result, events)
    }

    #[test]
    fn permission_error_is_isolated() {
        let mut store = MemoryStore::with_files(&["a.mp3", "b.mp3", "c.mp3"]);
        store.deny_rename.push("b.mp3".into());
        let entries = vec![
            entry("a", "A"),
            entry("b", "B"),
            entry("c", "C"),
            Entry::divider(),
        ];
        let (result, _) = run(&entries, &store);
        assert_eq!(result.renames_planned, 3);
        assert_eq!(result.files_renamed, 2);
        assert_eq!(result.errors, 1);
        assert_eq!(result.failures[0].phase, CommitPhase::Rename);
        assert_eq!(result.failures[0].original_path, Path::new("music").join("b.mp3"));
        assert!(result.failures[0].reason.contains("permission denied"));
        assert_eq!(store.names(), ["A.mp3", "C.mp3", "b.mp3"]);
    }

    #[test]
    fn unchanged_rows_do_nothing() {
        let store = MemoryStore::with_files(&["a.mp3"]).tag("a.mp3", TagPair::new("T", "R"));
        let entries = vec![tagged("a", "a", "T", "R"), Entry::divider()];
        let (result, events) = run(&entries, &store);
        assert_eq!(result.tags_planned, 0);
        assert_eq!(result.renames_planned, 0);
        assert_eq!(result.errors, 0);
        assert!(store.renames.borrow().is_empty());
        assert!(store.tag_writes.borrow().is_empty());
        assert_eq!(events.first(), Some(&CommitEvent::Started { total: 0 }));
        assert!(matches!(events.last(), Some(CommitEvent::Finished(_))));
    }

    #[test]
    fn ticks_cover_tags_then_renames() {
        let store = MemoryStore::with_files(&["a.mp3", "b.mp3"]);
        let entries = vec![
            tagged("a", "A - X", "X", "A"),
            entry("b", "B"),
            Entry::divider(),
        ];
        let (result, events) = run(&entries, &store);
        assert_eq!(result.tags_planned, 1);
        assert_eq!(result.tags_written, 1);
        assert_eq!(result.files_renamed, 2);
        assert_eq!(
            &events[..4],
            &[
                CommitEvent::Started { total: 3 },
                CommitEvent::Step { done: 1, total: 3 },
                CommitEvent::Step { done: 2, total: 3 },
                CommitEvent::Step { done: 3, total: 3 },
            ]
        );
        assert_eq!(events.len(), 5);
        // Tags go to the file under its old name, before it moves.
        assert_eq!(*store.tag_writes.borrow(), ["a.mp3"]);
        assert_eq!(
            store.files.borrow().get("A - X.mp3").cloned().flatten(),
            Some(TagPair::new("X", "A"))
        );
    }

    #[test]
    fn only_changed_tag_fields_are_written() {
        let store = MemoryStore::with_files(&["a.mp3"]).tag("a.mp3", TagPair::new("Same", "Old"));
        let entries = vec![tagged("a", "a", "Same", "New"), Entry::divider()];
        let (result, _) = run(&entries, &store);
        assert_eq!(result.tags_written, 1);
        assert_eq!(
            store.files.borrow().get("a.mp3").cloned().flatten(),
            Some(TagPair::new("Same", "New"))
        );
    }

    #[test]
    fn claimed_target_is_skipped() {
        let store = MemoryStore::with_files(&["a.mp3", "b.mp3"]);
        let entries = vec![entry("a", "b"), entry("b", "x"), Entry::divider()];
        let (result, _) = run(&entries, &store);
        assert_eq!(
            result.skipped,
            vec![SkippedRename {
                original: "a.mp3".into(),
                target: "b.mp3".into(),
                reason: SkipReason::Taken,
            }]
        );
        assert_eq!(result.renames_planned, 1);
        assert_eq!(store.names(), ["a.mp3", "x.mp3"]);
        assert!(result.summary().contains("1 renames skipped"));
    }

    #[test]
    fn blank_names_are_reported_not_renamed() {
        let store = MemoryStore::with_files(&["Lyrics.mp3", "Video.mp3"]);
        let entries = vec![entry("Lyrics", "  "), entry("Video", "Clip"), Entry::divider()];
        let (result, _) = run(&entries, &store);
        assert_eq!(result.renames_planned, 1);
        assert_eq!(result.skipped_for(SkipReason::BlankName), 1);
        assert_eq!(result.skipped[0].original, "Lyrics.mp3");
        assert!(result.summary().contains("1 renames skipped because the new name was blank"));
        assert_eq!(store.names(), ["Clip.mp3", "Lyrics.mp3"]);
    }

    #[test]
    fn broken_tags_are_a_failure_not_a_plan() {
        let mut store = MemoryStore::with_files(&["a.mp3", "b.mp3"]);
        store.broken_tags.push("a.mp3".into());
        store.deny_tags.push("b.mp3".into());
        let entries = vec![
            tagged("a", "a", "T", "R"),
            tagged("b", "b", "T", "R"),
            Entry::divider(),
        ];
        let (result, _) = run(&entries, &store);
        assert_eq!(result.tags_planned, 1);
        assert_eq!(result.tags_written, 0);
        assert_eq!(result.errors, 2);
        assert!(result.failures.iter().all(|f| f.phase == CommitPhase::Tags));
    }

    #[test]
    fn cancellation_stops_remaining_items() {
        let store = MemoryStore::with_files(&["a.mp3", "b.mp3"]);
        let entries = vec![entry("a", "A"), entry("b", "B"), Entry::divider()];
        let engine = CommitEngine::new(&Journal::memory());
        let cancel = AtomicBool::new(false);
        let mut steps = 0;
        let mut on_event = |event: CommitEvent| {
            if matches!(event, CommitEvent::Step { .. }) {
                steps += 1;
                cancel.store(true, Ordering::Relaxed);
            }
        };
        let result = engine.commit(&entries, Path::new("music"), &store, &mut on_event, &cancel);
        assert!(result.cancelled);
        assert_eq!(result.files_renamed, 1);
        assert_eq!(steps, 1);
    }

    #[test]
    fn worker_thread_reports_over_channel() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("old.mp3"), b"x").expect("write");
        let entries = vec![entry("old", "New"), Entry::divider()];
        let engine = CommitEngine::new(&Journal::memory());
        let (handle, events) = engine.spawn(
            entries,
            dir.path().to_path_buf(),
            crate::store::DiskStore::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let events: Vec<_> = events.iter().collect();
        let result = handle.join().expect("worker");
        assert_eq!(result.files_renamed, 1);
        assert_eq!(events.last(), Some(&CommitEvent::Finished(result)));
        assert!(dir.path().join("New.mp3").exists());
        assert_eq!(
            std::fs::metadata(dir.path().join("old.mp3")).map_err(|e| e.kind()).err(),
            Some(io::ErrorKind::NotFound)
        );
    }
}
