use std::cmp::Reverse;
use std::collections::HashSet;

use crate::collision::{full_name, resolve};
use crate::entry::Entry;
use crate::error::TagError;
use crate::filter::NameFilter;
use crate::logging::Journal;
use crate::store::ListedFile;
use crate::tags::TagPair;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg"];

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub limit: Option<usize>,
}

/// Split at the last `.`; `None` when there is no extension to speak of.
pub fn split_name(file_name: &str) -> Option<(&str, &str)> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some((stem, extension))
}

pub fn is_audio_extension(extension: &str) -> bool {
    AUDIO_EXTENSIONS
        .iter()
        .any(|known| extension.eq_ignore_ascii_case(known))
}

pub struct Planner<'a> {
    filter: &'a NameFilter,
    journal: Journal,
}

impl<'a> Planner<'a> {
    pub fn new(filter: &'a NameFilter, journal: &Journal) -> Self {
        Self {
            filter,
            journal: journal.scoped("planner"),
        }
    }

    /// Build the working set for a folder listing, newest files first, followed by a divider.
    ///
    /// `read_tags` gets the raw file name; missing tags are not an error.
    pub fn plan<F>(&self, listing: &[ListedFile], options: &PlanOptions, read_tags: F) -> Vec<Entry>
    where
        F: Fn(&str) -> Result<TagPair, TagError>,
    {
        let mut taken: HashSet<String> = listing.iter().map(|file| file.name.clone()).collect();

        let mut audio: Vec<&ListedFile> = Vec::new();
        for file in listing {
            if !file.is_file {
                self.journal.info(format!("Ignored folder: {}", file.name));
                continue;
            }
            if file.lossy_name {
                self.journal
                    .info(format!("Ignored file with a non UTF-8 name: {}", file.name));
                continue;
            }
            match split_name(&file.name) {
                Some((_, extension)) if is_audio_extension(extension) => audio.push(file),
                Some(_) => self
                    .journal
                    .debug(format!("Ignored unsupported file: {}", file.name)),
                None => self
                    .journal
                    .info(format!("No extension found for {}", file.name)),
            }
        }

        audio.sort_by(|a, b| {
            Reverse(a.created)
                .cmp(&Reverse(b.created))
                .then_with(|| a.name.cmp(&b.name))
        });
        if let Some(limit) = options.limit {
            audio.truncate(limit);
        }

        let mut entries = Vec::with_capacity(audio.len() + 1);
        for file in audio {
            let Some((stem, extension)) = split_name(&file.name) else {
                continue;
            };

            let mut candidate = self.filter.candidate(stem);
            if candidate.is_empty() {
                self.journal
                    .info(format!("Nothing left of {} after filtering, keeping its name", file.name));
                candidate = stem.to_string();
            }
            let resolution = resolve(&candidate, extension, &file.name, &taken);
            if resolution.suffixed {
                self.journal
                    .info(format!("New name already exists for {}", full_name(&candidate, extension)));
            }
            taken.insert(full_name(&resolution.name, extension));

            let mut entry = Entry::new(
                stem.to_string(),
                resolution.name,
                extension.to_string(),
            );
            if resolution.suffixed {
                entry.mark_suffixed();
            }

            match read_tags(&file.name) {
                Ok(pair) => {
                    entry.title = pair.title;
                    entry.artist = pair.artist;
                }
                Err(TagError::NoHeader) => {
                    self.journal.debug(format!("{} has no tag header", file.name));
                }
                Err(err) => {
                    self.journal
                        .warn(format!("Error happened when fetching metadata for {}: {err}", file.name));
                }
            }

            entries.push(entry);
        }

        self.journal.info(format!(
            "Planned {} of {} listed files",
            entries.len(),
            listing.len()
        ));
        entries.push(Entry::divider());
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::entry::RowState;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;

    fn plan_store(store: &MemoryStore, limit: Option<usize>) -> Vec<Entry> {
        let filter = NameFilter::builtin().expect("filter");
        let journal = Journal::memory();
        let planner = Planner::new(&filter, &journal);
        let listing = store.list_directory(Path::new(".")).expect("listing");
        planner.plan(&listing, &PlanOptions { limit }, |name| {
            store.read_tags(Path::new(name))
        })
    }

    #[test]
    fn skips_unsupported_and_appends_divider() {
        let store = MemoryStore::with_files(&["a.mp3", "notes.txt", "README", "b.FLAC"]);
        let entries = plan_store(&store, None);
        let names: Vec<_> = entries.iter().map(|e| e.original_name.as_str()).collect();
        assert_eq!(names, ["a", "b", ""]);
        assert_eq!(entries.last().map(|e| e.state), Some(RowState::Divider));
        assert_eq!(entries[1].extension, "FLAC");
    }

    #[test]
    fn lossy_names_are_skipped_and_logged() {
        let filter = NameFilter::builtin().expect("filter");
        let journal = Journal::memory();
        let planner = Planner::new(&filter, &journal);
        let listing = vec![
            ListedFile {
                name: "bad\u{fffd}.mp3".into(),
                lossy_name: true,
                is_file: true,
                created: std::time::SystemTime::UNIX_EPOCH,
            },
            ListedFile {
                name: "good.mp3".into(),
                lossy_name: false,
                is_file: true,
                created: std::time::SystemTime::UNIX_EPOCH,
            },
        ];
        let entries = planner.plan(&listing, &PlanOptions::default(), |_| Err(TagError::NoHeader));
        let names: Vec<_> = entries.iter().map(|e| e.original_name.as_str()).collect();
        assert_eq!(names, ["good", ""]);
        assert!(
            journal
                .records()
                .iter()
                .any(|record| record.message.contains("non UTF-8 name"))
        );
    }

    #[test]
    fn newest_first_and_limit() {
        let store = MemoryStore::with_files(&["old.mp3", "new.mp3", "mid.mp3"])
            .created_at("old.mp3", 10)
            .created_at("mid.mp3", 20)
            .created_at("new.mp3", 30);
        let entries = plan_store(&store, Some(2));
        let names: Vec<_> = entries.iter().map(|e| e.original_name.as_str()).collect();
        assert_eq!(names, ["new", "mid", ""]);
    }

    #[test]
    fn collision_gets_suffix_and_flag() {
        let store = MemoryStore::with_files(&["Song.mp3", "song (lyrics).mp3"]);
        let entries = plan_store(&store, None);
        let song = entries
            .iter()
            .find(|e| e.original_name == "Song")
            .expect("Song entry");
        let lyrics = entries
            .iter()
            .find(|e| e.original_name == "song (lyrics)")
            .expect("lyrics entry");
        assert_eq!(song.candidate_name, "Song");
        assert_eq!(lyrics.candidate_name, "Song (1)");
        assert!(!lyrics.well_formed);
    }

    #[test]
    fn plan_is_collision_free_and_deterministic() {
        let files = [
            "A - B video.mp3",
            "a - b.mp3",
            "A - B (lyrics).mp3",
            "a - b audio.mp3",
            "A - B (1).mp3",
            "a - b.ogg",
            "x.txt",
        ];
        let store = MemoryStore::with_files(&files);
        let first = plan_store(&store, None);
        let second = plan_store(&store, None);
        assert_eq!(first, second);

        let mut seen = HashSet::new();
        for entry in first.iter().filter(|e| !e.is_divider()) {
            assert!(
                seen.insert(entry.candidate_file()),
                "duplicate {}",
                entry.candidate_file()
            );
        }
    }

    #[test]
    fn blank_candidates_keep_the_original_stem() {
        let store = MemoryStore::with_files(&["Lyrics.mp3", "Video.mp3"]);
        let entries = plan_store(&store, None);
        let pairs: Vec<_> = entries
            .iter()
            .filter(|e| !e.is_divider())
            .map(|e| (e.original_name.as_str(), e.candidate_name.as_str()))
            .collect();
        assert_eq!(pairs, [("Lyrics", "Lyrics"), ("Video", "Video")]);
        assert!(entries.iter().all(|e| e.suffixed_candidate.is_none()));
    }

    #[test]
    fn trailing_space_is_not_planned() {
        let store = MemoryStore::with_files(&["a - b video.mp3", "Song Video.mp3"]);
        let entries = plan_store(&store, None);
        let candidates: Vec<_> = entries.iter().map(|e| e.candidate_name.as_str()).collect();
        assert_eq!(candidates, ["Song", "A - B", ""]);
    }

    #[test]
    fn tags_are_read_and_missing_tags_are_empty() {
        let store = MemoryStore::with_files(&["x.mp3", "y.mp3"])
            .tag("x.mp3", TagPair::new("Song", "Artist"));
        let entries = plan_store(&store, None);
        assert_eq!(entries[0].title, "Song");
        assert_eq!(entries[0].artist, "Artist");
        assert_eq!(entries[1].title, "");
    }

    #[test]
    fn example_name_is_cleaned() {
        let store = MemoryStore::with_files(&["Artist - Song (Lyrics) Video.mp3"]);
        let entries = plan_store(&store, None);
        assert_eq!(entries[0].candidate_name, "Artist - Song");
        assert!(entries[0].well_formed);
    }
}
