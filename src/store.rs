use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::TagError;
use crate::tags::{self, TagPair, TagUpdate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    /// The OS name was not UTF-8; `name` is a lossy rendering and cannot be renamed.
    pub lossy_name: bool,
    pub is_file: bool,
    pub created: SystemTime,
}

/// Filesystem and tag access used by planning and commit.
pub trait Store {
    fn list_directory(&self, folder: &Path) -> Result<Vec<ListedFile>>;
    fn read_tags(&self, path: &Path) -> Result<TagPair, TagError>;
    fn write_tags(&self, path: &Path, update: &TagUpdate) -> Result<(), TagError>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct DiskStore {
    exclude: Option<GlobSet>,
}

impl DiskStore {
    pub fn new(exclude_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            exclude: build_exclude_globs(exclude_patterns)?,
        })
    }
}

impl Store for DiskStore {
    fn list_directory(&self, folder: &Path) -> Result<Vec<ListedFile>> {
        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut listed = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("listing {}", folder.display()))?;
            let lossy_name = entry.file_name().to_str().is_none();
            let name = entry.file_name().to_string_lossy().into_owned();
            if self
                .exclude
                .as_ref()
                .is_some_and(|set| set.is_match(name.as_str()))
            {
                continue;
            }
            let metadata = entry
                .metadata()
                .with_context(|| format!("metadata for {}", entry.path().display()))?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            listed.push(ListedFile {
                name,
                lossy_name,
                is_file: metadata.is_file(),
                created,
            });
        }
        Ok(listed)
    }

    fn read_tags(&self, path: &Path) -> Result<TagPair, TagError> {
        tags::read_pair(path)
    }

    fn write_tags(&self, path: &Path, update: &TagUpdate) -> Result<(), TagError> {
        tags::write_update(path, update)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        // fs::rename replaces an existing destination on Unix.
        if to.exists() && !same_file(from, to) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        fs::rename(from, to)
    }
}

/// Case-only renames on case-insensitive filesystems see the destination as existing.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    let name = |p: &Path| p.file_name().and_then(|n| n.to_str()).map(str::to_lowercase);
    a.parent() == b.parent() && name(a).is_some() && name(a) == name(b)
}

fn build_exclude_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|err| anyhow!("invalid exclude glob '{pattern}': {err}"))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|err| anyhow!("unable to build exclude globs: {err}"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_top_level_only_and_honours_excludes() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("a.mp3"), b"a").expect("write a");
        fs::write(dir.path().join("skip.tmp"), b"t").expect("write tmp");
        fs::create_dir(dir.path().join("nested")).expect("nested dir");
        fs::write(dir.path().join("nested").join("b.mp3"), b"b").expect("write b");

        let store = DiskStore::new(&["*.tmp".to_string()]).expect("store");
        let listed = store.list_directory(dir.path()).expect("list");
        let names: Vec<_> = listed.iter().map(|f| (f.name.as_str(), f.is_file)).collect();
        assert_eq!(names, [("a.mp3", true), ("nested", false)]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_listed_as_lossy() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.mp3")), b"x").expect("write");
        fs::write(dir.path().join("good.mp3"), b"g").expect("write good");

        let listed = DiskStore::default().list_directory(dir.path()).expect("list");
        let flags: Vec<_> = listed.iter().map(|f| (f.name.as_str(), f.lossy_name)).collect();
        assert_eq!(flags, [("bad\u{fffd}.mp3", true), ("good.mp3", false)]);
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let dir = tempdir().expect("temp dir");
        let from = dir.path().join("a.mp3");
        let to = dir.path().join("b.mp3");
        fs::write(&from, b"a").expect("write a");
        fs::write(&to, b"b").expect("write b");

        let err = DiskStore::default().rename(&from, &to).expect_err("must refuse");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&to).expect("read b"), b"b");
    }

    #[test]
    fn invalid_exclude_glob_is_an_error() {
        assert!(DiskStore::new(&["[".to_string()]).is_err());
    }
}
