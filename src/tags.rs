//! Title/artist access over ID3 tags.
//!
//! WAV files keep their tag in a RIFF chunk; everything else gets a plain ID3v2 header.

use std::path::Path;

use id3::{Tag, TagLike, Version};
use serde::Serialize;

use crate::error::TagError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagPair {
    pub title: String,
    pub artist: String,
}

impl TagPair {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Fields of `desired` that are set and differ from `self`, or `None` when nothing changes.
    pub fn changes_toward(&self, desired: &TagPair) -> Option<TagUpdate> {
        let title = (!desired.title.is_empty() && desired.title != self.title)
            .then(|| desired.title.clone());
        let artist = (!desired.artist.is_empty() && desired.artist != self.artist)
            .then(|| desired.artist.clone());
        if title.is_none() && artist.is_none() {
            None
        } else {
            Some(TagUpdate { title, artist })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn read_tag(path: &Path) -> Result<Tag, TagError> {
    let tag = if is_wav(path) {
        Tag::read_from_wav_path(path)?
    } else {
        Tag::read_from_path(path)?
    };
    Ok(tag)
}

pub fn read_pair(path: &Path) -> Result<TagPair, TagError> {
    let tag = read_tag(path)?;
    Ok(TagPair {
        title: tag.title().map(str::to_owned).unwrap_or_default(),
        artist: tag.artist().map(str::to_owned).unwrap_or_default(),
    })
}

pub fn write_update(path: &Path, update: &TagUpdate) -> Result<(), TagError> {
    // Load existing tag if possible; otherwise start fresh.
    let mut tag = match read_tag(path) {
        Ok(tag) => tag,
        Err(TagError::NoHeader) => Tag::new(),
        Err(err) => return Err(err),
    };

    if let Some(title) = &update.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &update.artist {
        tag.set_artist(artist.clone());
    }

    if is_wav(path) {
        tag.write_to_wav_path(path, Version::Id3v24)?;
    } else {
        tag.write_to_path(path, Version::Id3v24)?;
    }
    Ok(())
}
