use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Error, anyhow};
use regex::Regex;
use serde::Deserialize;

use crate::filter::{SEPARATOR, is_well_formed};

static PARENTHESES_GROUP: LazyLock<Regex> = LazyLock::new(|| re(r" *\([^)]*\) *"));
static PARENTHESES: LazyLock<Regex> = LazyLock::new(|| re(r"[()]"));
static BRACKETS_GROUP: LazyLock<Regex> = LazyLock::new(|| re(r" *\[[^\]]*\] *"));
static BRACKETS: LazyLock<Regex> = LazyLock::new(|| re(r"[\[\]]"));
static NUMBERS: LazyLock<Regex> = LazyLock::new(|| re(r"[0-9]"));
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| re(r#"[.,'"]"#));

fn re(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => unreachable!("built-in pattern {pattern:?} is valid: {err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchAction {
    KeepOriginal,
    RemoveParentheses,
    RemoveBrackets,
    RemoveNumbers,
    RemovePunctuation,
    SwapArtistTitleOrder,
    MarkCheckedOut,
    TagFromCandidate,
}

impl BatchAction {
    pub const ALL: [BatchAction; 8] = [
        BatchAction::KeepOriginal,
        BatchAction::RemoveParentheses,
        BatchAction::RemoveBrackets,
        BatchAction::RemoveNumbers,
        BatchAction::RemovePunctuation,
        BatchAction::SwapArtistTitleOrder,
        BatchAction::MarkCheckedOut,
        BatchAction::TagFromCandidate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BatchAction::KeepOriginal => "keep-original",
            BatchAction::RemoveParentheses => "remove-parentheses",
            BatchAction::RemoveBrackets => "remove-brackets",
            BatchAction::RemoveNumbers => "remove-numbers",
            BatchAction::RemovePunctuation => "remove-punctuation",
            BatchAction::SwapArtistTitleOrder => "swap-artist-title-order",
            BatchAction::MarkCheckedOut => "mark-checked-out",
            BatchAction::TagFromCandidate => "tag-from-candidate",
        }
    }

    /// Candidate text after the action, before tidying. `original` is the file stem.
    pub fn rewrite(self, candidate: &str, original: &str) -> String {
        match self {
            BatchAction::KeepOriginal => original.to_string(),
            BatchAction::RemoveParentheses => {
                let text = PARENTHESES_GROUP.replace_all(candidate, " ");
                PARENTHESES.replace_all(&text, "").into_owned()
            }
            BatchAction::RemoveBrackets => {
                let text = BRACKETS_GROUP.replace_all(candidate, " ");
                BRACKETS.replace_all(&text, "").into_owned()
            }
            BatchAction::RemoveNumbers => NUMBERS.replace_all(candidate, "").into_owned(),
            BatchAction::RemovePunctuation => PUNCTUATION.replace_all(candidate, "").into_owned(),
            BatchAction::SwapArtistTitleOrder => match split_artist_title(candidate) {
                Some((artist, title)) => format!("{title}{SEPARATOR}{artist}"),
                None => candidate.to_string(),
            },
            BatchAction::MarkCheckedOut | BatchAction::TagFromCandidate => candidate.to_string(),
        }
    }
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BatchAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        BatchAction::ALL
            .into_iter()
            .find(|action| action.name() == wanted)
            .ok_or_else(|| anyhow!("unknown action '{s}'"))
    }
}

/// `(artist, title)` for a well-formed name.
pub fn split_artist_title(name: &str) -> Option<(&str, &str)> {
    if !is_well_formed(name) {
        return None;
    }
    name.split_once(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tidy;

    #[test]
    fn remove_numbers_keeps_spacing_until_tidied() {
        let raw = BatchAction::RemoveNumbers.rewrite("Track 01 - Song 2", "x");
        assert_eq!(raw, "Track  - Song ");
        assert_eq!(tidy(&raw), "Track - Song");
    }

    #[test]
    fn parentheses_and_brackets() {
        assert_eq!(
            tidy(&BatchAction::RemoveParentheses.rewrite("A - B (Remix) C", "")),
            "A - B C"
        );
        assert_eq!(
            tidy(&BatchAction::RemoveParentheses.rewrite("A - B (open", "")),
            "A - B open"
        );
        assert_eq!(
            tidy(&BatchAction::RemoveBrackets.rewrite("[HQ] A - B [x]", "")),
            "A - B"
        );
    }

    #[test]
    fn punctuation_removed() {
        assert_eq!(
            BatchAction::RemovePunctuation.rewrite("Mr. A, \"B's\" - C", ""),
            "Mr A Bs - C"
        );
    }

    #[test]
    fn swap_only_when_well_formed() {
        assert_eq!(
            BatchAction::SwapArtistTitleOrder.rewrite("Song - Artist", ""),
            "Artist - Song"
        );
        assert_eq!(
            BatchAction::SwapArtistTitleOrder.rewrite("A - B - C", ""),
            "A - B - C"
        );
    }

    #[test]
    fn keep_original_uses_stem() {
        assert_eq!(BatchAction::KeepOriginal.rewrite("New", "old name"), "old name");
    }

    #[test]
    fn parses_names() {
        assert_eq!(
            "remove_numbers".parse::<BatchAction>().expect("parse"),
            BatchAction::RemoveNumbers
        );
        assert!("explode".parse::<BatchAction>().is_err());
        for action in BatchAction::ALL {
            assert_eq!(action.name().parse::<BatchAction>().expect("round"), action);
        }
    }
}
