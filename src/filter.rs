use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use regex::Regex;

pub const SEPARATOR: &str = " - ";

const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("(lyrics)", ""),
    ("(lyric)", ""),
    ("lyric", ""),
    ("music", ""),
    ("video", ""),
    (" hd", ""),
    ("lyrics", ""),
    ("audio", ""),
    ("with lyrics", ""),
    (" hq", ""),
    ("switching vocals", ""),
    ("→", " -"),
    ("  ", " "),
    ("_", ""),
    ("」", ""),
    ("「", ""),
    ("[animated]", ""),
    ("[ ~secret-nightcore~ edit ]", ""),
];

#[derive(Debug, Clone)]
pub struct NameFilter {
    table: BTreeMap<String, String>,
    matcher: Option<Regex>,
    trailing: Regex,
    leading: Regex,
    runs: Regex,
}

impl NameFilter {
    pub fn new(table: BTreeMap<String, String>) -> Result<Self> {
        let mut lowered = BTreeMap::new();
        for (key, value) in table {
            let key = key.to_lowercase();
            let value = value.to_lowercase();
            if key.is_empty() {
                continue;
            }
            if value.len() >= key.len() {
                return Err(anyhow!(
                    "filter replacement for '{key}' must be shorter than the text it replaces"
                ));
            }
            lowered.insert(key, value);
        }

        let mut keys: Vec<&String> = lowered.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let matcher = if keys.is_empty() {
            None
        } else {
            let pattern = keys
                .iter()
                .map(|key| regex::escape(key))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&pattern).map_err(|err| anyhow!("invalid filter table: {err}"))?)
        };

        Ok(Self {
            table: lowered,
            matcher,
            trailing: Regex::new(r" +[-.,/\\]* +$")?,
            leading: Regex::new(r"^ +")?,
            runs: Regex::new(r" +")?,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(default_table())
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.to_lowercase();
        // Every changing pass shortens the text, so this reaches a fixpoint.
        loop {
            let next = self.pass(&text);
            if next == text {
                return text;
            }
            text = next;
        }
    }

    fn pass(&self, text: &str) -> String {
        let replaced = match &self.matcher {
            Some(matcher) => matcher
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    self.table
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_default()
                })
                .into_owned(),
            None => text.to_string(),
        };
        let trimmed = self.trailing.replace(&replaced, "");
        let trimmed = self.leading.replace(&trimmed, "");
        self.runs.replace_all(&trimmed, " ").into_owned()
    }

    /// Lowercase, filter, capitalize and tidy: the candidate name for a raw file stem.
    ///
    /// Empty when nothing survives the filter.
    pub fn candidate(&self, stem: &str) -> String {
        tidy(&capitalize(&self.normalize(stem)))
    }
}

pub fn default_table() -> BTreeMap<String, String> {
    DEFAULT_TABLE
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn capitalize(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous: Option<char> = None;
    for ch in input.chars() {
        let upper = match previous {
            None => true,
            Some(prev) => matches!(prev, ' ' | '.' | '-' | '(' | ')' | '[' | ']'),
        };
        if upper {
            output.extend(ch.to_uppercase());
        } else {
            output.push(ch);
        }
        previous = Some(ch);
    }
    output
}

/// Leading spaces dropped, runs collapsed, trailing spaces dropped.
pub fn tidy(text: &str) -> String {
    text.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_well_formed(name: &str) -> bool {
    name.matches(SEPARATOR).count() == 1
}
