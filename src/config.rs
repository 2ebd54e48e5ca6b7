use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filter::{NameFilter, default_table};
use crate::logging::LOG_DIR;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder scanned when `--folder` is not given.
    pub folder: Option<PathBuf>,
    pub limit: Option<usize>,
    pub exclude: Vec<String>,
    /// Replacement table for the name filter; the built-in table when absent.
    pub filter: Option<BTreeMap<String, String>>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        PathBuf::from(LOG_DIR).join(SETTINGS_FILE)
    }

    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.exists()
        {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content + "\n").with_context(|| format!("writing {}", path.display()))
    }

    pub fn name_filter(&self) -> Result<NameFilter> {
        match &self.filter {
            Some(table) => NameFilter::new(table.clone()).context("invalid filter table in settings"),
            None => NameFilter::builtin(),
        }
    }

    /// Write the built-in table out so it can be edited by hand.
    pub fn with_default_filter(mut self) -> Self {
        if self.filter.is_none() {
            self.filter = Some(default_table());
        }
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(crate::logging::Journal::default_path)
    }
}
