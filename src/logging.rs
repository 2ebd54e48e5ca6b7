use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const LOG_DIR: &str = ".tagger";
pub const LOG_FILE: &str = "rename_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARNING",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: Level,
    pub component: String,
    pub message: String,
}

#[derive(Debug)]
struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

#[derive(Debug, Clone)]
enum Sink {
    File(Arc<FileSink>),
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<LogRecord>>>),
}

/// Explicit logging handle. Cloning is cheap; clones share the same sink.
#[derive(Debug, Clone)]
pub struct Journal {
    sink: Sink,
    echo: Option<Level>,
    component: String,
}

impl Journal {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_sink(Sink::File(Arc::new(FileSink {
            path: path.into(),
            lock: Mutex::new(()),
        })))
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(LOG_DIR).join(LOG_FILE)
    }

    #[cfg(test)]
    pub fn memory() -> Self {
        Self::with_sink(Sink::Memory(Arc::new(Mutex::new(Vec::new()))))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            echo: None,
            component: "tagger".to_string(),
        }
    }

    /// Also print records at or above `level` to stderr.
    pub fn echo(mut self, level: Level) -> Self {
        self.echo = Some(level);
        self
    }

    pub fn scoped(&self, component: &str) -> Self {
        Self {
            sink: self.sink.clone(),
            echo: self.echo,
            component: format!("tagger.{component}"),
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.record(Level::Debug, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }

    /// Records captured by a memory journal.
    #[cfg(test)]
    pub fn records(&self) -> Vec<LogRecord> {
        match &self.sink {
            Sink::Memory(records) => records.lock().map(|r| r.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn record(&self, level: Level, message: String) {
        if self.echo.is_some_and(|min| level >= min) {
            eprintln!("{:<15}:{:<7}: {}", self.component, level, message);
        }
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = LogRecord {
            timestamp,
            level,
            component: self.component.clone(),
            message,
        };
        match &self.sink {
            #[cfg(test)]
            Sink::Memory(records) => {
                if let Ok(mut records) = records.lock() {
                    records.push(entry);
                }
            }
            Sink::File(sink) => {
                if level < Level::Info {
                    return;
                }
                let _guard = sink.lock.lock();
                let _ = append_record(&sink.path, &entry);
            }
        }
    }
}

fn append_record(log_path: &Path, entry: &LogRecord) -> Result<()> {
    if let Some(dir) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;
        }
    }
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("opening {log_path:?}"))?;
    writeln!(file, "{json}")?;
    truncate_log(log_path)?;
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    Ok(reader.lines().collect::<Result<_, _>>()?)
}

fn truncate_log(path: &Path) -> Result<()> {
    let lines = read_lines(path)?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

pub fn read_recent(path: &Path, tail: usize) -> Result<Vec<LogRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let lines = read_lines(path)?;
    let start = lines.len().saturating_sub(tail);
    Ok(lines[start..]
        .iter()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
