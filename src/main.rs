use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
use serde_json::json;

mod actions;
mod collision;
mod commit;
mod config;
mod entry;
mod error;
mod filter;
mod history;
mod logging;
mod planner;
mod preview;
mod script;
mod session;
mod store;
mod tags;

use actions::BatchAction;
use commit::{CommitEngine, CommitEvent, CommitResult};
use config::Settings;
use entry::Entry;
use filter::NameFilter;
use logging::{Journal, Level};
use planner::{PlanOptions, Planner};
use session::Session;
use store::{DiskStore, Store};

/// Folders with more files than this get a warning when no limit is set.
const LARGE_FOLDER: usize = 500;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(Settings::default_path);
    let settings = if cli.reset_settings {
        Settings::default()
    } else {
        Settings::load(&settings_path)?
    };

    match cli.command {
        Command::Rename(cmd) => handle_rename(cmd, settings, &settings_path)?,
        Command::Log(cmd) => handle_log(cmd, &settings)?,
        Command::Settings(cmd) => handle_settings(cmd, settings, &settings_path)?,
    }

    Ok(())
}

/// Flags win over saved settings.
struct ScanPlan {
    folder: PathBuf,
    limit: Option<usize>,
    exclude: Vec<String>,
}

impl ScanPlan {
    fn resolve(args: &ScanArgs, settings: &Settings) -> Self {
        Self {
            folder: args
                .folder
                .clone()
                .or_else(|| settings.folder.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            limit: args.limit.or(settings.limit),
            exclude: if args.exclude.is_empty() {
                settings.exclude.clone()
            } else {
                args.exclude.clone()
            },
        }
    }

    fn scan(&self, filter: &NameFilter, journal: &Journal) -> Result<(Vec<Entry>, usize)> {
        let store = DiskStore::new(&self.exclude)?;
        let listing = store
            .list_directory(&self.folder)
            .with_context(|| format!("scanning {}", self.folder.display()))?;
        let planner = Planner::new(filter, journal);
        let options = PlanOptions { limit: self.limit };
        let entries = planner.plan(&listing, &options, |name| {
            store.read_tags(&self.folder.join(name))
        });
        Ok((entries, listing.len()))
    }
}

fn open_journal(settings: &Settings, verbose: bool) -> Journal {
    let echo = if verbose { Level::Debug } else { Level::Warn };
    Journal::file(settings.log_path()).echo(echo)
}

fn handle_rename(cmd: RenameCommand, mut settings: Settings, settings_path: &Path) -> Result<()> {
    let colorize = cmd.color.should_color() && !cmd.json;
    let plan = ScanPlan::resolve(&cmd.scan, &settings);
    let journal = open_journal(&settings, cmd.verbose);
    let filter = settings.name_filter()?;

    let (entries, listed) = plan.scan(&filter, &journal)?;
    if listed > LARGE_FOLDER && plan.limit.is_none() {
        eprintln!(
            "warning: {} contains {listed} entries; pass --limit N to load only the newest files.",
            plan.folder.display()
        );
    }
    let mut session = Session::new(entries, &journal);

    for action in &cmd.actions {
        let targets = session.rows().ids().to_vec();
        let outcome = session.apply_action(*action, &targets)?;
        if !cmd.json {
            println!("{action}: {} row(s) changed", outcome.changed);
        }
        for (_, err) in &outcome.rejected {
            eprintln!("{action}: kept a row unchanged: {err}");
        }
    }

    if let Some(path) = &cmd.script {
        let script = script::load_script(path)?;
        for report in script::run_script(&script, &mut session) {
            if cmd.json {
                println!("{}", json!({ "event": "script_step", "report": report }));
                continue;
            }
            if !report.message.is_empty() {
                println!("step {} ({}): {}", report.step, report.op, report.message);
            }
            for err in &report.errors {
                eprintln!("step {} ({}): {err}", report.step, report.op);
            }
        }
    }

    if !cmd.json && session.history().undo_len() > 0 {
        println!(
            "edit history: {} step(s) to undo, {} to redo",
            session.history().undo_len(),
            session.history().redo_len()
        );
    }
    print_preview(&session, colorize, cmd.json);

    settings.folder = Some(plan.folder.clone());
    if !cmd.apply {
        if !cmd.json {
            println!("dry-run: rerun with --apply to commit these changes.");
        }
        return settings.save(settings_path);
    }

    let stats = preview::stats(session.rows());
    if !cmd.yes && !prompt_approval(&plan.folder, stats.renames, stats.tagged)? {
        println!("commit cancelled.");
        return settings.save(settings_path);
    }

    let snapshot = session.begin_commit()?;
    let result = run_commit(&plan, snapshot, &journal, cmd.json)?;
    if cmd.json {
        println!("{}", json!({ "event": "summary", "text": result.summary() }));
    } else {
        println!("{}", result.summary());
        for failure in &result.failures {
            eprintln!(
                "  failed: {}: {}",
                failure.original_path.display(),
                failure.reason
            );
        }
    }

    let (entries, listed) = plan.scan(&filter, &journal)?;
    session.rebuild(entries);
    if !cmd.json {
        println!(
            "rescanned {}: {} file(s) listed, {} loaded.",
            plan.folder.display(),
            listed,
            session.rows().len().saturating_sub(1)
        );
    }

    settings.save(settings_path)
}

fn run_commit(
    plan: &ScanPlan,
    snapshot: Vec<Entry>,
    journal: &Journal,
    json: bool,
) -> Result<CommitResult> {
    let store = DiskStore::new(&plan.exclude)?;
    let engine = CommitEngine::new(journal);
    let cancel = Arc::new(AtomicBool::new(false));
    let (handle, events) = engine.spawn(snapshot, plan.folder.clone(), store, cancel);

    for event in events {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            CommitEvent::Started { total } => println!("committing {total} item(s)..."),
            CommitEvent::Step { done, total } => {
                print!("\r[{done}/{total}]");
                io::stdout().flush()?;
            }
            CommitEvent::Finished(_) => println!(),
        }
    }

    handle
        .join()
        .map_err(|_| anyhow!("commit worker stopped unexpectedly"))
}

fn print_preview(session: &Session, colorize: bool, json: bool) {
    if json {
        for view in preview::row_views(session.rows()) {
            println!("{}", json!({ "event": "row", "row": view }));
        }
        return;
    }

    println!("--- preview ---");
    for line in preview::render_rows(session.rows(), colorize) {
        println!("{line}");
    }
    let stats = preview::stats(session.rows());
    println!(
        "{} row(s): {} rename(s), {} with tags, {} not in 'artist - title' form",
        stats.rows, stats.renames, stats.tagged, stats.malformed
    );
}

fn prompt_approval(folder: &Path, renames: usize, tagged: usize) -> Result<bool> {
    loop {
        print_prompt(&format!(
            "Commit {renames} rename(s) and tags for {tagged} file(s) in {}? [y]es/[n]o: ",
            folder.display()
        ))?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => {
                println!("Please enter y or n.");
            }
        }
    }
}

fn print_prompt(message: &str) -> Result<()> {
    print!("{message}");
    io::stdout().flush()?;
    Ok(())
}

fn handle_log(cmd: LogCommand, settings: &Settings) -> Result<()> {
    let records = logging::read_recent(&settings.log_path(), cmd.tail)?;
    if records.is_empty() {
        println!("rename log is empty.");
        return Ok(());
    }
    for record in records {
        println!(
            "[{}] {:<7} {:<15} {}",
            record.timestamp, record.level, record.component, record.message
        );
    }
    Ok(())
}

fn handle_settings(cmd: SettingsCommand, mut settings: Settings, settings_path: &Path) -> Result<()> {
    let mut changed = false;
    if let Some(folder) = cmd.folder {
        settings.folder = Some(folder);
        changed = true;
    }
    if let Some(limit) = cmd.limit {
        settings.limit = Some(limit);
        changed = true;
    }
    if cmd.clear_limit {
        settings.limit = None;
        changed = true;
    }
    if !cmd.exclude.is_empty() {
        settings.exclude = cmd.exclude;
        changed = true;
    }
    if cmd.write_filter {
        settings = settings.with_default_filter();
        changed = true;
    }
    // Refuse to save a table the filter would reject.
    settings.name_filter()?;

    if changed {
        settings.save(settings_path)?;
        println!("saved {}", settings_path.display());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "tagger", version, about = "Batch rename and tag audio files")]
struct Cli {
    /// Settings file; defaults to .tagger/settings.json.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,
    /// Ignore saved settings for this run.
    #[arg(long = "reset-settings", global = true, action = ArgAction::SetTrue)]
    reset_settings: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan new names for a folder, preview them and optionally commit.
    Rename(RenameCommand),
    /// Show the newest rename log records.
    Log(LogCommand),
    /// Show or update saved settings.
    Settings(SettingsCommand),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    folder: Option<PathBuf>,
    /// Load only the N newest files.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
}

#[derive(Debug, Args)]
struct RenameCommand {
    #[command(flatten)]
    scan: ScanArgs,
    /// Batch action applied to every row, in order, before the script.
    #[arg(long = "action", value_name = "ACTION")]
    actions: Vec<BatchAction>,
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    script: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    apply: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    yes: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
    #[arg(long, short, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(long = "tail", default_value_t = 20)]
    tail: usize,
}

#[derive(Debug, Args)]
struct SettingsCommand {
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    folder: Option<PathBuf>,
    #[arg(long, value_name = "N", conflicts_with = "clear_limit")]
    limit: Option<usize>,
    #[arg(long = "clear-limit", action = ArgAction::SetTrue)]
    clear_limit: bool,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
    /// Store the built-in filter table so it can be edited.
    #[arg(long = "write-filter", action = ArgAction::SetTrue)]
    write_filter: bool,
}
