use std::{
    fs,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::BufReader;

mod config;
mod error;
mod first_seen;
mod logs;
mod model;
mod operator;
mod poller;
mod scan;
mod session_log;
mod table;
mod timestamp;
mod tracker;

use config::Config;
use scan::{CommandSource, JsonLinesSource, ScanSource};
use session_log::SessionLog;
use table::LiveTable;
use timestamp::{Clock, SystemClock};
use tracker::{BatchSummary, Tracker};

#[derive(Debug, Parser)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the radio and log every cell seen
    Listen {
        /// Read one JSON batch per line from this file instead of stdin
        #[arg(short, long, conflicts_with = "command")]
        input: Option<PathBuf>,
        /// Stop after this many successful polls
        #[arg(short = 'n', long)]
        passes: Option<u64>,
        /// Do not print the cell table after every poll
        #[arg(short, long)]
        quiet: bool,
        /// Program (and arguments) run once per poll, printing a JSON batch
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Manage recorded log files
    #[clap(subcommand)]
    Logs(LogsCommand),
}

#[derive(Debug, Subcommand)]
enum LogsCommand {
    List,
    /// Print a log, the current session's if none is given
    Show { file: Option<String> },
    /// Copy logs into a directory, all of them if none are given
    Export { dest: PathBuf, files: Vec<String> },
    Delete {
        #[arg(long, conflicts_with = "files")]
        all: bool,
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Listen {
            input,
            passes,
            quiet,
            command,
        } => {
            if let Some((program, args)) = command.split_first() {
                let source = CommandSource::new(program, args.to_vec());
                listen(&config, source, passes, quiet).await?
            } else if let Some(path) = input {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let source = JsonLinesSource::new(BufReader::new(file));
                listen(&config, source, passes, quiet).await?
            } else {
                let source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
                listen(&config, source, passes, quiet).await?
            }
        }
        Command::Logs(command) => run_logs(&config.log_dir, command)?,
    };

    Ok(())
}

async fn listen<S: ScanSource>(
    config: &Config,
    mut source: S,
    passes: Option<u64>,
    quiet: bool,
) -> Result<()> {
    let store = first_seen::open_or_in_memory(&config.first_seen_path);
    let clock = SystemClock;
    let started = clock.now();

    let mut tracker = Tracker::new(store, Box::new(clock))
        .with_first_seen_key(config.first_seen_key);
    match SessionLog::create(&config.log_dir, &started) {
        Ok(log) => {
            info!("logging to {}", log.path().display());
            tracker = tracker.with_log(log);
        }
        Err(e) => warn!("{e}, cells will not be logged this session"),
    }

    let mut poll_config = config.poller();
    poll_config.max_passes = passes;

    let mut live = LiveTable::new(io::stdout().is_terminal());
    let on_pass = |tracker: &Tracker, _: &BatchSummary| {
        if !quiet {
            live.show(&mut io::stdout().lock(), &tracker.snapshot());
        }
    };

    tokio::select! {
        summary = poller::run(&mut source, &mut tracker, &poll_config, on_pass) => {
            info!(
                "{} polls, {} failed, {} new cells, {} updates",
                summary.passes, summary.failures, summary.new, summary.updated
            );
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    info!("{} distinct cells this session", tracker.registry().len());
    Ok(())
}

fn run_logs(dir: &Path, command: LogsCommand) -> Result<()> {
    match command {
        LogsCommand::List => {
            for log in logs::list_logs(dir)? {
                let modified: DateTime<Local> = log.modified.into();
                println!(
                    "{}\t{} bytes\t{}",
                    log.name(),
                    log.size,
                    timestamp::format_timestamp(&modified.fixed_offset())
                );
            }
        }
        LogsCommand::Show { file } => {
            let path = match file {
                Some(x) => logs::resolve(dir, &[x]).remove(0),
                None => match logs::latest_log(dir)? {
                    Some(x) => x.path,
                    None => bail!("No log files in {}", dir.display()),
                },
            };
            let data = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print!("{data}");
            let rows = logs::read_log(&path)?;
            eprintln!("{} cells in {}", rows.len(), path.display());
        }
        LogsCommand::Export { dest, files } => {
            let files = if files.is_empty() {
                all_logs(dir)?
            } else {
                logs::resolve(dir, &files)
            };
            let count = logs::export_logs(&files, &dest)?;
            println!("exported {count} log files to {}", dest.display());
        }
        LogsCommand::Delete { all, files } => {
            let files = match (all, files.is_empty()) {
                (true, _) => all_logs(dir)?,
                (false, false) => logs::resolve(dir, &files),
                (false, true) => bail!("Name the log files to delete or pass --all"),
            };
            let count = logs::delete_logs(&files)?;
            println!("deleted {count} log files");
        }
    }

    Ok(())
}

fn all_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(logs::list_logs(dir)?.into_iter().map(|x| x.path).collect())
}
