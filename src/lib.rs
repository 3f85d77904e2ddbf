//! Bulk loader: tab-separated key/value lines from stdin into an indexed
//! SQLite file, through the sqlite3 shell.

use anyhow::{Context, Result};
use clap::Parser;
use parse_size::parse_size;
use std::{
    ffi::OsString,
    path::PathBuf,
    time::{Duration, Instant},
};
use tokio::io::AsyncBufRead;

pub mod batch;
pub mod engine;
pub mod progress;
pub mod script;
pub mod units;

use batch::{BatchSink, BatchStats};
use engine::{ControlScript, Sqlite3};
use progress::Progress;
use script::Column;

shadow_rs::shadow!(build);

pub const DEFAULT_BATCH_SIZE: u64 = 64 << 20;

pub fn version() -> String {
    format!("sqlikv {} {}", build::PKG_VERSION, build::BUILD_TIME)
}

/// Rewrite the historical single-dash `-version` into `--version`, which is
/// what clap understands.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if arg == "-version" {
                OsString::from("--version")
            } else {
                arg
            }
        })
        .collect()
}

fn parse_bytes(s: &str) -> Result<u64, clap::Error> {
    let size = parse_size(s)
        .map_err(|e| clap::Error::raw(clap::error::ErrorKind::ValueValidation, e))?;
    if size == 0 {
        return Err(clap::Error::raw(
            clap::error::ErrorKind::ValueValidation,
            "batch size must be at least one byte",
        ));
    }
    Ok(size)
}

/// Load tab-separated key/value lines from stdin into an SQLite table
/// `map(k, v)`, then optionally index it.
#[derive(Parser, Debug)]
pub struct Cli {
    /// Output filename
    #[clap(short = 'o', long, default_value = "data.db")]
    pub output: PathBuf,

    /// Batch size, e.g. 1048576 or 16MiB
    #[clap(short = 'B', long, default_value = "64MiB", value_parser = parse_bytes)]
    pub batch_size: u64,

    /// Index mode: 0=none, 1=k, 2=v, 3=kv
    #[clap(short = 'I', long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub index_mode: u8,

    /// sqlite3 cache size, needs memory = C x page size
    #[clap(short = 'C', long, default_value_t = 100_000, allow_negative_numbers = true)]
    pub cache_size: i64,

    /// sqlite3 executable to drive
    #[clap(long, default_value = "sqlite3")]
    pub sqlite3: PathBuf,

    /// Show version and exit
    #[clap(short = 'V', long)]
    pub version: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    None,
    Key,
    Value,
    Both,
}

impl TryFrom<u8> for IndexMode {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(IndexMode::None),
            1 => Ok(IndexMode::Key),
            2 => Ok(IndexMode::Value),
            3 => Ok(IndexMode::Both),
            _ => anyhow::bail!("invalid index mode {}, expected 0-3", value),
        }
    }
}

impl IndexMode {
    pub fn columns(&self) -> &'static [Column] {
        match self {
            IndexMode::None => &[],
            IndexMode::Key => &[Column::Key],
            IndexMode::Value => &[Column::Value],
            IndexMode::Both => &[Column::Key, Column::Value],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub written: u64,
    pub batches: usize,
    pub indexes: usize,
}

// Each flush goes to the shell, then onto the progress line.
struct Importer<'a> {
    engine: &'a Sqlite3,
    control: &'a ControlScript,
    progress: Progress,
}

impl BatchSink for Importer<'_> {
    async fn flush(&mut self, batch: &[u8]) -> Result<u64> {
        let n = self.engine.import(batch, self.control).await?;
        self.progress.record(n);
        self.progress
            .report(&mut std::io::stdout().lock())
            .context("writing progress")?;
        Ok(n)
    }
}

/// Create the table if needed, import everything `input` yields, then build
/// the requested indexes. Every failure aborts; nothing is rolled back.
pub async fn run<R>(args: &Cli, input: R) -> Result<Summary>
where
    R: AsyncBufRead + Unpin,
{
    let index_mode = IndexMode::try_from(args.index_mode)?;
    let engine = Sqlite3::new(&args.sqlite3, &args.output);

    let exists = tokio::fs::try_exists(&args.output)
        .await
        .with_context(|| format!("checking {}", args.output.display()))?;
    if !exists {
        engine
            .run_script(script::INIT_SQL, "initialized database")
            .await?;
    }

    let control = ControlScript::new(&script::import_sql(args.cache_size))?;
    tracing::debug!("control script at {}", control.path().display());

    let started = Instant::now();
    let mut importer = Importer {
        engine: &engine,
        control: &control,
        progress: Progress::new(),
    };
    let threshold = usize::try_from(args.batch_size).unwrap_or(usize::MAX);
    let BatchStats { written, batches } = batch::drive(input, threshold, &mut importer).await?;
    println!();
    drop(control);

    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
    tracing::info!(
        "imported {} in {} batches ({})",
        humansize::format_size(written, humansize::BINARY),
        batches,
        humantime::format_duration(elapsed)
    );

    let columns = index_mode.columns();
    if columns.is_empty() {
        tracing::info!("no index requested");
    }
    for (i, column) in columns.iter().enumerate() {
        let msg = format!("{}/{} created index", i + 1, columns.len());
        engine
            .run_script(&script::index_sql(*column, args.cache_size), &msg)
            .await?;
    }

    Ok(Summary {
        written,
        batches,
        indexes: columns.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Cli::parse_from(["sqlikv"]);
        assert_eq!(args.output, PathBuf::from("data.db"));
        assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(args.index_mode, 3);
        assert_eq!(args.cache_size, 100_000);
        assert_eq!(args.sqlite3, PathBuf::from("sqlite3"));
        assert!(!args.version);
    }

    #[test]
    fn test_cli_flags() {
        let args = Cli::parse_from([
            "sqlikv", "-o", "out.db", "-B", "16KiB", "-I", "1", "-C", "-2000", "-V",
        ]);
        assert_eq!(args.output, PathBuf::from("out.db"));
        assert_eq!(args.batch_size, 16 * 1024);
        assert_eq!(args.index_mode, 1);
        assert_eq!(args.cache_size, -2000);
        assert!(args.version);
    }

    #[test]
    fn test_cli_single_dash_version() {
        let args = Cli::parse_from(normalize_args(["sqlikv", "-version"]));
        assert!(args.version);
        let args = Cli::parse_from(normalize_args(["sqlikv", "-o", "x.db"]));
        assert!(!args.version);
        assert_eq!(args.output, PathBuf::from("x.db"));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["sqlikv", "-I", "4"]).is_err());
        assert!(Cli::try_parse_from(["sqlikv", "-B", "0"]).is_err());
        assert!(Cli::try_parse_from(["sqlikv", "-B", "lots"]).is_err());
    }

    #[test]
    fn test_index_mode_columns() {
        assert!(IndexMode::try_from(0).unwrap().columns().is_empty());
        assert_eq!(IndexMode::try_from(1).unwrap().columns(), &[Column::Key]);
        assert_eq!(IndexMode::try_from(2).unwrap().columns(), &[Column::Value]);
        assert_eq!(
            IndexMode::try_from(3).unwrap().columns(),
            &[Column::Key, Column::Value]
        );
        assert!(IndexMode::try_from(7).is_err());
    }

    #[test]
    fn test_version() {
        assert!(version().starts_with(&format!("sqlikv {} ", env!("CARGO_PKG_VERSION"))));
    }
}
