//! Scan command implementation
//!
//! Loads a CSV file into a view and keeps the records matching a regular
//! expression, evaluated in parallel. Ctrl-C and `--timeout-ms` cancel the scan
//! between records.

use anyhow::{Context, Result, anyhow};
use clap::Args;
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Output;
use crate::config::ShardrunConfig;
use crate::parallel::{CancelToken, WorkerQuota};
use crate::views::View;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// CSV file to scan
    pub file: PathBuf,

    /// Regular expression a record must match
    #[arg(short, long)]
    pub pattern: String,

    /// Match only this column instead of any field
    #[arg(long)]
    pub column: Option<String>,

    /// Cancel the scan after this many milliseconds (0 = no timeout)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Maximum workers for this scan (0 = all logical CPUs)
    #[arg(long)]
    pub cpu: Option<usize>,

    /// Records required to justify one additional worker
    #[arg(long)]
    pub min_per_worker: Option<usize>,

    /// The first row is a record, not a header
    #[arg(long)]
    pub no_headers: bool,

    /// Print only the number of matching records
    #[arg(long)]
    pub count: bool,
}

pub async fn execute(args: ScanArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let mut settings = ShardrunConfig::load(config_path)?.settings()?;

    // CLI flags have the highest priority
    if let Some(cpu) = args.cpu {
        settings.parallel.max_workers = cpu;
    }
    if let Some(min_per_worker) = args.min_per_worker {
        settings.parallel.min_items_per_worker = min_per_worker;
    }
    let timeout_ms = args.timeout_ms.unwrap_or(settings.scan.timeout_ms);
    let has_headers = settings.scan.has_headers && !args.no_headers;

    let regex = Regex::new(&args.pattern)
        .with_context(|| format!("Invalid pattern: {}", args.pattern))?;
    let view = View::from_csv_path(&args.file, has_headers)?;

    let column = match &args.column {
        Some(name) => Some(
            view.column_index(name)
                .ok_or_else(|| anyhow!("Unknown column: {name}"))?,
        ),
        None => None,
    };

    let quota = Arc::new(WorkerQuota::from_settings(&settings.parallel));
    output.verbose(&format!(
        "Scanning {} records with up to {} workers",
        view.len(),
        quota.max_workers()
    ));

    let token = if timeout_ms > 0 {
        CancelToken::with_timeout(Duration::from_millis(timeout_ms))
    } else {
        CancelToken::new()
    };

    let interrupt = token.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel("interrupted");
        }
    });

    let total = view.len();
    let filter_token = token.clone();
    let filtered = tokio::task::spawn_blocking(move || {
        view.par_filter(&quota, &filter_token, 0, |record| {
            Ok(match column {
                Some(index) => record.get(index).is_some_and(|field| regex.is_match(field)),
                None => record.iter().any(|field| regex.is_match(field)),
            })
        })
    })
    .await
    .context("Scan task failed")?;
    ctrl_c.abort();

    let filtered = filtered?;

    if args.count {
        println!("{}", filtered.len());
    } else {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        filtered.write_csv(&mut lock)?;
        lock.flush()?;
    }

    output.success(&format!("Matched {} of {} records", filtered.len(), total));
    Ok(())
}
