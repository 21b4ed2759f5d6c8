use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fdpool_cache::EvictionReport;
use fdpool_cfg::ConfigSet;
use fdpool_filesystem::{HandlePool, OpenOptions, PoolPath};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Prefix for environment variables that override configs, e.g. `FDPOOL_EVICTION_AGE=10m`.
const ENV_PREFIX: &str = "FDPOOL";

#[derive(Debug, Parser)]
#[command(name = "fdpool", about = "Open files through an evicting handle pool")]
struct Args {
    /// Override a config, e.g. `--set eviction_age=10m`. May be repeated.
    #[arg(long = "set", value_name = "NAME=VALUE", global = true)]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open every regular file in a directory, then run an eviction pass.
    Scan(ScanArgs),
    /// Print every config and its current value.
    Configs,
}

#[derive(Debug, clap::Args)]
struct ScanArgs {
    /// Directory to scan, subdirectories are skipped.
    dir: PathBuf,
    /// Maximum number of handles to keep open while scanning.
    #[arg(long)]
    max_open: Option<u64>,
    /// Evict handles unused for at least this many seconds.
    #[arg(long, value_name = "SECS")]
    older_than: Option<u64>,
    /// Minimum number (or fraction) of handles to close.
    #[arg(long)]
    min: Option<String>,
    /// Maximum number (or fraction) of handles to close.
    #[arg(long)]
    max: Option<String>,
    /// Fraction of handles that may be closed.
    #[arg(long)]
    percentage: Option<String>,
    /// Timestamp that orders eviction, `added` or `used`.
    #[arg(long)]
    priority: Option<String>,
    /// Keep the pool open this many seconds with a background evictor before the final pass.
    #[arg(long, value_name = "SECS")]
    linger: Option<u64>,
}

impl ScanArgs {
    /// Apply the flags that were given to `configs`.
    fn apply(&self, configs: &ConfigSet) -> Result<(), anyhow::Error> {
        let updates = [
            ("max_open_handles", self.max_open.map(|n| n.to_string())),
            ("eviction_age", self.older_than.map(|secs| format!("{secs}s"))),
            ("eviction_min", self.min.clone()),
            ("eviction_max", self.max.clone()),
            ("eviction_percentage", self.percentage.clone()),
            ("eviction_priority", self.priority.clone()),
        ];
        for (name, value) in updates {
            if let Some(value) = value {
                configs.try_update(name, &value)?;
            }
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut builder = ConfigSet::builder();
    fdpool_filesystem::register_configs(&mut builder);
    let configs = builder.build();

    let from_env = configs.load_env(ENV_PREFIX)?;
    tracing::debug!(from_env, "loaded configs from the environment");
    for assignment in &args.overrides {
        configs.try_assign(assignment)?;
    }

    match args.command {
        Command::Configs => {
            println!("{configs}");
            Ok(())
        }
        Command::Scan(scan_args) => {
            scan_args.apply(&configs)?;
            scan(scan_args, configs).await
        }
    }
}

async fn scan(args: ScanArgs, configs: ConfigSet) -> Result<(), anyhow::Error> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(&args.dir)
        .with_context(|| format!("reading {}", args.dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let pool = HandlePool::new(configs);
    tracing::info!(files = files.len(), limit = pool.handle_limit(), "scanning");

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.blue} {pos}/{len} {msg}")?.progress_chars("=> "),
    );

    let mut failed_opens = 0;
    for file in &files {
        let path = file.to_string_lossy();
        match pool.open(&path, OpenOptions::READ_ONLY) {
            Ok(descriptor) => {
                let size = descriptor.stat().map(|stat| stat.size).unwrap_or_default();
                progress.set_message(format!("{} bytes", size));
            }
            Err(err) => {
                failed_opens += 1;
                progress.suspend(|| tracing::warn!(%path, %err, "failed to open"));
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message(format!("{} open", pool.len()));

    if let Some(secs) = args.linger {
        let evictor = pool.spawn_evictor();
        tokio::time::sleep(Duration::from_secs(secs)).await;
        evictor.abort();
    }

    let report = pool.evict_configured()?;
    print_report("eviction", &report);

    let report = pool.close_all();
    print_report("close all", &report);

    if failed_opens > 0 {
        anyhow::bail!("failed to open {failed_opens} files");
    }
    Ok(())
}

fn print_report(name: &str, report: &EvictionReport<PoolPath>) {
    println!(
        "{name}: {} open, {} candidates, {} closed, {} failed",
        report.population,
        report.candidates,
        report.closed.len(),
        report.failed.len(),
    );
    for path in &report.failed {
        println!("  failed to close {path}");
    }
}
