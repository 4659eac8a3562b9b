//! mlru - read JSON files through a memoizing LRU cache

mod reader;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use memolru::{CacheConfig, MissPolicy};
use tracing::{error, info};

use crate::reader::JsonReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON cache configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache capacity (number of results), overrides the config file
    #[arg(short, long, global = true)]
    capacity: Option<usize>,

    /// Coalesce concurrent misses on the same file
    #[arg(long, global = true)]
    single_flight: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read each file in order, printing one compact JSON line per file
    Read {
        /// Files to read; repeated paths are served from the cache
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::load(path)?,
            None => CacheConfig::default(),
        };
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if self.single_flight {
            config.miss_policy = MissPolicy::SingleFlight;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.cache_config()?;
    info!("Cache capacity: {}", config.capacity);
    info!("Miss policy: {:?}", config.miss_policy);

    match cli.command {
        Command::Read { files } => {
            let failed = run_read(&JsonReader::new(config)?, &files, &mut std::io::stdout())?;
            if failed > 0 {
                anyhow::bail!("{} file(s) could not be read", failed);
            }
        }
    }

    Ok(())
}

/// Reads every file, writing one line each to `out`; returns the failure count
fn run_read<W: std::io::Write>(
    reader: &JsonReader,
    files: &[PathBuf],
    out: &mut W,
) -> Result<usize> {
    let mut failed = 0;

    for path in files {
        let cached = reader.is_cached(path);
        match reader.read(path) {
            Ok(value) => {
                info!(
                    "{} ({})",
                    path.display(),
                    if cached { "hit" } else { "miss" }
                );
                writeln!(out, "{}", value)?;
            }
            Err(e) => {
                error!("Error reading {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    let stats = reader.stats();
    info!(
        "Hits: {}, misses: {}, evictions: {}, cached: {}, hit ratio: {:.2}",
        stats.hits(),
        stats.misses(),
        stats.evictions(),
        reader.cached(),
        stats.hit_ratio()
    );

    Ok(failed)
}
