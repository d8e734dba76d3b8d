use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

use civic_search::config::SearchConfig;
use civic_search::housekeeping::{self, DEFAULT_PRUNE_DAYS, DEFAULT_PURGE_HOURS};
use civic_search::{logging, open_service, SearchRequest};

#[derive(Parser, Debug)]
#[command(name = "civic-search", version, about = "Search and maintain a consultation corpus")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "CIVIC_SEARCH_CONFIG")]
    config: Option<PathBuf>,
    /// Database path, overriding the configuration
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run one search and print the page as JSON
    Search {
        /// Query text; empty or one character browses the newest answers
        #[arg(default_value = "")]
        q: String,
        /// Token from a previous page's next_cursor
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Cache and popularity statistics
    CacheStats,
    /// Delete cached pages older than N hours
    PurgeCache {
        #[arg(
            long,
            value_name = "HOURS",
            default_value_t = DEFAULT_PURGE_HOURS,
            value_parser = clap::value_parser!(i64).range(0..)
        )]
        older_than: i64,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Delete popularity counters not searched for N days
    PruneStats {
        #[arg(
            long,
            value_name = "DAYS",
            default_value_t = DEFAULT_PRUNE_DAYS,
            value_parser = clap::value_parser!(i64).range(0..)
        )]
        days: i64,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Rebuild the full-text index from the answers table
    RebuildIndex {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = SearchConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    let _logger = logging::init(config.log_dir.as_deref())?;

    let (store, orchestrator) = open_service(&config)?;
    match cli.cmd {
        Cmd::Search { q, cursor } => {
            let page = orchestrator
                .search(&SearchRequest {
                    q,
                    cursor,
                    partial: false,
                })
                .await?;
            print_json(&page)
        }
        Cmd::CacheStats => print_json(&housekeeping::cache_report(&store)?),
        Cmd::PurgeCache {
            older_than,
            dry_run,
        } => print_json(&housekeeping::purge_cache(
            &store,
            older_than,
            dry_run,
            Utc::now(),
        )?),
        Cmd::PruneStats { days, dry_run } => print_json(&housekeeping::prune_stats(
            &store,
            days,
            dry_run,
            Utc::now(),
        )?),
        Cmd::RebuildIndex { dry_run } => {
            let answers = housekeeping::rebuild_index(&store, dry_run)?;
            print_json(&serde_json::json!({ "answers": answers, "dry_run": dry_run }))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("civic-search: {e}");
            ExitCode::FAILURE
        }
    }
}
