use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::logging::LogDestination;

#[derive(Debug, Parser, Clone)]
#[command(name = "tablectl")]
#[command(about = "Loads a filtered, cursor-paginated table and prints it")]
pub struct Cli {
    /// List endpoint URL. Overrides `endpoint` in the config file.
    #[arg(long, env = "TABLECTL_ENDPOINT")]
    pub endpoint: Option<String>,
    /// Query string holding the filter state, e.g. `level=error&sort=timestamp.asc`.
    #[arg(long, env = "TABLECTL_QUERY", default_value = "")]
    pub query: String,
    /// Pages to load before printing. At least one.
    #[arg(
        long,
        env = "TABLECTL_PAGES",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub pages: u32,
    /// Keep live mode on for this many seconds after paging. 0 disables it.
    #[arg(long, env = "TABLECTL_LIVE_SECS", default_value_t = 0)]
    pub live_secs: u64,
    /// Prepend live rows as they arrive instead of staging them.
    #[arg(long)]
    pub auto_merge: bool,
    #[arg(long, env = "TABLECTL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,
    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}
