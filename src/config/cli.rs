//! Command-line argument parsing
//!
//! Arguments are grouped by category for clarity.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Benchmark PostgreSQL runtime parameters and search for a fast configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "pg-tuning-bench")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help information
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: (),

    // ===== Connection Options =====
    /// Server hostname
    #[arg(short = 'h', long = "host", default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short = 'p', long = "port", default_value_t = 5432)]
    pub port: u16,

    /// Database user
    #[arg(short = 'U', long = "user", default_value = "postgres")]
    pub user: String,

    /// Database password
    #[arg(short = 'W', long = "password", env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name
    #[arg(short = 'd', long = "dbname", default_value = "postgres")]
    pub dbname: String,

    /// Connection timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    // ===== Search Options =====
    /// Search strategy
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = SearchMode::Grid)]
    pub mode: SearchMode,

    /// Grid axis "name=v1,v2,..." (repeatable; grid mode)
    #[arg(long = "grid", action = clap::ArgAction::Append)]
    pub grid: Vec<String>,

    /// Tuned parameter "name:low:high" (repeatable; optimize mode)
    #[arg(long = "tune", action = clap::ArgAction::Append)]
    pub tune: Vec<String>,

    /// Proposal budget for optimize mode
    #[arg(long = "rounds", default_value_t = 20)]
    pub rounds: usize,

    /// Random proposals before the surrogate model is used
    #[arg(long = "initial-points", default_value_t = 3)]
    pub initial_points: usize,

    /// Acquisition function: ei or lcb
    #[arg(long = "acquisition", default_value = "ei")]
    pub acquisition: String,

    /// Seed for the optimizer's random number generator
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    // ===== Workload Options =====
    /// Per-probe deadline in seconds
    #[arg(long = "deadline", default_value_t = 30.0)]
    pub deadline_secs: f64,

    /// Add the analytic probe and the concurrent sub-batch
    #[arg(short = 'e', long = "enhanced")]
    pub enhanced: bool,

    /// Worker cap for the concurrent sub-batch
    #[arg(long = "pool-size", default_value_t = 5)]
    pub pool_size: usize,

    /// Users generated in the base dataset
    #[arg(long = "dataset-users", default_value_t = 10_000)]
    pub dataset_users: u64,

    /// Orders generated in the base dataset
    #[arg(long = "dataset-orders", default_value_t = 100_000)]
    pub dataset_orders: u64,

    /// Skip dataset creation (assume loaded)
    #[arg(long = "skip-setup")]
    pub skip_setup: bool,

    // ===== Output Options =====
    /// SQLite file receiving probe results
    #[arg(long = "results-db", default_value = "performance_results.db")]
    pub results_db: PathBuf,

    /// Keep results from earlier runs instead of clearing them
    #[arg(long = "keep-results")]
    pub keep_results: bool,

    /// JSON export of the run summary and stored results
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// How the next configuration is chosen
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Every combination of the --grid axes
    #[default]
    Grid,
    /// Gaussian-process search over the --tune bounds
    Optimize,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if !self.deadline_secs.is_finite() || self.deadline_secs <= 0.0 {
            return Err("--deadline must be a positive number of seconds".to_string());
        }

        if self.pool_size == 0 {
            return Err("--pool-size must be at least 1".to_string());
        }

        match self.mode {
            SearchMode::Grid => {
                if !self.tune.is_empty() {
                    return Err("--tune is only used with --mode optimize".to_string());
                }
            }
            SearchMode::Optimize => {
                if !self.grid.is_empty() {
                    return Err("--grid is only used with --mode grid".to_string());
                }
                if self.tune.is_empty() {
                    return Err("--mode optimize requires at least one --tune".to_string());
                }
                if self.rounds == 0 {
                    return Err("--rounds must be at least 1".to_string());
                }
            }
        }

        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".to_string());
        }

        Ok(())
    }
}
