//! Harness configuration derived from CLI arguments

use std::path::PathBuf;
use std::time::Duration;

use super::cli::{CliArgs, SearchMode};
use crate::benchmark::BatchConfig;
use crate::client::ConnectionFactory;
use crate::optimizer::{Acquisition, Dimension, GridAxis, OptimizerConfig, ParameterSpace};
use crate::workload::DatasetSpec;

/// Grid swept when no `--grid` is given
pub const DEFAULT_GRID: [&str; 3] = [
    "work_mem=4MB,16MB,64MB",
    "effective_cache_size=100MB,200MB",
    "random_page_cost=2.0,3.0",
];

/// Search strategy and its inputs
#[derive(Debug, Clone)]
pub enum StrategyConfig {
    Grid(Vec<GridAxis>),
    Optimize {
        space: ParameterSpace,
        config: OptimizerConfig,
    },
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Grid(_) => "grid",
            StrategyConfig::Optimize { .. } => "optimize",
        }
    }
}

/// Complete harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    // Connection
    pub factory: ConnectionFactory,

    // Search
    pub strategy: StrategyConfig,

    // Workload
    pub batch: BatchConfig,
    pub enhanced: bool,
    pub dataset: DatasetSpec,
    pub skip_setup: bool,

    // Output
    pub results_db: PathBuf,
    pub keep_results: bool,
    pub output_path: Option<PathBuf>,
    pub quiet: bool,
    pub verbose: bool,
}

impl HarnessConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        // Validate first
        args.validate()?;

        let factory = ConnectionFactory {
            host: args.host.clone(),
            port: args.port,
            user: args.user.clone(),
            password: args.password.clone(),
            dbname: args.dbname.clone(),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            application_name: env!("CARGO_PKG_NAME").to_string(),
        };

        let strategy = match args.mode {
            SearchMode::Grid => {
                let specs: Vec<&str> = if args.grid.is_empty() {
                    DEFAULT_GRID.to_vec()
                } else {
                    args.grid.iter().map(String::as_str).collect()
                };
                let axes = specs
                    .into_iter()
                    .map(GridAxis::parse)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?;
                StrategyConfig::Grid(axes)
            }
            SearchMode::Optimize => {
                let dims = args
                    .tune
                    .iter()
                    .map(|s| Dimension::parse(s))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?;
                let space = ParameterSpace::new(dims).map_err(|e| e.to_string())?;
                let acquisition: Acquisition = args.acquisition.parse()?;
                StrategyConfig::Optimize {
                    space,
                    config: OptimizerConfig {
                        rounds: args.rounds,
                        initial_points: args.initial_points,
                        acquisition,
                        seed: args.seed,
                        ..OptimizerConfig::default()
                    },
                }
            }
        };

        let deadline = Duration::try_from_secs_f64(args.deadline_secs)
            .map_err(|e| format!("--deadline {}: {}", args.deadline_secs, e))?;

        Ok(Self {
            factory,
            strategy,
            batch: BatchConfig {
                deadline,
                pool_size: args.pool_size,
            },
            enhanced: args.enhanced,
            dataset: DatasetSpec {
                users: args.dataset_users,
                orders: args.dataset_orders,
            },
            skip_setup: args.skip_setup,
            results_db: args.results_db.clone(),
            keep_results: args.keep_results,
            output_path: args.output.clone(),
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionSource;
    use clap::Parser;

    fn config(argv: &[&str]) -> Result<HarnessConfig, String> {
        let args = CliArgs::parse_from(std::iter::once("test").chain(argv.iter().copied()));
        HarnessConfig::from_cli(&args)
    }

    #[test]
    fn test_default_grid() {
        let config = config(&[]).unwrap();
        let StrategyConfig::Grid(axes) = &config.strategy else {
            panic!("expected grid mode");
        };
        assert_eq!(axes.len(), 3);
        assert_eq!(axes.iter().map(|a| a.values.len()).product::<usize>(), 12);
        assert_eq!(config.batch.deadline, Duration::from_secs(30));
        assert_eq!(config.factory.describe(), "postgres@localhost:5432/postgres");
    }

    #[test]
    fn test_explicit_grid_replaces_default() {
        let config = config(&["--grid", "seq_page_cost=1.0,1.5"]).unwrap();
        let StrategyConfig::Grid(axes) = &config.strategy else {
            panic!("expected grid mode");
        };
        assert_eq!(axes.len(), 1);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        assert!(config(&["--grid", "shared_buffers=128MB"]).is_err());
        assert!(config(&["--mode", "optimize", "--tune", "fsync:0:1"]).is_err());
    }

    #[test]
    fn test_optimize_config() {
        let config = config(&[
            "--mode",
            "optimize",
            "--tune",
            "work_mem:4MB:256MB",
            "--tune",
            "random_page_cost:1.0:4.0",
            "--rounds",
            "12",
            "--acquisition",
            "lcb",
            "--deadline",
            "2.5",
        ])
        .unwrap();
        let StrategyConfig::Optimize { space, config: opt } = &config.strategy else {
            panic!("expected optimize mode");
        };
        assert_eq!(space.dim(), 2);
        assert_eq!(opt.rounds, 12);
        assert!(matches!(opt.acquisition, Acquisition::LowerConfidenceBound { .. }));
        assert_eq!(config.batch.deadline, Duration::from_millis(2500));
    }

    #[test]
    fn test_oversized_deadline_rejected() {
        assert!(config(&["--deadline", "1e30"]).is_err());
    }

    #[test]
    fn test_bad_acquisition_rejected() {
        assert!(config(&["--mode", "optimize", "--tune", "work_mem:4MB:8MB", "--acquisition", "pi"]).is_err());
    }
}
