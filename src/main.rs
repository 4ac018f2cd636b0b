//! pg-tuning-bench - PostgreSQL runtime parameter benchmark
//!
//! Runs a fixed probe suite under each parameter set proposed by a grid or a
//! model-based search, stores every sample in SQLite and reports the fastest
//! configuration found.

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use pg_tuning_bench::benchmark::{Harness, HarnessOptions, RunSummary};
use pg_tuning_bench::client::ConnectionSource;
use pg_tuning_bench::config::{CliArgs, HarnessConfig, StrategyConfig};
use pg_tuning_bench::metrics::{print_summaries, summarize, RunReport};
use pg_tuning_bench::optimizer::{BayesianSearch, GridSearch};
use pg_tuning_bench::store::ResultStore;
use pg_tuning_bench::workload::Suite;

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn print_banner(config: &HarnessConfig) {
    if config.quiet {
        return;
    }

    println!("pg-tuning-bench v{}", env!("CARGO_PKG_VERSION"));
    println!("====================================");
    println!("Target: {}", config.factory.describe());
    match &config.strategy {
        StrategyConfig::Grid(axes) => {
            println!("Strategy: grid");
            for axis in axes {
                let values: Vec<String> = axis.values.iter().map(|v| v.canonical()).collect();
                println!("  {} = {}", axis.parameter, values.join(", "));
            }
        }
        StrategyConfig::Optimize { space, config: opt } => {
            println!(
                "Strategy: optimize ({} rounds, {} initial, acquisition {})",
                opt.rounds, opt.initial_points, opt.acquisition
            );
            for dim in space.dimensions() {
                println!(
                    "  {} in [{}, {}]",
                    dim.parameter,
                    dim.realize(0.0).canonical(),
                    dim.realize(1.0).canonical()
                );
            }
        }
    }
    println!(
        "Deadline: {:.1}s, Pool size: {}, Enhanced: {}",
        config.batch.deadline.as_secs_f64(),
        config.batch.pool_size,
        config.enhanced
    );
    println!("Results: {}", config.results_db.display());
    println!("====================================\n");
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse_args();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    // Build configuration
    let config =
        HarnessConfig::from_cli(&args).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    print_banner(&config);

    let store = ResultStore::open(&config.results_db)
        .with_context(|| format!("Failed to open result store {}", config.results_db.display()))?;
    let mut harness = Harness::new(
        Box::new(config.factory.clone()),
        store,
        Suite::standard(config.enhanced),
        HarnessOptions::from(&config),
    );

    let summary: RunSummary = match &config.strategy {
        StrategyConfig::Grid(axes) => {
            let mut grid = GridSearch::new(axes.clone())?;
            info!("Grid search over {} configurations", grid.len());
            harness.run(&mut grid)?
        }
        StrategyConfig::Optimize { space, config: opt } => {
            let mut search = BayesianSearch::new(space.clone(), opt.clone());
            let summary = harness.run(&mut search)?;
            if !config.quiet {
                println!("{}", search.summary());
            }
            summary
        }
    };

    let results = harness.store().all()?;
    let configurations = summarize(&results);

    if !config.quiet {
        summary.print_summary();
        print_summaries(&configurations);
    }

    // Export to JSON if requested
    if let Some(ref output_path) = config.output_path {
        info!("Writing results to: {:?}", output_path);
        RunReport::new(&summary, &configurations, &results)
            .write_json(output_path)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    }

    if !config.quiet {
        println!("\n====================================");
        println!("TUNING COMPLETE");
        println!("====================================");
        println!("Rounds: {} completed, {} failed", summary.completed, summary.failed);
        match &summary.best {
            Some(best) => println!("Best configuration: {} ({:.4}s)", best.active, best.objective),
            None => println!("Best configuration: none"),
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
