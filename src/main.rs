//! backend-balancer host.
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!   caller         │                   Engine                     │
//!   ───select()───▶│  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!                  │  │ registry │──▶│ strategy │──▶│ account  │  │
//!   ◀──backend id──│  │ snapshot │   │  pick    │   │  +1 conn │  │
//!                  │  └──────────┘   └──────────┘   └──────────┘  │
//!   ───release()──▶│               (one lock for all three)        │
//!                  └──────────────────────────────────────────────┘
//!                     ▲                ▲                 │
//!              health monitor    config watcher     metrics / stats
//! ```
//!
//! `run` keeps the engine and its background tasks alive until SIGINT or
//! SIGTERM. `simulate` drives selections from worker threads and prints
//! the resulting distribution. `check` validates a config file.

use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use serde::Serialize;

use backend_balancer::config::{load_config, EngineConfig};
use backend_balancer::lifecycle::startup;
use backend_balancer::observability::logging;
use backend_balancer::{Engine, EngineError, StatsSnapshot, StrategyKind};

#[derive(Parser)]
#[command(name = "backend-balancer")]
#[command(about = "Backend selection engine for a software load balancer", long_about = None)]
struct Cli {
    /// TOML config file. Without it three placeholder backends are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine with health checks and config reload until stopped
    Run,
    /// Drive selections from several threads and print the distribution
    Simulate {
        /// Total number of selections
        #[arg(short, long, default_value_t = 300)]
        requests: usize,
        /// Worker threads
        #[arg(short, long, default_value_t = 4)]
        workers: usize,
        /// Override the configured strategy
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
        /// Keep connections open instead of releasing them at the end
        #[arg(long)]
        hold: bool,
    },
    /// Validate the config and print a summary
    Check,
}

#[derive(Serialize)]
struct SimulationReport {
    strategy: StrategyKind,
    requests: usize,
    workers: usize,
    distribution: StatsSnapshot,
    released: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::placeholder(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("backend-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => startup::run(config, cli.config.as_deref()).await?,
        Commands::Simulate {
            requests,
            workers,
            strategy,
            hold,
        } => {
            let report = simulate(&config, requests, workers, strategy, hold)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Check => print_summary(&config),
    }

    Ok(())
}

fn simulate(
    config: &EngineConfig,
    requests: usize,
    workers: usize,
    strategy: Option<StrategyKind>,
    hold: bool,
) -> Result<SimulationReport, EngineError> {
    let engine = Arc::new(Engine::from_config(config)?);
    if let Some(kind) = strategy {
        engine.set_strategy(kind);
    }

    let workers = workers.max(1);
    let selected: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let engine = &engine;
                // spread the remainder over the first workers
                let share = requests / workers + usize::from(w < requests % workers);
                s.spawn(move || (0..share).map(|_| engine.select()).collect::<Vec<_>>())
            })
            .collect();

        join_workers(handles)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
    })?;

    let distribution = engine.snapshot();
    if !hold {
        for id in &selected {
            engine.release(id)?;
        }
    }

    Ok(SimulationReport {
        strategy: engine.strategy(),
        requests: selected.len(),
        workers,
        distribution,
        released: !hold,
    })
}

/// Join every worker in order. A worker panic is re-raised here instead of
/// dropping that worker's selections.
fn join_workers<T>(handles: Vec<thread::ScopedJoinHandle<'_, Vec<T>>>) -> Vec<T> {
    handles
        .into_iter()
        .flat_map(|h| h.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
        .collect()
}

fn print_summary(config: &EngineConfig) {
    println!("strategy: {}", config.strategy);
    println!("backends: {}", config.backends.len());
    for b in &config.backends {
        match &b.address {
            Some(address) => println!("  {} (weight {}, probe {})", b.id, b.weight, address),
            None => println!("  {} (weight {})", b.id, b.weight),
        }
    }
    let hc = &config.health_check;
    if hc.enabled {
        println!(
            "health checks: every {}s on {} (unhealthy after {}, healthy after {})",
            hc.interval_secs, hc.path, hc.unhealthy_threshold, hc.healthy_threshold
        );
    } else {
        println!("health checks: disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_releases_everything() {
        let report = simulate(&EngineConfig::placeholder(), 301, 4, None, false).unwrap();
        assert_eq!(report.requests, 301);
        assert_eq!(report.distribution.total_connections(), 301);
        assert_eq!(report.distribution.get("ip1"), Some(101));
        assert!(report.released);
    }

    #[test]
    fn test_join_workers_keeps_order() {
        let joined = thread::scope(|s| {
            let handles = vec![s.spawn(|| vec![1, 2]), s.spawn(|| vec![3])];
            join_workers(handles)
        });
        assert_eq!(joined, vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "worker failed")]
    fn test_join_workers_propagates_panics() {
        thread::scope(|s| {
            let handles = vec![
                s.spawn(|| vec![1]),
                s.spawn(|| -> Vec<i32> { panic!("worker failed") }),
            ];
            join_workers(handles)
        });
    }
}
