//! GeoDTN - geocast delay-tolerant network simulation
//!
//! Runs a scenario file or a generated random-walk scenario and prints a
//! delivery report.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use geodtn_logging::{ConsoleFormat, FileConfig, GeoSubscriberBuilder};
use geodtn_routing::{DEFAULT_COPIES, StrategyConfig};
use geodtn_simulation::{RandomScenario, Report, Runner, ScenarioConfig};

#[derive(Parser)]
#[command(
    name = "geodtn",
    about = "Geocast delay-tolerant network simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Also write JSONL logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Epidemic,
    Gsaf,
    Gswd,
    CastPlus,
    DirectionBased,
    Evr,
    Geoopp,
}

impl StrategyArg {
    fn config(self, copies: u32) -> StrategyConfig {
        match self {
            StrategyArg::Epidemic => StrategyConfig::Epidemic,
            StrategyArg::Gsaf => StrategyConfig::Gsaf { copies },
            StrategyArg::Gswd => StrategyConfig::Gswd { copies },
            StrategyArg::CastPlus => StrategyConfig::CastPlus { copies },
            StrategyArg::DirectionBased => StrategyConfig::DirectionBased { copies },
            StrategyArg::Evr => StrategyConfig::Evr,
            StrategyArg::Geoopp => StrategyConfig::Geoopp,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file
    Run {
        /// Path to the JSON scenario
        scenario: PathBuf,

        /// Override the scenario's default strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Initial copies for copy-limited strategies
        #[arg(short, long, default_value_t = DEFAULT_COPIES)]
        copies: u32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a generated random-walk scenario
    Random {
        /// Number of hosts
        #[arg(long, default_value = "20")]
        hosts: usize,

        /// Simulated seconds
        #[arg(short, long, default_value = "3600")]
        duration: f64,

        /// Link range in distance units
        #[arg(short, long, default_value = "50")]
        range: f64,

        /// Number of geocast messages
        #[arg(short, long, default_value = "10")]
        messages: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, value_enum, default_value = "epidemic")]
        strategy: StrategyArg,

        /// Initial copies for copy-limited strategies
        #[arg(short, long, default_value_t = DEFAULT_COPIES)]
        copies: u32,

        /// Write the generated scenario here instead of running it
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario file without running it
    Check {
        /// Path to the JSON scenario
        scenario: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = GeoSubscriberBuilder::new()
        .with_level("info")
        .with_console(match cli.log_format {
            LogFormat::Pretty => ConsoleFormat::Pretty,
            LogFormat::Compact => ConsoleFormat::Compact,
            LogFormat::Json => ConsoleFormat::Json,
        });
    if cli.verbose {
        logging = logging
            .with_level("debug")
            .with_target_level("geodtn_routing::world", "trace");
    }
    if let Some(directory) = cli.log_dir {
        logging = logging.with_file_output(FileConfig {
            directory,
            ..FileConfig::default()
        });
    }
    let _log_guard = logging.init();

    match cli.command {
        Commands::Run {
            scenario,
            strategy,
            copies,
            json,
        } => {
            let mut config = ScenarioConfig::load(&scenario)?;
            if let Some(strategy) = strategy {
                config.strategy = strategy.config(copies);
            }
            let report = run(&config)?;
            print_report(&report, json)?;
        }
        Commands::Random {
            hosts,
            duration,
            range,
            messages,
            seed,
            strategy,
            copies,
            save,
            json,
        } => {
            anyhow::ensure!(hosts > 0, "at least one host is required");
            let config = RandomScenario {
                hosts,
                duration,
                link_range: range,
                messages,
                seed,
                ..RandomScenario::default()
            }
            .generate(strategy.config(copies));

            match save {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&config)?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Scenario written to {}", path.display());
                }
                None => {
                    let report = run(&config)?;
                    print_report(&report, json)?;
                }
            }
        }
        Commands::Check { scenario } => {
            let config = ScenarioConfig::load(&scenario)?;
            let regions = config.build_regions()?;
            let cells = config.build_cells()?;
            println!(
                "{}: {} hosts, {} regions, {} cells, {} events, {} messages, {}s",
                config.name,
                config.hosts.len(),
                regions.len(),
                cells.len(),
                config.events.len(),
                config.messages.len(),
                config.duration
            );
            for (index, _) in config.hosts.iter().enumerate() {
                for warning in config.router_for(index).warnings() {
                    println!("  warning (host {index}): {warning}");
                }
            }
        }
    }

    Ok(())
}

fn run(config: &ScenarioConfig) -> anyhow::Result<Report> {
    let mut runner = Runner::new(config)
        .with_context(|| format!("Scenario `{}` is not runnable", config.name))?;
    let report = runner
        .run()
        .with_context(|| format!("Scenario `{}` aborted", config.name))?;
    Ok(report)
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
