use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use yield_guard::config::GuardConfig;
use yield_guard::scenarios::{self, Expected, Outcome, Scenario, ScenarioReport};

#[derive(Parser)]
#[command(name = "yield-guard-demo")]
#[command(about = "Run the suspension-guard acceptance scenarios", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file: standalone TOML or a Cargo manifest with
    /// [package.metadata.yield-guard]. Defaults plus YIELD_GUARD_EVENTS otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available scenarios
    List,

    /// Run scenarios (all of them when no name is given)
    Run {
        /// Scenario names, as printed by `list`
        names: Vec<String>,

        /// Print reports as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn select(names: &[String]) -> Result<Vec<&'static Scenario>> {
    if names.is_empty() {
        return Ok(scenarios::all().iter().collect());
    }
    names
        .iter()
        .map(|name| match scenarios::find(name) {
            Some(scenario) => Ok(scenario),
            None => bail!("unknown scenario `{name}` (see `yield-guard-demo list`)"),
        })
        .collect()
}

fn describe_expected(expected: &Expected) -> String {
    match expected {
        Expected::Completes => "completes".to_string(),
        Expected::Rejected(reason) => format!("rejected with \"{reason}\""),
    }
}

fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Completed => "completed".to_string(),
        Outcome::Rejected(reason) => format!("rejected with \"{reason}\""),
        Outcome::Failed(message) => format!("failed: {message}"),
    }
}

fn print_report(report: &ScenarioReport) {
    let status = if report.passed {
        "ok".green().bold()
    } else {
        "MISMATCH".red().bold()
    };
    println!("{:<28} {}", report.name, status);
    if !report.passed {
        println!("    expected: {}", describe_expected(&report.expected));
        println!("    observed: {}", describe_outcome(&report.outcome));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp(None)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GuardConfig::load(path)?.with_env_overrides()?,
        None => GuardConfig::from_env()?,
    };
    log::debug!("using configuration {config:?}");

    match cli.command {
        Commands::List => {
            for scenario in scenarios::all() {
                println!("{:<28} {}", scenario.name, scenario.description);
            }
        }
        Commands::Run { names, json } => {
            let selected = select(&names)?;
            let _registration = yield_guard::install_with(&config);

            let reports: Vec<ScenarioReport> =
                selected.iter().map(|scenario| scenario.run()).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
            }

            let mismatched = reports.iter().filter(|report| !report.passed).count();
            if mismatched > 0 {
                bail!("{mismatched} of {} scenario(s) misbehaved", reports.len());
            }
        }
    }

    Ok(())
}
