//! Command-line runner: load a scenario and parameters from JSON, run a
//! fixed number of days, and optionally write a CSV report.

use crate::error::PansimError;
use crate::log::{info, parse_log_level, set_log_level};
use crate::parameters::Parameters;
use crate::report::write_variable_report;
use crate::scenario::Scenario;
use crate::simulation::Simulation;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Stochastic SEATIRD epidemic simulator")]
pub struct Args {
    /// Path to the scenario JSON (nodes, travel, stockpiles, seeds)
    pub scenario: PathBuf,

    /// Optional path to a parameters JSON; defaults apply otherwise
    #[arg(short, long)]
    pub parameters: Option<PathBuf>,

    /// Number of days to simulate
    #[arg(short, long, default_value_t = 120)]
    pub days: u32,

    /// Random seed
    #[arg(short, long, default_value_t = 0)]
    pub random_seed: u64,

    /// Optional path for a CSV report of per-day variable values
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable logging at the given level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// Runs a simulation per the arguments and returns it for inspection.
pub fn run_with_args(args: &Args) -> Result<Simulation, PansimError> {
    if let Some(level) = &args.log_level {
        set_log_level(parse_log_level(level).map_err(PansimError::from)?);
    }

    let scenario = Scenario::load_from_json(&args.scenario)?;
    let parameters = match &args.parameters {
        Some(path) => Parameters::load_from_json(path)?,
        None => Parameters::default(),
    };

    let mut simulation = Simulation::new(scenario, parameters, args.random_seed)?;
    info!(
        "simulating {} days over {} nodes with seed {}",
        args.days,
        simulation.num_nodes(),
        args.random_seed
    );

    for _ in 0..args.days {
        simulation.simulate();
    }

    if let Some(output) = &args.output {
        write_variable_report(&simulation, output)?;
        info!("wrote report to {}", output.display());
    }

    Ok(simulation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stratum::{NUM_AGE_GROUPS, NUM_RISK_GROUPS};
    use std::io::Write;

    fn scenario_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let population = [[20.0; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];
        let scenario = crate::scenario::Scenario {
            nodes: vec![crate::scenario::NodeSpec {
                id: crate::scenario::NodeId(48453),
                name: "Travis".to_string(),
                population,
                antiviral_stockpile: 0,
                vaccine_stockpile: 0,
            }],
            ..Default::default()
        };
        write!(file, "{}", serde_json::to_string(&scenario).unwrap()).unwrap();
        file
    }

    #[test]
    fn runs_and_writes_report() {
        let scenario = scenario_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let args = Args {
            scenario: scenario.path().to_path_buf(),
            parameters: None,
            days: 3,
            random_seed: 1,
            output: Some(output.path().to_path_buf()),
            log_level: None,
        };
        let simulation = run_with_args(&args).unwrap();
        assert_eq!(simulation.time(), 3);
        let report = std::fs::read_to_string(output.path()).unwrap();
        assert!(report.lines().count() > 4);
    }

    #[test]
    fn missing_scenario_is_an_error() {
        let args = Args {
            scenario: PathBuf::from("/nonexistent/scenario.json"),
            parameters: None,
            days: 1,
            random_seed: 0,
            output: None,
            log_level: None,
        };
        assert!(run_with_args(&args).is_err());
    }
}
