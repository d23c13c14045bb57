//! CSV reports of simulation output: one serialized row per
//! (day, node, variable), written after a run from the stored variables.

use crate::error::PansimError;
use crate::simulation::{DerivedVariable, Simulation};
use crate::stratum::StratumSelector;
use crate::variables::Variable;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct VariableRow<'a> {
    day: usize,
    node: u32,
    node_name: &'a str,
    variable: &'a str,
    value: f64,
}

/// Writes per-day node totals for every stored variable, plus the
/// `All infected` derived series, to a CSV file.
pub fn write_variable_report<P: AsRef<Path>>(
    simulation: &Simulation,
    path: P,
) -> Result<(), PansimError> {
    let mut writer = csv::Writer::from_path(path)?;
    for day in 0..simulation.num_times() {
        for node in simulation.node_ids() {
            let node_name = simulation.node_name(node)?;
            for variable in Variable::ALL {
                writer.serialize(VariableRow {
                    day,
                    node: node.0,
                    node_name,
                    variable: variable.name(),
                    value: simulation.value(variable, day, node, StratumSelector::ALL)?,
                })?;
            }
            writer.serialize(VariableRow {
                day,
                node: node.0,
                node_name,
                variable: DerivedVariable::AllInfected.name(),
                value: simulation.derived(
                    DerivedVariable::AllInfected,
                    day,
                    node,
                    StratumSelector::ALL,
                )?,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;
    use crate::scenario::{NodeId, NodeSpec, Scenario};
    use crate::stratum::{Stratum, NUM_AGE_GROUPS, NUM_RISK_GROUPS};

    #[test]
    fn report_has_a_row_per_day_node_variable() {
        let scenario = Scenario {
            nodes: vec![NodeSpec {
                id: NodeId(1),
                name: "Travis".to_string(),
                population: [[50.0; NUM_RISK_GROUPS]; NUM_AGE_GROUPS],
                antiviral_stockpile: 0,
                vaccine_stockpile: 0,
            }],
            ..Scenario::default()
        };
        let mut simulation = Simulation::new(scenario, Parameters::default(), 3).unwrap();
        simulation
            .initial_cases(NodeId(1), Stratum::new(0, 0, 0), 2)
            .unwrap();
        for _ in 0..5 {
            simulation.simulate();
        }

        let file = tempfile::NamedTempFile::new().unwrap();
        write_variable_report(&simulation, file.path()).unwrap();

        let mut reader = csv::Reader::from_path(file.path()).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 6 * (Variable::COUNT + 1));
        assert_eq!(&rows[0][1], "1");
        assert_eq!(&rows[0][2], "Travis");
        assert_eq!(&rows[0][3], "susceptible");
        assert_eq!(rows[0][4].parse::<f64>().unwrap(), 498.0);
    }
}
