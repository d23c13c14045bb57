//! The dataset contract: everything the simulator consumes from a loader.
//!
//! A scenario describes the node network (identifiers, names, initial
//! populations per (age, risk), bilateral travel fractions) plus initial
//! stockpiles, scheduled deliveries, and initial cases. The simulator is
//! never constructed from a scenario that fails validation.

use crate::error::PansimError;
use crate::stockpile::Delivery;
use crate::stratum::{NUM_AGE_GROUPS, NUM_RISK_GROUPS};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

/// Opaque node identifier (a county FIPS code in the Texas dataset).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One geographic node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    /// Initial population per `[age][risk]`; the vaccinated stratum starts
    /// empty.
    pub population: [[f64; NUM_RISK_GROUPS]; NUM_AGE_GROUPS],
    #[serde(default)]
    pub antiviral_stockpile: u64,
    #[serde(default)]
    pub vaccine_stockpile: u64,
}

impl NodeSpec {
    pub fn total_population(&self) -> f64 {
        self.population.iter().flatten().sum()
    }
}

/// Cases seeded into a node before the first day is simulated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitialCases {
    pub node: NodeId,
    pub age: usize,
    pub risk: usize,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub nodes: Vec<NodeSpec>,
    /// `travel[i][j]`: fraction of node `i` residents who spend time in
    /// node `j` each day. Empty means no travel; otherwise the matrix must
    /// be square with the node count.
    #[serde(default)]
    pub travel: Vec<Vec<f64>>,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
    #[serde(default)]
    pub initial_cases: Vec<InitialCases>,
}

impl Scenario {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    /// Travel fraction from node index `from` to node index `to`; zero on
    /// the diagonal and when no matrix was supplied.
    pub fn travel_fraction(&self, from: usize, to: usize) -> f64 {
        if from == to || self.travel.is_empty() {
            return 0.0;
        }
        self.travel[from][to]
    }

    pub fn validate(&self) -> Result<(), PansimError> {
        if self.nodes.is_empty() {
            return Err("scenario has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|other| other.id == node.id) {
                return Err(format!("duplicate node id {}", node.id).into());
            }
            for row in &node.population {
                for &count in row {
                    if !count.is_finite() || count < 0.0 {
                        return Err(format!(
                            "node {} has an invalid population count {count}",
                            node.id
                        )
                        .into());
                    }
                }
            }
        }
        if !self.travel.is_empty() {
            if self.travel.len() != self.nodes.len()
                || self.travel.iter().any(|row| row.len() != self.nodes.len())
            {
                return Err(format!(
                    "travel matrix must be {n}x{n} to match the node count",
                    n = self.nodes.len()
                )
                .into());
            }
            for row in &self.travel {
                for &fraction in row {
                    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                        return Err(
                            format!("travel fraction {fraction} outside [0, 1]").into()
                        );
                    }
                }
            }
        }
        for delivery in &self.deliveries {
            if self.node_index(delivery.node).is_none() {
                return Err(format!("delivery targets unknown node {}", delivery.node).into());
            }
        }
        for cases in &self.initial_cases {
            if self.node_index(cases.node).is_none() {
                return Err(format!("initial cases target unknown node {}", cases.node).into());
            }
            if cases.age >= NUM_AGE_GROUPS || cases.risk >= NUM_RISK_GROUPS {
                return Err(format!(
                    "initial cases for node {} name an invalid stratum ({}, {})",
                    cases.node, cases.age, cases.risk
                )
                .into());
            }
        }
        Ok(())
    }

    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Scenario, PansimError> {
        let contents = fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&contents)?;
        scenario.validate()?;
        Ok(scenario)
    }
}
