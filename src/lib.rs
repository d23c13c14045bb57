//! A stochastic discrete-event SEATIRD epidemic simulator
//!
//! Pansim models the spread of an influenza-like pathogen over a network
//! of geographic nodes (counties), with the population of each node
//! stratified by age group, risk group and vaccination status. Disease
//! follows the SEATIRD progression: susceptible, exposed, asymptomatic,
//! treatable, infectious, recovered or deceased.
//!
//! The model is agent-count rather than agent-based: compartment counts
//! live in a dense population store, but every exposure materializes a
//! per-individual [`schedule::Schedule`], the individual's entire future
//! sampled eagerly with competing exponentials, and a per-node priority
//! queue consumes those events in time order. Interleaved with event
//! processing, the engine applies daily antiviral and vaccine campaigns
//! pro-rata over priority groups subject to stockpile and capacity,
//! blocks contacts through non-pharmaceutical interventions, and runs a
//! daily travel step that probabilistically exposes susceptibles between
//! nodes.
//!
//! A typical run:
//!
//! ```rust
//! use pansim::prelude::*;
//!
//! # fn main() -> Result<(), PansimError> {
//! let scenario = Scenario {
//!     nodes: vec![NodeSpec {
//!         id: NodeId(48453),
//!         name: "Travis".to_string(),
//!         population: [[1000.0, 100.0]; 5],
//!         antiviral_stockpile: 500,
//!         vaccine_stockpile: 0,
//!     }],
//!     ..Scenario::default()
//! };
//! let mut simulation = Simulation::new(scenario, Parameters::default(), 42)?;
//! simulation.initial_cases(NodeId(48453), Stratum::new(1, 0, 0), 5)?;
//! for _ in 0..30 {
//!     simulation.simulate();
//! }
//! let infected = simulation.derived(
//!     DerivedVariable::AllInfected,
//!     simulation.time(),
//!     NodeId(48453),
//!     StratumSelector::ALL,
//! )?;
//! # let _ = infected;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::PansimError;

pub mod log;
pub use crate::log::{
    debug, disable_logging, enable_logging, error, info, set_log_level, trace, warn, LevelFilter,
};

pub mod rng;
pub use rng::SimRng;

pub mod stratum;
pub use stratum::{Stratum, StratumSelector};

pub mod variables;
pub use variables::{Variable, VariableStore};

pub mod parameters;
pub use parameters::Parameters;

pub mod priority;
pub use priority::{PriorityGroup, PriorityGroupSelections};

pub mod npi;
pub use npi::{AgePairMask, Npi};

pub mod stockpile;
pub use stockpile::{Delivery, Resource, StockpileNetwork};

pub mod scenario;
pub use scenario::{InitialCases, NodeId, NodeSpec, Scenario};

pub mod schedule;
pub mod queue;

pub mod ili;
pub use ili::IliConfig;

pub mod simulation;
pub use simulation::{DerivedVariable, Simulation};

pub mod report;
pub mod runner;

/// The types most callers need.
pub mod prelude {
    pub use crate::error::PansimError;
    pub use crate::ili::IliConfig;
    pub use crate::npi::{AgePairMask, Npi};
    pub use crate::parameters::Parameters;
    pub use crate::priority::{PriorityGroup, PriorityGroupSelections};
    pub use crate::scenario::{InitialCases, NodeId, NodeSpec, Scenario};
    pub use crate::simulation::{DerivedVariable, Simulation};
    pub use crate::stockpile::{Delivery, Resource};
    pub use crate::stratum::{Stratum, StratumSelector};
    pub use crate::variables::Variable;
}
