//! The population store: a dense 5-D counter of people per
//! `(variable, time, node, age, risk, vaccinated)`.
//!
//! Counts are non-negative integers stored as `f64`. The store only grows
//! along the time axis; the newest frame (`t+1` during a step) is the only
//! mutable frontier. At every `(t, node)` the seven disease compartments
//! sum to the `population` variable.

use crate::error::PansimError;
use crate::log::warn;
use crate::stratum::{
    Stratum, StratumSelector, NUM_AGE_GROUPS, NUM_RISK_GROUPS, NUM_VACCINATED_GROUPS,
};
use std::str::FromStr;

/// A tracked population variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    Susceptible,
    Exposed,
    Asymptomatic,
    Treatable,
    Infectious,
    Recovered,
    Deceased,
    Population,
    /// Cumulative count treated with antivirals, effective or not.
    Treated,
    TreatedDaily,
    TreatedIneffectiveDaily,
    VaccinatedDaily,
}

/// The seven compartments that partition `population` at every `(t, node)`.
pub const COMPARTMENTS: [Variable; 7] = [
    Variable::Susceptible,
    Variable::Exposed,
    Variable::Asymptomatic,
    Variable::Treatable,
    Variable::Infectious,
    Variable::Recovered,
    Variable::Deceased,
];

impl Variable {
    pub const COUNT: usize = 12;

    pub const ALL: [Variable; Variable::COUNT] = [
        Variable::Susceptible,
        Variable::Exposed,
        Variable::Asymptomatic,
        Variable::Treatable,
        Variable::Infectious,
        Variable::Recovered,
        Variable::Deceased,
        Variable::Population,
        Variable::Treated,
        Variable::TreatedDaily,
        Variable::TreatedIneffectiveDaily,
        Variable::VaccinatedDaily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::Susceptible => "susceptible",
            Variable::Exposed => "exposed",
            Variable::Asymptomatic => "asymptomatic",
            Variable::Treatable => "treatable",
            Variable::Infectious => "infectious",
            Variable::Recovered => "recovered",
            Variable::Deceased => "deceased",
            Variable::Population => "population",
            Variable::Treated => "treated",
            Variable::TreatedDaily => "treated (daily)",
            Variable::TreatedIneffectiveDaily => "treated (ineffective daily)",
            Variable::VaccinatedDaily => "vaccinated (daily)",
        }
    }

    fn index(self) -> usize {
        Variable::ALL.iter().position(|v| *v == self).unwrap()
    }
}

impl FromStr for Variable {
    type Err = PansimError;

    fn from_str(name: &str) -> Result<Variable, PansimError> {
        Variable::ALL
            .into_iter()
            .find(|v| v.name() == name)
            .ok_or_else(|| PansimError::from(format!("unknown variable: {name}")))
    }
}

const STRATA_PER_NODE: usize = NUM_AGE_GROUPS * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS;

/// Dense storage with computed strides; time is the outermost dimension so
/// `copy_forward` appends one contiguous frame.
pub struct VariableStore {
    num_nodes: usize,
    data: Vec<f64>,
}

impl VariableStore {
    /// A store with a single zeroed frame at `t = 0`.
    pub fn new(num_nodes: usize) -> VariableStore {
        VariableStore {
            num_nodes,
            data: vec![0.0; Variable::COUNT * num_nodes * STRATA_PER_NODE],
        }
    }

    fn frame_len(&self) -> usize {
        Variable::COUNT * self.num_nodes * STRATA_PER_NODE
    }

    pub fn num_times(&self) -> usize {
        self.data.len() / self.frame_len()
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn offset(&self, var: Variable, t: usize, node: usize, stratum: Stratum) -> usize {
        debug_assert!(t < self.num_times());
        debug_assert!(node < self.num_nodes);
        debug_assert!(stratum.is_valid());
        ((t * Variable::COUNT + var.index()) * self.num_nodes + node) * STRATA_PER_NODE
            + (stratum.age * NUM_RISK_GROUPS + stratum.risk) * NUM_VACCINATED_GROUPS
            + stratum.vax
    }

    /// Single-stratum read; internal hot path, bounds checked in debug.
    pub fn value(&self, var: Variable, t: usize, node: usize, stratum: Stratum) -> f64 {
        self.data[self.offset(var, t, node, stratum)]
    }

    pub fn set_value(&mut self, var: Variable, t: usize, node: usize, stratum: Stratum, n: f64) {
        let offset = self.offset(var, t, node, stratum);
        self.data[offset] = n;
    }

    pub fn add_value(&mut self, var: Variable, t: usize, node: usize, stratum: Stratum, n: f64) {
        let offset = self.offset(var, t, node, stratum);
        self.data[offset] += n;
    }

    /// Sums the variable over every stratum the selector matches.
    pub fn sum(&self, var: Variable, t: usize, node: usize, selector: StratumSelector) -> f64 {
        Stratum::all()
            .filter(|s| selector.matches(*s))
            .map(|s| self.value(var, t, node, s))
            .sum()
    }

    /// Sums the variable over an explicit set of strata.
    pub fn sum_set(&self, var: Variable, t: usize, node: usize, strata: &[Stratum]) -> f64 {
        strata.iter().map(|s| self.value(var, t, node, *s)).sum()
    }

    /// Checked read for external callers; wildcard dimensions are summed.
    pub fn get(
        &self,
        var: Variable,
        t: usize,
        node: usize,
        selector: StratumSelector,
    ) -> Result<f64, PansimError> {
        if t >= self.num_times() {
            return Err(format!("time index {t} out of range (have {})", self.num_times()).into());
        }
        if node >= self.num_nodes {
            return Err(format!("node index {node} out of range").into());
        }
        if !selector.is_valid() {
            return Err(format!("invalid stratum selector: {selector:?}").into());
        }
        Ok(self.sum(var, t, node, selector))
    }

    /// Atomically moves `n` people from one variable to another at a fixed
    /// `(t, node, stratum)`. Short counts clamp to what is available with a
    /// warning; returns the number actually moved.
    pub fn transition(
        &mut self,
        n: f64,
        from: Variable,
        to: Variable,
        t: usize,
        node: usize,
        stratum: Stratum,
    ) -> f64 {
        if n <= 0.0 {
            return 0.0;
        }
        let available = self.value(from, t, node, stratum);
        let moved = if n > available {
            warn!(
                "transition {} -> {} of {} clamped to {} at t={} node={} stratum={:?}",
                from.name(),
                to.name(),
                n,
                available.max(0.0),
                t,
                node,
                stratum
            );
            available.max(0.0)
        } else {
            n
        };
        self.add_value(from, t, node, stratum, -moved);
        self.add_value(to, t, node, stratum, moved);
        moved
    }

    /// Moves `n` people of one variable between strata at a fixed
    /// `(t, node)`; the vaccination pass uses this for compartment and
    /// population moves. Clamps like [`VariableStore::transition`].
    pub fn shift(
        &mut self,
        n: f64,
        var: Variable,
        t: usize,
        node: usize,
        from: Stratum,
        to: Stratum,
    ) -> f64 {
        if n <= 0.0 {
            return 0.0;
        }
        let available = self.value(var, t, node, from);
        let moved = if n > available {
            warn!(
                "stratum shift of {} {} clamped to {} at t={} node={} {:?} -> {:?}",
                n,
                var.name(),
                available.max(0.0),
                t,
                node,
                from,
                to
            );
            available.max(0.0)
        } else {
            n
        };
        self.add_value(var, t, node, from, -moved);
        self.add_value(var, t, node, to, moved);
        moved
    }

    /// Extends the time axis by one frame initialized from frame `t`.
    /// `t` must be the current last frame.
    pub fn copy_forward(&mut self, t: usize) {
        assert_eq!(
            t + 1,
            self.num_times(),
            "copy_forward must extend the frontier"
        );
        let frame_len = self.frame_len();
        let start = t * frame_len;
        self.data.extend_from_within(start..start + frame_len);
    }

    /// Zeroes one variable across all nodes and strata at time `t`; the
    /// daily counters reset this way each morning.
    pub fn zero_variable(&mut self, var: Variable, t: usize) {
        for node in 0..self.num_nodes {
            for stratum in Stratum::all() {
                self.set_value(var, t, node, stratum, 0.0);
            }
        }
    }
}
