//! Synthetic sentinel ILI surveillance.
//!
//! A fixed panel of sentinel providers per node reports an
//! influenza-like-illness fraction each day: the true infected prevalence
//! plus a baseline of background ILI, observed with multiplicative noise
//! drawn from the simulation stream. The engine records one observation
//! per day after travel; the `ILI reports` derived variable scales the
//! stored fraction back to a patient count.

use crate::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Sentinel panel configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IliConfig {
    /// Number of independent providers averaged per node.
    pub providers_per_node: usize,
    /// Background ILI fraction reported even with no circulating virus.
    pub baseline: f64,
    /// Fraction of true prevalence the panel detects.
    pub sensitivity: f64,
    /// Half-width of the uniform multiplicative noise on each provider.
    pub noise: f64,
}

impl Default for IliConfig {
    fn default() -> IliConfig {
        IliConfig {
            providers_per_node: 3,
            baseline: 0.01,
            sensitivity: 0.6,
            noise: 0.25,
        }
    }
}

/// Accumulated daily observations, `[t][node] -> fraction`.
pub struct IliSurveillance {
    config: IliConfig,
    values: Vec<Vec<f64>>,
}

impl IliSurveillance {
    pub fn new(num_nodes: usize, config: IliConfig) -> IliSurveillance {
        IliSurveillance {
            config,
            // Day zero reports nothing.
            values: vec![vec![0.0; num_nodes]],
        }
    }

    /// Records one day of observations from per-node infected counts and
    /// populations.
    pub fn observe(&mut self, infected: &[f64], population: &[f64], rng: &mut SimRng) {
        let config = &self.config;
        let observations = infected
            .iter()
            .zip(population)
            .map(|(&infected, &population)| {
                let prevalence = if population > 0.0 {
                    infected / population
                } else {
                    0.0
                };
                let signal = config.baseline + config.sensitivity * prevalence;
                let mut total = 0.0;
                for _ in 0..config.providers_per_node {
                    let factor = 1.0 + config.noise * (2.0 * rng.uniform() - 1.0);
                    total += signal * factor;
                }
                let mean = if config.providers_per_node > 0 {
                    total / config.providers_per_node as f64
                } else {
                    signal
                };
                mean.max(0.0)
            })
            .collect();
        self.values.push(observations);
    }

    pub fn num_times(&self) -> usize {
        self.values.len()
    }

    /// The observed ILI fraction at `(t, node)`; zero when `t` is beyond
    /// the recorded days.
    pub fn fraction(&self, t: usize, node: usize) -> f64 {
        self.values.get(t).map_or(0.0, |day| day[node])
    }
}
