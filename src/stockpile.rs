//! Per-node antiviral and vaccine stockpiles, tracked over time the same
//! way population variables are: one frame per day, with `t+1` the only
//! mutable frontier. Scheduled deliveries (replenishments) land during the
//! daily copy-forward.

use crate::log::debug;
use crate::scenario::NodeId;
use serde::{Deserialize, Serialize};

/// A distributable resource held in stockpiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Antivirals,
    Vaccines,
}

/// A scheduled shipment into one node's stockpile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Delivery {
    pub day: u32,
    pub node: NodeId,
    pub resource: Resource,
    pub amount: u64,
}

/// One node's stockpile history, by day.
#[derive(Clone, Debug)]
pub struct Stockpile {
    antivirals: Vec<u64>,
    vaccines: Vec<u64>,
}

impl Stockpile {
    fn new(antivirals: u64, vaccines: u64) -> Stockpile {
        Stockpile {
            antivirals: vec![antivirals],
            vaccines: vec![vaccines],
        }
    }

    fn series(&self, resource: Resource) -> &Vec<u64> {
        match resource {
            Resource::Antivirals => &self.antivirals,
            Resource::Vaccines => &self.vaccines,
        }
    }

    fn series_mut(&mut self, resource: Resource) -> &mut Vec<u64> {
        match resource {
            Resource::Antivirals => &mut self.antivirals,
            Resource::Vaccines => &mut self.vaccines,
        }
    }

    pub fn available(&self, t: usize, resource: Resource) -> u64 {
        self.series(resource)[t]
    }
}

/// The stockpiles of every node plus the delivery schedule.
pub struct StockpileNetwork {
    stockpiles: Vec<Stockpile>,
    deliveries: Vec<(u32, usize, Resource, u64)>,
}

impl StockpileNetwork {
    /// `initial[i]` is `(antivirals, vaccines)` for node index `i`;
    /// deliveries are given by node index as well.
    pub fn new(initial: &[(u64, u64)], deliveries: Vec<(u32, usize, Resource, u64)>) -> StockpileNetwork {
        StockpileNetwork {
            stockpiles: initial
                .iter()
                .map(|&(antivirals, vaccines)| Stockpile::new(antivirals, vaccines))
                .collect(),
            deliveries,
        }
    }

    /// Copies day `t` forward to `t+1` and applies deliveries due on `t+1`.
    pub fn evolve(&mut self, t: usize) {
        for stockpile in &mut self.stockpiles {
            for resource in [Resource::Antivirals, Resource::Vaccines] {
                let series = stockpile.series_mut(resource);
                assert_eq!(t + 1, series.len(), "evolve must extend the frontier");
                let carried = series[t];
                series.push(carried);
            }
        }
        for &(day, node, resource, amount) in &self.deliveries {
            if day as usize == t + 1 {
                debug!("delivering {amount} {resource:?} to node index {node} on day {day}");
                self.stockpiles[node].series_mut(resource)[t + 1] += amount;
            }
        }
    }

    pub fn available(&self, t: usize, node: usize, resource: Resource) -> u64 {
        self.stockpiles[node].available(t, resource)
    }

    /// Removes `amount` from a node's stockpile at time `t`.
    pub fn debit(&mut self, t: usize, node: usize, resource: Resource, amount: u64) {
        let series = self.stockpiles[node].series_mut(resource);
        debug_assert!(series[t] >= amount);
        series[t] = series[t].saturating_sub(amount);
    }

    pub fn stockpile(&self, node: usize) -> &Stockpile {
        &self.stockpiles[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evolve_carries_and_delivers() {
        let mut network = StockpileNetwork::new(
            &[(1000, 500), (0, 0)],
            vec![(2, 1, Resource::Vaccines, 250)],
        );
        network.evolve(0);
        assert_eq!(network.available(1, 0, Resource::Antivirals), 1000);
        assert_eq!(network.available(1, 1, Resource::Vaccines), 0);
        network.evolve(1);
        assert_eq!(network.available(2, 1, Resource::Vaccines), 250);
        assert_eq!(network.available(2, 0, Resource::Vaccines), 500);
    }

    #[test]
    fn debit_reduces_frontier_only() {
        let mut network = StockpileNetwork::new(&[(1000, 0)], Vec::new());
        network.evolve(0);
        network.debit(1, 0, Resource::Antivirals, 300);
        assert_eq!(network.available(1, 0, Resource::Antivirals), 700);
        assert_eq!(network.available(0, 0, Resource::Antivirals), 1000);
        network.evolve(1);
        assert_eq!(network.available(2, 0, Resource::Antivirals), 700);
    }

    #[test]
    #[should_panic(expected = "evolve must extend the frontier")]
    fn evolve_requires_frontier() {
        let mut network = StockpileNetwork::new(&[(10, 10)], Vec::new());
        network.evolve(1);
    }
}
