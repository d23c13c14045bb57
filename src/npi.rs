//! Non-pharmaceutical interventions: contact blockers scoped to a node, a
//! day window, and a mask of (source age, target age) pairs.
//!
//! For a discrete contact the engine draws against the combined
//! effectiveness of every applicable NPI; for the travel step the same
//! combined value scales the expected number of infectious contacts.

use crate::scenario::NodeId;
use crate::stratum::NUM_AGE_GROUPS;
use serde::{Deserialize, Serialize};

/// Which (from age, to age) contact pairs an NPI applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePairMask(pub [[bool; NUM_AGE_GROUPS]; NUM_AGE_GROUPS]);

impl AgePairMask {
    /// Applies to every contact pair.
    pub fn all() -> AgePairMask {
        AgePairMask([[true; NUM_AGE_GROUPS]; NUM_AGE_GROUPS])
    }

    /// Applies to contacts from any of `from_ages` to any of `to_ages`,
    /// in both directions (a school closure cuts child-adult contact the
    /// same way it cuts adult-child contact).
    pub fn between(from_ages: &[usize], to_ages: &[usize]) -> AgePairMask {
        let mut mask = [[false; NUM_AGE_GROUPS]; NUM_AGE_GROUPS];
        for &a in from_ages {
            for &b in to_ages {
                mask[a][b] = true;
                mask[b][a] = true;
            }
        }
        AgePairMask(mask)
    }

    pub fn applies(&self, from_age: usize, to_age: usize) -> bool {
        self.0[from_age][to_age]
    }
}

impl Default for AgePairMask {
    fn default() -> AgePairMask {
        AgePairMask::all()
    }
}

/// One contact-blocking intervention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Npi {
    pub name: String,
    /// Restricts the NPI to one node; `None` applies it everywhere.
    #[serde(default)]
    pub node: Option<NodeId>,
    /// First day in effect.
    pub start_day: u32,
    /// Last day in effect, inclusive.
    pub end_day: u32,
    /// Probability that an applicable contact is blocked.
    pub effectiveness: f64,
    #[serde(default)]
    pub age_pair_mask: AgePairMask,
}

impl Npi {
    fn active(&self, node: NodeId, day: u32, from_age: usize, to_age: usize) -> bool {
        self.node.map_or(true, |n| n == node)
            && (self.start_day..=self.end_day).contains(&day)
            && self.age_pair_mask.applies(from_age, to_age)
    }
}

/// Combined effectiveness of all NPIs active for the given contact:
/// `1 - prod(1 - e_i)`. Zero when none apply.
pub fn combined_effectiveness(
    npis: &[Npi],
    node: NodeId,
    day: u32,
    from_age: usize,
    to_age: usize,
) -> f64 {
    let pass_through: f64 = npis
        .iter()
        .filter(|npi| npi.active(node, day, from_age, to_age))
        .map(|npi| 1.0 - npi.effectiveness)
        .product();
    1.0 - pass_through
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school_closure(node: Option<NodeId>) -> Npi {
        Npi {
            name: "school closure".to_string(),
            node,
            start_day: 10,
            end_day: 20,
            effectiveness: 0.4,
            age_pair_mask: AgePairMask::between(&[1], &[0, 1, 2, 3, 4]),
        }
    }

    #[test]
    fn window_is_inclusive() {
        let npis = vec![school_closure(None)];
        let node = NodeId(48453);
        assert_eq!(combined_effectiveness(&npis, node, 9, 1, 2), 0.0);
        assert_eq!(combined_effectiveness(&npis, node, 10, 1, 2), 0.4);
        assert_eq!(combined_effectiveness(&npis, node, 20, 1, 2), 0.4);
        assert_eq!(combined_effectiveness(&npis, node, 21, 1, 2), 0.0);
    }

    #[test]
    fn mask_is_symmetric_for_between() {
        let npis = vec![school_closure(None)];
        let node = NodeId(1);
        assert_eq!(combined_effectiveness(&npis, node, 15, 2, 1), 0.4);
        assert_eq!(combined_effectiveness(&npis, node, 15, 1, 1), 0.4);
        // Adult-adult contact is untouched by a school closure.
        assert_eq!(combined_effectiveness(&npis, node, 15, 2, 2), 0.0);
    }

    #[test]
    fn node_scoping() {
        let npis = vec![school_closure(Some(NodeId(1)))];
        assert_eq!(combined_effectiveness(&npis, NodeId(1), 15, 1, 2), 0.4);
        assert_eq!(combined_effectiveness(&npis, NodeId(2), 15, 1, 2), 0.0);
    }

    #[test]
    fn multiple_npis_compound() {
        let mut second = school_closure(None);
        second.name = "distancing".to_string();
        second.effectiveness = 0.5;
        second.age_pair_mask = AgePairMask::all();
        let npis = vec![school_closure(None), second];
        let combined = combined_effectiveness(&npis, NodeId(1), 15, 1, 2);
        approx::assert_abs_diff_eq!(combined, 0.7, epsilon = 1e-12);
    }
}
