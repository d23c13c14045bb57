//! Priority groups: which strata are eligible for a treatment pass before
//! the remainder of the population.
//!
//! A group selects values per dimension, with `None` as the wildcard; a
//! selection is an ordered list of groups. Interventions expand a
//! selection to the deduplicated set of concrete strata it covers.

use crate::stratum::{Stratum, NUM_AGE_GROUPS, NUM_RISK_GROUPS, NUM_VACCINATED_GROUPS};
use serde::{Deserialize, Serialize};

/// One priority group: per-dimension selections, wildcard when `None`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PriorityGroup {
    pub name: String,
    #[serde(default)]
    pub ages: Option<Vec<usize>>,
    #[serde(default)]
    pub risks: Option<Vec<usize>>,
    #[serde(default)]
    pub vax: Option<Vec<usize>>,
}

impl PriorityGroup {
    /// The group covering the entire population.
    pub fn everyone(name: &str) -> PriorityGroup {
        PriorityGroup {
            name: name.to_string(),
            ages: None,
            risks: None,
            vax: None,
        }
    }

    fn dimension(selection: &Option<Vec<usize>>, size: usize) -> Vec<usize> {
        match selection {
            Some(values) => values.iter().copied().filter(|v| *v < size).collect(),
            None => (0..size).collect(),
        }
    }

    fn expand(&self) -> Vec<Stratum> {
        let mut strata = Vec::new();
        for age in Self::dimension(&self.ages, NUM_AGE_GROUPS) {
            for risk in Self::dimension(&self.risks, NUM_RISK_GROUPS) {
                for vax in Self::dimension(&self.vax, NUM_VACCINATED_GROUPS) {
                    strata.push(Stratum { age, risk, vax });
                }
            }
        }
        strata
    }
}

/// An ordered list of priority groups applied as one treatment pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PriorityGroupSelections {
    pub groups: Vec<PriorityGroup>,
}

impl PriorityGroupSelections {
    pub fn new(groups: Vec<PriorityGroup>) -> PriorityGroupSelections {
        PriorityGroupSelections { groups }
    }

    /// The implicit all-population selection that mops up residual
    /// stockpile after the configured groups are served.
    pub fn everyone() -> PriorityGroupSelections {
        PriorityGroupSelections {
            groups: vec![PriorityGroup::everyone("_ALL_")],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All concrete strata the selection covers, deduplicated, in
    /// (age, risk, vax) order.
    pub fn strata(&self) -> Vec<Stratum> {
        let mut strata: Vec<Stratum> = self.groups.iter().flat_map(PriorityGroup::expand).collect();
        strata.sort();
        strata.dedup();
        strata
    }

    /// The (age, risk) pairs the selection covers, ignoring the
    /// vaccination dimension; the vaccine pass works per pair and fixes
    /// the vaccination stratum itself.
    pub fn age_risk_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> =
            self.strata().iter().map(|s| (s.age, s.risk)).collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_group_covers_everything() {
        let selections = PriorityGroupSelections::everyone();
        assert_eq!(
            selections.strata().len(),
            NUM_AGE_GROUPS * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS
        );
        assert_eq!(
            selections.age_risk_pairs().len(),
            NUM_AGE_GROUPS * NUM_RISK_GROUPS
        );
    }

    #[test]
    fn overlapping_groups_deduplicate() {
        let children = PriorityGroup {
            name: "children".to_string(),
            ages: Some(vec![0, 1]),
            risks: None,
            vax: None,
        };
        let high_risk_children = PriorityGroup {
            name: "high-risk children".to_string(),
            ages: Some(vec![0, 1]),
            risks: Some(vec![1]),
            vax: None,
        };
        let selections = PriorityGroupSelections::new(vec![children, high_risk_children]);
        let strata = selections.strata();
        assert_eq!(strata.len(), 2 * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS);
        let mut sorted = strata.clone();
        sorted.sort();
        assert_eq!(strata, sorted);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let group = PriorityGroup {
            name: "elderly".to_string(),
            ages: Some(vec![4, 9]),
            risks: Some(vec![0]),
            vax: Some(vec![0]),
        };
        let selections = PriorityGroupSelections::new(vec![group]);
        assert_eq!(selections.strata(), vec![Stratum::new(4, 0, 0)]);
    }

    #[test]
    fn empty_selection() {
        let selections = PriorityGroupSelections::default();
        assert!(selections.is_empty());
        assert!(selections.strata().is_empty());
    }
}
