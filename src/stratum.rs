//! Population strata and the model's mixing constants.
//!
//! Every person belongs to a stratum: an (age group, risk group,
//! vaccination status) triple. Counts are tracked per stratum; queries sum
//! over wildcard dimensions with a [`StratumSelector`].

use serde::{Deserialize, Serialize};

/// Number of age groups: 0-4, 5-24, 25-44, 45-64, 65+.
pub const NUM_AGE_GROUPS: usize = 5;
/// Number of risk groups: low, high.
pub const NUM_RISK_GROUPS: usize = 2;
/// Number of vaccination strata: unvaccinated, vaccinated.
pub const NUM_VACCINATED_GROUPS: usize = 2;

/// Daily contact rates between age groups, `CONTACT_RATES[from][to]`.
pub const CONTACT_RATES: [[f64; NUM_AGE_GROUPS]; NUM_AGE_GROUPS] = [
    [45.1228487783, 8.7808312353, 11.7757947836, 6.10114751268, 4.02227175596],
    [8.7808312353, 41.2889143668, 13.3332813497, 7.847051289, 4.22656343551],
    [11.7757947836, 13.3332813497, 21.4270155984, 13.7392636644, 6.92483172729],
    [6.10114751268, 7.847051289, 13.7392636644, 18.0482119252, 9.45371062356],
    [4.02227175596, 4.22656343551, 6.92483172729, 9.45371062356, 14.0529294262],
];

/// Susceptibility to infection by age group.
pub const SIGMA: [f64; NUM_AGE_GROUPS] = [1.00, 0.98, 0.94, 0.91, 0.66];

/// Fraction of a traveler's contacts that happen at the destination.
pub const TRAVEL_RHO: f64 = 0.39;

/// Divisors applied to travel flows by age group; the very young and the
/// old travel less.
pub const AGE_FLOW_REDUCTION: [f64; NUM_AGE_GROUPS] = [10.0, 2.0, 1.0, 1.0, 2.0];

/// An (age, risk, vaccinated) triple identifying a sub-population.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stratum {
    pub age: usize,
    pub risk: usize,
    pub vax: usize,
}

impl Stratum {
    pub fn new(age: usize, risk: usize, vax: usize) -> Stratum {
        Stratum { age, risk, vax }
    }

    /// Whether every dimension is within the model's bounds.
    pub fn is_valid(&self) -> bool {
        self.age < NUM_AGE_GROUPS && self.risk < NUM_RISK_GROUPS && self.vax < NUM_VACCINATED_GROUPS
    }

    /// All strata in (age, risk, vax) lexicographic order.
    pub fn all() -> impl Iterator<Item = Stratum> {
        (0..NUM_AGE_GROUPS).flat_map(|age| {
            (0..NUM_RISK_GROUPS).flat_map(move |risk| {
                (0..NUM_VACCINATED_GROUPS).map(move |vax| Stratum { age, risk, vax })
            })
        })
    }
}

/// A stratum query with per-dimension wildcards; `None` sums the dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumSelector {
    pub age: Option<usize>,
    pub risk: Option<usize>,
    pub vax: Option<usize>,
}

impl StratumSelector {
    /// Selects the whole population of a node.
    pub const ALL: StratumSelector = StratumSelector {
        age: None,
        risk: None,
        vax: None,
    };

    pub fn age(age: usize) -> StratumSelector {
        StratumSelector {
            age: Some(age),
            ..StratumSelector::ALL
        }
    }

    pub fn age_risk(age: usize, risk: usize) -> StratumSelector {
        StratumSelector {
            age: Some(age),
            risk: Some(risk),
            vax: None,
        }
    }

    pub fn with_vax(self, vax: usize) -> StratumSelector {
        StratumSelector {
            vax: Some(vax),
            ..self
        }
    }

    /// Whether any specified dimension is out of bounds.
    pub fn is_valid(&self) -> bool {
        self.age.map_or(true, |a| a < NUM_AGE_GROUPS)
            && self.risk.map_or(true, |r| r < NUM_RISK_GROUPS)
            && self.vax.map_or(true, |v| v < NUM_VACCINATED_GROUPS)
    }

    pub fn matches(&self, stratum: Stratum) -> bool {
        self.age.map_or(true, |a| a == stratum.age)
            && self.risk.map_or(true, |r| r == stratum.risk)
            && self.vax.map_or(true, |v| v == stratum.vax)
    }
}

impl From<Stratum> for StratumSelector {
    fn from(stratum: Stratum) -> StratumSelector {
        StratumSelector {
            age: Some(stratum.age),
            risk: Some(stratum.risk),
            vax: Some(stratum.vax),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_strata_count_and_order() {
        let all: Vec<Stratum> = Stratum::all().collect();
        assert_eq!(
            all.len(),
            NUM_AGE_GROUPS * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS
        );
        assert_eq!(all[0], Stratum::new(0, 0, 0));
        assert_eq!(all[1], Stratum::new(0, 0, 1));
        assert_eq!(all[2], Stratum::new(0, 1, 0));
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
        assert!(all.iter().all(Stratum::is_valid));
    }

    #[test]
    fn selector_matching() {
        let stratum = Stratum::new(2, 1, 0);
        assert!(StratumSelector::ALL.matches(stratum));
        assert!(StratumSelector::age(2).matches(stratum));
        assert!(!StratumSelector::age(3).matches(stratum));
        assert!(StratumSelector::age_risk(2, 1).matches(stratum));
        assert!(!StratumSelector::age_risk(2, 1).with_vax(1).matches(stratum));
        assert_eq!(
            StratumSelector::from(stratum),
            StratumSelector::age_risk(2, 1).with_vax(0)
        );
    }

    #[test]
    fn selector_validity() {
        assert!(StratumSelector::ALL.is_valid());
        assert!(StratumSelector::age(4).is_valid());
        assert!(!StratumSelector::age(5).is_valid());
        assert!(!StratumSelector::age_risk(0, 2).is_valid());
        assert!(!StratumSelector::ALL.with_vax(2).is_valid());
    }

    #[test]
    fn contact_matrix_is_symmetric_enough() {
        // The supplied matrix is symmetric; a transposition typo here would
        // silently skew transmission.
        for a in 0..NUM_AGE_GROUPS {
            for b in 0..NUM_AGE_GROUPS {
                assert_eq!(CONTACT_RATES[a][b], CONTACT_RATES[b][a]);
            }
        }
    }
}
