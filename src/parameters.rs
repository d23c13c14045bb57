//! Model parameters: a read-mostly value handed to the simulator at
//! construction. Interventions and the transmission model consult this
//! value; nothing in the core mutates it.

use crate::error::PansimError;
use crate::ili::IliConfig;
use crate::npi::Npi;
use crate::priority::PriorityGroupSelections;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Basic reproduction number.
    pub r0: f64,
    /// Scaling factor for the transmission rate given contact;
    /// `beta = r0 / beta_scale`.
    pub beta_scale: f64,
    /// Exposed -> asymptomatic transition rate.
    pub tau: f64,
    /// Asymptomatic -> treatable transition rate.
    pub kappa: f64,
    /// Treatable -> infectious transition rate.
    pub chi: f64,
    /// Asymptomatic, treatable or infectious -> recovered transition rate.
    pub gamma: f64,
    /// Asymptomatic, treatable or infectious -> deceased transition rate.
    pub nu: f64,
    /// Probability an antiviral course removes a treatable case.
    pub antiviral_effectiveness: f64,
    /// Fraction of treatable cases that seek and follow treatment.
    pub antiviral_adherence: f64,
    /// Courses distributable per day, as a fraction of node population.
    pub antiviral_capacity: f64,
    /// Probability a delivered vaccine protects against a contact.
    pub vaccine_effectiveness: f64,
    /// Fraction of the population willing to be vaccinated.
    pub vaccine_adherence: f64,
    /// Doses distributable per day, as a fraction of node population.
    pub vaccine_capacity: f64,
    /// Days after vaccination before the vaccine can take effect.
    pub vaccine_latency_period: u32,
    pub antiviral_priority_groups: PriorityGroupSelections,
    pub vaccine_priority_groups: PriorityGroupSelections,
    pub npis: Vec<Npi>,
    /// Sentinel ILI surveillance; `None` disables it.
    pub ili: Option<IliConfig>,
}

impl Default for Parameters {
    fn default() -> Parameters {
        Parameters {
            r0: 1.2,
            beta_scale: 65.0,
            tau: 0.526316,
            kappa: 0.526316,
            chi: 1.0,
            gamma: 0.243902,
            nu: 0.0087,
            antiviral_effectiveness: 0.15,
            antiviral_adherence: 0.8,
            antiviral_capacity: 0.001,
            vaccine_effectiveness: 0.8,
            vaccine_adherence: 0.83,
            vaccine_capacity: 0.001,
            vaccine_latency_period: 14,
            antiviral_priority_groups: PriorityGroupSelections::default(),
            vaccine_priority_groups: PriorityGroupSelections::default(),
            npis: Vec::new(),
            ili: None,
        }
    }
}

impl Parameters {
    /// Transmission rate given contact.
    pub fn beta(&self) -> f64 {
        self.r0 / self.beta_scale
    }

    /// Range checks; the simulator refuses to construct on an `Err`.
    pub fn validate(&self) -> Result<(), PansimError> {
        fn rate(name: &str, value: f64) -> Result<(), PansimError> {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite non-negative rate, got {value}").into());
            }
            Ok(())
        }
        fn fraction(name: &str, value: f64) -> Result<(), PansimError> {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be within [0, 1], got {value}").into());
            }
            Ok(())
        }

        rate("r0", self.r0)?;
        if !(self.beta_scale > 0.0) {
            return Err(format!("beta_scale must be positive, got {}", self.beta_scale).into());
        }
        rate("tau", self.tau)?;
        rate("kappa", self.kappa)?;
        rate("chi", self.chi)?;
        rate("gamma", self.gamma)?;
        rate("nu", self.nu)?;
        fraction("antiviral_effectiveness", self.antiviral_effectiveness)?;
        fraction("antiviral_adherence", self.antiviral_adherence)?;
        fraction("antiviral_capacity", self.antiviral_capacity)?;
        fraction("vaccine_effectiveness", self.vaccine_effectiveness)?;
        fraction("vaccine_adherence", self.vaccine_adherence)?;
        fraction("vaccine_capacity", self.vaccine_capacity)?;
        for npi in &self.npis {
            fraction(&format!("npi '{}' effectiveness", npi.name), npi.effectiveness)?;
            if npi.end_day < npi.start_day {
                return Err(format!(
                    "npi '{}' window ends on day {} before it starts on day {}",
                    npi.name, npi.end_day, npi.start_day
                )
                .into());
            }
        }
        Ok(())
    }

    /// Reads parameters from a JSON file; missing fields take defaults.
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Parameters, PansimError> {
        let contents = fs::read_to_string(path)?;
        let parameters: Parameters = serde_json::from_str(&contents)?;
        parameters.validate()?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        let bad = Parameters {
            beta_scale: 0.0,
            ..Parameters::default()
        };
        assert!(bad.validate().is_err());

        let bad = Parameters {
            gamma: -0.2,
            ..Parameters::default()
        };
        assert!(bad.validate().is_err());

        let bad = Parameters {
            vaccine_adherence: 1.5,
            ..Parameters::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_inverted_npi_window() {
        let bad = Parameters {
            npis: vec![Npi {
                name: "backwards".to_string(),
                node: None,
                start_day: 10,
                end_day: 5,
                effectiveness: 0.5,
                age_pair_mask: Default::default(),
            }],
            ..Parameters::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn load_from_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"r0": 2.5, "vaccine_latency_period": 7}}"#).unwrap();
        let parameters = Parameters::load_from_json(file.path()).unwrap();
        assert_eq!(parameters.r0, 2.5);
        assert_eq!(parameters.vaccine_latency_period, 7);
        assert_eq!(parameters.beta_scale, 65.0);
    }

    #[test]
    fn load_from_json_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"r0": -1.0}}"#).unwrap();
        assert!(Parameters::load_from_json(file.path()).is_err());
    }
}
