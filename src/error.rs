//! Provides [`PansimError`] and wraps other errors.
use std::fmt::{self, Debug, Display};
use std::io;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
/// The error type for every fallible operation in the crate. External
/// errors (I/O, JSON, CSV) are wrapped; everything else is reported through
/// the `PansimError` string variant.
pub enum PansimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    PansimError(String),
}

impl From<io::Error> for PansimError {
    fn from(error: io::Error) -> Self {
        PansimError::IoError(error)
    }
}

impl From<serde_json::Error> for PansimError {
    fn from(error: serde_json::Error) -> Self {
        PansimError::JsonError(error)
    }
}

impl From<csv::Error> for PansimError {
    fn from(error: csv::Error) -> Self {
        PansimError::CsvError(error)
    }
}

impl From<String> for PansimError {
    fn from(error: String) -> Self {
        PansimError::PansimError(error)
    }
}

impl From<&str> for PansimError {
    fn from(error: &str) -> Self {
        PansimError::PansimError(error.to_string())
    }
}

impl std::error::Error for PansimError {}

impl Display for PansimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {self:?}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string() {
        let error: PansimError = "unknown variable".into();
        assert!(matches!(error, PansimError::PansimError(_)));
        assert_eq!(
            error.to_string(),
            "Error: PansimError(\"unknown variable\")"
        );
    }

    #[test]
    fn from_io_error() {
        let error: PansimError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(error, PansimError::IoError(_)));
    }
}
