//! Typed errors for the installer and configuration layer.
//!
//! Application plumbing still flows through `anyhow`; these variants exist
//! so `main` can recognise a failure and print remediation guidance.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Unknown variant label or an invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A source bundle (or other required input) is missing.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf, guidance: String },

    /// Filesystem failure while installing.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    /// Remediation hint for the operator, if any.
    pub fn guidance(&self) -> Option<&str> {
        match self {
            HarnessError::NotFound { guidance, .. } => Some(guidance.as_str()),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_carries_guidance() {
        let err = HarnessError::NotFound {
            path: PathBuf::from("/tmp/missing"),
            guidance: "Create the backup first.".to_string(),
        };
        assert_eq!(err.guidance(), Some("Create the backup first."));
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn test_configuration_has_no_guidance() {
        let err = HarnessError::Configuration("unknown variant 'v9'".to_string());
        assert!(err.guidance().is_none());
        assert!(err.to_string().contains("v9"));
    }
}
