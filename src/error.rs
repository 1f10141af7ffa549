use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the analysis core. The binary wraps these in `anyhow`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown {kind} '{value}' (expected {expected})")]
    InvalidPolicy {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0}")]
    MissingModels(MissingModels),

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("malformed model artifact {path}: {reason}")]
    Model { path: PathBuf, reason: String },
}

/// Diagnostic for model artifacts that could not be found at startup.
#[derive(Debug)]
pub struct MissingModels {
    pub searched: PathBuf,
    pub missing: Vec<PathBuf>,
    pub listing: Vec<String>,
}

impl fmt::Display for MissingModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "missing model files:")?;
        for path in &self.missing {
            writeln!(f, "  {}", path.display())?;
        }
        writeln!(f, "searched: {}", self.searched.display())?;
        write!(f, "directory listing:")?;
        if self.listing.is_empty() {
            write!(f, " (empty or unreadable)")?;
        }
        for name in &self.listing {
            write!(f, "\n  {}", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_lists_paths_and_contents() {
        let err = AnalysisError::MissingModels(MissingModels {
            searched: PathBuf::from("/opt/sonority/models"),
            missing: vec![PathBuf::from("/opt/sonority/models/rf_model_clarity.json")],
            listing: vec!["scaler.json".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("rf_model_clarity.json"));
        assert!(msg.contains("searched: /opt/sonority/models"));
        assert!(msg.contains("scaler.json"));
    }

    #[test]
    fn invalid_policy_names_the_choices() {
        let err = AnalysisError::InvalidPolicy {
            kind: "edge policy",
            value: "wrap".into(),
            expected: "drop, pad or short",
        };
        assert_eq!(
            err.to_string(),
            "unknown edge policy 'wrap' (expected drop, pad or short)"
        );
    }
}
