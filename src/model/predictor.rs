use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use super::loader::ModelSet;
use super::{ModelArtifact, Regressor, Standardizer, Trait};
use crate::error::AnalysisError;
use crate::stats::WindowStats;

/// Where the standardization applied to a run came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardizationSource {
    /// The transform saved alongside the models.
    Persisted,
    /// Fit on this input's own windows. Results are not comparable across inputs.
    FittedPerCall,
}

#[derive(Clone, Debug)]
pub struct WindowPredictions {
    pub traits: BTreeMap<Trait, Vec<f64>>,
    pub source: StandardizationSource,
}

/// Read-only trait models shared across every file in a batch.
pub struct TraitPredictor {
    models: BTreeMap<Trait, ModelArtifact>,
    scaler: Option<Standardizer>,
}

impl TraitPredictor {
    pub fn new(models: BTreeMap<Trait, ModelArtifact>, scaler: Option<Standardizer>) -> Self {
        Self { models, scaler }
    }

    pub fn from_set(set: ModelSet) -> Self {
        Self::new(set.models, set.scaler)
    }

    /// One value per window for every loaded trait.
    pub fn predict_windows(&self, stats: &WindowStats) -> Result<WindowPredictions, AnalysisError> {
        let (standardized, source) = match &self.scaler {
            Some(scaler) => (scaler.transform(&stats.vectors)?, StandardizationSource::Persisted),
            None if stats.is_empty() => (Vec::new(), StandardizationSource::FittedPerCall),
            None => {
                log::warn!("Fitting standardization on this input's {} windows", stats.len());
                let fitted = Standardizer::fit(&stats.vectors)?;
                (fitted.transform(&stats.vectors)?, StandardizationSource::FittedPerCall)
            }
        };

        let mut traits = BTreeMap::new();
        for (&t, model) in &self.models {
            let expected = model.n_features();
            if !stats.is_empty() && stats.dim() != expected {
                return Err(AnalysisError::DimensionMismatch {
                    expected,
                    actual: stats.dim(),
                });
            }
            let values: Vec<f64> = standardized.par_iter().map(|row| model.predict(row)).collect();
            traits.insert(t, values);
        }

        Ok(WindowPredictions { traits, source })
    }
}
