use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{ModelArtifact, Standardizer, Trait};
use crate::error::{AnalysisError, MissingModels};

pub const SCALER_FILE: &str = "scaler.json";

/// Artifacts for every trait plus the optional shared scaler.
#[derive(Debug)]
pub struct ModelSet {
    pub dir: PathBuf,
    pub models: BTreeMap<Trait, ModelArtifact>,
    pub scaler: Option<Standardizer>,
}

pub fn model_file_name(t: Trait) -> String {
    format!("rf_model_{}.json", t.name())
}

/// Locate the bundled models directory relative to the executable.
pub fn find_models_dir() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(ref dir) = exe_dir {
        let models_dir = dir.join("models");
        if models_dir.is_dir() {
            return models_dir;
        }
        // target/debug layout
        if let Some(parent) = dir.parent() {
            let models_dir = parent.join("models");
            if models_dir.is_dir() {
                return models_dir;
            }
            if let Some(grandparent) = parent.parent() {
                let models_dir = grandparent.join("models");
                if models_dir.is_dir() {
                    return models_dir;
                }
            }
        }
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

/// Load every trait model from `dir`. All missing files are reported together
/// before anything is parsed.
pub fn load_models(dir: &Path) -> Result<ModelSet, AnalysisError> {
    let missing: Vec<PathBuf> = Trait::ALL
        .iter()
        .map(|&t| dir.join(model_file_name(t)))
        .filter(|p| !p.is_file())
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingModels(MissingModels {
            searched: dir.to_path_buf(),
            missing,
            listing: list_dir(dir),
        }));
    }

    let mut models = BTreeMap::new();
    for t in Trait::ALL {
        let path = dir.join(model_file_name(t));
        let model: ModelArtifact = read_json(&path)?;
        model
            .validate()
            .map_err(|reason| AnalysisError::Model { path: path.clone(), reason })?;
        log::debug!("Loaded {} model ({} features)", t, super::Regressor::n_features(&model));
        models.insert(t, model);
    }

    let scaler_path = dir.join(SCALER_FILE);
    let scaler = if scaler_path.is_file() {
        let scaler: Standardizer = read_json(&scaler_path)?;
        scaler
            .validate()
            .map_err(|reason| AnalysisError::Model { path: scaler_path.clone(), reason })?;
        Some(scaler)
    } else {
        log::warn!(
            "No {} in {}; standardization will be fit per input",
            SCALER_FILE,
            dir.display()
        );
        None
    };

    log::info!("Loaded {} trait models from {}", models.len(), dir.display());
    Ok(ModelSet {
        dir: dir.to_path_buf(),
        models,
        scaler,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AnalysisError> {
    let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::Model {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| AnalysisError::Model {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
