use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::pitch::{YinConfig, FMAX_HZ, FMIN_HZ};
use crate::consonance::ConsonanceScoring;
use crate::stats::{AggregationMode, Centering, EdgePolicy};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub consonance: ConsonanceConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,
    #[serde(default = "default_step_secs")]
    pub step_secs: f64,
    #[serde(default = "default_mode")]
    pub mode: AggregationMode,
    #[serde(default = "default_edge")]
    pub edge: EdgePolicy,
    #[serde(default = "default_centering")]
    pub centering: Centering,
    #[serde(default = "default_fmin")]
    pub fmin: f64,
    #[serde(default = "default_fmax")]
    pub fmax: f64,
    #[serde(default = "default_yin_threshold")]
    pub yin_threshold: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelsConfig {
    /// Overrides the directory found next to the executable.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsonanceConfig {
    #[serde(default)]
    pub scoring: ConsonanceScoring,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            step_secs: default_step_secs(),
            mode: default_mode(),
            edge: default_edge(),
            centering: default_centering(),
            fmin: default_fmin(),
            fmax: default_fmax(),
            yin_threshold: default_yin_threshold(),
        }
    }
}

impl AnalysisConfig {
    pub fn yin(&self) -> YinConfig {
        YinConfig {
            fmin: self.fmin,
            fmax: self.fmax,
            threshold: self.yin_threshold,
            ..YinConfig::default()
        }
    }
}

fn default_window_secs() -> f64 { 1.0 }
fn default_step_secs() -> f64 { 0.1 }
fn default_mode() -> AggregationMode { AggregationMode::Strided }
fn default_edge() -> EdgePolicy { EdgePolicy::Short }
fn default_centering() -> Centering { Centering::Center }
fn default_fmin() -> f64 { FMIN_HZ }
fn default_fmax() -> f64 { FMAX_HZ }
fn default_yin_threshold() -> f64 { 0.1 }

/// Explicit path first, then `sonority.toml`, then the per-user config.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("sonority.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sonority").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sonority").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// A config that exists but does not parse is an error, never a silent default.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    if config.analysis.fmin <= 0.0 || config.analysis.fmin >= config.analysis.fmax {
        anyhow::bail!(
            "analysis.fmin ({}) must be positive and below analysis.fmax ({})",
            config.analysis.fmin,
            config.analysis.fmax
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.analysis.window_secs, 1.0);
        assert_eq!(config.analysis.edge, EdgePolicy::Short);
        assert_eq!(config.consonance.scoring, ConsonanceScoring::Ratio);
        assert!(config.models.dir.is_none());
    }

    #[test]
    fn reads_sections() {
        let config = parse_config(
            r#"
            [analysis]
            mode = "dense"
            centering = "trailing"
            window_secs = 0.5

            [models]
            dir = "/srv/models"

            [consonance]
            scoring = "weighted"
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.mode, AggregationMode::Dense);
        assert_eq!(config.analysis.centering, Centering::Trailing);
        assert_eq!(config.analysis.step_secs, 0.1);
        assert_eq!(config.models.dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(config.consonance.scoring, ConsonanceScoring::Weighted);
    }

    #[test]
    fn bad_policy_fails_fast() {
        let err = parse_config("[analysis]\nedge = \"wrap\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("wrap"));
        assert!(parse_config("[analysis]\nfmin = 500.0\nfmax = 100.0\n").is_err());
    }
}
