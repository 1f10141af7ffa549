pub mod heuristic;
pub mod loader;
pub mod predictor;
pub mod scaler;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use predictor::{StandardizationSource, TraitPredictor};
pub use scaler::Standardizer;

/// Perceptual traits predicted from window statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trait {
    Brightness,
    Clarity,
    Sharpness,
    Smoothness,
    Thickness,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Brightness,
        Trait::Clarity,
        Trait::Sharpness,
        Trait::Smoothness,
        Trait::Thickness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trait::Brightness => "brightness",
            Trait::Clarity => "clarity",
            Trait::Sharpness => "sharpness",
            Trait::Smoothness => "smoothness",
            Trait::Thickness => "thickness",
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that maps one standardized statistic vector to a trait value.
pub trait Regressor: Send + Sync {
    /// Length of the input vector this model expects.
    fn n_features(&self) -> usize;

    fn predict(&self, x: &[f64]) -> f64;
}

/// One decision tree in scikit-learn's flattened layout: node `i` is a leaf
/// when `children_left[i] < 0`, otherwise `x[feature[i]] <= threshold[i]`
/// descends left.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("empty tree".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("tree arrays differ in length".into());
        }
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l < 0 {
                continue;
            }
            // Children always come after their parent, which also rules out cycles.
            let in_range = |c: i64| c as usize > i && (c as usize) < n;
            if r < 0 || !in_range(l) || !in_range(r) {
                return Err(format!("node {} has invalid children ({}, {})", i, l, r));
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= n_features {
                return Err(format!("node {} splits on feature {} of {}", i, f, n_features));
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] >= 0 {
            let f = self.feature[node] as usize;
            node = if x[f] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

/// Random-forest regressor: the mean of its trees.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl Regressor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        sum / self.trees.len() as f64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, x: &[f64]) -> f64 {
        self.intercept + self.coef.iter().zip(x).map(|(c, v)| c * v).sum::<f64>()
    }
}

/// On-disk form of a trait model, tagged by `kind`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    RandomForest(RandomForest),
    Linear(LinearModel),
}

impl ModelArtifact {
    /// Check internal consistency so prediction can index without bounds failures.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelArtifact::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err("forest has no trees".into());
                }
                for (i, tree) in forest.trees.iter().enumerate() {
                    tree.validate(forest.n_features)
                        .map_err(|e| format!("tree {}: {}", i, e))?;
                }
                Ok(())
            }
            ModelArtifact::Linear(linear) => {
                if linear.coef.is_empty() {
                    Err("linear model has no coefficients".into())
                } else {
                    Ok(())
                }
            }
        }
    }

    fn regressor(&self) -> &dyn Regressor {
        match self {
            ModelArtifact::RandomForest(m) => m,
            ModelArtifact::Linear(m) => m,
        }
    }
}

impl Regressor for ModelArtifact {
    fn n_features(&self) -> usize {
        self.regressor().n_features()
    }

    fn predict(&self, x: &[f64]) -> f64 {
        self.regressor().predict(x)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A one-split stump on `feature`: `left` when `x <= threshold`, else `right`.
    pub(crate) fn stump(feature: i64, threshold: f64, left: f64, right: f64) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![0.0, left, right],
        }
    }

    #[test]
    fn tree_threshold_is_inclusive_on_the_left() {
        let tree = stump(0, 0.5, -1.0, 1.0);
        assert_eq!(tree.predict(&[0.5]), -1.0);
        assert_eq!(tree.predict(&[0.51]), 1.0);
    }

    #[test]
    fn forest_averages_trees() {
        let forest = RandomForest {
            n_features: 2,
            trees: vec![stump(0, 0.0, 1.0, 3.0), stump(1, 0.0, 10.0, 20.0)],
        };
        assert_eq!(forest.predict(&[1.0, -1.0]), 6.5);
    }

    #[test]
    fn artifact_parses_from_tagged_json() {
        let json = r#"{"kind":"linear","coef":[2.0,-1.0],"intercept":0.5}"#;
        let model: ModelArtifact = serde_json::from_str(json).unwrap();
        assert!(model.validate().is_ok());
        assert_eq!(model.n_features(), 2);
        assert_eq!(model.predict(&[1.0, 1.0]), 1.5);
    }

    #[test]
    fn validation_rejects_broken_trees() {
        let mut tree = stump(0, 0.0, 1.0, 2.0);
        tree.feature[0] = 7;
        let model = ModelArtifact::RandomForest(RandomForest {
            n_features: 3,
            trees: vec![tree],
        });
        assert!(model.validate().unwrap_err().contains("feature 7"));

        let mut cyclic = stump(0, 0.0, 1.0, 2.0);
        cyclic.children_left[0] = 0;
        let model = ModelArtifact::RandomForest(RandomForest {
            n_features: 1,
            trees: vec![cyclic],
        });
        assert!(model.validate().is_err());
    }

    #[test]
    fn trait_names_are_lowercase() {
        let names: Vec<_> = Trait::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, ["brightness", "clarity", "sharpness", "smoothness", "thickness"]);
        assert_eq!(serde_json::to_string(&Trait::Clarity).unwrap(), "\"clarity\"");
    }
}
