//! Regressors evaluated over an encoded feature vector.

use serde::{Deserialize, Serialize};

use super::ModelLoadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Regressor {
    Linear(LinearRegressor),
    TreeEnsemble(TreeEnsemble),
}

impl Regressor {
    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Linear(_) => "linear",
            Regressor::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    pub fn verify(&self, width: usize) -> Result<(), ModelLoadError> {
        match self {
            Regressor::Linear(model) => model.verify(width),
            Regressor::TreeEnsemble(model) => model.verify(width),
        }
    }

    /// `features` must be `width` long, as established by `verify`
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Regressor::Linear(model) => model.predict(features),
            Regressor::TreeEnsemble(model) => model.predict(features),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegressor {
    fn verify(&self, width: usize) -> Result<(), ModelLoadError> {
        if self.coefficients.len() != width {
            return Err(ModelLoadError::Incompatible(format!(
                "linear regressor has {} coefficients for {} encoded features",
                self.coefficients.len(),
                width
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelLoadError::Incompatible(
                "linear regressor has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Bagged ensembles (random forests)
    #[default]
    Mean,
    /// Boosted ensembles, scaled by the learning rate
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    pub trees: Vec<Tree>,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    fn verify(&self, width: usize) -> Result<(), ModelLoadError> {
        if self.trees.is_empty() {
            return Err(ModelLoadError::Incompatible("tree ensemble has no trees".to_string()));
        }
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err(ModelLoadError::Incompatible(
                "tree ensemble has non-finite parameters".to_string(),
            ));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.verify(width)
                .map_err(|reason| ModelLoadError::Incompatible(format!("tree {}: {}", idx, reason)))?;
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        match self.aggregation {
            Aggregation::Mean => self.base_score + total / self.trees.len() as f64,
            Aggregation::Sum => self.base_score + self.learning_rate * total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Go to `left` when `features[feature] <= threshold`, otherwise `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Flat node array rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Children must point strictly forward, which rules out cycles and
    /// bounds traversal by the node count.
    fn verify(&self, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= width {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, width
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {} has a NaN threshold", idx));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} is not finite", idx));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: low },
                Node::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn linear_prediction() {
        let model = Regressor::Linear(LinearRegressor {
            intercept: 1.5,
            coefficients: vec![2.0, -0.5, 0.0],
        });
        model.verify(3).unwrap();
        assert_eq!(model.predict(&[1.0, 4.0, 100.0]), 1.5);
    }

    #[test]
    fn linear_width_mismatch() {
        let model = Regressor::Linear(LinearRegressor {
            intercept: 0.0,
            coefficients: vec![1.0],
        });
        assert!(matches!(model.verify(2), Err(ModelLoadError::Incompatible(_))));
    }

    #[test]
    fn split_goes_left_on_equal() {
        let tree = stump(0, 2.0, 10.0, 20.0);
        tree.verify(1).unwrap();
        assert_eq!(tree.predict(&[2.0]), 10.0);
        assert_eq!(tree.predict(&[2.5]), 20.0);
    }

    #[test]
    fn mean_and_sum_aggregation() {
        let trees = vec![stump(0, 0.5, 10.0, 30.0), stump(1, 4.5, 12.5, 8.125)];

        let mean = TreeEnsemble {
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            trees: trees.clone(),
        };
        assert_eq!(mean.predict(&[1.0, 5.0]), 19.0625);

        let boosted = TreeEnsemble {
            aggregation: Aggregation::Sum,
            base_score: 2.0,
            learning_rate: 0.5,
            trees,
        };
        assert_eq!(boosted.predict(&[1.0, 5.0]), 2.0 + 0.5 * (30.0 + 8.125));
    }

    #[test]
    fn rejects_backward_children() {
        let tree = Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert!(tree.verify(1).is_err());
    }

    #[test]
    fn rejects_out_of_range_feature() {
        assert!(stump(3, 1.0, 0.0, 1.0).verify(3).is_err());
    }

    #[test]
    fn rejects_empty_ensemble() {
        let ensemble = Regressor::TreeEnsemble(TreeEnsemble {
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            trees: vec![],
        });
        assert!(matches!(ensemble.verify(1), Err(ModelLoadError::Incompatible(_))));
    }

    #[test]
    fn deserializes_tagged_nodes() {
        let regressor: Regressor = serde_json::from_str(
            r#"{
                "type": "tree_ensemble",
                "trees": [{"nodes": [
                    {"split": {"feature": 0, "threshold": 0.5, "left": 1, "right": 2}},
                    {"leaf": {"value": 1.0}},
                    {"leaf": {"value": 2.0}}
                ]}]
            }"#,
        )
        .unwrap();
        regressor.verify(1).unwrap();
        assert_eq!(regressor.kind(), "tree_ensemble");
        assert_eq!(regressor.predict(&[0.0]), 1.0);
    }
}
