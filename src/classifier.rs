//! # Prediction Service
//! Loads the trained subscription classifier once at startup and turns a
//! normalized [`FeatureRecord`] into the probability of a successful campaign.
//!
//! Encoding mirrors the training table: numeric attributes keep their name,
//! categorical attributes become one-hot columns `<attribute>_<value>`. The row
//! is then reindexed to the classifier's training-time column order; columns
//! the request does not produce are filled with 0.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::read_verified;
use crate::error::{Result, StrategyError};
use crate::features::{FeatureRecord, FeatureValue};

/// Seam over the classifier artifact so the agent can be driven by any model.
pub trait Classifier: Send + Sync {
    /// Training-time column order.
    fn feature_names(&self) -> &[String];
    /// Probability mass on the positive class for one reindexed row.
    fn predict_probability(&self, row: &[f64]) -> f64;
    /// Short description for diagnostics.
    fn describe(&self) -> String {
        format!("classifier({} features)", self.feature_names().len())
    }
}

/// Serialized classifier artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub model: ClassifierModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest { trees: Vec<DecisionTree> },
    Logistic { coefficients: Vec<f64>, intercept: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root.
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `row[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class sample counts (or weights) at the leaf: `[negative, positive]`.
    Leaf { value: Vec<f64> },
}

/// Loaded, validated classifier. Read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct ClassifierHandle {
    artifact: ClassifierArtifact,
    source: String,
}

impl ClassifierHandle {
    pub fn from_artifact(artifact: ClassifierArtifact, source: impl Into<String>) -> Result<Self> {
        validate(&artifact)?;
        Ok(Self {
            artifact,
            source: source.into(),
        })
    }

    pub fn load_from_path(path: &Path, expected_sha256: Option<&str>) -> Result<Self> {
        let bytes = read_verified(path, expected_sha256).map_err(StrategyError::ModelUnavailable)?;
        let artifact: ClassifierArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            StrategyError::ModelUnavailable(format!("parsing {}: {e}", path.display()))
        })?;
        Self::from_artifact(artifact, path.display().to_string())
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn validate(a: &ClassifierArtifact) -> Result<()> {
    let width = a.feature_names.len();
    if width == 0 {
        return Err(StrategyError::ModelUnavailable(
            "artifact declares no feature columns".into(),
        ));
    }
    let mut seen = std::collections::HashSet::with_capacity(width);
    for name in &a.feature_names {
        if !seen.insert(name.as_str()) {
            return Err(StrategyError::ModelUnavailable(format!(
                "duplicate feature column '{name}'"
            )));
        }
    }

    match &a.model {
        ClassifierModel::Logistic {
            coefficients,
            intercept,
        } => {
            if coefficients.len() != width {
                return Err(StrategyError::ModelUnavailable(format!(
                    "logistic model has {} coefficients for {} columns",
                    coefficients.len(),
                    width
                )));
            }
            if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                return Err(StrategyError::ModelUnavailable(
                    "logistic model has non-finite weights".into(),
                ));
            }
        }
        ClassifierModel::RandomForest { trees } => {
            if trees.is_empty() {
                return Err(StrategyError::ModelUnavailable("forest has no trees".into()));
            }
            for (t, tree) in trees.iter().enumerate() {
                if tree.nodes.is_empty() {
                    return Err(StrategyError::ModelUnavailable(format!("tree {t} is empty")));
                }
                for (i, node) in tree.nodes.iter().enumerate() {
                    match node {
                        TreeNode::Split {
                            feature,
                            left,
                            right,
                            ..
                        } => {
                            // Children must point forward, which also rules out cycles.
                            let n = tree.nodes.len();
                            if *feature >= width || *left >= n || *right >= n || *left <= i || *right <= i {
                                return Err(StrategyError::ModelUnavailable(format!(
                                    "tree {t} node {i} is malformed"
                                )));
                            }
                        }
                        TreeNode::Leaf { value } => {
                            if value.len() < 2 || value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                                return Err(StrategyError::ModelUnavailable(format!(
                                    "tree {t} leaf {i} needs two non-negative class weights"
                                )));
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

impl Classifier for ClassifierHandle {
    fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    fn predict_probability(&self, row: &[f64]) -> f64 {
        match &self.artifact.model {
            ClassifierModel::Logistic {
                coefficients,
                intercept,
            } => {
                let z = intercept
                    + coefficients
                        .iter()
                        .zip(row)
                        .map(|(w, x)| w * x)
                        .sum::<f64>();
                1.0 / (1.0 + (-z).exp())
            }
            ClassifierModel::RandomForest { trees } => {
                let total: f64 = trees.iter().map(|t| leaf_positive_share(t, row)).sum();
                total / trees.len() as f64
            }
        }
    }

    fn describe(&self) -> String {
        let kind = match &self.artifact.model {
            ClassifierModel::Logistic { .. } => "logistic".to_string(),
            ClassifierModel::RandomForest { trees } => format!("random_forest[{}]", trees.len()),
        };
        format!("{kind} from {}", self.source)
    }
}

fn leaf_positive_share(tree: &DecisionTree, row: &[f64]) -> f64 {
    let mut idx = 0usize;
    loop {
        match &tree.nodes[idx] {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let x = row.get(*feature).copied().unwrap_or(0.0);
                idx = if x <= *threshold { *left } else { *right };
            }
            TreeNode::Leaf { value } => {
                let sum: f64 = value.iter().sum();
                return if sum > 0.0 { value[1] / sum } else { 0.0 };
            }
        }
    }
}

/// One-hot expand `record` and reindex it to `columns`.
pub fn encode_row(record: &FeatureRecord, columns: &[String]) -> Result<Vec<f64>> {
    let mut present: HashMap<String, f64> = HashMap::with_capacity(32);
    for (name, value) in record.entries() {
        match value {
            FeatureValue::Numeric(x) => {
                if !x.is_finite() {
                    return Err(StrategyError::FeatureMismatch(format!(
                        "attribute '{name}' is not a finite number"
                    )));
                }
                present.insert(name.to_string(), x);
            }
            FeatureValue::Categorical(v) => {
                present.insert(format!("{name}_{v}"), 1.0);
            }
        }
    }

    // A row built entirely from fill values means the artifact was trained on another schema.
    if !columns.iter().any(|c| present.contains_key(c)) {
        return Err(StrategyError::FeatureMismatch(
            "no classifier column matches the request attributes".into(),
        ));
    }

    Ok(columns
        .iter()
        .map(|c| present.get(c).copied().unwrap_or(0.0))
        .collect())
}

/// Wraps the loaded classifier. Constructed once; shared by reference.
#[derive(Clone)]
pub struct PredictionService {
    classifier: Arc<dyn Classifier>,
}

impl PredictionService {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Load the artifact at startup; failure is [`StrategyError::ModelUnavailable`].
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self> {
        let handle = ClassifierHandle::load_from_path(path, expected_sha256)?;
        info!(model = %handle.describe(), "Classifier loaded");
        Ok(Self::new(Arc::new(handle)))
    }

    pub fn describe(&self) -> String {
        self.classifier.describe()
    }

    pub fn predict(&self, record: &FeatureRecord) -> Result<f64> {
        let start = Instant::now();
        let row = encode_row(record, self.classifier.feature_names())?;
        let p = self.classifier.predict_probability(&row);
        if !p.is_finite() {
            return Err(StrategyError::FeatureMismatch(
                "classifier produced a non-finite probability".into(),
            ));
        }
        let p = p.clamp(0.0, 1.0);
        debug!(
            success_prob = p,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Predicted success probability"
        );
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CampaignInput, FeatureNormalizer};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn stump_forest() -> ClassifierArtifact {
        ClassifierArtifact {
            feature_names: cols(&["duration", "contact_telephone"]),
            model: ClassifierModel::RandomForest {
                trees: vec![
                    DecisionTree {
                        nodes: vec![
                            TreeNode::Split {
                                feature: 0,
                                threshold: 300.0,
                                left: 1,
                                right: 2,
                            },
                            TreeNode::Leaf {
                                value: vec![9.0, 1.0],
                            },
                            TreeNode::Leaf {
                                value: vec![3.0, 7.0],
                            },
                        ],
                    },
                    DecisionTree {
                        nodes: vec![
                            TreeNode::Split {
                                feature: 1,
                                threshold: 0.5,
                                left: 1,
                                right: 2,
                            },
                            TreeNode::Leaf {
                                value: vec![1.0, 1.0],
                            },
                            TreeNode::Leaf {
                                value: vec![4.0, 0.0],
                            },
                        ],
                    },
                ],
            },
        }
    }

    #[test]
    fn one_hot_and_reindex() {
        let r = FeatureNormalizer::normalize(&CampaignInput::default());
        let row = encode_row(
            &r,
            &cols(&["age", "job_admin.", "job_blue-collar", "unknown_col", "nr.employed"]),
        )
        .unwrap();
        assert_eq!(row, vec![30.0, 1.0, 0.0, 0.0, 5191.0]);
    }

    #[test]
    fn forest_averages_leaf_shares() {
        let h = ClassifierHandle::from_artifact(stump_forest(), "mem").unwrap();
        // long call on cellular: tree A → 0.7, tree B → 0.5
        let p = h.predict_probability(&[500.0, 0.0]);
        assert!((p - 0.6).abs() < 1e-12, "p={p}");
        // short call on telephone: tree A → 0.1, tree B → 0.0
        let p = h.predict_probability(&[100.0, 1.0]);
        assert!((p - 0.05).abs() < 1e-12, "p={p}");
    }

    #[test]
    fn backward_child_pointer_is_rejected() {
        let mut a = stump_forest();
        if let ClassifierModel::RandomForest { trees } = &mut a.model {
            trees[0].nodes[0] = TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 2,
            };
        }
        let err = ClassifierHandle::from_artifact(a, "mem").unwrap_err();
        assert!(matches!(err, StrategyError::ModelUnavailable(_)));
    }

    #[test]
    fn artifact_json_shape() {
        let json = r#"{
            "kind": "logistic",
            "feature_names": ["age"],
            "coefficients": [0.0],
            "intercept": 0.0
        }"#;
        let a: ClassifierArtifact = serde_json::from_str(json).unwrap();
        let h = ClassifierHandle::from_artifact(a, "mem").unwrap();
        assert!((h.predict_probability(&[42.0]) - 0.5).abs() < 1e-12);
    }
}
