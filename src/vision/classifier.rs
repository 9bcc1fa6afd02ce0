//! 眼部/嘴部状态分类器
//!
//! 模型以带版本号、显式 schema 的 JSON 文件形式在启动时加载一次，
//! 之后只读共享。支持两类模型：
//! - `random_forest`: 决策树集成，各树叶子归一化为概率后取平均，再取 argmax
//! - `linear`: 每类一组权重与截距，取决策函数 argmax

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::MODEL_FORMAT_VERSION;

use super::error::ClassifierError;
use super::types::{ClassLabel, FeatureVector};

pub trait Classifier: Send + Sync {
    /// Feature dimensionality the model was trained on.
    fn input_dim(&self) -> usize;

    /// Class id → label table.
    fn labels(&self) -> &[ClassLabel];

    fn predict(&self, features: &FeatureVector) -> Result<usize, ClassifierError>;

    fn classify(&self, features: &FeatureVector) -> Result<ClassLabel, ClassifierError> {
        let id = self.predict(features)?;
        self.labels()
            .get(id)
            .cloned()
            .ok_or(ClassifierError::UnknownClass(id))
    }
}

/// 启动自检：维度必须与特征提取器一致，并能完成一次探测预测
pub fn self_check(classifier: &dyn Classifier, feature_len: usize) -> Result<(), ClassifierError> {
    if classifier.input_dim() != feature_len {
        return Err(ClassifierError::DimensionMismatch {
            expected: classifier.input_dim(),
            actual: feature_len,
        });
    }
    let probe = FeatureVector::new(vec![0.0; feature_len]);
    classifier.classify(&probe)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub format_version: u32,
    pub input_dim: usize,
    #[serde(default = "ClassLabel::default_table")]
    pub labels: Vec<ClassLabel>,
    pub model: ModelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest {
        trees: Vec<DecisionTree>,
    },
    Linear {
        /// One row of `input_dim` weights per class.
        weights: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Node 0 is the root. Children always come after their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class sample counts or probabilities.
    Leaf { value: Vec<f64> },
}

impl DecisionTree {
    fn leaf_for(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }

    fn validate(
        &self,
        tree_idx: usize,
        input_dim: usize,
        n_classes: usize,
    ) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(invalid(format!("tree {tree_idx} has no nodes")));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= input_dim {
                        return Err(invalid(format!(
                            "tree {tree_idx} node {i} splits on feature {feature} >= {input_dim}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!(
                            "tree {tree_idx} node {i} threshold is not finite"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(invalid(format!(
                                "tree {tree_idx} node {i} has invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(invalid(format!(
                            "tree {tree_idx} leaf {i} has {} values, expected {n_classes}",
                            value.len()
                        )));
                    }
                    let negative = value.iter().any(|v| !v.is_finite() || *v < 0.0);
                    if negative || value.iter().sum::<f64>() <= 0.0 {
                        return Err(invalid(format!(
                            "tree {tree_idx} leaf {i} is not a distribution"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> ClassifierError {
    ClassifierError::InvalidModel(message)
}

/// Classifier backed by a validated [`ModelFile`].
#[derive(Debug, Clone)]
pub struct ModelClassifier {
    input_dim: usize,
    labels: Vec<ClassLabel>,
    model: ModelKind,
}

impl ModelClassifier {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ClassifierError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let file: ModelFile = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        Self::from_model_file(file)
    }

    pub fn from_model_file(file: ModelFile) -> Result<Self, ClassifierError> {
        if file.format_version != MODEL_FORMAT_VERSION {
            return Err(ClassifierError::UnsupportedVersion {
                found: file.format_version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        if file.input_dim == 0 {
            return Err(invalid("input_dim must be > 0".to_string()));
        }
        if file.labels.is_empty() {
            return Err(invalid("label table is empty".to_string()));
        }

        let n_classes = file.labels.len();
        match &file.model {
            ModelKind::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(invalid("random forest has no trees".to_string()));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i, file.input_dim, n_classes)?;
                }
            }
            ModelKind::Linear {
                weights,
                intercepts,
            } => {
                if weights.len() != n_classes || intercepts.len() != n_classes {
                    return Err(invalid(format!(
                        "linear model has {} weight rows and {} intercepts, expected {n_classes}",
                        weights.len(),
                        intercepts.len()
                    )));
                }
                if let Some(row) = weights.iter().position(|w| w.len() != file.input_dim) {
                    return Err(invalid(format!(
                        "weight row {row} does not have {} columns",
                        file.input_dim
                    )));
                }
            }
        }

        Ok(Self {
            input_dim: file.input_dim,
            labels: file.labels,
            model: file.model,
        })
    }

    /// Per-class scores: averaged probabilities or raw decision values.
    pub fn scores(&self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        let x = features.as_slice();
        if x.len() != self.input_dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.input_dim,
                actual: x.len(),
            });
        }

        let n_classes = self.labels.len();
        let scores = match &self.model {
            ModelKind::RandomForest { trees } => {
                let mut acc = vec![0.0; n_classes];
                for tree in trees {
                    let leaf = tree.leaf_for(x);
                    let total: f64 = leaf.iter().sum();
                    for (a, v) in acc.iter_mut().zip(leaf) {
                        *a += v / total;
                    }
                }
                let n = trees.len() as f64;
                acc.iter().map(|a| a / n).collect()
            }
            ModelKind::Linear {
                weights,
                intercepts,
            } => weights
                .iter()
                .zip(intercepts)
                .map(|(w, b)| w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
                .collect(),
        };
        Ok(scores)
    }
}

impl Classifier for ModelClassifier {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    fn predict(&self, features: &FeatureVector) -> Result<usize, ClassifierError> {
        let scores = self.scores(features)?;
        Ok(argmax(&scores))
    }
}

/// 并列时取第一个最大值
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
