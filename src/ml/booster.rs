/// Evaluator for gradient-boosted tree models saved by XGBoost in JSON form.
/// Only single-output regression boosters with numeric splits are supported.
///
/// Inputs are narrowed to `f32` and leaves are summed in `f32`, the way
/// XGBoost itself predicts, so values sitting exactly on a cut point branch
/// identically.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::{ForecastError, Predictor};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),

    #[error("malformed model: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Debug, Deserialize)]
struct LearnerJson {
    #[serde(default)]
    feature_names: Vec<String>,
    learner_model_param: LearnerParamJson,
    objective: ObjectiveJson,
    gradient_booster: GradientBoosterJson,
}

#[derive(Debug, Deserialize)]
struct LearnerParamJson {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GradientBoosterJson {
    model: GbTreeJson,
}

#[derive(Debug, Deserialize)]
struct GbTreeJson {
    trees: Vec<TreeJson>,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    /// 0 numeric, 1 categorical. Absent in models older than 1.6.
    #[serde(default)]
    split_type: Vec<u8>,
}

/// `default_left` is written as 0/1 by some XGBoost versions and as booleans by others.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    Identity,
    Exp,
    Sigmoid,
}

impl Link {
    fn for_objective(name: &str) -> Result<Self, ModelError> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:absoluteerror" | "reg:pseudohubererror" => {
                Ok(Self::Identity)
            }
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Self::Exp),
            "reg:logistic" | "binary:logistic" => Ok(Self::Sigmoid),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }

    /// Margin that corresponds to a base score on the output scale.
    fn margin(self, base_score: f32) -> f32 {
        match self {
            Self::Identity => base_score,
            Self::Exp => base_score.ln(),
            Self::Sigmoid => (base_score / (1.0 - base_score)).ln(),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Self::Identity => margin,
            Self::Exp => margin.exp(),
            Self::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    condition: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(json: TreeJson, num_feature: usize) -> Result<Self, ModelError> {
        let n = json.left_children.len();
        if [
            json.right_children.len(),
            json.split_indices.len(),
            json.split_conditions.len(),
            json.default_left.len(),
        ]
        .iter()
        .any(|len| *len != n)
            || n == 0
        {
            return Err(ModelError::Malformed("tree arrays differ in length".into()));
        }
        if !json.split_type.is_empty() && json.split_type.len() != n {
            return Err(ModelError::Malformed("tree arrays differ in length".into()));
        }
        if let Some(i) = json.split_type.iter().position(|t| *t != 0) {
            return Err(ModelError::Malformed(format!(
                "node {i} uses a categorical split"
            )));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let node = Node {
                left: json.left_children[i],
                right: json.right_children[i],
                feature: json.split_indices[i],
                condition: json.split_conditions[i],
                default_left: json.default_left[i].is_set(),
            };
            if node.left != -1 {
                // children always come after their parent, which also rules out cycles
                let in_range = |c: i32| c > i as i32 && (c as usize) < n;
                if !in_range(node.left) || !in_range(node.right) {
                    return Err(ModelError::Malformed(format!("node {i} has an invalid child")));
                }
                if num_feature > 0 && node.feature >= num_feature {
                    return Err(ModelError::Malformed(format!(
                        "node {i} splits on feature {} of {num_feature}",
                        node.feature
                    )));
                }
            }
            nodes.push(node);
        }
        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f64]) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.left == -1 {
                return node.condition;
            }
            let x = row.get(node.feature).map_or(f32::NAN, |v| *v as f32);
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                x < node.condition
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }
}

/// A loaded tree ensemble.
#[derive(Debug, Clone)]
pub struct Booster {
    feature_names: Vec<String>,
    num_feature: usize,
    base_margin: f32,
    link: Link,
    trees: Vec<Tree>,
}

impl Booster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(raw)?;
        let learner = file.learner;

        let link = Link::for_objective(&learner.objective.name)?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let num_feature = match &learner.learner_model_param.num_feature {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ModelError::Malformed(format!("bad num_feature '{raw}'")))?,
            None => learner.feature_names.len(),
        };
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            return Err(ModelError::Malformed(format!(
                "{} feature names for {num_feature} features",
                learner.feature_names.len()
            )));
        }

        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .map(|t| Tree::from_json(t, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names: learner.feature_names,
            num_feature,
            base_margin: link.margin(base_score),
            link,
            trees,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_feature
    }

    fn predict_unchecked(&self, row: &[f64]) -> f64 {
        let margin = self
            .trees
            .iter()
            .fold(self.base_margin, |acc, t| acc + t.leaf_value(row));
        f64::from(self.link.apply(margin))
    }
}

fn parse_base_score(raw: &str) -> Result<f32, ModelError> {
    // newer releases write a vector, e.g. "[1.2E2]"
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f32>()
        .map_err(|_| ModelError::Malformed(format!("bad base_score '{raw}'")))
}

impl Predictor for Booster {
    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn predict(&self, row: &[f64], feature_names: &[String]) -> Result<f64, ForecastError> {
        let names_match = self.feature_names.is_empty() || self.feature_names == feature_names;
        let shape_match = row.len() == feature_names.len()
            && (self.num_feature == 0 || row.len() == self.num_feature);
        if !names_match || !shape_match {
            return Err(ForecastError::SchemaMismatch {
                expected: self.feature_names.clone(),
                found: feature_names.to_vec(),
            });
        }
        Ok(self.predict_unchecked(row))
    }
}
