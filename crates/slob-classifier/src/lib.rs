//! `SetupClassifier`: inference-only decision-tree-ensemble model over the
//! 37-feature vector `slob-features` produces. The model artifact (trees +
//! per-feature scaler + feature-name manifest) is trained offline and
//! deserialized here; nothing in this crate fits or mutates a model at
//! runtime — `ModelArtifact::load` is the only way one comes into being,
//! and every field on it is immutable afterward.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use slob_features::{Features, FEATURE_COUNT, FEATURE_NAMES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    fn transform(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            let std = if self.std[i] > 1e-12 { self.std[i] } else { 1.0 };
            out[i] = (raw[i] - self.mean[i]) / std;
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    Leaf {
        /// Fraction of positive-class training samples that reached this
        /// leaf, in `[0, 1]`.
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        match self {
            Node::Leaf { value } => *value,
            Node::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if x[*feature_idx] <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub root: Node,
}

/// An immutable model artifact: feature-name manifest, scaler, and a tree
/// ensemble whose predictions are averaged. Loaded once at startup (or at
/// backtest configuration time) and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub feature_names: Vec<String>,
    pub scaler: Scaler,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierError {
    FeatureNameMismatch,
    EmptyEnsemble,
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::FeatureNameMismatch => {
                write!(f, "model artifact's feature_names does not match slob-features::FEATURE_NAMES")
            }
            ClassifierError::EmptyEnsemble => write!(f, "model artifact has zero trees"),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl ModelArtifact {
    /// Deserializes and validates a model artifact from JSON. Validation is
    /// the only gate: a mismatched feature manifest or an empty ensemble
    /// fails loudly here instead of silently predicting garbage later.
    pub fn load(json: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json).context("parse model artifact json")?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!(ClassifierError::EmptyEnsemble);
        }
        if self.feature_names.len() != FEATURE_COUNT
            || self.feature_names.iter().zip(FEATURE_NAMES.iter()).any(|(a, b)| a != b)
        {
            bail!(ClassifierError::FeatureNameMismatch);
        }
        Ok(())
    }
}

/// Wraps an immutable `ModelArtifact` with the inference contract the
/// engine calls: `predict_proba` for the raw score, `evaluate` for the
/// thresholded go/no-go decision shadow-logged alongside the rule-based
/// path.
#[derive(Debug, Clone)]
pub struct SetupClassifier {
    artifact: ModelArtifact,
    pub decision_threshold: f64,
}

impl SetupClassifier {
    pub fn new(artifact: ModelArtifact, decision_threshold: f64) -> Self {
        Self {
            artifact,
            decision_threshold,
        }
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// Ensemble-averaged probability in `[0, 1]` that the setup is a
    /// winning trade.
    pub fn predict_proba(&self, features: &Features) -> f64 {
        let raw = features.to_vector();
        let scaled = self.artifact.scaler.transform(&raw);
        let sum: f64 = self.artifact.trees.iter().map(|t| t.root.predict(&scaled)).sum();
        sum / self.artifact.trees.len() as f64
    }

    /// `true` when `predict_proba` clears `decision_threshold`.
    pub fn evaluate(&self, features: &Features) -> bool {
        self.predict_proba(features) >= self.decision_threshold
    }
}
