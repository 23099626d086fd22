//! Training configuration.
//!
//! Configuration is loaded from `~/.crosshash/config.toml` (or a path given
//! on the command line) with defaults matching the reference training setup.
//! Enumerated options are real enums: an unknown `similarity_function`,
//! `loss_type`, or `hash_layer` fails at parse time and is never defaulted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// Distance function used by the similarity losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    Cosine,
    Euclidean,
}

/// Reduction norm applied to the positive/negative loss terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossNorm {
    L1,
    L2,
}

/// Hash-layer variant, resolved once at model construction.
///
/// `Select` layers emit one argmax decision per hash slot and are discrete by
/// construction; `Linear` layers emit continuous codes that need sign
/// binarization plus a quantization penalty during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashLayerKind {
    Select,
    Linear,
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl fmt::Display for LossNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "l1"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

impl fmt::Display for HashLayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

impl FromStr for DistanceKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(ConfigError::ValidationError(format!(
                "unknown similarity_function {other:?} (expected cosine or euclidean)"
            ))),
        }
    }
}

impl FromStr for LossNorm {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            other => Err(ConfigError::ValidationError(format!(
                "unknown loss_type {other:?} (expected l1 or l2)"
            ))),
        }
    }
}

impl FromStr for HashLayerKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "linear" => Ok(Self::Linear),
            other => Err(ConfigError::ValidationError(format!(
                "unknown hash_layer {other:?} (expected select or linear)"
            ))),
        }
    }
}

/// Fallback clipping threshold used when `sim_threshold` is 0.
pub const DEFAULT_SIM_THRESHOLD: f32 = 0.05;

/// Root training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Dataset name, used in artifact file names
    pub dataset: String,

    /// Directory for checkpoints and evaluation artifacts
    pub save_dir: PathBuf,

    /// Optional checkpoint to load; required for evaluation-only runs
    pub pretrained: Option<PathBuf>,

    /// Distance function for the similarity losses
    pub similarity_function: DistanceKind,

    /// L1/L2 reduction of the loss terms
    pub loss_type: LossNorm,

    /// Hash-layer variant the model was built with
    pub hash_layer: HashLayerKind,

    /// Hash code length in bits/slots
    pub output_dim: usize,

    /// Number of training epochs
    pub epochs: usize,

    /// Mini-batch size
    pub batch_size: usize,

    /// Number of query samples held out for validation
    pub query_num: usize,

    /// Number of training samples drawn from the retrieval split
    pub train_num: usize,

    /// Emit the loss sub-term log record every N steps
    pub display_step: u64,

    /// Seed for the dataset split and the baseline projections
    pub seed: u64,

    /// Hash-head learning rate
    pub lr: f64,

    /// Multiplicative learning-rate decay factor
    pub lr_decay: f64,

    /// Apply the decay every N epochs
    pub lr_decay_freq: usize,

    /// ϑ, the error-code rate scaling the Euclidean distance ceiling
    pub vartheta: f32,

    /// Clipping threshold τ for the similarity loss; 0 selects the
    /// built-in default of 0.05
    pub sim_threshold: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset: "or5k".to_string(),
            save_dir: PathBuf::from("./result/128-bit"),
            pretrained: None,
            similarity_function: DistanceKind::Euclidean,
            loss_type: LossNorm::L2,
            hash_layer: HashLayerKind::Select,
            output_dim: 128,
            epochs: 12,
            batch_size: 128,
            query_num: 7430,
            train_num: 7430,
            display_step: 10,
            seed: 1814,
            lr: 1e-6,
            lr_decay: 0.9,
            lr_decay_freq: 5,
            vartheta: 0.75,
            sim_threshold: 0.1,
        }
    }
}

impl TrainConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: TrainConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file path (platform config dir, with a
    /// `~/.crosshash/config.toml` fallback).
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("io", "crosshash", "crosshash")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".crosshash").join("config.toml")
            })
    }

    /// Resolved save directory (with ~ expansion).
    pub fn save_dir(&self) -> PathBuf {
        let path_str = self.save_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Effective clipping threshold τ: `sim_threshold`, or 0.05 when unset.
    pub fn effective_threshold(&self) -> f32 {
        if self.sim_threshold != 0.0 {
            self.sim_threshold
        } else {
            DEFAULT_SIM_THRESHOLD
        }
    }

    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dim == 0 {
            return Err(ConfigError::ValidationError(
                "output_dim must be > 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch_size must be > 0".into(),
            ));
        }
        if self.epochs == 0 {
            return Err(ConfigError::ValidationError("epochs must be > 0".into()));
        }
        if self.display_step == 0 {
            return Err(ConfigError::ValidationError(
                "display_step must be > 0".into(),
            ));
        }
        if self.sim_threshold < 0.0 {
            return Err(ConfigError::ValidationError(
                "sim_threshold must be >= 0".into(),
            ));
        }
        if self.vartheta <= 0.0 {
            return Err(ConfigError::ValidationError(
                "vartheta must be > 0".into(),
            ));
        }
        if self.lr_decay <= 0.0 || self.lr_decay > 1.0 {
            return Err(ConfigError::ValidationError(
                "lr_decay must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
