//! # Model Configuration
//!
//! The hyperparameters of an ensemble are collected into one immutable `ModelConfig`
//! that is handed to the model at construction. It can be built in code, or read from
//! a TOML file whose keys mirror the struct fields:
//!
//! ```toml
//! n_nodes = 50
//! lam = 0.05
//! weight_range = [-1.0, 1.0]
//! bias_range = [-1.0, 1.0]
//! activation = "relu"
//! n_layer = 5
//! same_feature = false
//! seed = 7
//! ```
//!
//! Any key left out of the file takes its default value.

use crate::activation::Activation;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Every way a configuration can be rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Unknown activation function '{0}'. Expected one of: sigmoid, sine, hardlim, tribas, radbas, sign, relu, leaky_relu."
    )]
    UnknownActivation(String),

    #[error("The number of enhancement nodes per layer must be at least 1.")]
    ZeroNodes,

    #[error("The number of layers must be at least 1.")]
    ZeroLayers,

    #[error("The regularization parameter must be finite and non-negative, got {0}.")]
    InvalidRegularization(f64),

    #[error(
        "The {name} range [{min}, {max}] is malformed. Both bounds and their difference must be finite, and min must be strictly less than max."
    )]
    MalformedRange {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// A half-open interval `[min, max)` that random draws are taken from.
/// Written as a two-element array `[min, max]` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        // A finite width implies finite bounds, and uniform sampling needs both.
        let width = self.max - self.min;
        if self.min < self.max && width.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::MalformedRange {
                name,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl From<[f64; 2]> for ValueRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

/// Hyperparameters of an ensemble deep RVFL model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Enhancement nodes generated by every layer's random projection.
    pub n_nodes: usize,
    /// Ridge regularization strength used by every closed-form solve.
    pub lam: f64,
    /// Range for the random projection weights.
    pub weight_range: ValueRange,
    /// Range for the random projection biases.
    pub bias_range: ValueRange,
    pub activation: Activation,
    /// Number of stacked layers, and therefore of voters in the ensemble.
    pub n_layer: usize,
    /// Standardize each block with one scalar mean/std instead of per-column
    /// statistics. Appropriate when every feature shares one scale (e.g. pixels).
    pub same_feature: bool,
    /// Seed for the random projections. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_nodes: 50,
            lam: 0.05,
            weight_range: ValueRange::new(-1.0, 1.0),
            bias_range: ValueRange::new(-1.0, 1.0),
            activation: Activation::Relu,
            n_layer: 5,
            same_feature: false,
            seed: None,
        }
    }
}

impl ModelConfig {
    /// Builds and validates a configuration, resolving the activation by name.
    pub fn new(
        n_nodes: usize,
        lam: f64,
        weight_range: [f64; 2],
        bias_range: [f64; 2],
        activation: &str,
        n_layer: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            n_nodes,
            lam,
            weight_range: weight_range.into(),
            bias_range: bias_range.into(),
            activation: activation.parse()?,
            n_layer,
            same_feature: false,
            seed: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_same_feature(mut self, same_feature: bool) -> Self {
        self.same_feature = same_feature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks every constraint a model relies on at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_nodes == 0 {
            return Err(ConfigError::ZeroNodes);
        }
        if self.n_layer == 0 {
            return Err(ConfigError::ZeroLayers);
        }
        if !self.lam.is_finite() || self.lam < 0.0 {
            return Err(ConfigError::InvalidRegularization(self.lam));
        }
        self.weight_range.validate("weight")?;
        self.bias_range.validate("bias")?;
        Ok(())
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a TOML file without validating it, so that callers can
    /// layer overrides on top before calling `validate`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_matches_reference_run() {
        let config = ModelConfig::default();
        assert_eq!(config.n_nodes, 50);
        assert_eq!(config.lam, 0.05);
        assert_eq!(config.n_layer, 5);
        assert_eq!(config.activation, Activation::Relu);
        assert_eq!(config.weight_range, ValueRange::new(-1.0, 1.0));
        assert!(!config.same_feature);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_rejects_bad_hyperparameters() {
        assert!(matches!(
            ModelConfig::new(0, 1.0, [-1.0, 1.0], [0.0, 1.0], "relu", 2),
            Err(ConfigError::ZeroNodes)
        ));
        assert!(matches!(
            ModelConfig::new(4, 1.0, [-1.0, 1.0], [0.0, 1.0], "relu", 0),
            Err(ConfigError::ZeroLayers)
        ));
        assert!(matches!(
            ModelConfig::new(4, -0.5, [-1.0, 1.0], [0.0, 1.0], "relu", 2),
            Err(ConfigError::InvalidRegularization(_))
        ));
        assert!(matches!(
            ModelConfig::new(4, f64::NAN, [-1.0, 1.0], [0.0, 1.0], "relu", 2),
            Err(ConfigError::InvalidRegularization(_))
        ));
        assert!(matches!(
            ModelConfig::new(4, 1.0, [1.0, -1.0], [0.0, 1.0], "relu", 2),
            Err(ConfigError::MalformedRange { name: "weight", .. })
        ));
        assert!(matches!(
            ModelConfig::new(4, 1.0, [-1.0, 1.0], [0.5, 0.5], "relu", 2),
            Err(ConfigError::MalformedRange { name: "bias", .. })
        ));
        // Finite bounds whose difference overflows cannot be sampled uniformly.
        assert!(matches!(
            ModelConfig::new(3, 1.0, [-1e308, 1e308], [0.0, 1.0], "relu", 1),
            Err(ConfigError::MalformedRange { name: "weight", .. })
        ));
        assert!(matches!(
            ModelConfig::new(3, 1.0, [-1.0, 1.0], [f64::MIN, f64::MAX], "relu", 1),
            Err(ConfigError::MalformedRange { name: "bias", .. })
        ));
        assert!(matches!(
            ModelConfig::from_toml_str("weight_range = [-1e308, 1e308]"),
            Err(ConfigError::MalformedRange { name: "weight", .. })
        ));
        assert!(ModelConfig::new(3, 1.0, [-1e300, 1e300], [0.0, 1.0], "relu", 1).is_ok());
        assert!(matches!(
            ModelConfig::new(4, 1.0, [-1.0, 1.0], [0.0, 1.0], "swish", 2),
            Err(ConfigError::UnknownActivation(_))
        ));
    }

    #[test]
    fn test_toml_fills_missing_keys_with_defaults() {
        let config = ModelConfig::from_toml_str(
            r#"
            n_nodes = 8
            activation = "leaky_relu"
            bias_range = [0.0, 1.0]
            seed = 11
            "#,
        )
        .unwrap();

        assert_eq!(config.n_nodes, 8);
        assert_eq!(config.activation, Activation::LeakyRelu);
        assert_eq!(config.bias_range, ValueRange::new(0.0, 1.0));
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.n_layer, 5);
        assert_eq!(config.lam, 0.05);
    }

    #[test]
    fn test_toml_rejects_unknown_keys_and_activations() {
        let unknown_key = ModelConfig::from_toml_str("n_nodez = 3");
        assert!(matches!(unknown_key, Err(ConfigError::TomlParseError(_))));

        let unknown_activation = ModelConfig::from_toml_str(r#"activation = "gelu""#);
        match unknown_activation {
            Err(ConfigError::TomlParseError(e)) => assert!(e.to_string().contains("gelu")),
            other => panic!("Expected TomlParseError, got {:?}", other),
        }

        let zero_layers = ModelConfig::from_toml_str("n_layer = 0");
        assert!(matches!(zero_layers, Err(ConfigError::ZeroLayers)));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "n_nodes = 12\nlam = 1.0\nsame_feature = true").unwrap();
        file.flush().unwrap();

        let config = ModelConfig::load(file.path()).unwrap();
        assert_eq!(config.n_nodes, 12);
        assert_eq!(config.lam, 1.0);
        assert!(config.same_feature);
    }

    #[test]
    fn test_read_defers_validation_to_the_caller() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "n_nodes = 0\nn_layer = 2").unwrap();
        file.flush().unwrap();

        assert!(matches!(ModelConfig::load(file.path()), Err(ConfigError::ZeroNodes)));

        let mut config = ModelConfig::read(file.path()).unwrap();
        assert_eq!(config.n_layer, 2);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroNodes)));
        config.n_nodes = 4;
        assert!(config.validate().is_ok());
    }
}
