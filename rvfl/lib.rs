#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

pub mod activation;
pub mod config;
pub mod data;
pub mod model;
pub mod projection;
pub mod solver;
pub mod standardize;

pub use activation::Activation;
pub use config::{ConfigError, ModelConfig, ValueRange};
pub use data::{DataError, Dataset, LoadOptions, load_dataset};
pub use model::{EnsembleDeepRvfl, ModelError, Prediction, TrainedLayer};
pub use solver::RidgeForm;
