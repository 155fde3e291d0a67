//! # Ensemble Deep RVFL
//!
//! This module orchestrates training and inference across the stacked layers.
//!
//! 1.  **Training:** The raw input is standardized once with layer-0 statistics to give
//!     the skip features `data_std`. Each layer then standardizes its base input `h`,
//!     projects it through a frozen random layer, concatenates `data_std` and a bias
//!     column, and solves its output weights in closed form. The projected block
//!     (without the bias column) becomes the next layer's `h`.
//!
//! 2.  **Inference:** The same forward transform is replayed with the frozen artifacts.
//!     Each layer produces class scores; either every layer's softmax is returned, or
//!     every layer casts one vote and the majority wins.
//!
//! A model is trained exactly once. Reads never mutate it.

use crate::activation::Activation;
use crate::config::{ConfigError, ModelConfig};
use crate::projection::{RandomProjection, with_bias_column};
use crate::solver::{self, RidgeForm, SolverError};
use crate::standardize::{Standardization, Standardizer};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, ShapeError, s};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Every failure the model can report.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error(
        "Input must contain at least one sample and one feature, but has shape [{samples}, {features}]."
    )]
    EmptyInput { samples: usize, features: usize },

    #[error("The input has {samples} samples but {labels} labels were provided.")]
    MismatchedSampleCount { samples: usize, labels: usize },

    #[error("The input has {found} feature columns, but the model was trained on {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },

    #[error("Label {label} at sample {index} is not a valid class index for {num_classes} classes.")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error("Non-finite values (NaN or Infinity) were found in the input features.")]
    NonFiniteInput,

    #[error("The model has not been trained. Call `train` before `predict` or `eval`.")]
    NotTrained,

    #[error("This model has already been trained. Training the same instance twice is not supported.")]
    RetrainNotSupported,

    #[error("The closed-form solve failed at layer {layer}: {source}")]
    Solver {
        layer: usize,
        #[source]
        source: SolverError,
    },

    #[error("Internal error: failed to assemble a layer's design matrix: {0}")]
    InternalStackingError(#[from] ShapeError),
}

impl ModelError {
    /// True for the errors that describe malformed or mismatched input dimensions.
    pub fn is_invalid_shape(&self) -> bool {
        matches!(
            self,
            ModelError::EmptyInput { .. }
                | ModelError::MismatchedSampleCount { .. }
                | ModelError::MismatchedFeatureCount { .. }
                | ModelError::LabelOutOfRange { .. }
        )
    }
}

/// The frozen artifacts of one trained layer.
#[derive(Debug, Clone)]
pub struct TrainedLayer {
    standardization: Standardization,
    projection: RandomProjection,
    beta: Array2<f64>,
    form: RidgeForm,
}

impl TrainedLayer {
    /// Standardization applied to this layer's base input.
    pub fn standardization(&self) -> &Standardization {
        &self.standardization
    }

    pub fn projection(&self) -> &RandomProjection {
        &self.projection
    }

    /// Output weights, shape `[n_nodes + D + 1, num_classes]`.
    pub fn beta(&self) -> &Array2<f64> {
        &self.beta
    }

    /// The ridge form used to solve this layer's output weights.
    pub fn solver_form(&self) -> RidgeForm {
        self.form
    }
}

#[derive(Debug, Clone)]
struct TrainedEnsemble {
    /// Layer-0 statistics, applied to raw input to produce the skip features.
    input_standardization: Standardization,
    layers: Vec<TrainedLayer>,
    n_features: usize,
    num_classes: usize,
}

#[derive(Debug, Clone)]
enum ModelState {
    Untrained,
    Trained(TrainedEnsemble),
    /// Training started and failed part-way. The instance can no longer be used.
    Failed,
}

/// The result of `predict`.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// One ensemble-voted class per sample.
    Labels(Array1<usize>),
    /// Softmax of every layer's scores, shape `[samples, n_layer, num_classes]`.
    LayerProbabilities(Array3<f64>),
}

/// An ensemble deep random vector functional link classifier.
#[derive(Debug, Clone)]
pub struct EnsembleDeepRvfl {
    config: ModelConfig,
    activation: fn(f64) -> f64,
    state: ModelState,
}

impl EnsembleDeepRvfl {
    /// Validates the configuration and creates an untrained model.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        Ok(Self {
            activation: config.activation.resolve(),
            config,
            state: ModelState::Untrained,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn activation(&self) -> Activation {
        self.config.activation
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ModelState::Trained(_))
    }

    /// Per-layer artifacts in layer order. Empty until the model is trained.
    pub fn layers(&self) -> &[TrainedLayer] {
        match &self.state {
            ModelState::Trained(ensemble) => &ensemble.layers,
            _ => &[],
        }
    }

    pub fn num_classes(&self) -> Option<usize> {
        self.trained().ok().map(|ensemble| ensemble.num_classes)
    }

    pub fn n_features(&self) -> Option<usize> {
        self.trained().ok().map(|ensemble| ensemble.n_features)
    }

    /// Trains the model, drawing random projections from the configured seed (or OS
    /// entropy when no seed is set).
    pub fn train(
        &mut self,
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        num_classes: usize,
    ) -> Result<(), ModelError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.train_with_rng(data, labels, num_classes, &mut rng)
    }

    /// Trains the model, drawing random projections from `rng`.
    ///
    /// Input validation failures leave the model untrained. A failure after the first
    /// layer has started (e.g. a singular solve) leaves the model permanently unusable.
    pub fn train_with_rng<R: Rng + ?Sized>(
        &mut self,
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        num_classes: usize,
        rng: &mut R,
    ) -> Result<(), ModelError> {
        if !matches!(self.state, ModelState::Untrained) {
            return Err(ModelError::RetrainNotSupported);
        }
        validate_training_input(data, labels, num_classes)?;

        self.state = ModelState::Failed;
        let ensemble = self.fit(data, labels, num_classes, rng)?;
        self.state = ModelState::Trained(ensemble);
        Ok(())
    }

    fn fit<R: Rng + ?Sized>(
        &self,
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        num_classes: usize,
        rng: &mut R,
    ) -> Result<TrainedEnsemble, ModelError> {
        let (n_samples, n_features) = data.dim();
        let config = &self.config;
        log::info!(
            "Training ensemble deep RVFL: {} samples, {} features, {} classes, {} layers of {} {} nodes.",
            n_samples,
            n_features,
            num_classes,
            config.n_layer,
            config.n_nodes,
            config.activation
        );

        let targets = one_hot(labels, num_classes);
        let mut h = data.to_owned();
        // Layer 0 standardizes the same raw block, so it refits these statistics exactly.
        let input_standardization = Standardization::fit(h.view(), config.same_feature);
        let data_std = input_standardization.apply(h.view());
        let mut standardizer = Standardizer::new(config.same_feature);

        let mut fitted = Vec::with_capacity(config.n_layer);
        for layer in 0..config.n_layer {
            let h_std = standardizer.fit_or_reuse(h.view(), layer);
            let projection = RandomProjection::generate(
                h_std.ncols(),
                config.n_nodes,
                config.weight_range,
                config.bias_range,
                rng,
            );
            let core = projection.design_core(h_std.view(), data_std.view(), self.activation)?;
            let design = with_bias_column(core.view())?;

            let solution = solver::solve(design.view(), targets.view(), config.lam)
                .map_err(|source| ModelError::Solver { layer, source })?;
            log::debug!(
                "Layer {}: design {}x{}, {:?} ridge solve, beta {}x{}.",
                layer,
                design.nrows(),
                design.ncols(),
                solution.form,
                solution.beta.nrows(),
                solution.beta.ncols()
            );

            fitted.push((projection, solution));
            h = core;
        }

        let layers: Vec<TrainedLayer> = standardizer
            .into_params()
            .into_iter()
            .zip(fitted)
            .map(|(standardization, (projection, solution))| TrainedLayer {
                standardization,
                projection,
                beta: solution.beta,
                form: solution.form,
            })
            .collect();

        log::info!("Training complete: {} layers fitted.", layers.len());
        Ok(TrainedEnsemble {
            input_standardization,
            layers,
            n_features,
            num_classes,
        })
    }

    /// Predicts with the trained ensemble.
    ///
    /// With `output_prob`, returns every layer's softmax probabilities. Otherwise each
    /// layer votes for its highest-scoring class and the most-voted class is returned
    /// per sample, ties going to the lowest class index.
    pub fn predict(
        &self,
        data: ArrayView2<f64>,
        output_prob: bool,
    ) -> Result<Prediction, ModelError> {
        if output_prob {
            self.predict_proba(data).map(Prediction::LayerProbabilities)
        } else {
            self.predict_labels(data).map(Prediction::Labels)
        }
    }

    /// Ensemble-voted class per sample.
    pub fn predict_labels(&self, data: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        let ensemble = self.trained()?;
        let scores = self.layer_scores(ensemble, data)?;
        let votes: Vec<Array1<usize>> = scores.iter().map(|s| argmax_rows(s.view())).collect();
        Ok(majority_vote(&votes, data.nrows(), ensemble.num_classes))
    }

    /// Per-layer softmax probabilities, shape `[samples, n_layer, num_classes]`.
    pub fn predict_proba(&self, data: ArrayView2<f64>) -> Result<Array3<f64>, ModelError> {
        let ensemble = self.trained()?;
        let scores = self.layer_scores(ensemble, data)?;

        let mut probabilities =
            Array3::<f64>::zeros((data.nrows(), scores.len(), ensemble.num_classes));
        for (layer, layer_scores) in scores.iter().enumerate() {
            probabilities
                .slice_mut(s![.., layer, ..])
                .assign(&softmax_rows(layer_scores.view()));
        }
        Ok(probabilities)
    }

    /// Fraction of samples whose ensemble-voted class equals the given label.
    pub fn eval(&self, data: ArrayView2<f64>, labels: ArrayView1<usize>) -> Result<f64, ModelError> {
        if data.nrows() != labels.len() {
            return Err(ModelError::MismatchedSampleCount {
                samples: data.nrows(),
                labels: labels.len(),
            });
        }
        let predicted = self.predict_labels(data)?;
        let correct = predicted
            .iter()
            .zip(labels.iter())
            .filter(|(p, l)| p == l)
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }

    fn trained(&self) -> Result<&TrainedEnsemble, ModelError> {
        match &self.state {
            ModelState::Trained(ensemble) => Ok(ensemble),
            _ => Err(ModelError::NotTrained),
        }
    }

    /// Replays the forward transform and returns each layer's `[m, num_classes]` scores.
    fn layer_scores(
        &self,
        ensemble: &TrainedEnsemble,
        data: ArrayView2<f64>,
    ) -> Result<Vec<Array2<f64>>, ModelError> {
        validate_features(data)?;
        if data.ncols() != ensemble.n_features {
            return Err(ModelError::MismatchedFeatureCount {
                found: data.ncols(),
                expected: ensemble.n_features,
            });
        }

        let data_std = ensemble.input_standardization.apply(data);
        let mut h = data.to_owned();
        let mut scores = Vec::with_capacity(ensemble.layers.len());
        for layer in &ensemble.layers {
            let h_std = layer.standardization.apply(h.view());
            let core = layer
                .projection
                .design_core(h_std.view(), data_std.view(), self.activation)?;
            let design = with_bias_column(core.view())?;
            scores.push(design.dot(&layer.beta));
            h = core;
        }
        Ok(scores)
    }
}

fn validate_features(data: ArrayView2<f64>) -> Result<(), ModelError> {
    let (samples, features) = data.dim();
    if samples == 0 || features == 0 {
        return Err(ModelError::EmptyInput { samples, features });
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFiniteInput);
    }
    Ok(())
}

fn validate_training_input(
    data: ArrayView2<f64>,
    labels: ArrayView1<usize>,
    num_classes: usize,
) -> Result<(), ModelError> {
    validate_features(data)?;
    if data.nrows() != labels.len() {
        return Err(ModelError::MismatchedSampleCount {
            samples: data.nrows(),
            labels: labels.len(),
        });
    }
    if let Some((index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= num_classes) {
        return Err(ModelError::LabelOutOfRange {
            index,
            label,
            num_classes,
        });
    }
    Ok(())
}

/// `targets[i, labels[i]] = 1`, zero elsewhere.
fn one_hot(labels: ArrayView1<usize>, num_classes: usize) -> Array2<f64> {
    let mut targets = Array2::zeros((labels.len(), num_classes));
    for (i, &label) in labels.iter().enumerate() {
        targets[[i, label]] = 1.0;
    }
    targets
}

/// Index of the first maximum of each row.
fn argmax_rows(scores: ArrayView2<f64>) -> Array1<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| first_max_index(row.iter().copied()))
        .collect()
}

fn first_max_index<T: PartialOrd + Copy>(values: impl IntoIterator<Item = T>) -> usize {
    let mut best: Option<(usize, T)> = None;
    for (index, value) in values.into_iter().enumerate() {
        let improves = match best {
            Some((_, current)) => value > current,
            None => true,
        };
        if improves {
            best = Some((index, value));
        }
    }
    best.map_or(0, |(index, _)| index)
}

/// Counts layer votes per sample and picks the most-voted class. Ties resolve to the
/// lowest class index.
fn majority_vote(votes: &[Array1<usize>], n_samples: usize, num_classes: usize) -> Array1<usize> {
    Array1::from_shape_fn(n_samples, |sample| {
        let mut counts = vec![0usize; num_classes];
        for layer_votes in votes {
            counts[layer_votes[sample]] += 1;
        }
        first_max_index(counts)
    })
}

/// Row-wise softmax, shifted by the row maximum for numerical stability.
fn softmax_rows(scores: ArrayView2<f64>) -> Array2<f64> {
    let mut probabilities = scores.to_owned();
    for mut row in probabilities.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row /= total;
    }
    probabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_one_hot_sets_single_entry_per_row() {
        let targets = one_hot(array![2, 0, 1, 2].view(), 3);
        assert_eq!(
            targets,
            array![
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0]
            ]
        );
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        let scores = array![[0.1, 0.9, 0.9], [2.0, -1.0, 2.0], [-3.0, -2.0, -5.0]];
        assert_eq!(argmax_rows(scores.view()), array![1, 0, 1]);
    }

    #[test]
    fn test_majority_vote_breaks_ties_toward_lowest_class() {
        let votes = vec![array![2, 1, 0], array![1, 1, 2], array![2, 0, 1], array![1, 0, 2]];
        // Sample 0: classes 1 and 2 tie with two votes each.
        // Sample 1: classes 0 and 1 tie with two votes each.
        // Sample 2: class 2 wins with two votes.
        assert_eq!(majority_vote(&votes, 3, 3), array![1, 0, 2]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let scores = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, -1000.0]];
        let probabilities = softmax_rows(scores.view());

        for row in probabilities.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(probabilities[[1, 0]], 0.5, epsilon = 1e-12);
        assert!(probabilities[[0, 2]] > probabilities[[0, 1]]);
    }

    #[test]
    fn test_untrained_model_refuses_reads() {
        let model = EnsembleDeepRvfl::new(ModelConfig::default()).unwrap();
        let data = Array2::<f64>::zeros((2, 3));

        assert!(!model.is_trained());
        assert!(model.layers().is_empty());
        assert!(matches!(model.predict(data.view(), false), Err(ModelError::NotTrained)));
        assert!(matches!(
            model.eval(data.view(), array![0, 1].view()),
            Err(ModelError::NotTrained)
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let config = ModelConfig {
            n_layer: 0,
            ..ModelConfig::default()
        };
        assert!(matches!(
            EnsembleDeepRvfl::new(config),
            Err(ModelError::Configuration(ConfigError::ZeroLayers))
        ));
    }

    #[test]
    fn test_training_input_is_validated() {
        let mut model = EnsembleDeepRvfl::new(ModelConfig::default().with_seed(1)).unwrap();
        let data = array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5]];

        let err = model.train(data.view(), array![0, 1].view(), 2).unwrap_err();
        assert!(matches!(
            err,
            ModelError::MismatchedSampleCount {
                samples: 3,
                labels: 2
            }
        ));
        assert!(err.is_invalid_shape());

        let err = model.train(data.view(), array![0, 1, 2].view(), 2).unwrap_err();
        assert!(matches!(
            err,
            ModelError::LabelOutOfRange {
                index: 2,
                label: 2,
                num_classes: 2
            }
        ));

        let empty = Array2::<f64>::zeros((3, 0));
        let err = model.train(empty.view(), array![0, 1, 0].view(), 2).unwrap_err();
        assert!(matches!(err, ModelError::EmptyInput { features: 0, .. }));

        let poisoned = array![[0.0, f64::NAN], [1.0, 0.0], [0.5, 0.5]];
        let err = model.train(poisoned.view(), array![0, 1, 0].view(), 2).unwrap_err();
        assert!(matches!(err, ModelError::NonFiniteInput));

        // Rejected input never touched the model, so a valid fit still succeeds.
        assert!(!model.is_trained());
        model.train(data.view(), array![0, 1, 0].view(), 2).unwrap();
        assert!(model.is_trained());
    }

    #[test]
    fn test_skip_features_use_first_layer_statistics() {
        let config = ModelConfig::new(3, 0.5, [-1.0, 1.0], [0.0, 1.0], "sigmoid", 2)
            .unwrap()
            .with_seed(8);
        let mut model = EnsembleDeepRvfl::new(config).unwrap();
        let data = array![[0.5, 3.0], [1.5, -1.0], [-1.0, 2.0], [2.0, 0.0], [0.25, 1.0]];
        model.train(data.view(), array![0, 1, 0, 1, 0].view(), 2).unwrap();

        let ensemble = model.trained().unwrap();
        assert_eq!(
            &ensemble.input_standardization,
            ensemble.layers[0].standardization()
        );
        assert_ne!(
            ensemble.layers[0].standardization(),
            ensemble.layers[1].standardization()
        );
    }

    #[test]
    fn test_failed_solve_poisons_the_model() {
        // An all-zero feature standardizes to an all-zero design column, so without
        // regularization the primal Gram matrix has a zero pivot.
        let config = ModelConfig::new(1, 0.0, [-1.0, 1.0], [-1.0, 1.0], "sigmoid", 2)
            .unwrap()
            .with_seed(5);
        let mut model = EnsembleDeepRvfl::new(config).unwrap();
        let data = array![[0.5, 0.0], [1.5, 0.0], [-1.0, 0.0], [2.0, 0.0], [0.25, 0.0]];
        let labels = array![0, 1, 0, 1, 0];

        let err = model.train(data.view(), labels.view(), 2).unwrap_err();
        match err {
            ModelError::Solver { layer: 0, source } => assert!(source.is_singular()),
            other => panic!("Expected a layer 0 solver failure, got {:?}", other),
        }
        assert!(!model.is_trained());
        assert!(matches!(
            model.train(data.view(), labels.view(), 2),
            Err(ModelError::RetrainNotSupported)
        ));
        assert!(matches!(model.predict(data.view(), false), Err(ModelError::NotTrained)));
    }
}
