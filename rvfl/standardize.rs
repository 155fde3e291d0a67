//! Per-layer z-score standardization.
//!
//! Statistics are part of the trained artifact: they are fit from a layer's training
//! input the first time that layer is seen and then reused verbatim for every later
//! call, including on evaluation and inference data.

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Frozen standardization parameters for one layer's input block.
#[derive(Debug, Clone, PartialEq)]
pub enum Standardization {
    /// One mean and std per feature column.
    Columnwise { mean: Array1<f64>, std: Array1<f64> },
    /// A single mean and std shared by every entry of the block.
    Scalar { mean: f64, std: f64 },
}

impl Standardization {
    /// Fits parameters from `x`. The std is floored at `1/sqrt(n_samples)` so that
    /// near-constant features do not blow up after division.
    pub fn fit(x: ArrayView2<f64>, same_feature: bool) -> Self {
        let floor = std_floor(x.nrows());
        if same_feature {
            let mean = x.mean().unwrap_or(0.0);
            let std = x.std(0.0).max(floor);
            Standardization::Scalar { mean, std }
        } else {
            let mean = x
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(x.ncols()));
            let std = x.std_axis(Axis(0), 0.0).mapv(|s| s.max(floor));
            Standardization::Columnwise { mean, std }
        }
    }

    /// Returns `(x - mean) / std` as a new array.
    pub fn apply(&self, x: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Standardization::Columnwise { mean, std } => (&x - mean) / std,
            Standardization::Scalar { mean, std } => x.mapv(|v| (v - mean) / std),
        }
    }
}

fn std_floor(n_samples: usize) -> f64 {
    1.0 / (n_samples.max(1) as f64).sqrt()
}

/// Fits standardization lazily, one slot per layer index.
#[derive(Debug, Clone)]
pub struct Standardizer {
    same_feature: bool,
    layers: Vec<Option<Standardization>>,
}

impl Standardizer {
    pub fn new(same_feature: bool) -> Self {
        Self {
            same_feature,
            layers: Vec::new(),
        }
    }

    /// Standardizes `x` with the parameters of `layer`, fitting them from `x` if this
    /// is the first time the layer is used.
    pub fn fit_or_reuse(&mut self, x: ArrayView2<f64>, layer: usize) -> Array2<f64> {
        if layer >= self.layers.len() {
            self.layers.resize_with(layer + 1, || None);
        }
        let same_feature = self.same_feature;
        self.layers[layer]
            .get_or_insert_with(|| Standardization::fit(x, same_feature))
            .apply(x)
    }

    /// Consumes the standardizer, yielding the fitted parameters in layer order.
    pub fn into_params(self) -> Vec<Standardization> {
        self.layers.into_iter().flatten().collect()
    }
}
