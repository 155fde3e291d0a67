//! Random enhancement-feature projections and the per-layer forward transform.

use crate::config::ValueRange;
use ndarray::{Array2, ArrayView2, Axis, ShapeError, concatenate};
use rand::Rng;
use rand::distributions::Uniform;

/// Draws a `[rows, cols]` matrix with entries independently uniform over `[min, max)`.
///
/// Entries are drawn in row-major order, so a seeded generator always produces the
/// same matrix.
pub fn random_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    range: ValueRange,
    rng: &mut R,
) -> Array2<f64> {
    let distribution = Uniform::new(range.min, range.max);
    Array2::from_shape_fn((rows, cols), |_| rng.sample(&distribution))
}

/// The frozen random weights and bias of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomProjection {
    /// Shape `[input_dim, n_nodes]`.
    pub weights: Array2<f64>,
    /// Shape `[1, n_nodes]`.
    pub bias: Array2<f64>,
}

impl RandomProjection {
    /// Generates a projection from `input_dim` inputs to `n_nodes` enhancement nodes.
    /// The weights are drawn before the bias.
    pub fn generate<R: Rng + ?Sized>(
        input_dim: usize,
        n_nodes: usize,
        weight_range: ValueRange,
        bias_range: ValueRange,
        rng: &mut R,
    ) -> Self {
        let weights = random_matrix(input_dim, n_nodes, weight_range, rng);
        let bias = random_matrix(1, n_nodes, bias_range, rng);
        Self { weights, bias }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_nodes(&self) -> usize {
        self.weights.ncols()
    }

    /// `activation(h · W + 1 · b)`, shape `[n, n_nodes]`.
    pub fn project(&self, h: ArrayView2<f64>, activation: fn(f64) -> f64) -> Array2<f64> {
        let mut projected = h.dot(&self.weights);
        projected += &self.bias;
        projected.mapv_inplace(activation);
        projected
    }

    /// Projects `h` and appends the skip-connected standardized input features,
    /// giving the `[n, n_nodes + D]` block that feeds the next layer.
    pub fn design_core(
        &self,
        h: ArrayView2<f64>,
        data_std: ArrayView2<f64>,
        activation: fn(f64) -> f64,
    ) -> Result<Array2<f64>, ShapeError> {
        let projected = self.project(h, activation);
        concatenate(Axis(1), &[projected.view(), data_std.view()])
    }
}

/// Appends a trailing column of ones so the output weights carry an intercept row.
pub fn with_bias_column(core: ArrayView2<f64>) -> Result<Array2<f64>, ShapeError> {
    let ones = Array2::<f64>::ones((core.nrows(), 1));
    concatenate(Axis(1), &[core.view(), ones.view()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, relu};
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_matrix_stays_inside_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let range = ValueRange::new(-0.25, 0.75);
        let matrix = random_matrix(40, 25, range, &mut rng);

        assert_eq!(matrix.dim(), (40, 25));
        assert!(matrix.iter().all(|&v| (-0.25..0.75).contains(&v)));
        let mean = matrix.mean().unwrap();
        assert!((mean - 0.25).abs() < 0.05, "mean {} far from range centre", mean);
    }

    #[test]
    fn test_generate_is_reproducible_for_a_seed() {
        let range = ValueRange::new(-1.0, 1.0);
        let a = RandomProjection::generate(4, 3, range, range, &mut StdRng::seed_from_u64(9));
        let b = RandomProjection::generate(4, 3, range, range, &mut StdRng::seed_from_u64(9));
        let c = RandomProjection::generate(4, 3, range, range, &mut StdRng::seed_from_u64(10));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.input_dim(), 4);
        assert_eq!(a.n_nodes(), 3);
        assert_eq!(a.bias.dim(), (1, 3));
    }

    #[test]
    fn test_project_adds_bias_to_every_row() {
        let projection = RandomProjection {
            weights: array![[1.0, -1.0], [0.5, 2.0]],
            bias: array![[0.5, -10.0]],
        };
        let h = array![[1.0, 2.0], [-3.0, 0.0]];

        let linear = projection.project(h.view(), |x| x);
        assert_eq!(linear, array![[2.5, -7.0], [-2.5, -7.0]]);

        let rectified = projection.project(h.view(), relu);
        assert_eq!(rectified, array![[2.5, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_design_blocks_have_expected_layout() {
        let projection = RandomProjection {
            weights: array![[1.0, 0.0, 2.0]],
            bias: array![[0.0, 1.0, 0.0]],
        };
        let h = array![[1.0], [2.0]];
        let data_std = array![[-1.0, 0.5], [1.0, -0.5]];

        let core = projection
            .design_core(h.view(), data_std.view(), Activation::Relu.resolve())
            .unwrap();
        assert_eq!(core, array![[1.0, 1.0, 2.0, -1.0, 0.5], [2.0, 1.0, 4.0, 1.0, -0.5]]);

        let design = with_bias_column(core.view()).unwrap();
        assert_eq!(design.dim(), (2, 6));
        assert!(design.column(5).iter().all(|&v| v == 1.0));
    }
}
