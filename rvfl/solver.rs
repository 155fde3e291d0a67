//! # Closed-Form Ridge Regression
//!
//! Each layer's output weights minimize `||D·beta - Y||² + lam·||beta||²` and are
//! computed directly from one of two algebraically equivalent forms:
//!
//! - primal: `beta = (lam·I + Dᵀ·D)⁻¹ · Dᵀ · Y`, inverting a `[p, p]` Gram matrix;
//! - dual:   `beta = Dᵀ · (lam·I + D·Dᵀ)⁻¹ · Y`, inverting an `[n, n]` Gram matrix.
//!
//! The smaller of the two Gram matrices is the one that gets factorized. Both are
//! symmetric positive definite whenever `lam > 0`, so a Cholesky factorization is
//! used; a failed factorization means the regularized system is singular.

use ndarray::{Array2, ArrayView2, Axis};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{FactorizeC, SolveC, UPLO};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error(
        "The regularized Gram matrix ({dim}x{dim}, {form:?} form) is singular and could not be factorized: {source}"
    )]
    SingularMatrix {
        form: RidgeForm,
        dim: usize,
        #[source]
        source: LinalgError,
    },

    #[error(
        "The ridge solution contains non-finite values. The regularized Gram matrix is numerically singular."
    )]
    NonFiniteSolution,

    #[error("The design matrix has {design_rows} rows but the target matrix has {target_rows}.")]
    MismatchedRows {
        design_rows: usize,
        target_rows: usize,
    },
}

impl SolverError {
    /// True for every failure caused by a (numerically) singular Gram matrix.
    pub fn is_singular(&self) -> bool {
        matches!(
            self,
            SolverError::SingularMatrix { .. } | SolverError::NonFiniteSolution
        )
    }
}

/// Which algebraic form of the ridge solution to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RidgeForm {
    Primal,
    Dual,
}

impl RidgeForm {
    /// Chooses the cheaper form for a design matrix of shape `[rows, cols]`.
    ///
    /// The trailing column of an RVFL design is the bias column, so `rows >= cols`
    /// is the same as `n_samples > n_nodes + D`.
    pub fn for_design(rows: usize, cols: usize) -> Self {
        if rows >= cols {
            RidgeForm::Primal
        } else {
            RidgeForm::Dual
        }
    }
}

/// Output weights together with the form that produced them.
#[derive(Debug, Clone)]
pub struct RidgeSolution {
    /// Shape `[design.ncols(), targets.ncols()]`.
    pub beta: Array2<f64>,
    pub form: RidgeForm,
}

/// Solves for ridge output weights, choosing the form from the design shape.
pub fn solve(
    design: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    lam: f64,
) -> Result<RidgeSolution, SolverError> {
    let form = RidgeForm::for_design(design.nrows(), design.ncols());
    solve_with_form(design, targets, lam, form)
}

/// Solves for ridge output weights with an explicitly chosen form.
pub fn solve_with_form(
    design: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    lam: f64,
    form: RidgeForm,
) -> Result<RidgeSolution, SolverError> {
    if design.nrows() != targets.nrows() {
        return Err(SolverError::MismatchedRows {
            design_rows: design.nrows(),
            target_rows: targets.nrows(),
        });
    }

    let beta = match form {
        RidgeForm::Primal => {
            let gram = regularized_gram(design.t().dot(&design), lam);
            let rhs = design.t().dot(&targets);
            solve_spd(gram, rhs.view(), form)?
        }
        RidgeForm::Dual => {
            let gram = regularized_gram(design.dot(&design.t()), lam);
            let alpha = solve_spd(gram, targets, form)?;
            design.t().dot(&alpha)
        }
    };

    if beta.iter().any(|v| !v.is_finite()) {
        log::warn!(
            "{:?} ridge solve produced non-finite output weights (lam = {:e}).",
            form,
            lam
        );
        return Err(SolverError::NonFiniteSolution);
    }

    Ok(RidgeSolution { beta, form })
}

fn regularized_gram(mut gram: Array2<f64>, lam: f64) -> Array2<f64> {
    gram.diag_mut().map_inplace(|v| *v += lam);
    gram
}

/// Solves `gram · X = rhs` column by column against one Cholesky factorization.
fn solve_spd(
    gram: Array2<f64>,
    rhs: ArrayView2<f64>,
    form: RidgeForm,
) -> Result<Array2<f64>, SolverError> {
    let dim = gram.nrows();
    let singular = |source| SolverError::SingularMatrix { form, dim, source };

    let factor = gram.factorizec(UPLO::Lower).map_err(singular)?;
    let mut solution = Array2::<f64>::zeros((dim, rhs.ncols()));
    for (j, column) in rhs.axis_iter(Axis(1)).enumerate() {
        let solved = factor.solvec(&column).map_err(singular)?;
        solution.column_mut(j).assign(&solved);
    }
    Ok(solution)
}
