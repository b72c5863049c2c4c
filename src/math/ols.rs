//! Ordinary least squares for the additive forecaster.
//!
//! Each design row holds the trend and seasonal terms for one history date;
//! the fit minimizes `Σ (y_i - x_i^T β)^2`.
//!
//! The design is tall (dates outnumber terms), so the solve goes through the
//! SVD pseudo-inverse. Singular values below `max(rows, cols) · ε · σ_max` are
//! treated as zero, which keeps nearly collinear Fourier columns on short
//! histories from blowing up the coefficients.

use nalgebra::{DMatrix, DVector};

/// Coefficients plus the residual sum of squares they leave.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresFit {
    pub coefficients: DVector<f64>,
    pub residual_ss: f64,
}

impl LeastSquaresFit {
    /// Residual standard deviation with `rows - cols` degrees of freedom
    /// (at least one).
    pub fn sigma(&self, rows: usize) -> f64 {
        let dof = rows.saturating_sub(self.coefficients.len()).max(1) as f64;
        (self.residual_ss / dof).sqrt()
    }
}

/// Fit `target ≈ design · β`.
///
/// `None` when the shapes disagree or the solve produces non-finite values.
pub fn fit_least_squares(design: &DMatrix<f64>, target: &DVector<f64>) -> Option<LeastSquaresFit> {
    if design.nrows() != target.len() || design.ncols() == 0 {
        return None;
    }

    let svd = design.clone().svd(true, true);
    let largest = svd.singular_values.max();
    let cutoff = design.nrows().max(design.ncols()) as f64 * f64::EPSILON * largest;

    let coefficients = svd.solve(target, cutoff).ok()?;
    if coefficients.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let residual_ss = (target - design * &coefficients).norm_squared();
    Some(LeastSquaresFit {
        coefficients,
        residual_ss,
    })
}
