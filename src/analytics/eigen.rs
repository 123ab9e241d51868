// analytics/eigen.rs

// Eigen-decomposition helpers for complex analysis matrices. Eigenvalues
// come from nalgebra's Schur decomposition; eigenvectors are recovered per
// eigenvalue by shifted inverse iteration, which is deterministic for a
// fixed start vector.

use nalgebra::{Complex, DMatrix, DVector};

use crate::MeanfieldError;

const INVERSE_ITERATIONS: usize = 3;

/// Eigenvalues of a complex square matrix.
pub fn eigenvalues(
    matrix: &DMatrix<Complex<f64>>,
) -> Result<DVector<Complex<f64>>, MeanfieldError> {
    matrix.eigenvalues().ok_or_else(|| {
        MeanfieldError::Computation(
            "eigenvalue computation did not converge".to_string(),
        )
    })
}

/// Right eigenvector for a known eigenvalue, via inverse iteration on the
/// slightly shifted matrix `A - (1 + eps) * lambda * I`.
pub fn right_eigenvector(
    matrix: &DMatrix<Complex<f64>>,
    lambda: Complex<f64>,
) -> Result<DVector<Complex<f64>>, MeanfieldError> {
    let n = matrix.nrows();
    let shift = lambda * Complex::new(1.0 + 1e-10, 0.0) + Complex::new(1e-12, 1e-12);
    let mut shifted = matrix.clone();
    for i in 0..n {
        shifted[(i, i)] -= shift;
    }
    let lu = shifted.lu();

    let mut v = DVector::from_element(n, Complex::new(1.0, 0.0));
    v /= Complex::new(v.norm(), 0.0);
    for _ in 0..INVERSE_ITERATIONS {
        let next = lu.solve(&v).ok_or_else(|| {
            MeanfieldError::Computation(format!(
                "inverse iteration failed for eigenvalue {}",
                lambda
            ))
        })?;
        let norm = next.norm();
        if !norm.is_finite() || norm == 0.0 {
            return Err(MeanfieldError::Computation(format!(
                "inverse iteration diverged for eigenvalue {}",
                lambda
            )));
        }
        v = next / Complex::new(norm, 0.0);
    }
    Ok(v)
}

/// Left eigenvector for a known eigenvalue: `v^T A = lambda v^T`. Computed
/// as the conjugate of the right eigenvector of the adjoint at
/// `conj(lambda)`.
pub fn left_eigenvector(
    matrix: &DMatrix<Complex<f64>>,
    lambda: Complex<f64>,
) -> Result<DVector<Complex<f64>>, MeanfieldError> {
    let adjoint_vec = right_eigenvector(&matrix.adjoint(), lambda.conj())?;
    Ok(adjoint_vec.map(|c| c.conj()))
}

/// Index of the eigenvalue closest to one; used to pick the dominant mode.
pub fn closest_to_one(values: &DVector<Complex<f64>>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, lambda) in values.iter().enumerate() {
        let dist = (lambda - Complex::new(1.0, 0.0)).norm();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}
