//! Numeric boundary of the toolkit.
//!
//! The network facade composes and memoizes analyses; the formulas
//! themselves live behind [`AnalyticsEngine`]: deterministic functions from
//! numeric parameters to numeric arrays. [`MeanFieldAnalytics`] is the
//! bundled reference implementation; tests substitute stubs through the same
//! trait.

pub mod eigen;
mod meanfield;

use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::params::PhysicalParams;
use crate::MeanfieldError;

pub use meanfield::MeanFieldAnalytics;

/// Matrices whose eigensystems the facade exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EigenMatrix {
    /// Effective connectivity matrix `MH(omega)`
    EffectiveConnectivity,
    /// Propagator `(I - MH(omega))^-1`
    Propagator,
    /// Inverse propagator `I - MH(omega)`
    InversePropagator,
}

/// Left or right eigenvectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EigenSide {
    /// Row eigenvectors of the matrix
    Left,
    /// Column eigenvectors of the matrix
    Right,
}

/// Deterministic numeric routines of the mean-field model.
///
/// All methods are pure functions of their arguments. Failures (singular
/// matrices, non-convergent iterations) are computation errors; callers
/// propagate them without retrying and the memoizer records nothing.
#[cfg_attr(test, mockall::automock)]
pub trait AnalyticsEngine {
    /// Stationary firing rate per population [Hz].
    fn firing_rates(&self, params: &PhysicalParams) -> Result<DVector<f64>, MeanfieldError>;

    /// Mean input per population [V], given the stationary rates.
    fn mean_input(
        &self,
        rates: &DVector<f64>,
        params: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError>;

    /// Input standard deviation per population [V].
    fn std_input(
        &self,
        rates: &DVector<f64>,
        params: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError>;

    /// Transfer function per population and angular frequency [Hz/V];
    /// shape (dimension, |omegas|). Implementations may assume non-negative
    /// frequencies; the facade conjugates the result where a negative
    /// angular frequency demands it.
    fn transfer_function(
        &self,
        mean: &DVector<f64>,
        std: &DVector<f64>,
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError>;

    /// Delay distribution kernel per angular frequency; one
    /// dimension x dimension matrix per omega.
    fn delay_dist_matrix(
        &self,
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError>;

    /// Population power spectra; shape (dimension, |omegas|).
    fn power_spectra(
        &self,
        rates: &DVector<f64>,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<f64>, MeanfieldError>;

    /// Per-connection sensitivity of the dominant eigenmode at one angular
    /// frequency; shape (dimension, dimension).
    fn sensitivity_measure(
        &self,
        transfer_function: &DVector<Complex<f64>>,
        delay_dist: &DMatrix<Complex<f64>>,
        params: &PhysicalParams,
        omega: f64,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError>;

    /// Eigenvalues of the chosen matrix along the frequency grid; shape
    /// (dimension, |omegas|).
    fn eigenvalue_spectra(
        &self,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError>;

    /// Left or right eigenvectors of the chosen matrix along the frequency
    /// grid; one dimension x dimension matrix (eigenvectors as columns) per
    /// omega.
    fn eigenvector_spectra(
        &self,
        side: EigenSide,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError>;
}
