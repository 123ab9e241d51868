// analytics/meanfield.rs

// Reference analytics engine: standard leaky integrate-and-fire mean-field
// approximations. Stationary rates come from a Siegert-style self-consistency
// loop, the transfer function is the rate slope filtered by membrane and
// synapse, delay kernels are sharp or Gaussian, and the spectral analyses are
// built on the effective connectivity matrix MH(omega).

use log::debug;
use nalgebra::{Complex, DMatrix, DVector};

use super::eigen;
use super::{AnalyticsEngine, EigenMatrix, EigenSide};
use crate::params::{DelayDistKind, PhysicalParams};
use crate::MeanfieldError;

const RATE_MAX_ITERATIONS: usize = 500;
const RATE_TOLERANCE: f64 = 1e-10;
const RATE_RELAXATION: f64 = 0.3;

/// Built-in LIF mean-field implementation of [`AnalyticsEngine`].
#[derive(Clone, Debug, Default)]
pub struct MeanFieldAnalytics;

impl MeanFieldAnalytics {
    /// New engine instance.
    pub fn new() -> Self {
        MeanFieldAnalytics
    }

    /// Mean input for a given rate vector [V].
    fn mean_from_rates(&self, rates: &DVector<f64>, p: &PhysicalParams) -> DVector<f64> {
        DVector::from_fn(p.dimension, |i, _| {
            let recurrent: f64 = (0..p.dimension)
                .map(|j| p.k[(i, j)] * p.j[(i, j)] * rates[j])
                .sum();
            let external = p.k_ext[i] * p.j_ext * p.nu_ext;
            p.tau_m * (recurrent + external)
        })
    }

    /// Input standard deviation for a given rate vector [V].
    fn std_from_rates(&self, rates: &DVector<f64>, p: &PhysicalParams) -> DVector<f64> {
        DVector::from_fn(p.dimension, |i, _| {
            let recurrent: f64 = (0..p.dimension)
                .map(|j| p.k[(i, j)] * p.j[(i, j)].powi(2) * rates[j])
                .sum();
            let external = p.k_ext[i] * p.j_ext.powi(2) * p.nu_ext;
            (p.tau_m * (recurrent + external)).sqrt()
        })
    }

    /// Effective connectivity matrix MH at one frequency, from the transfer
    /// function column and the delay kernel at that frequency.
    fn effective_connectivity(
        &self,
        tf: &DVector<Complex<f64>>,
        delay_dist: &DMatrix<Complex<f64>>,
        p: &PhysicalParams,
    ) -> DMatrix<Complex<f64>> {
        DMatrix::from_fn(p.dimension, p.dimension, |i, j| {
            tf[i] * p.tau_m * p.k[(i, j)] * p.j[(i, j)] * delay_dist[(i, j)]
        })
    }

    /// Builds the matrix selected for eigenanalysis at one frequency.
    fn analysis_matrix(
        &self,
        which: EigenMatrix,
        tf: &DVector<Complex<f64>>,
        delay_dist: &DMatrix<Complex<f64>>,
        p: &PhysicalParams,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let mh = self.effective_connectivity(tf, delay_dist, p);
        let identity = DMatrix::identity(p.dimension, p.dimension);
        match which {
            EigenMatrix::EffectiveConnectivity => Ok(mh),
            EigenMatrix::InversePropagator => Ok(identity - mh),
            EigenMatrix::Propagator => (identity - mh).try_inverse().ok_or_else(|| {
                MeanfieldError::Computation(
                    "propagator is singular: I - MH is not invertible".to_string(),
                )
            }),
        }
    }
}

impl AnalyticsEngine for MeanFieldAnalytics {
    fn firing_rates(&self, p: &PhysicalParams) -> Result<DVector<f64>, MeanfieldError> {
        let mut rates = DVector::zeros(p.dimension);
        for iteration in 0..RATE_MAX_ITERATIONS {
            let mean = self.mean_from_rates(&rates, p);
            let std = self.std_from_rates(&rates, p);
            let mut next = DVector::zeros(p.dimension);
            for i in 0..p.dimension {
                let target = siegert_rate(mean[i], std[i], p)?;
                next[i] = (1.0 - RATE_RELAXATION) * rates[i] + RATE_RELAXATION * target;
            }
            let delta = (&next - &rates).amax();
            rates = next;
            if !rates.iter().all(|r| r.is_finite()) {
                return Err(MeanfieldError::Computation(
                    "firing-rate iteration produced non-finite values".to_string(),
                ));
            }
            if delta < RATE_TOLERANCE {
                debug!("firing rates converged after {} iterations", iteration + 1);
                return Ok(rates);
            }
        }
        Err(MeanfieldError::Computation(format!(
            "firing-rate iteration did not converge within {} steps",
            RATE_MAX_ITERATIONS
        )))
    }

    fn mean_input(
        &self,
        rates: &DVector<f64>,
        p: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError> {
        Ok(self.mean_from_rates(rates, p))
    }

    fn std_input(
        &self,
        rates: &DVector<f64>,
        p: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError> {
        Ok(self.std_from_rates(rates, p))
    }

    fn transfer_function(
        &self,
        mean: &DVector<f64>,
        std: &DVector<f64>,
        p: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        // rate slope dnu/dmu at the working point, per population [Hz/V]
        let mut slopes = DVector::zeros(p.dimension);
        for i in 0..p.dimension {
            slopes[i] = rate_slope(mean[i], std[i], p)?;
        }
        let mut tf = DMatrix::zeros(p.dimension, omegas.len());
        for (col, &omega) in omegas.iter().enumerate() {
            // the filter form is valid for non-negative frequencies; callers
            // conjugate the result for negative omegas
            let omega = omega.abs();
            let membrane = Complex::new(1.0, omega * p.tau_m);
            let synapse = Complex::new(1.0, omega * p.tau_s);
            for i in 0..p.dimension {
                tf[(i, col)] = Complex::new(slopes[i], 0.0) / (membrane * synapse);
            }
        }
        Ok(tf)
    }

    fn delay_dist_matrix(
        &self,
        p: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        let matrices = omegas
            .iter()
            .map(|&omega| match p.delay_dist {
                DelayDistKind::None => {
                    DMatrix::from_element(p.dimension, p.dimension, Complex::new(1.0, 0.0))
                }
                DelayDistKind::Gaussian => DMatrix::from_fn(p.dimension, p.dimension, |i, j| {
                    let attenuation = (-0.5 * (omega * p.delay_sd[(i, j)]).powi(2)).exp();
                    let phase = Complex::new(0.0, -omega * p.delay[(i, j)]).exp();
                    phase * attenuation
                }),
            })
            .collect();
        Ok(matrices)
    }

    fn power_spectra(
        &self,
        rates: &DVector<f64>,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        p: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<f64>, MeanfieldError> {
        check_grid_inputs(transfer_function, delay_dist, p, omegas)?;
        let mut spectra = DMatrix::zeros(p.dimension, omegas.len());
        for (col, _) in omegas.iter().enumerate() {
            let tf = transfer_function.column(col).clone_owned();
            let propagator =
                self.analysis_matrix(EigenMatrix::Propagator, &tf, &delay_dist[col], p)?;
            for i in 0..p.dimension {
                // shot noise from finite populations, filtered by the propagator
                spectra[(i, col)] = (0..p.dimension)
                    .map(|j| propagator[(i, j)].norm_sqr() * rates[j] / p.n[j])
                    .sum();
            }
        }
        Ok(spectra)
    }

    fn sensitivity_measure(
        &self,
        transfer_function: &DVector<Complex<f64>>,
        delay_dist: &DMatrix<Complex<f64>>,
        p: &PhysicalParams,
        omega: f64,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let mh = self.effective_connectivity(transfer_function, delay_dist, p);
        let values = eigen::eigenvalues(&mh)?;
        let index = eigen::closest_to_one(&values);
        let lambda = values[index];
        debug!(
            "sensitivity measure at omega {}: dominant eigenvalue {}",
            omega, lambda
        );
        let right = eigen::right_eigenvector(&mh, lambda)?;
        let left = eigen::left_eigenvector(&mh, lambda)?;
        let overlap: Complex<f64> = left.iter().zip(right.iter()).map(|(l, r)| l * r).sum();
        if overlap.norm() == 0.0 {
            return Err(MeanfieldError::Computation(
                "degenerate eigenmode: left/right eigenvector overlap vanishes".to_string(),
            ));
        }
        Ok(DMatrix::from_fn(p.dimension, p.dimension, |i, j| {
            left[i] * right[j] / overlap * mh[(i, j)]
        }))
    }

    fn eigenvalue_spectra(
        &self,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        p: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        check_grid_inputs(transfer_function, delay_dist, p, omegas)?;
        let mut spectra = DMatrix::zeros(p.dimension, omegas.len());
        for col in 0..omegas.len() {
            let tf = transfer_function.column(col).clone_owned();
            let m = self.analysis_matrix(matrix, &tf, &delay_dist[col], p)?;
            let values = eigen::eigenvalues(&m)?;
            spectra.set_column(col, &values);
        }
        Ok(spectra)
    }

    fn eigenvector_spectra(
        &self,
        side: EigenSide,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        p: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        check_grid_inputs(transfer_function, delay_dist, p, omegas)?;
        let mut per_omega = Vec::with_capacity(omegas.len());
        for col in 0..omegas.len() {
            let tf = transfer_function.column(col).clone_owned();
            let m = self.analysis_matrix(matrix, &tf, &delay_dist[col], p)?;
            let values = eigen::eigenvalues(&m)?;
            let mut vectors = DMatrix::zeros(p.dimension, p.dimension);
            for (k, &lambda) in values.iter().enumerate() {
                let v = match side {
                    EigenSide::Right => eigen::right_eigenvector(&m, lambda)?,
                    EigenSide::Left => eigen::left_eigenvector(&m, lambda)?,
                };
                vectors.set_column(k, &v);
            }
            per_omega.push(vectors);
        }
        Ok(per_omega)
    }
}

fn check_grid_inputs(
    transfer_function: &DMatrix<Complex<f64>>,
    delay_dist: &[DMatrix<Complex<f64>>],
    p: &PhysicalParams,
    omegas: &[f64],
) -> Result<(), MeanfieldError> {
    if transfer_function.shape() != (p.dimension, omegas.len())
        || delay_dist.len() != omegas.len()
    {
        return Err(MeanfieldError::Computation(format!(
            "grid inputs disagree: transfer function {:?}, {} delay matrices, {} omegas",
            transfer_function.shape(),
            delay_dist.len(),
            omegas.len()
        )));
    }
    Ok(())
}

/// Siegert first-passage rate of a LIF neuron for the given mean and
/// standard deviation of the input [Hz].
fn siegert_rate(mean: f64, std: f64, p: &PhysicalParams) -> Result<f64, MeanfieldError> {
    if std <= 0.0 {
        // noiseless limit: fires only when driven over threshold
        return Ok(if mean > p.v_th_rel {
            1.0 / (p.tau_r + p.tau_m * (mean / (mean - p.v_th_rel)).ln())
        } else {
            0.0
        });
    }
    let lower = (p.v_0_rel - mean) / std;
    let upper = (p.v_th_rel - mean) / std;
    if !lower.is_finite() || !upper.is_finite() {
        return Err(MeanfieldError::Computation(
            "siegert rate: non-finite integration bounds".to_string(),
        ));
    }
    // far below threshold the rate underflows to zero
    if upper > 10.0 {
        return Ok(0.0);
    }
    let integral = simpson(lower, upper, 400, siegert_integrand);
    let inverse_rate = p.tau_r + p.tau_m * std::f64::consts::PI.sqrt() * integral;
    if !(inverse_rate.is_finite() && inverse_rate > 0.0) {
        return Err(MeanfieldError::Computation(format!(
            "siegert rate diverged (mean {:.3e} V, std {:.3e} V)",
            mean, std
        )));
    }
    Ok(1.0 / inverse_rate)
}

/// exp(u^2) * (1 + erf(u)), with the asymptotic form for large negative u
/// where the direct product would be 0 * inf.
fn siegert_integrand(u: f64) -> f64 {
    if u < -4.0 {
        let u2 = u * u;
        // erfcx expansion: 1/(|u| sqrt(pi)) * (1 - 1/(2 u^2))
        (1.0 - 0.5 / u2) / (-u * std::f64::consts::PI.sqrt())
    } else {
        (u * u).exp() * (1.0 + erf(u))
    }
}

/// Numerical slope of the Siegert rate with respect to the mean input
/// [Hz/V].
fn rate_slope(mean: f64, std: f64, p: &PhysicalParams) -> Result<f64, MeanfieldError> {
    let step = (1e-3 * std).max(1e-9);
    let upper = siegert_rate(mean + step, std, p)?;
    let lower = siegert_rate(mean - step, std, p)?;
    Ok((upper - lower) / (2.0 * step))
}

/// Composite Simpson rule with a fixed even number of intervals.
fn simpson(a: f64, b: f64, intervals: usize, f: fn(f64) -> f64) -> f64 {
    debug_assert!(intervals % 2 == 0);
    if a >= b {
        return 0.0;
    }
    let h = (b - a) / intervals as f64;
    let mut acc = f(a) + f(b);
    for i in 1..intervals {
        let weight = if i % 2 == 0 { 2.0 } else { 4.0 };
        acc += weight * f(a + i as f64 * h);
    }
    acc * h / 3.0
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}
