//! Network facade: named, auto-memoized analysis operations.
//!
//! A [`Network`] owns one parameter store pair (network + analysis), one
//! result cache and one analytics engine. Accessors compose on each other
//! (power spectra pull in the transfer function, firing rates and the delay
//! distribution matrix) and every expensive step goes through the memoizer,
//! so repeated calls never recompute.
//!
//! Instances are single-threaded: the indexed memoization appends are not
//! atomic across threads, so share a `Network` only behind an external
//! exclusive lock, if at all. `change_parameters` never mutates the
//! receiver; it builds a fresh network (with a fresh cache) from merged
//! parameter overlays.

use log::{debug, info};
use nalgebra::{Complex, DMatrix, DVector};

use crate::analytics::{AnalyticsEngine, EigenMatrix, EigenSide, MeanFieldAnalytics};
use crate::cache::{Probe, ResultCache, ResultValue};
use crate::params::{derive, ParameterStore, PhysicalParams, Quantity, Unit, UnitSystem};
use crate::{storage, MeanfieldError};

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Stationary working point: rates, mean input and input deviation for all
/// populations.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkingPoint {
    /// Stationary firing rates [Hz]
    pub firing_rates: DVector<f64>,
    /// Mean input per population [V]
    pub mean_input: DVector<f64>,
    /// Input standard deviation per population [V]
    pub std_input: DVector<f64>,
}

/// Mean-field network with memoized analysis accessors.
pub struct Network<A: AnalyticsEngine> {
    network_params: ParameterStore,
    analysis_params: ParameterStore,
    results: ResultCache,
    analytics: A,
    units: UnitSystem,
}

impl Network<MeanFieldAnalytics> {
    /// Builds a network from YAML parameter files using the bundled
    /// analytics engine, then tries to seed the cache from previously saved
    /// results under `./results` (a missing snapshot is not an error).
    pub fn from_files(
        network_params_path: &str,
        analysis_params_path: &str,
    ) -> Result<Self, MeanfieldError> {
        let units = UnitSystem::new();
        let network_params = storage::load_params(network_params_path, &units)?;
        let analysis_params = storage::load_params(analysis_params_path, &units)?;
        let mut network = Network::new(
            network_params,
            analysis_params,
            MeanFieldAnalytics::new(),
            units,
        )?;
        match storage::restore_results(std::path::Path::new("results"), &mut network, None) {
            Ok(true) => info!("restored previously computed results"),
            Ok(false) => debug!("no stored results for the current parameters"),
            Err(e) => debug!("could not restore stored results: {}", e),
        }
        Ok(network)
    }
}

impl<A: AnalyticsEngine> Network<A> {
    /// Builds a network from parameter stores. Dependent network parameters
    /// (weight and delay matrices, dimension) and the angular frequency grid
    /// are derived here; derived entries overlay the raw inputs.
    pub fn new(
        network_params: ParameterStore,
        analysis_params: ParameterStore,
        analytics: A,
        units: UnitSystem,
    ) -> Result<Self, MeanfieldError> {
        let derived_network = derive::derive_network_params(&network_params, &units)?;
        let network_params = network_params.merged(&derived_network);
        let derived_analysis = derive::derive_analysis_params(&analysis_params, &units)?;
        let analysis_params = analysis_params.merged(&derived_analysis);
        Ok(Network {
            network_params,
            analysis_params,
            results: ResultCache::new(),
            analytics,
            units,
        })
    }

    /// Network parameters, raw and derived.
    pub fn network_params(&self) -> &ParameterStore {
        &self.network_params
    }

    /// Analysis parameters, including the derived `omegas` grid.
    pub fn analysis_params(&self) -> &ParameterStore {
        &self.analysis_params
    }

    /// The result cache (read-only view, for instrumentation and storage).
    pub fn cache(&self) -> &ResultCache {
        &self.results
    }

    pub(crate) fn set_cache(&mut self, cache: ResultCache) {
        self.results = cache;
    }

    /// Angular frequency grid [Hz].
    pub fn omegas(&self) -> Result<DVector<f64>, MeanfieldError> {
        self.analysis_params
            .vector_in("omegas", Unit::Hertz, &self.units)
    }

    fn physical(&self) -> Result<PhysicalParams, MeanfieldError> {
        PhysicalParams::from_store(&self.network_params, &self.units)
    }

    fn frequency_probe(&self, freq: &Quantity) -> Result<(Probe, f64), MeanfieldError> {
        let f_hz = freq.to(&self.units, Unit::Hertz)?.as_scalar()?;
        Ok((Probe::frequency(f_hz, Unit::Hertz), TWO_PI * f_hz))
    }

    /// Stationary firing rates [Hz]. Memoized.
    pub fn firing_rates(&mut self) -> Result<DVector<f64>, MeanfieldError> {
        let params = self.physical()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("firing_rates", || {
                analytics.firing_rates(&params).map(ResultValue::RealVector)
            })?
            .into_real_vector()
    }

    /// Mean input per population [V]. Memoized; depends on the firing
    /// rates.
    pub fn mean_input(&mut self) -> Result<DVector<f64>, MeanfieldError> {
        let rates = self.firing_rates()?;
        let params = self.physical()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("mu", || {
                analytics
                    .mean_input(&rates, &params)
                    .map(ResultValue::RealVector)
            })?
            .into_real_vector()
    }

    /// Input standard deviation per population [V]. Memoized; depends on
    /// the firing rates.
    pub fn std_input(&mut self) -> Result<DVector<f64>, MeanfieldError> {
        let rates = self.firing_rates()?;
        let params = self.physical()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("sigma", || {
                analytics
                    .std_input(&rates, &params)
                    .map(ResultValue::RealVector)
            })?
            .into_real_vector()
    }

    /// Stationary working point. A cheap composition of the three memoized
    /// accessors, not itself cached.
    pub fn working_point(&mut self) -> Result<WorkingPoint, MeanfieldError> {
        Ok(WorkingPoint {
            firing_rates: self.firing_rates()?,
            mean_input: self.mean_input()?,
            std_input: self.std_input()?,
        })
    }

    /// Delay distribution kernels over the whole frequency grid, one
    /// dimension x dimension matrix per omega. Memoized.
    pub fn delay_dist_matrix(
        &mut self,
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        let params = self.physical()?;
        let omegas = self.omegas()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("delay_dist", || {
                analytics
                    .delay_dist_matrix(&params, omegas.as_slice())
                    .map(ResultValue::ComplexMatrixSeq)
            })?
            .into_complex_matrix_seq()
    }

    /// Delay distribution kernel at a single frequency. Indexed-memoized by
    /// the probed frequency.
    pub fn delay_dist_matrix_at(
        &mut self,
        freq: &Quantity,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let (probe, omega) = self.frequency_probe(freq)?;
        let params = self.physical()?;
        let analytics = &self.analytics;
        let units = &self.units;
        self.results
            .get_or_compute_at("delay_dist_single", "delay_dist_freqs", probe, units, || {
                let mut matrices = analytics.delay_dist_matrix(&params, &[omega])?;
                if matrices.is_empty() {
                    return Err(MeanfieldError::Computation(
                        "analytics returned no delay distribution matrix".to_string(),
                    ));
                }
                Ok(ResultValue::ComplexMatrix(matrices.remove(0)))
            })?
            .into_complex_matrix()
    }

    /// Transfer functions over the whole frequency grid, shape
    /// (dimension, |omegas|). Memoized; depends on mean and deviation.
    pub fn transfer_function(&mut self) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let mean = self.mean_input()?;
        let std = self.std_input()?;
        let params = self.physical()?;
        let omegas = self.omegas()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("transfer_function", || {
                analytics
                    .transfer_function(&mean, &std, &params, omegas.as_slice())
                    .map(ResultValue::ComplexMatrix)
            })?
            .into_complex_matrix()
    }

    /// Transfer function at a single frequency, one entry per population.
    /// Indexed-memoized by the probed frequency.
    pub fn transfer_function_at(
        &mut self,
        freq: &Quantity,
    ) -> Result<DVector<Complex<f64>>, MeanfieldError> {
        let mean = self.mean_input()?;
        let std = self.std_input()?;
        let (probe, omega) = self.frequency_probe(freq)?;
        let params = self.physical()?;
        let analytics = &self.analytics;
        let units = &self.units;
        self.results
            .get_or_compute_at(
                "transfer_function_single",
                "transfer_freqs",
                probe,
                units,
                || {
                    let tf = analytics.transfer_function(&mean, &std, &params, &[omega])?;
                    Ok(ResultValue::ComplexVector(tf.column(0).clone_owned()))
                },
            )?
            .into_complex_vector()
    }

    /// Sensitivity measure at a single frequency: how each connection moves
    /// the dominant eigenvalue. Indexed-memoized by the probed frequency.
    ///
    /// The transfer function and delay kernel are recomputed at exactly this
    /// frequency, bypassing the grid-wide caches; for negative angular
    /// frequencies the transfer function is complex-conjugated.
    pub fn sensitivity_measure(
        &mut self,
        freq: &Quantity,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let mean = self.mean_input()?;
        let std = self.std_input()?;
        let (probe, omega) = self.frequency_probe(freq)?;
        let params = self.physical()?;
        let analytics = &self.analytics;
        let units = &self.units;
        self.results
            .get_or_compute_at(
                "sensitivity_measure",
                "sensitivity_freqs",
                probe,
                units,
                || {
                    let tf = analytics.transfer_function(&mean, &std, &params, &[omega])?;
                    let mut tf = tf.column(0).clone_owned();
                    if omega < 0.0 {
                        tf = tf.map(|c| c.conj());
                    }
                    let mut delay_dist = analytics.delay_dist_matrix(&params, &[omega])?;
                    if delay_dist.is_empty() {
                        return Err(MeanfieldError::Computation(
                            "analytics returned no delay distribution matrix".to_string(),
                        ));
                    }
                    analytics
                        .sensitivity_measure(&tf, &delay_dist.remove(0), &params, omega)
                        .map(ResultValue::ComplexMatrix)
                },
            )?
            .into_complex_matrix()
    }

    /// Population power spectra over the frequency grid, shape
    /// (dimension, |omegas|). Memoized; depends on the transfer function,
    /// firing rates and delay distribution matrix.
    pub fn power_spectra(&mut self) -> Result<DMatrix<f64>, MeanfieldError> {
        let rates = self.firing_rates()?;
        let tf = self.transfer_function()?;
        let delay_dist = self.delay_dist_matrix()?;
        let params = self.physical()?;
        let omegas = self.omegas()?;
        let analytics = &self.analytics;
        self.results
            .get_or_compute("power_spectra", || {
                analytics
                    .power_spectra(&rates, &tf, &delay_dist, &params, omegas.as_slice())
                    .map(ResultValue::RealMatrix)
            })?
            .into_real_matrix()
    }

    /// Eigenvalues of the chosen analysis matrix along the frequency grid,
    /// shape (dimension, |omegas|). Indexed-memoized by the matrix name.
    pub fn eigenvalue_spectra(
        &mut self,
        matrix: EigenMatrix,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        let tf = self.transfer_function()?;
        let delay_dist = self.delay_dist_matrix()?;
        let params = self.physical()?;
        let omegas = self.omegas()?;
        let analytics = &self.analytics;
        let units = &self.units;
        self.results
            .get_or_compute_at(
                "eigenvalue_spectra",
                "eigenvalue_matrix",
                Probe::Matrix(matrix),
                units,
                || {
                    analytics
                        .eigenvalue_spectra(matrix, &tf, &delay_dist, &params, omegas.as_slice())
                        .map(ResultValue::ComplexMatrix)
                },
            )?
            .into_complex_matrix()
    }

    /// Right eigenvectors of the chosen analysis matrix along the frequency
    /// grid. Indexed-memoized by the matrix name.
    pub fn r_eigenvec_spectra(
        &mut self,
        matrix: EigenMatrix,
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        self.eigenvector_spectra(EigenSide::Right, matrix, "r_eigenvec_spectra", "r_eigenvec_matrix")
    }

    /// Left eigenvectors of the chosen analysis matrix along the frequency
    /// grid. Indexed-memoized by the matrix name.
    pub fn l_eigenvec_spectra(
        &mut self,
        matrix: EigenMatrix,
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        self.eigenvector_spectra(EigenSide::Left, matrix, "l_eigenvec_spectra", "l_eigenvec_matrix")
    }

    fn eigenvector_spectra(
        &mut self,
        side: EigenSide,
        matrix: EigenMatrix,
        result_key: &str,
        probe_key: &str,
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        let tf = self.transfer_function()?;
        let delay_dist = self.delay_dist_matrix()?;
        let params = self.physical()?;
        let omegas = self.omegas()?;
        let analytics = &self.analytics;
        let units = &self.units;
        self.results
            .get_or_compute_at(result_key, probe_key, Probe::Matrix(matrix), units, || {
                analytics
                    .eigenvector_spectra(
                        side,
                        matrix,
                        &tf,
                        &delay_dist,
                        &params,
                        omegas.as_slice(),
                    )
                    .map(ResultValue::ComplexMatrixSeq)
            })?
            .into_complex_matrix_seq()
    }

    /// Sorted names of all currently cached results.
    pub fn show(&self) -> Vec<String> {
        self.results.show()
    }
}

impl<A: AnalyticsEngine + Clone> Network<A> {
    /// New network with the given parameter overlays applied (overrides
    /// win). The receiver is left untouched, including its cached results;
    /// the new network starts with an empty cache and re-derived dependent
    /// parameters.
    pub fn change_parameters(
        &self,
        network_overrides: &ParameterStore,
        analysis_overrides: &ParameterStore,
    ) -> Result<Network<A>, MeanfieldError> {
        info!("building new network from parameter overrides");
        Network::new(
            self.network_params.merged(network_overrides),
            self.analysis_params.merged(analysis_overrides),
            self.analytics.clone(),
            self.units.clone(),
        )
    }
}
