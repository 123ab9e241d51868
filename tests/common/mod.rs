// Shared test fixtures: a two-population parameter set small enough to
// converge quickly, and an analytics engine wrapper that counts every
// underlying computation so the memoization contracts can be asserted.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::{Complex, DMatrix, DVector};

use meanfield::analytics::{AnalyticsEngine, EigenMatrix, EigenSide};
use meanfield::params::PhysicalParams;
use meanfield::{
    MeanFieldAnalytics, MeanfieldError, ParamValue, ParameterStore, Unit,
};

/// Raw network parameters for the `two_population` preset.
pub fn two_population_network_params() -> ParameterStore {
    let mut p = ParameterStore::new();
    p.insert_text("label", "two_population");
    p.insert(
        "populations",
        ParamValue::TextList(vec!["E".to_string(), "I".to_string()]),
    );
    p.insert_scalar("tau_m", 10.0, Unit::Millisecond);
    p.insert_scalar("tau_s", 0.5, Unit::Millisecond);
    p.insert_scalar("tau_r", 2.0, Unit::Millisecond);
    p.insert_scalar("w", 87.8, Unit::Picoampere);
    p.insert_scalar("C", 250.0, Unit::Picofarad);
    p.insert_scalar("V_th_abs", -50.0, Unit::Millivolt);
    p.insert_scalar("V_0_abs", -65.0, Unit::Millivolt);
    p.insert_scalar("d_e", 1.5, Unit::Millisecond);
    p.insert_scalar("d_i", 0.75, Unit::Millisecond);
    p.insert_scalar("g", 5.0, Unit::Dimensionless);
    p.insert_matrix(
        "K",
        DMatrix::from_row_slice(2, 2, &[200.0, 100.0, 200.0, 100.0]),
        Unit::Dimensionless,
    );
    p.insert_vector(
        "N",
        DVector::from_vec(vec![1000.0, 250.0]),
        Unit::Dimensionless,
    );
    p.insert_vector(
        "K_ext",
        DVector::from_vec(vec![1000.0, 900.0]),
        Unit::Dimensionless,
    );
    p.insert_scalar("nu_ext", 8.0, Unit::Hertz);
    p.insert_text("delay_dist", "gaussian");
    p
}

/// Analysis parameters spanning [0.1, 5.0) Hz in 1 Hz steps.
pub fn analysis_params() -> ParameterStore {
    let mut p = ParameterStore::new();
    p.insert_scalar("f_min", 0.1, Unit::Hertz);
    p.insert_scalar("f_max", 5.0, Unit::Hertz);
    p.insert_scalar("df", 1.0, Unit::Hertz);
    p
}

/// How often each underlying computation ran.
#[derive(Clone, Debug, Default)]
pub struct Counters {
    pub firing_rates: usize,
    pub mean_input: usize,
    pub std_input: usize,
    pub transfer_function: usize,
    pub delay_dist_matrix: usize,
    pub power_spectra: usize,
    pub sensitivity_measure: usize,
    pub eigenvalue_spectra: usize,
    pub eigenvector_spectra: usize,
}

/// Delegates to [`MeanFieldAnalytics`] while counting calls and recording
/// the transfer-function inputs handed to the sensitivity measure.
#[derive(Clone, Default)]
pub struct CountingAnalytics {
    inner: MeanFieldAnalytics,
    pub counters: Rc<RefCell<Counters>>,
    pub sensitivity_inputs: Rc<RefCell<Vec<DVector<Complex<f64>>>>>,
}

impl CountingAnalytics {
    pub fn new() -> Self {
        CountingAnalytics::default()
    }
}

impl AnalyticsEngine for CountingAnalytics {
    fn firing_rates(&self, params: &PhysicalParams) -> Result<DVector<f64>, MeanfieldError> {
        self.counters.borrow_mut().firing_rates += 1;
        self.inner.firing_rates(params)
    }

    fn mean_input(
        &self,
        rates: &DVector<f64>,
        params: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError> {
        self.counters.borrow_mut().mean_input += 1;
        self.inner.mean_input(rates, params)
    }

    fn std_input(
        &self,
        rates: &DVector<f64>,
        params: &PhysicalParams,
    ) -> Result<DVector<f64>, MeanfieldError> {
        self.counters.borrow_mut().std_input += 1;
        self.inner.std_input(rates, params)
    }

    fn transfer_function(
        &self,
        mean: &DVector<f64>,
        std: &DVector<f64>,
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        self.counters.borrow_mut().transfer_function += 1;
        self.inner.transfer_function(mean, std, params, omegas)
    }

    fn delay_dist_matrix(
        &self,
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        self.counters.borrow_mut().delay_dist_matrix += 1;
        self.inner.delay_dist_matrix(params, omegas)
    }

    fn power_spectra(
        &self,
        rates: &DVector<f64>,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<f64>, MeanfieldError> {
        self.counters.borrow_mut().power_spectra += 1;
        self.inner
            .power_spectra(rates, transfer_function, delay_dist, params, omegas)
    }

    fn sensitivity_measure(
        &self,
        transfer_function: &DVector<Complex<f64>>,
        delay_dist: &DMatrix<Complex<f64>>,
        params: &PhysicalParams,
        omega: f64,
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        self.counters.borrow_mut().sensitivity_measure += 1;
        self.sensitivity_inputs
            .borrow_mut()
            .push(transfer_function.clone());
        self.inner
            .sensitivity_measure(transfer_function, delay_dist, params, omega)
    }

    fn eigenvalue_spectra(
        &self,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        self.counters.borrow_mut().eigenvalue_spectra += 1;
        self.inner
            .eigenvalue_spectra(matrix, transfer_function, delay_dist, params, omegas)
    }

    fn eigenvector_spectra(
        &self,
        side: EigenSide,
        matrix: EigenMatrix,
        transfer_function: &DMatrix<Complex<f64>>,
        delay_dist: &[DMatrix<Complex<f64>>],
        params: &PhysicalParams,
        omegas: &[f64],
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        self.counters.borrow_mut().eigenvector_spectra += 1;
        self.inner
            .eigenvector_spectra(side, matrix, transfer_function, delay_dist, params, omegas)
    }
}

/// Initializes test logging once; repeated calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
