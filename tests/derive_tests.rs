// Dependent-parameter derivation: purity, preset handling and the angular
// frequency grid boundaries.

mod common;

use approx::assert_relative_eq;
use rstest::rstest;

use common::{analysis_params, two_population_network_params};
use meanfield::params::derive::{derive_analysis_params, derive_network_params};
use meanfield::{MeanfieldError, ParameterStore, Unit, UnitSystem};

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

#[test]
fn derivation_is_deterministic() {
    let units = UnitSystem::new();
    let raw = two_population_network_params();

    let first = derive_network_params(&raw, &units).unwrap();
    let second = derive_network_params(&raw, &units).unwrap();

    // bit-identical, not just approximately equal
    assert_eq!(first, second);
    assert_eq!(
        first.scalar_in("dimension", Unit::Dimensionless, &units).unwrap(),
        2.0
    );
}

#[test]
fn derived_weight_and_delay_matrices() {
    let units = UnitSystem::new();
    let derived = derive_network_params(&two_population_network_params(), &units).unwrap();

    let j = derived.scalar_in("j", Unit::Millivolt, &units).unwrap();
    // tau_s * w / C = 0.5 ms * 87.8 pA / 250 pF
    assert_relative_eq!(j, 0.1756, epsilon = 1e-12);

    let jm = derived.matrix_in("J", Unit::Millivolt, &units).unwrap();
    assert_eq!(jm.shape(), (2, 2));
    // excitatory column uniform, inhibitory column scaled by -g
    assert_relative_eq!(jm[(0, 0)], j, epsilon = 1e-12);
    assert_relative_eq!(jm[(0, 1)], -5.0 * j, epsilon = 1e-12);
    assert_relative_eq!(jm[(1, 0)], j, epsilon = 1e-12);
    assert_relative_eq!(jm[(1, 1)], -5.0 * j, epsilon = 1e-12);

    let delay = derived.matrix_in("Delay", Unit::Millisecond, &units).unwrap();
    let delay_sd = derived
        .matrix_in("Delay_sd", Unit::Millisecond, &units)
        .unwrap();
    assert_eq!(delay[(0, 0)], 1.5);
    assert_eq!(delay[(0, 1)], 0.75);
    // delay spread is half the mean delay, per class
    assert_eq!(delay_sd[(1, 0)], 0.75);
    assert_eq!(delay_sd[(1, 1)], 0.375);

    assert_eq!(
        derived.scalar_in("V_th_rel", Unit::Millivolt, &units).unwrap(),
        15.0
    );
    assert_eq!(
        derived.scalar_in("V_0_rel", Unit::Millivolt, &units).unwrap(),
        0.0
    );
}

#[test]
fn missing_raw_parameter_is_a_configuration_error() {
    let units = UnitSystem::new();
    let mut raw = ParameterStore::new();
    raw.insert_text("label", "two_population");
    // everything else missing
    let err = derive_network_params(&raw, &units).unwrap_err();
    assert!(matches!(err, MeanfieldError::Configuration(_)));
}

#[test]
fn unrecognized_preset_derives_nothing() {
    let units = UnitSystem::new();
    let mut raw = two_population_network_params();
    raw.insert_text("label", "wilson_cowan");
    let derived = derive_network_params(&raw, &units).unwrap();
    assert!(derived.names().is_empty());
}

#[rstest]
#[case(0.1, 2.0, 1.0, 2)]
#[case(0.1, 5.0, 1.0, 5)]
#[case(0.1, 150.0, 1.0, 150)]
#[case(1.0, 1.0, 1.0, 0)]
fn omega_grid_has_half_open_range_semantics(
    #[case] f_min: f64,
    #[case] f_max: f64,
    #[case] df: f64,
    #[case] expected_len: usize,
) {
    let units = UnitSystem::new();
    let mut raw = ParameterStore::new();
    raw.insert_scalar("f_min", f_min, Unit::Hertz);
    raw.insert_scalar("f_max", f_max, Unit::Hertz);
    raw.insert_scalar("df", df, Unit::Hertz);

    let derived = derive_analysis_params(&raw, &units).unwrap();
    let omegas = derived.vector_in("omegas", Unit::Hertz, &units).unwrap();

    assert_eq!(omegas.len(), expected_len);
    for (i, omega) in omegas.iter().enumerate() {
        // strictly increasing, evenly spaced, below the stop bound
        assert_relative_eq!(
            *omega,
            TWO_PI * f_min + i as f64 * TWO_PI * df,
            epsilon = 1e-9
        );
        assert!(*omega < TWO_PI * f_max);
    }
}

#[test]
fn omega_grid_excludes_f_max() {
    let units = UnitSystem::new();
    let derived = derive_analysis_params(&analysis_params(), &units).unwrap();
    let omegas = derived.vector_in("omegas", Unit::Hertz, &units).unwrap();
    assert!(omegas.iter().all(|w| (w - TWO_PI * 5.0).abs() > 1e-9));
}
