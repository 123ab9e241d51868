// params/derive.rs

// Derivation of dependent parameters from raw physical inputs. Pure
// functions: the same raw store always yields the same derived store. The
// weight, delay and delay-SD matrices are built per preset; preset-specific
// structural exceptions are declarative data rather than inline arithmetic.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use super::{ParameterStore, Quantity, Unit, UnitSystem};
use crate::MeanfieldError;

/// A single connection whose derived weight deviates from the uniform rule.
#[derive(Clone, Copy, Debug)]
pub struct StructuralOverride {
    /// Target population (row of `J`)
    pub row: usize,
    /// Source population (column of `J`)
    pub col: usize,
    /// Multiplicative factor applied after the matrix is assembled
    pub factor: f64,
}

/// A named parameter bundle describing a network model structure.
#[derive(Clone, Copy, Debug)]
pub struct Preset {
    /// Preset label, matched against the `label` parameter
    pub label: &'static str,
    /// Connection-specific weight exceptions
    pub structural_overrides: &'static [StructuralOverride],
}

/// Known presets. `microcircuit` reproduces the cortical microcircuit
/// structure, including the doubled L4E->L23E weight.
pub const PRESETS: &[Preset] = &[
    Preset {
        label: "microcircuit",
        structural_overrides: &[StructuralOverride {
            row: 0,
            col: 2,
            factor: 2.0,
        }],
    },
    Preset {
        label: "two_population",
        structural_overrides: &[],
    },
];

fn find_preset(label: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.label == label)
}

/// Derives all network parameters that are a pure function of the raw
/// inputs: per-synapse weight `j`, relative potentials, delay standard
/// deviations, the `J`/`Delay`/`Delay_sd` matrices and the system dimension.
///
/// An unrecognized (or absent) preset label yields an empty store, so that
/// callers can treat "no derivation available" as a soft condition. Missing
/// raw parameters for a recognized preset are a configuration error.
pub fn derive_network_params(
    raw: &ParameterStore,
    units: &UnitSystem,
) -> Result<ParameterStore, MeanfieldError> {
    let mut derived = ParameterStore::new();

    let label = match raw.get("label") {
        Some(super::ParamValue::Text(label)) => label.clone(),
        _ => {
            warn!("no preset label given, skipping parameter derivation");
            return Ok(derived);
        }
    };
    let preset = match find_preset(&label) {
        Some(preset) => preset,
        None => {
            warn!("unrecognized preset '{}', skipping parameter derivation", label);
            return Ok(derived);
        }
    };

    // raw inputs, normalized where arithmetic crosses units
    let tau_s = raw.scalar_in("tau_s", Unit::Second, units)?;
    let w = raw.scalar_in("w", Unit::Ampere, units)?;
    let c = raw.scalar_in("C", Unit::Farad, units)?;
    let v_th_abs = raw.scalar_in("V_th_abs", Unit::Millivolt, units)?;
    let v_0_abs = raw.scalar_in("V_0_abs", Unit::Millivolt, units)?;
    let d_e = raw.scalar_in("d_e", Unit::Millisecond, units)?;
    let d_i = raw.scalar_in("d_i", Unit::Millisecond, units)?;
    let g = raw.scalar_in("g", Unit::Dimensionless, units)?;
    let populations = raw.text_list("populations")?;
    let dimension = populations.len();

    // weight per synapse, converted from charge/capacitance to voltage
    let j_volt = tau_s * w / c;
    let j_mv = j_volt * 1e3;
    derived.insert_scalar("j", j_mv, Unit::Millivolt);

    // potentials relative to the reset potential
    derived.insert_scalar("V_0_rel", 0.0, Unit::Millivolt);
    derived.insert_scalar("V_th_rel", v_th_abs - v_0_abs, Unit::Millivolt);

    // delay standard deviations, half the mean delay per synapse class
    derived.insert_scalar("d_e_sd", d_e * 0.5, Unit::Millisecond);
    derived.insert_scalar("d_i_sd", d_i * 0.5, Unit::Millisecond);

    derived.insert_matrix(
        "J",
        weight_matrix(dimension, j_mv, g, preset.structural_overrides)?,
        Unit::Millivolt,
    );
    derived.insert_matrix(
        "Delay",
        alternating_matrix(dimension, d_e, d_i),
        Unit::Millisecond,
    );
    derived.insert_matrix(
        "Delay_sd",
        alternating_matrix(dimension, d_e * 0.5, d_i * 0.5),
        Unit::Millisecond,
    );

    derived.insert_scalar("dimension", dimension as f64, Unit::Dimensionless);

    debug!(
        "derived parameters for preset '{}' ({} populations)",
        label, dimension
    );
    Ok(derived)
}

/// Builds the weight matrix: uniform `j`, every other row negated and scaled
/// by the inhibitory gain `g`, transposed, then the preset's structural
/// overrides applied.
fn weight_matrix(
    dimension: usize,
    j: f64,
    g: f64,
    overrides: &[StructuralOverride],
) -> Result<DMatrix<f64>, MeanfieldError> {
    let mut m = DMatrix::from_element(dimension, dimension, j);
    for row in (1..dimension).step_by(2) {
        m.row_mut(row).scale_mut(-g);
    }
    let mut m = m.transpose();
    for o in overrides {
        if o.row >= dimension || o.col >= dimension {
            return Err(MeanfieldError::Configuration(format!(
                "structural override ({}, {}) outside a {}-population network",
                o.row, o.col, dimension
            )));
        }
        m[(o.row, o.col)] *= o.factor;
    }
    Ok(m)
}

/// Builds a delay-style matrix: excitatory value on even rows, inhibitory
/// value on odd rows, then transposed so columns carry the source class.
fn alternating_matrix(dimension: usize, excitatory: f64, inhibitory: f64) -> DMatrix<f64> {
    let mut m = DMatrix::from_element(dimension, dimension, excitatory);
    for row in (1..dimension).step_by(2) {
        m.row_mut(row).fill(inhibitory);
    }
    m.transpose()
}

/// Derives the analysis parameters: the angular frequency grid `omegas`
/// spanning `[2*pi*f_min, 2*pi*f_max)` in steps of `2*pi*df`.
pub fn derive_analysis_params(
    raw: &ParameterStore,
    units: &UnitSystem,
) -> Result<ParameterStore, MeanfieldError> {
    let f_min = raw.scalar_in("f_min", Unit::Hertz, units)?;
    let f_max = raw.scalar_in("f_max", Unit::Hertz, units)?;
    let df = raw.scalar_in("df", Unit::Hertz, units)?;

    let two_pi = 2.0 * std::f64::consts::PI;
    let omegas = arange(two_pi * f_min, two_pi * f_max, two_pi * df)?;

    let mut derived = ParameterStore::new();
    derived.insert_vector("omegas", omegas, Unit::Hertz);
    Ok(derived)
}

/// Half-open floating-point range `[start, stop)` with step `step`; length
/// is `ceil((stop - start) / step)` evaluated in floating point, entry `i`
/// is `start + i * step`.
fn arange(start: f64, stop: f64, step: f64) -> Result<DVector<f64>, MeanfieldError> {
    if step <= 0.0 || !step.is_finite() {
        return Err(MeanfieldError::Configuration(format!(
            "frequency step must be positive and finite, got {}",
            step
        )));
    }
    let span = (stop - start) / step;
    let len = if span > 0.0 { span.ceil() as usize } else { 0 };
    Ok(DVector::from_fn(len, |i, _| start + i as f64 * step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    fn microcircuit_raw() -> ParameterStore {
        let mut p = ParameterStore::new();
        p.insert_text("label", "microcircuit");
        p.insert(
            "populations",
            ParamValue::TextList(
                ["23E", "23I", "4E", "4I", "5E", "5I", "6E", "6I"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
        );
        p.insert_scalar("tau_s", 0.5, Unit::Millisecond);
        p.insert_scalar("w", 87.8, Unit::Picoampere);
        p.insert_scalar("C", 250.0, Unit::Picofarad);
        p.insert_scalar("V_th_abs", -50.0, Unit::Millivolt);
        p.insert_scalar("V_0_abs", -65.0, Unit::Millivolt);
        p.insert_scalar("d_e", 1.5, Unit::Millisecond);
        p.insert_scalar("d_i", 0.75, Unit::Millisecond);
        p.insert_scalar("g", 4.0, Unit::Dimensionless);
        p
    }

    #[test]
    fn microcircuit_weight_matrix_structure() {
        let units = UnitSystem::new();
        let derived = derive_network_params(&microcircuit_raw(), &units).unwrap();

        let j = derived
            .scalar_in("j", Unit::Millivolt, &units)
            .unwrap();
        let jm = derived.matrix_in("J", Unit::Millivolt, &units).unwrap();
        assert_eq!(jm.shape(), (8, 8));
        // columns alternate excitatory/inhibitory after the transpose
        assert_eq!(jm[(3, 0)], j);
        assert_eq!(jm[(3, 1)], -4.0 * j);
        // the single structural override: doubled L4E->L23E weight
        assert_eq!(jm[(0, 2)], 2.0 * j);
        assert_eq!(jm[(1, 2)], j);
    }

    #[test]
    fn unrecognized_preset_is_a_no_op() {
        let units = UnitSystem::new();
        let mut raw = microcircuit_raw();
        raw.insert_text("label", "ring_attractor");
        let derived = derive_network_params(&raw, &units).unwrap();
        assert!(derived.names().is_empty());
    }

    #[test]
    fn missing_raw_parameter_fails() {
        let units = UnitSystem::new();
        let mut raw = microcircuit_raw();
        raw = {
            let mut clean = ParameterStore::new();
            for name in raw.names() {
                if name != "g" {
                    clean.insert(name, raw.get(name).unwrap().clone());
                }
            }
            clean
        };
        assert!(matches!(
            derive_network_params(&raw, &units),
            Err(MeanfieldError::Configuration(_))
        ));
    }

    #[test]
    fn arange_excludes_stop() {
        let v = arange(0.0, 1.0, 0.25).unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(v[3], 0.75);
    }
}
