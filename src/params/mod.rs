//! Parameter handling for mean-field analyses.
//!
//! A [`ParameterStore`] maps parameter names to dimensional quantities (or
//! plain text values such as the preset label). Stores are never mutated
//! through the analysis path; overlays produce new stores. The
//! [`PhysicalParams`] extraction is the numeric boundary handed to the
//! analytics engine: everything converted to SI base units, missing or
//! mistyped entries reported as configuration errors.

pub mod derive;
pub mod units;

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::MeanfieldError;
pub use units::{Dimension, Magnitude, Quantity, Unit, UnitSystem};

/// A single named parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Dimensional quantity (scalar, vector or matrix)
    Quantity(Quantity),
    /// Text value, e.g. the preset label or the delay distribution name
    Text(String),
    /// List of text values, e.g. population names
    TextList(Vec<String>),
}

/// Name -> value mapping with overlay-update semantics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterStore {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterStore {
    /// Empty store.
    pub fn new() -> Self {
        ParameterStore {
            values: BTreeMap::new(),
        }
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Convenience: insert a scalar quantity.
    pub fn insert_scalar(&mut self, name: &str, value: f64, unit: Unit) {
        self.insert(name, ParamValue::Quantity(Quantity::scalar(value, unit)));
    }

    /// Convenience: insert a vector quantity.
    pub fn insert_vector(&mut self, name: &str, value: DVector<f64>, unit: Unit) {
        self.insert(name, ParamValue::Quantity(Quantity::vector(value, unit)));
    }

    /// Convenience: insert a matrix quantity.
    pub fn insert_matrix(&mut self, name: &str, value: DMatrix<f64>, unit: Unit) {
        self.insert(name, ParamValue::Quantity(Quantity::matrix(value, unit)));
    }

    /// Convenience: insert a text value.
    pub fn insert_text(&mut self, name: &str, value: &str) {
        self.insert(name, ParamValue::Text(value.to_string()));
    }

    /// Looks up a raw value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// True if the parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Quantity under `name`, or a configuration error naming the parameter.
    pub fn quantity(&self, name: &str) -> Result<&Quantity, MeanfieldError> {
        match self.values.get(name) {
            Some(ParamValue::Quantity(q)) => Ok(q),
            Some(_) => Err(MeanfieldError::Configuration(format!(
                "parameter '{}' is not a quantity",
                name
            ))),
            None => Err(MeanfieldError::Configuration(format!(
                "missing required parameter '{}'",
                name
            ))),
        }
    }

    /// Scalar magnitude of `name`, converted to `unit`.
    pub fn scalar_in(
        &self,
        name: &str,
        unit: Unit,
        units: &UnitSystem,
    ) -> Result<f64, MeanfieldError> {
        self.quantity(name)?.to(units, unit)?.as_scalar()
    }

    /// Vector magnitude of `name`, converted to `unit`.
    pub fn vector_in(
        &self,
        name: &str,
        unit: Unit,
        units: &UnitSystem,
    ) -> Result<DVector<f64>, MeanfieldError> {
        Ok(self.quantity(name)?.to(units, unit)?.as_vector()?.clone())
    }

    /// Matrix magnitude of `name`, converted to `unit`.
    pub fn matrix_in(
        &self,
        name: &str,
        unit: Unit,
        units: &UnitSystem,
    ) -> Result<DMatrix<f64>, MeanfieldError> {
        Ok(self.quantity(name)?.to(units, unit)?.as_matrix()?.clone())
    }

    /// Text value of `name`.
    pub fn text(&self, name: &str) -> Result<&str, MeanfieldError> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Ok(s),
            Some(_) => Err(MeanfieldError::Configuration(format!(
                "parameter '{}' is not a text value",
                name
            ))),
            None => Err(MeanfieldError::Configuration(format!(
                "missing required parameter '{}'",
                name
            ))),
        }
    }

    /// Text list value of `name`.
    pub fn text_list(&self, name: &str) -> Result<&[String], MeanfieldError> {
        match self.values.get(name) {
            Some(ParamValue::TextList(l)) => Ok(l),
            Some(_) => Err(MeanfieldError::Configuration(format!(
                "parameter '{}' is not a list of names",
                name
            ))),
            None => Err(MeanfieldError::Configuration(format!(
                "missing required parameter '{}'",
                name
            ))),
        }
    }

    /// New store containing this store's entries overlaid with `overrides`
    /// (overrides win). Neither input is mutated.
    pub fn merged(&self, overrides: &ParameterStore) -> ParameterStore {
        let mut values = self.values.clone();
        for (name, value) in &overrides.values {
            values.insert(name.clone(), value.clone());
        }
        ParameterStore { values }
    }

    /// Sorted parameter names.
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(|k| k.as_str()).collect()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }
}

/// Shape of the synaptic delay distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayDistKind {
    /// Sharp delays, kernel identically one
    None,
    /// Gaussian spread around the mean delay
    Gaussian,
}

impl DelayDistKind {
    /// Parses the parameter-file spelling of the distribution.
    pub fn parse(name: &str) -> Result<Self, MeanfieldError> {
        match name {
            "none" => Ok(DelayDistKind::None),
            "gaussian" => Ok(DelayDistKind::Gaussian),
            other => Err(MeanfieldError::Configuration(format!(
                "unknown delay distribution '{}'",
                other
            ))),
        }
    }
}

/// SI-normalized numeric view of the network parameters, as consumed by the
/// analytics engine. Built fresh from the store for every computation; the
/// store stays the single source of truth.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalParams {
    /// Number of populations
    pub dimension: usize,
    /// Membrane time constant [s]
    pub tau_m: f64,
    /// Synaptic time constant [s]
    pub tau_s: f64,
    /// Refractory time [s]
    pub tau_r: f64,
    /// Threshold relative to reset [V]
    pub v_th_rel: f64,
    /// Reset potential, relative [V]
    pub v_0_rel: f64,
    /// In-degree matrix
    pub k: DMatrix<f64>,
    /// Weight matrix [V]
    pub j: DMatrix<f64>,
    /// Weight of a single external synapse [V]
    pub j_ext: f64,
    /// External drive rate [Hz]
    pub nu_ext: f64,
    /// External in-degrees per population
    pub k_ext: DVector<f64>,
    /// Population sizes
    pub n: DVector<f64>,
    /// Mean delay matrix [s]
    pub delay: DMatrix<f64>,
    /// Delay standard deviation matrix [s]
    pub delay_sd: DMatrix<f64>,
    /// Delay distribution shape
    pub delay_dist: DelayDistKind,
}

impl PhysicalParams {
    /// Extracts and SI-normalizes everything the analytics engine needs.
    pub fn from_store(
        store: &ParameterStore,
        units: &UnitSystem,
    ) -> Result<Self, MeanfieldError> {
        let dimension = store.scalar_in("dimension", Unit::Dimensionless, units)?;
        if dimension < 1.0 || dimension.fract() != 0.0 {
            return Err(MeanfieldError::Configuration(format!(
                "network dimension must be a positive integer, got {}",
                dimension
            )));
        }
        let dimension = dimension as usize;
        let params = PhysicalParams {
            dimension,
            tau_m: store.scalar_in("tau_m", Unit::Second, units)?,
            tau_s: store.scalar_in("tau_s", Unit::Second, units)?,
            tau_r: store.scalar_in("tau_r", Unit::Second, units)?,
            v_th_rel: store.scalar_in("V_th_rel", Unit::Volt, units)?,
            v_0_rel: store.scalar_in("V_0_rel", Unit::Volt, units)?,
            k: store.matrix_in("K", Unit::Dimensionless, units)?,
            j: store.matrix_in("J", Unit::Volt, units)?,
            j_ext: store.scalar_in("j", Unit::Volt, units)?,
            nu_ext: store.scalar_in("nu_ext", Unit::Hertz, units)?,
            k_ext: store.vector_in("K_ext", Unit::Dimensionless, units)?,
            n: store.vector_in("N", Unit::Dimensionless, units)?,
            delay: store.matrix_in("Delay", Unit::Second, units)?,
            delay_sd: store.matrix_in("Delay_sd", Unit::Second, units)?,
            delay_dist: DelayDistKind::parse(store.text("delay_dist")?)?,
        };
        params.check_shapes()?;
        Ok(params)
    }

    fn check_shapes(&self) -> Result<(), MeanfieldError> {
        let d = self.dimension;
        for (name, shape) in [
            ("K", self.k.shape()),
            ("J", self.j.shape()),
            ("Delay", self.delay.shape()),
            ("Delay_sd", self.delay_sd.shape()),
        ] {
            if shape != (d, d) {
                return Err(MeanfieldError::Configuration(format!(
                    "matrix '{}' has shape {:?}, expected ({}, {})",
                    name, shape, d, d
                )));
            }
        }
        for (name, len) in [("K_ext", self.k_ext.len()), ("N", self.n.len())] {
            if len != d {
                return Err(MeanfieldError::Configuration(format!(
                    "vector '{}' has length {}, expected {}",
                    name, len, d
                )));
            }
        }
        Ok(())
    }
}
