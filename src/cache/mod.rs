//! Result memoization for the network facade.
//!
//! Two policies, selected per named operation at the call site:
//!
//! - **scalar**: one cached value per result name. The first call computes
//!   and stores, every later call returns the stored value. Only building a
//!   fresh network (the copy-on-write override path) invalidates it.
//! - **indexed**: per result name, an ordered probe list (frequency or
//!   matrix name) kept in one-to-one positional correspondence with the
//!   result list. Lookup is exact match; on a miss the computation runs
//!   first and probe + result are appended together, so a failed computation
//!   leaves both lists untouched and they can never desynchronize. The lists
//!   are append-only and never reordered.
//!
//! Frequency probes are compared by magnitude after explicit conversion to
//! the stored probe's unit. The comparison is exact floating-point equality;
//! near-duplicate frequencies within rounding noise are distinct probes.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::analytics::EigenMatrix;
use crate::params::{Unit, UnitSystem};
use crate::MeanfieldError;

/// A cached analysis result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    /// Per-population real values (rates, means, deviations)
    RealVector(DVector<f64>),
    /// Real matrix, e.g. power spectra (dimension x |omegas|)
    RealMatrix(DMatrix<f64>),
    /// Per-population complex values at one frequency
    ComplexVector(DVector<Complex<f64>>),
    /// Complex matrix (transfer functions over the grid, single delay-dist
    /// slice, sensitivity measure, eigenvalue spectra)
    ComplexMatrix(DMatrix<Complex<f64>>),
    /// One complex matrix per grid frequency
    ComplexMatrixSeq(Vec<DMatrix<Complex<f64>>>),
}

impl ResultValue {
    /// Unwraps a real vector result.
    pub fn into_real_vector(self) -> Result<DVector<f64>, MeanfieldError> {
        match self {
            ResultValue::RealVector(v) => Ok(v),
            other => Err(type_mismatch("real vector", &other)),
        }
    }

    /// Unwraps a real matrix result.
    pub fn into_real_matrix(self) -> Result<DMatrix<f64>, MeanfieldError> {
        match self {
            ResultValue::RealMatrix(m) => Ok(m),
            other => Err(type_mismatch("real matrix", &other)),
        }
    }

    /// Unwraps a complex vector result.
    pub fn into_complex_vector(self) -> Result<DVector<Complex<f64>>, MeanfieldError> {
        match self {
            ResultValue::ComplexVector(v) => Ok(v),
            other => Err(type_mismatch("complex vector", &other)),
        }
    }

    /// Unwraps a complex matrix result.
    pub fn into_complex_matrix(self) -> Result<DMatrix<Complex<f64>>, MeanfieldError> {
        match self {
            ResultValue::ComplexMatrix(m) => Ok(m),
            other => Err(type_mismatch("complex matrix", &other)),
        }
    }

    /// Unwraps a complex matrix sequence result.
    pub fn into_complex_matrix_seq(
        self,
    ) -> Result<Vec<DMatrix<Complex<f64>>>, MeanfieldError> {
        match self {
            ResultValue::ComplexMatrixSeq(s) => Ok(s),
            other => Err(type_mismatch("complex matrix sequence", &other)),
        }
    }
}

fn type_mismatch(expected: &str, got: &ResultValue) -> MeanfieldError {
    let got = match got {
        ResultValue::RealVector(_) => "real vector",
        ResultValue::RealMatrix(_) => "real matrix",
        ResultValue::ComplexVector(_) => "complex vector",
        ResultValue::ComplexMatrix(_) => "complex matrix",
        ResultValue::ComplexMatrixSeq(_) => "complex matrix sequence",
    };
    MeanfieldError::Computation(format!(
        "cached result has unexpected type: expected {}, got {}",
        expected, got
    ))
}

/// Input value an indexed result is keyed by.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Probe {
    /// A dimensional frequency
    Frequency {
        /// Magnitude in `unit`
        magnitude: f64,
        /// Unit the magnitude is expressed in
        unit: Unit,
    },
    /// A named analysis matrix
    Matrix(EigenMatrix),
}

impl Probe {
    /// Frequency probe in the given unit.
    pub fn frequency(magnitude: f64, unit: Unit) -> Self {
        Probe::Frequency { magnitude, unit }
    }

    /// Exact-match comparison against a stored probe. Frequencies are
    /// converted to the stored unit before comparison; incompatible units
    /// never match.
    fn matches(&self, stored: &Probe, units: &UnitSystem) -> bool {
        match (self, stored) {
            (
                Probe::Frequency { magnitude, unit },
                Probe::Frequency {
                    magnitude: stored_mag,
                    unit: stored_unit,
                },
            ) => match units.convert(*magnitude, *unit, *stored_unit) {
                Ok(converted) => converted == *stored_mag,
                Err(_) => false,
            },
            (Probe::Matrix(a), Probe::Matrix(b)) => a == b,
            _ => false,
        }
    }
}

/// Probe list and result list for one indexed result, in positional
/// correspondence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct IndexedSeries {
    probe_key: String,
    probes: Vec<Probe>,
    results: Vec<ResultValue>,
}

/// Serializable snapshot of a cache, used by the storage collaborator.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    scalars: BTreeMap<String, ResultValue>,
    series: BTreeMap<String, IndexedSeries>,
}

/// Memoized results owned by a single network instance. Not thread-safe;
/// confine each instance to one thread or wrap accessor sequences in an
/// external lock.
#[derive(Clone, Debug, Default)]
pub struct ResultCache {
    scalars: BTreeMap<String, ResultValue>,
    series: BTreeMap<String, IndexedSeries>,
}

impl ResultCache {
    /// Empty cache.
    pub fn new() -> Self {
        ResultCache::default()
    }

    /// Scalar memoization: returns the stored value for `key`, or runs
    /// `compute`, stores its value and returns it. A failing computation
    /// stores nothing.
    pub fn get_or_compute<F>(
        &mut self,
        key: &str,
        compute: F,
    ) -> Result<ResultValue, MeanfieldError>
    where
        F: FnOnce() -> Result<ResultValue, MeanfieldError>,
    {
        if let Some(value) = self.scalars.get(key) {
            debug!("cache hit for '{}'", key);
            return Ok(value.clone());
        }
        debug!("cache miss for '{}', computing", key);
        let value = compute()?;
        self.scalars.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Indexed memoization: looks `probe` up in the probe list registered
    /// under `probe_key`; on an exact match the stored result at the same
    /// index is returned. Otherwise `compute` runs and, only on success,
    /// probe and result are appended together.
    pub fn get_or_compute_at<F>(
        &mut self,
        key: &str,
        probe_key: &str,
        probe: Probe,
        units: &UnitSystem,
        compute: F,
    ) -> Result<ResultValue, MeanfieldError>
    where
        F: FnOnce() -> Result<ResultValue, MeanfieldError>,
    {
        if let Some(series) = self.series.get(key) {
            if let Some(index) = series.probes.iter().position(|p| probe.matches(p, units)) {
                debug!("cache hit for '{}' at probe index {}", key, index);
                return Ok(series.results[index].clone());
            }
        }
        debug!("cache miss for '{}' at {:?}, computing", key, probe);
        // compute before touching either list: on failure neither advances
        let value = compute()?;
        let series = self
            .series
            .entry(key.to_string())
            .or_insert_with(|| IndexedSeries {
                probe_key: probe_key.to_string(),
                probes: Vec::new(),
                results: Vec::new(),
            });
        series.probes.push(probe);
        series.results.push(value.clone());
        Ok(value)
    }

    /// Probe list of an indexed result, by result name.
    pub fn probes(&self, key: &str) -> Option<&[Probe]> {
        self.series.get(key).map(|s| s.probes.as_slice())
    }

    /// Probe and result list lengths of an indexed result. Always equal by
    /// construction; exposed for instrumentation.
    pub fn series_lens(&self, key: &str) -> Option<(usize, usize)> {
        self.series
            .get(key)
            .map(|s| (s.probes.len(), s.results.len()))
    }

    /// Sorted list of result names with at least one cached value.
    pub fn show(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scalars
            .keys()
            .chain(self.series.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Snapshot for persistence.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            scalars: self.scalars.clone(),
            series: self.series.clone(),
        }
    }

    /// Rebuilds a cache from a persisted snapshot, re-validating the
    /// positional correspondence of every indexed series.
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Result<Self, MeanfieldError> {
        for (key, series) in &snapshot.series {
            if series.probes.len() != series.results.len() {
                return Err(MeanfieldError::Storage(format!(
                    "indexed result '{}' ({}): {} probes but {} results",
                    key,
                    series.probe_key,
                    series.probes.len(),
                    series.results.len()
                )));
            }
        }
        Ok(ResultCache {
            scalars: snapshot.scalars,
            series: snapshot.series,
        })
    }
}
