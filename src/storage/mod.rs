// storage/mod.rs

// Persistence collaborators: YAML parameter files in `{name: {val, unit}}`
// form, and result-store snapshots addressed by a content hash over a
// selectable subset of the network parameters. Snapshots seed a fresh
// network's cache so earlier frequency sweeps are not recomputed.

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use log::info;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::analytics::AnalyticsEngine;
use crate::cache::{CacheSnapshot, ResultCache};
use crate::network::Network;
use crate::params::{ParamValue, ParameterStore, Quantity, Unit, UnitSystem};
use crate::MeanfieldError;

/// On-disk form of a results snapshot.
#[derive(Serialize, Deserialize)]
struct StoredResults {
    parameters_hash: String,
    results: CacheSnapshot,
}

/// Loads a parameter file: a YAML mapping from parameter name to either a
/// `{val, unit}` pair, a bare number/list (dimensionless), a string, or a
/// list of strings.
pub fn load_params(path: &str, units: &UnitSystem) -> Result<ParameterStore, MeanfieldError> {
    let file = File::open(path)
        .map_err(|e| MeanfieldError::Storage(format!("cannot open '{}': {}", path, e)))?;
    let root: Value = serde_yaml::from_reader(file)
        .map_err(|e| MeanfieldError::Storage(format!("cannot parse '{}': {}", path, e)))?;
    let mapping = root.as_mapping().ok_or_else(|| {
        MeanfieldError::Storage(format!("'{}' is not a mapping of parameters", path))
    })?;

    let mut store = ParameterStore::new();
    for (key, value) in mapping {
        let name = key.as_str().ok_or_else(|| {
            MeanfieldError::Storage(format!("non-string parameter name in '{}'", path))
        })?;
        store.insert(name, parse_param(name, value, units)?);
    }
    info!("loaded {} parameters from '{}'", store.names().len(), path);
    Ok(store)
}

fn parse_param(
    name: &str,
    value: &Value,
    units: &UnitSystem,
) -> Result<ParamValue, MeanfieldError> {
    match value {
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Number(_) => Ok(ParamValue::Quantity(Quantity::scalar(
            number(name, value)?,
            Unit::Dimensionless,
        ))),
        Value::Sequence(seq) if seq.iter().all(Value::is_string) => Ok(ParamValue::TextList(
            seq.iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect(),
        )),
        Value::Sequence(_) => Ok(ParamValue::Quantity(magnitude_param(
            name,
            value,
            Unit::Dimensionless,
        )?)),
        Value::Mapping(map) => {
            let val = map.get("val").ok_or_else(|| {
                MeanfieldError::Storage(format!("parameter '{}' has no 'val' entry", name))
            })?;
            let unit = match map.get("unit") {
                Some(Value::String(symbol)) => units.parse(symbol)?,
                Some(_) => {
                    return Err(MeanfieldError::Storage(format!(
                        "parameter '{}' has a non-string unit",
                        name
                    )))
                }
                None => Unit::Dimensionless,
            };
            Ok(ParamValue::Quantity(magnitude_param(name, val, unit)?))
        }
        _ => Err(MeanfieldError::Storage(format!(
            "parameter '{}' has an unsupported value type",
            name
        ))),
    }
}

fn magnitude_param(name: &str, value: &Value, unit: Unit) -> Result<Quantity, MeanfieldError> {
    match value {
        Value::Number(_) => Ok(Quantity::scalar(number(name, value)?, unit)),
        Value::Sequence(rows) if rows.iter().all(Value::is_sequence) => {
            let nrows = rows.len();
            let ncols = rows
                .first()
                .and_then(|r| r.as_sequence())
                .map(|r| r.len())
                .unwrap_or(0);
            let mut data = Vec::with_capacity(nrows * ncols);
            for row in rows {
                let row = row.as_sequence().ok_or_else(|| {
                    MeanfieldError::Storage(format!(
                        "parameter '{}' mixes rows and scalars",
                        name
                    ))
                })?;
                if row.len() != ncols {
                    return Err(MeanfieldError::Storage(format!(
                        "parameter '{}' is not a rectangular matrix",
                        name
                    )));
                }
                for entry in row {
                    data.push(number(name, entry)?);
                }
            }
            Ok(Quantity::matrix(
                DMatrix::from_row_slice(nrows, ncols, &data),
                unit,
            ))
        }
        Value::Sequence(entries) => {
            let mut data = Vec::with_capacity(entries.len());
            for entry in entries {
                data.push(number(name, entry)?);
            }
            Ok(Quantity::vector(DVector::from_vec(data), unit))
        }
        _ => Err(MeanfieldError::Storage(format!(
            "parameter '{}': 'val' must be a number or a (nested) list",
            name
        ))),
    }
}

fn number(name: &str, value: &Value) -> Result<f64, MeanfieldError> {
    value.as_f64().ok_or_else(|| {
        MeanfieldError::Storage(format!("parameter '{}' contains a non-numeric entry", name))
    })
}

/// Content hash over the selected network parameters (all of them when
/// `keys` is `None`). Parameters are visited in name order, so the hash is
/// independent of insertion order.
pub fn param_hash(store: &ParameterStore, keys: Option<&[&str]>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, value) in store.iter() {
        if let Some(keys) = keys {
            if !keys.contains(&name.as_str()) {
                continue;
            }
        }
        name.hash(&mut hasher);
        // debug rendering is stable for a given toolchain, which is all the
        // snapshot lookup needs
        format!("{:?}", value).hash(&mut hasher);
    }
    hasher.finish()
}

fn results_path(dir: &Path, hash: u64) -> PathBuf {
    dir.join(format!("results_{:016x}.yaml", hash))
}

/// Saves the network's cached results under the parameter hash. `keys`
/// selects which network parameters feed the hash (all of them when `None`),
/// so snapshots can be shared across parameter variations that do not affect
/// the saved results. Returns the snapshot path.
pub fn save_results<A: AnalyticsEngine>(
    dir: &Path,
    network: &Network<A>,
    keys: Option<&[&str]>,
) -> Result<PathBuf, MeanfieldError> {
    let hash = param_hash(network.network_params(), keys);
    std::fs::create_dir_all(dir)
        .map_err(|e| MeanfieldError::Storage(format!("cannot create '{}': {}", dir.display(), e)))?;
    let path = results_path(dir, hash);
    let file = File::create(&path)
        .map_err(|e| MeanfieldError::Storage(format!("cannot create '{}': {}", path.display(), e)))?;
    let stored = StoredResults {
        parameters_hash: format!("{:016x}", hash),
        results: network.cache().snapshot(),
    };
    serde_yaml::to_writer(file, &stored)
        .map_err(|e| MeanfieldError::Storage(format!("cannot write '{}': {}", path.display(), e)))?;
    info!("saved results to {}", path.display());
    Ok(path)
}

/// Restores a previously saved snapshot matching the network's current
/// parameter hash over the same key selection used when saving. Returns
/// `false` when no snapshot exists.
pub fn restore_results<A: AnalyticsEngine>(
    dir: &Path,
    network: &mut Network<A>,
    keys: Option<&[&str]>,
) -> Result<bool, MeanfieldError> {
    let hash = param_hash(network.network_params(), keys);
    let path = results_path(dir, hash);
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(&path)
        .map_err(|e| MeanfieldError::Storage(format!("cannot open '{}': {}", path.display(), e)))?;
    let stored: StoredResults = serde_yaml::from_reader(file)
        .map_err(|e| MeanfieldError::Storage(format!("cannot parse '{}': {}", path.display(), e)))?;
    if stored.parameters_hash != format!("{:016x}", hash) {
        return Err(MeanfieldError::Storage(format!(
            "snapshot '{}' carries a foreign parameter hash",
            path.display()
        )));
    }
    network.set_cache(ResultCache::from_snapshot(stored.results)?);
    info!("restored results from {}", path.display());
    Ok(true)
}
