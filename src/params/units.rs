// params/units.rs

// Dimensional quantities for network and analysis parameters. Every value in
// a ParameterStore carries a unit tag; combining values across incompatible
// dimensions is an error and conversions are explicit. The unit table lives
// in an explicitly constructed UnitSystem value handed to whoever needs it,
// never in process-global state.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::MeanfieldError;

/// Physical dimension of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Seconds and friends
    Time,
    /// Inverse time (rates, frequencies)
    Frequency,
    /// Membrane potentials
    Voltage,
    /// Synaptic currents
    Current,
    /// Membrane capacitance
    Capacitance,
    /// Pure numbers (counts, gains)
    Dimensionless,
}

/// Unit tag carried by every quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// s
    Second,
    /// ms
    Millisecond,
    /// Hz
    Hertz,
    /// V
    Volt,
    /// mV
    Millivolt,
    /// A
    Ampere,
    /// pA
    Picoampere,
    /// F
    Farad,
    /// pF
    Picofarad,
    /// no unit
    Dimensionless,
}

impl Unit {
    /// Dimension this unit measures.
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Second | Unit::Millisecond => Dimension::Time,
            Unit::Hertz => Dimension::Frequency,
            Unit::Volt | Unit::Millivolt => Dimension::Voltage,
            Unit::Ampere | Unit::Picoampere => Dimension::Current,
            Unit::Farad | Unit::Picofarad => Dimension::Capacitance,
            Unit::Dimensionless => Dimension::Dimensionless,
        }
    }

    /// Factor converting a magnitude in this unit to SI base units.
    pub fn si_factor(self) -> f64 {
        match self {
            Unit::Second | Unit::Hertz | Unit::Volt | Unit::Ampere | Unit::Farad => 1.0,
            Unit::Millisecond | Unit::Millivolt => 1e-3,
            Unit::Picoampere | Unit::Picofarad => 1e-12,
            Unit::Dimensionless => 1.0,
        }
    }

    /// Conventional symbol, as written in parameter files.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Second => "s",
            Unit::Millisecond => "ms",
            Unit::Hertz => "Hz",
            Unit::Volt => "V",
            Unit::Millivolt => "mV",
            Unit::Ampere => "A",
            Unit::Picoampere => "pA",
            Unit::Farad => "F",
            Unit::Picofarad => "pF",
            Unit::Dimensionless => "",
        }
    }
}

/// Explicit unit table: symbol lookup and checked conversion.
#[derive(Clone, Debug, Default)]
pub struct UnitSystem;

impl UnitSystem {
    /// Builds the standard unit table.
    pub fn new() -> Self {
        UnitSystem
    }

    /// Resolves a unit symbol from a parameter file.
    pub fn parse(&self, symbol: &str) -> Result<Unit, MeanfieldError> {
        let unit = match symbol {
            "s" => Unit::Second,
            "ms" => Unit::Millisecond,
            "Hz" | "hertz" => Unit::Hertz,
            "V" => Unit::Volt,
            "mV" => Unit::Millivolt,
            "A" => Unit::Ampere,
            "pA" => Unit::Picoampere,
            "F" => Unit::Farad,
            "pF" => Unit::Picofarad,
            "" | "1" | "dimensionless" => Unit::Dimensionless,
            other => {
                return Err(MeanfieldError::Configuration(format!(
                    "unknown unit symbol '{}'",
                    other
                )))
            }
        };
        Ok(unit)
    }

    /// Converts a magnitude between units of the same dimension.
    pub fn convert(&self, magnitude: f64, from: Unit, to: Unit) -> Result<f64, MeanfieldError> {
        if from.dimension() != to.dimension() {
            return Err(MeanfieldError::Configuration(format!(
                "cannot convert '{}' to '{}': incompatible dimensions",
                from.symbol(),
                to.symbol()
            )));
        }
        Ok(magnitude * from.si_factor() / to.si_factor())
    }
}

/// Magnitude of a quantity: scalar, per-population vector or connectivity
/// matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Magnitude {
    /// Single value
    Scalar(f64),
    /// One entry per population
    Vector(DVector<f64>),
    /// dimension x dimension
    Matrix(DMatrix<f64>),
}

/// A magnitude with its unit tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// The numeric payload
    pub magnitude: Magnitude,
    /// Unit the payload is expressed in
    pub unit: Unit,
}

impl Quantity {
    /// Scalar quantity.
    pub fn scalar(value: f64, unit: Unit) -> Self {
        Quantity {
            magnitude: Magnitude::Scalar(value),
            unit,
        }
    }

    /// Vector quantity.
    pub fn vector(values: DVector<f64>, unit: Unit) -> Self {
        Quantity {
            magnitude: Magnitude::Vector(values),
            unit,
        }
    }

    /// Matrix quantity.
    pub fn matrix(values: DMatrix<f64>, unit: Unit) -> Self {
        Quantity {
            magnitude: Magnitude::Matrix(values),
            unit,
        }
    }

    /// Explicit conversion to another unit of the same dimension.
    pub fn to(&self, units: &UnitSystem, target: Unit) -> Result<Quantity, MeanfieldError> {
        let factor = units.convert(1.0, self.unit, target)?;
        let magnitude = match &self.magnitude {
            Magnitude::Scalar(v) => Magnitude::Scalar(v * factor),
            Magnitude::Vector(v) => Magnitude::Vector(v * factor),
            Magnitude::Matrix(m) => Magnitude::Matrix(m * factor),
        };
        Ok(Quantity {
            magnitude,
            unit: target,
        })
    }

    /// Scalar payload, or a configuration error if this is not a scalar.
    pub fn as_scalar(&self) -> Result<f64, MeanfieldError> {
        match &self.magnitude {
            Magnitude::Scalar(v) => Ok(*v),
            _ => Err(MeanfieldError::Configuration(
                "expected a scalar quantity".to_string(),
            )),
        }
    }

    /// Vector payload, or a configuration error.
    pub fn as_vector(&self) -> Result<&DVector<f64>, MeanfieldError> {
        match &self.magnitude {
            Magnitude::Vector(v) => Ok(v),
            _ => Err(MeanfieldError::Configuration(
                "expected a vector quantity".to_string(),
            )),
        }
    }

    /// Matrix payload, or a configuration error.
    pub fn as_matrix(&self) -> Result<&DMatrix<f64>, MeanfieldError> {
        match &self.magnitude {
            Magnitude::Matrix(m) => Ok(m),
            _ => Err(MeanfieldError::Configuration(
                "expected a matrix quantity".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_within_dimension() {
        let units = UnitSystem::new();
        let tau = Quantity::scalar(10.0, Unit::Millisecond);
        let si = tau.to(&units, Unit::Second).unwrap();
        assert_eq!(si.as_scalar().unwrap(), 0.01);
    }

    #[test]
    fn rejects_cross_dimension_conversion() {
        let units = UnitSystem::new();
        let tau = Quantity::scalar(10.0, Unit::Millisecond);
        assert!(tau.to(&units, Unit::Millivolt).is_err());
    }

    #[test]
    fn parses_symbols() {
        let units = UnitSystem::new();
        assert_eq!(units.parse("mV").unwrap(), Unit::Millivolt);
        assert_eq!(units.parse("Hz").unwrap(), Unit::Hertz);
        assert!(units.parse("furlong").is_err());
    }
}
