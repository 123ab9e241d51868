//! Mean-field analysis of spiking neural networks.
//!
//! This library computes stationary and dynamical statistics of a mean-field
//! network model: firing rates, transfer functions, power spectra and
//! eigenmode analyses. The [`Network`] facade derives dependent parameters
//! from raw physical inputs, memoizes every expensive frequency-domain
//! calculation, and composes the memoized pieces into higher-level analyses.
//! The physical formulas live behind the [`AnalyticsEngine`] trait;
//! [`MeanFieldAnalytics`] is the bundled reference implementation.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod analytics;
pub mod cache;
pub mod network;
pub mod params;
pub mod storage;

// Re-export commonly used items for easier access
pub use analytics::{AnalyticsEngine, EigenMatrix, EigenSide, MeanFieldAnalytics};
pub use cache::{Probe, ResultCache, ResultValue};
pub use network::{Network, WorkingPoint};
pub use params::{
    Magnitude, ParamValue, ParameterStore, PhysicalParams, Quantity, Unit, UnitSystem,
};

/// Toolkit error types.
#[derive(Debug)]
pub enum MeanfieldError {
    /// Missing or structurally invalid parameters
    Configuration(String),
    /// A numeric routine failed; nothing was cached
    Computation(String),
    /// Parameter or result persistence failed
    Storage(String),
}

impl std::fmt::Display for MeanfieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MeanfieldError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            MeanfieldError::Computation(msg) => write!(f, "computation error: {}", msg),
            MeanfieldError::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for MeanfieldError {}
