//! Risk scoring: additive clinical formulas, the ADA-style questionnaire
//! score, and a bounded 0-100 composite that can defer to a predictive
//! model.

pub mod ada;
pub mod blend;
pub mod formulas;
pub mod model;

pub use ada::*;
pub use blend::*;
pub use formulas::*;
pub use model::{ModelError, ModelInfo, RiskModel, RiskModelService};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    /// No health record exists for the patient. Never reported as a zero score.
    #[error("no data available")]
    NoData,
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
