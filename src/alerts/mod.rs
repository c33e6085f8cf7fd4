//! Threshold alerts on incoming vitals, plus acknowledge/snooze.

pub mod lifecycle;
pub mod rules;

pub use lifecycle::*;
pub use rules::*;
