//! Survival/probability model and its calibration data

pub mod calibration;
pub mod survival;

pub use calibration::{Calibration, CalibrationCurve};
pub use survival::{geometric_window_probability, SurvivalModel};
