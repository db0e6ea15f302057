//! Core domain types and logic.

pub mod bar;
pub mod budget;
pub mod config_validation;
pub mod error;
pub mod funnel;
pub mod indicator;
pub mod indicator_helpers;
pub mod instrument;
pub mod position;
pub mod risk;
pub mod screen;
pub mod sentiment;
pub mod signal;
pub mod snapshot;
