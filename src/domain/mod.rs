//! Core domain types and logic.

pub mod series;
pub mod indicator;
pub mod frame;
pub mod config;
pub mod signal;
pub mod simulator;
pub mod summary;
pub mod search;
pub mod error;
