//! RAIDWATCH application.
//!
//! Wires the classifier, state manager, geocoder and renderer into a
//! single pipeline thread fed by a report stream.

pub mod classifier;
pub mod config;
pub mod history;
pub mod notify;
pub mod pipeline;
pub mod renderer;

pub use raidwatch_core as core;
