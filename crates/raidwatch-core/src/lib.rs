//! Core types and definitions for RAIDWATCH.
//!
//! This crate defines the vocabulary shared across all other crates:
//! events, tracked groups, state snapshots, geographic types, and constants.
//! It has no dependency on I/O or any runtime framework.

pub mod constants;
pub mod enums;
pub mod events;
pub mod state;
pub mod types;
