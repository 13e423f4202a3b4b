//! Core types: errors, configuration, storage roots.

pub mod config;
pub mod errors;
