//! Core types for the fair price aggregator
//!
//! This crate provides shared types used across all components:
//! - Instrument and observation definitions
//! - Feed and configuration error types
//! - Aggregation configuration

pub mod types;
pub mod config;
pub mod errors;

pub use types::*;
pub use crate::config::*;
pub use errors::*;
