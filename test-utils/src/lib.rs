//! Shared test utilities for message-pact.
//!
//! This crate provides:
//! - Proptest generators for matcher trees, provider states and interactions
//! - Test fixtures with a sample order event contract

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use generators::*;
