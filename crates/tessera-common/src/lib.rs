//! # tessera-common
//!
//! Foundation layer for Tessera: identifiers, values, locations, and utilities.
//!
//! This crate provides the fundamental building blocks used by all other
//! Tessera crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (ObjectId, AttributeId, Value, ObjectLocation)
//! - [`utils`] - Utility functions and helpers (stable hashing, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{AttributeId, ObjectId, ObjectLocation, ShardId, TypeId, Value};
pub use utils::error::{Error, Result};
