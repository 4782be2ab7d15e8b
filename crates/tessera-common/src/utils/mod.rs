//! Utility modules shared by every Tessera crate.

pub mod error;
pub mod hash;
