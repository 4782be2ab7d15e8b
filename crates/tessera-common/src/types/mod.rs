//! Core type definitions for Tessera.
//!
//! This module contains all fundamental types used throughout the database:
//! - Identifier types ([`ObjectId`], [`TypeId`], [`AttributeId`], [`ShardId`])
//! - Attribute values ([`Value`])
//! - Persisted-object addressing ([`ObjectLocation`])

mod id;
mod location;
mod value;

pub use id::{AttributeId, ObjectId, ShardId, TypeId};
pub use location::{ObjectLocation, SEPARATOR};
pub use value::Value;
