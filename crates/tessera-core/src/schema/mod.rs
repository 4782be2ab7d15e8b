//! Domain objects and the slice of the type system indices need.
//!
//! The full type system lives outside this crate. Indices only need to turn
//! an attribute id into an [`AttributeDescriptor`], which is what the
//! [`AttributeResolver`] contract provides.

mod attribute;
mod object;

pub use attribute::{AttributeCatalog, AttributeDescriptor, AttributeResolver, Cardinality};
pub use object::DbObject;
