//! # tessera-engine
//!
//! The main entry point for Tessera: database lifecycle, the index catalog,
//! and the domain-object cache.
//!
//! ## Modules
//!
//! - [`database`] - TesseraDB struct and lifecycle management
//! - [`config`] - Configuration options
//! - [`catalog`] - Index creation, lookup, dispatch, and maintenance
//! - [`objects`] - Bounded cache of domain objects

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod database;
pub mod objects;

pub use catalog::IndexCatalog;
pub use config::Config;
pub use database::TesseraDB;
pub use objects::DomainObjectCache;
