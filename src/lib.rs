//! Scope-tracking XML builder on top of a small libxml2-style document model.
//!
//! [`ScopedBuilder`] is the entry point for Rust callers; the `ffi` module
//! exposes the same operations through a C ABI. The document model lives in
//! `tree` and `doc`, serialisation in `save`.

pub mod builder;
pub mod doc;
pub mod error;
pub mod ffi;
pub mod save;
pub mod tree;

pub use builder::{BuildPhase, BuilderOptions, ScopeIntent, ScopedBuilder};
pub use doc::{DocumentError, XmlDocument};
pub use error::{BuilderError, BuilderResult};
pub use tree::{NodeId, Standalone, XmlDeclaration, XmlNode, XmlNodeType};
