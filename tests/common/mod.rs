//! Shared test utilities for seisquery integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Catalogs are built in memory; nothing touches the
//! network or the filesystem unless a harness asks for a tempdir.

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod hooked_store;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use hooked_store::*;
