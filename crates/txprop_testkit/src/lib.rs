//! # txprop Testkit
//!
//! Test utilities for txprop.
//!
//! This crate provides:
//! - Fixtures wiring an in-memory backend, a coordinator and the services
//! - Call plans: trees of nested units of work plus a reference model of
//!   which physical transactions must commit
//! - Property-based test generators for call plans using proptest
//! - The named propagation scenarios, runnable from tests and the CLI
//!
//! ## Usage
//!
//! ```rust
//! use txprop_testkit::prelude::*;
//!
//! let report = find_scenario("recover_exception_success").unwrap().run();
//! assert!(report.passed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod plan;
pub mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::plan::*;
    pub use crate::scenarios::*;
}

pub use fixtures::*;
pub use generators::*;
pub use plan::*;
pub use scenarios::*;
