//! labkit Common Library
//!
//! Shared constants, configuration loading, the platform API and the error
//! taxonomy used by every labkit crate.
//!
//! # Module Structure
//!
//! - [`consts`] - Fixed bus addresses, timings and transport defaults
//! - [`config`] - Configuration loading traits and types
//! - [`hal`] - Platform primitives, board revision tag, error types
//! - [`io`] - Connector and pin-role vocabulary
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use labkit_common::prelude::*;
//!
//! let revision = HardwareRevision::V2 { minor: Some(3) };
//! assert_eq!(revision.to_string(), "v2.3");
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod io;
pub mod prelude;
