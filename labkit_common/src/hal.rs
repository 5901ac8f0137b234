//! Platform primitives and board-level types.
//!
//! This module contains the platform API the capability layer is built
//! on, the revision tag and the error taxonomy.

pub mod error;
pub mod platform;
pub mod types;
