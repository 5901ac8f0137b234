//! Connector vocabulary: named expansion headers and logical pin roles.
//!
//! Shared by the capability layer and applications. Physical bindings
//! live in `labkit_hal::connector`.

pub mod role;
