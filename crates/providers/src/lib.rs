//! Generator implementations for gencache.
//!
//! All generators implement the `gencache_core::Generator` trait.
//! [`build_from_config`] selects one based on configuration.

pub mod responses;
pub mod router;

pub use responses::ResponsesGenerator;
pub use router::build_from_config;
