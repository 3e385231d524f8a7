//! Shared types and catalog wire format for spry-pkg.
//!
//! Everything in this crate is pure data: platform identifiers, validated
//! checksums, package descriptors and the raw TOML records they are built
//! from. No I/O happens here.

pub mod hash;
pub mod platform;
pub mod types;

// Re-exports
pub use hash::*;
pub use platform::*;
pub use types::*;
