//! C ABI for plugins shipped as shared libraries.
//!
//! The ABI types and host callbacks are always compiled; opening
//! libraries requires the `dynamic` feature.

pub mod abi;
#[cfg(feature = "dynamic")]
pub mod library;
pub mod safety;

#[cfg(feature = "dynamic")]
pub use library::LibraryPlugin;
