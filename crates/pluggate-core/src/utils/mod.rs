//! # Utilities
//!
//! Small helpers shared by the plugin system:
//!
//! - **[`fs`]**: plugin archive path checks and archive discovery.
//! - **[`memoize`]**: a compute-once-per-key cache ([`Memoizer`]).
pub mod fs;
pub mod memoize;

pub use memoize::Memoizer;

#[cfg(test)]
mod tests;
