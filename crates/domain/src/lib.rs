//! # Restq Domain
//!
//! Domain types shared by every restq crate.
//!
//! This crate contains:
//! - The error taxonomy and `Result` alias
//! - Client configuration structures
//! - `ResourcePath`, the immutable addressing chain for remote resources
//!
//! ## Architecture
//! - Depends only on the `foundation` tier of `restq-common`
//! - No I/O, no async runtime
//! - Pure data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod path;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use path::ResourcePath;
