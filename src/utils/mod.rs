//! Utils Module - Helper Functions & Shared Utilities
//!
//! Static tables, constants and the result cache.

pub mod cache;
pub mod constants;

pub use cache::*;
pub use constants::*;
