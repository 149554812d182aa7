//! Command implementations.

pub mod build;
pub mod keys;
pub mod sync;
