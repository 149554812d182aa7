//! Shared value types for relkit.
//!
//! Everything in this crate is plain data: descriptors for remote objects
//! and their local counterparts, content checksums as reported by object
//! storage, CPU architectures, and release versions. None of it performs
//! network or subprocess I/O.

pub mod arch;
pub mod checksum;
pub mod object;
pub mod version;

// Re-exports
pub use arch::*;
pub use checksum::*;
pub use object::*;
pub use version::*;
