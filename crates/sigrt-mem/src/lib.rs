//! Memory primitives for the `sigrt` runtime.
//!
//! - **Slot arenas**: generational, index-addressed storage for objects,
//!   sources and loops. Stale keys are detected instead of aliasing reused
//!   slots.
//! - **String interning**: deduplicated names with [`Symbol`] ids for
//!   signal names and user-data keys (requires the `string-interner`
//!   feature).

pub mod slot;

#[cfg(feature = "string-interner")]
pub mod interner;

pub use slot::{SlotArena, SlotKey};

#[cfg(feature = "string-interner")]
pub use interner::{StringInterner, Symbol};
