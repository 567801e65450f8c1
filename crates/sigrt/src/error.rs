//! Error types for the `sigrt` runtime.
//!
//! Every variant is a precondition violation: a handle that does not
//! resolve, a type id outside the registry, a signal used with the wrong
//! listener variant. They are logged where they are detected and then
//! returned to the caller; nothing in the runtime recovers from them.

use std::fmt;

/// Errors reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Type id is 0, out of range, or no type was ever registered.
    InvalidClass {
        /// The offending type id.
        id: u32,
    },

    /// Parent type id passed to registration is not in the registry.
    InvalidParent {
        /// The offending parent id.
        id: u32,
    },

    /// Object handle does not refer to a live object.
    InvalidObject,

    /// Source handle does not refer to a live source.
    InvalidSource,

    /// Loop handle does not refer to a live loop.
    InvalidLoop,

    /// Signal handle does not refer to a declared signal.
    InvalidSignal {
        /// The offending signal index.
        id: u32,
    },

    /// A class already declares a signal with this name.
    SignalExists {
        /// Signal name.
        name: String,
    },

    /// No class in the searched chain declares this signal.
    SignalNotFound {
        /// Signal name.
        name: String,
    },

    /// Listener or emission variant does not match the signal.
    SignalKindMismatch {
        /// Signal name.
        name: String,
        /// Whether the signal carries a parameter.
        has_param: bool,
    },

    /// Source is already attached to a loop.
    SourceAlreadyAttached,

    /// Loop is running and cannot be torn down.
    LoopRunning,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidClass { id } => write!(f, "Invalid type id: {id}"),
            Error::InvalidParent { id } => {
                write!(f, "Invalid parent type id: {id}")
            }
            Error::InvalidObject => write!(f, "Invalid object handle"),
            Error::InvalidSource => write!(f, "Invalid source handle"),
            Error::InvalidLoop => write!(f, "Invalid loop handle"),
            Error::InvalidSignal { id } => {
                write!(f, "Invalid signal handle: {id}")
            }
            Error::SignalExists { name } => {
                write!(f, "Signal '{name}' already declared on this class")
            }
            Error::SignalNotFound { name } => {
                write!(f, "Signal '{name}' not found")
            }
            Error::SignalKindMismatch { name, has_param } => {
                let kind = if *has_param { "one-argument" } else { "zero-argument" };
                write!(f, "Signal '{name}' is a {kind} signal")
            }
            Error::SourceAlreadyAttached => {
                write!(f, "Source is already attached to a loop")
            }
            Error::LoopRunning => write!(f, "Loop is running"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
