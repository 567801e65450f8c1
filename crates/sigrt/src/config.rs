//! Runtime configuration.
//!
//! Capacities only pre-size the arenas; every table still grows on demand.

use sigrt_log::{Level, ParseLevelError};

/// Settings applied by [`Runtime::with_config`](crate::Runtime::with_config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Initial class table capacity (the implicit root included).
    pub class_capacity: usize,
    /// Initial object arena capacity.
    pub object_capacity: usize,
    /// Initial source arena capacity.
    pub source_capacity: usize,
    /// Global log level to apply, if any.
    pub log_level: Option<Level>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            class_capacity: 16,
            object_capacity: 64,
            source_capacity: 16,
            log_level: None,
        }
    }
}

impl RuntimeConfig {
    /// Default capacities with the log level taken from `SIGRT_LOG`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseLevelError`] if `SIGRT_LOG` is set to an unknown level.
    pub fn from_env() -> Result<Self, ParseLevelError> {
        let log_level = match std::env::var(sigrt_log::ENV_VAR) {
            Ok(value) => Some(value.parse()?),
            Err(_) => None,
        };
        Ok(Self {
            log_level,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_class_capacity(mut self, capacity: usize) -> Self {
        self.class_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_object_capacity(mut self, capacity: usize) -> Self {
        self.object_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_source_capacity(mut self, capacity: usize) -> Self {
        self.source_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }
}
