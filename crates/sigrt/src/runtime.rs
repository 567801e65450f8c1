//! The runtime context.
//!
//! A [`Runtime`] owns every table the other modules operate on: the type
//! registry, the object arena, the source arena and the loop arena. The
//! operations themselves live in `impl Runtime` blocks next to the types
//! they manage ([`registry`](crate::registry), [`object`](crate::object),
//! [`signal`](crate::signal), [`source`](crate::source),
//! [`main_loop`](crate::main_loop)).
//!
//! # Re-entrancy
//!
//! Hooks, listeners and dispatch callbacks receive `&Runtime` and may call
//! any operation on it. No table borrow is held while user code runs.
//!
//! # Thread Safety
//!
//! `Runtime` is neither `Send` nor `Sync`. The registry, listener chains
//! and source lists are mutated only from the owning thread. A loop's
//! attached-source count can be observed elsewhere through
//! [`SourceCounter`](crate::SourceCounter).

use crate::config::RuntimeConfig;
use crate::main_loop::LoopRecord;
use crate::object::ObjectRecord;
use crate::registry::TypeRegistry;
use crate::source::SourceRecord;
use sigrt_log::debug;
use sigrt_mem::{SlotArena, StringInterner};
use std::cell::{Cell, RefCell};
use std::fmt;

/// Independent instance of the object runtime and scheduler.
///
/// # Example
///
/// ```rust
/// use sigrt::{ClassId, Runtime, TypeDescriptor};
///
/// let rt = Runtime::new();
/// let widget = rt.type_register(TypeDescriptor::new(32), ClassId::ROOT).unwrap();
/// let obj = rt.object_new(widget).unwrap();
///
/// assert_eq!(rt.object_refcount(obj), Some(1));
/// rt.object_unref(obj);
/// assert!(!rt.object_is_alive(obj));
/// ```
pub struct Runtime {
    pub(crate) types: RefCell<Option<TypeRegistry>>,
    pub(crate) names: RefCell<StringInterner>,
    pub(crate) objects: RefCell<SlotArena<ObjectRecord>>,
    pub(crate) sources: RefCell<SlotArena<SourceRecord>>,
    pub(crate) loops: RefCell<SlotArena<LoopRecord>>,
    next_source_id: Cell<u64>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Creates a runtime with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a runtime from `config`.
    ///
    /// Applies `config.log_level` to the global logger when set.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        if let Some(level) = config.log_level {
            sigrt_log::set_level(level);
        }

        Self {
            types: RefCell::new(None),
            names: RefCell::new(StringInterner::new()),
            objects: RefCell::new(SlotArena::with_capacity(config.object_capacity)),
            sources: RefCell::new(SlotArena::with_capacity(config.source_capacity)),
            loops: RefCell::new(SlotArena::new()),
            next_source_id: Cell::new(1),
            config,
        }
    }

    /// Settings this runtime was created with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Number of live sources, attached or not.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }

    pub(crate) fn next_source_id(&self) -> u64 {
        let id = self.next_source_id.get();
        self.next_source_id.set(id + 1);
        id
    }
}

impl Drop for Runtime {
    /// Frees live objects without running dispose or finalize; their
    /// user-data destructors still run.
    fn drop(&mut self) {
        let live = self.objects.get_mut().drain();
        if !live.is_empty() {
            debug!("releasing {} live objects at teardown", live.len());
        }
        for record in live {
            record.release_user_data();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self
            .types
            .try_borrow()
            .map(|types| types.as_ref().map_or(0, TypeRegistry::class_count))
            .unwrap_or(0);

        f.debug_struct("Runtime")
            .field("classes", &classes)
            .field("objects", &self.objects.try_borrow().map_or(0, |o| o.len()))
            .field("sources", &self.sources.try_borrow().map_or(0, |s| s.len()))
            .field("loops", &self.loops.try_borrow().map_or(0, |l| l.len()))
            .finish()
    }
}
