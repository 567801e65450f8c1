//! Event sources: schedulable units driven by a [`MainLoop`].
//!
//! A source is created on its own, attached to one loop at a time, and
//! moves through [`SourceState`]s as the loop ticks through its phases
//! (see [`main_loop`](crate::main_loop) for the phase rules). Hooks are
//! supplied through [`SourceFuncs`]; the dispatch callback is bound
//! separately with [`Runtime::source_set_callback`].
//!
//! # Storage
//!
//! Sources live in the runtime's slot arena. The loop's source list is an
//! intrusive doubly linked list threaded through `prev`/`next` handles in
//! each record; attaching prepends.
//!
//! # Removal
//!
//! Detaching and destroying are separate steps:
//! - [`Runtime::source_remove`] marks the source `None`; the owning loop
//!   unlinks it during its next Cleanup phase.
//! - [`Runtime::source_destroy`] unlinks immediately (if attached) and
//!   frees the record.

use crate::error::{Error, Result};
use crate::main_loop::MainLoop;
use crate::runtime::Runtime;
use sigrt_log::{debug, error, warn};
use sigrt_mem::SlotKey;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::Ordering;

/// Handle to an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Source(pub(crate) SlotKey);

/// Lifecycle state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceState {
    /// Not scheduled; detached at the next Cleanup phase if still attached.
    None,
    /// Waiting for its `prepare` hook to succeed.
    Prepare,
    /// Waiting for its `check` hook to succeed.
    Check,
    /// Ready to be dispatched.
    Active,
    /// Dispatched this cycle; returns to `Prepare` after Cleanup.
    Cleanup,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceState::None => "none",
            SourceState::Prepare => "prepare",
            SourceState::Check => "check",
            SourceState::Active => "active",
            SourceState::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Optional per-source hooks.
///
/// Every method has a default, so an implementation only overrides what it
/// needs. A source created without hooks behaves as if every method kept
/// its default: always prepared, always ready.
///
/// # Example
///
/// ```rust
/// use sigrt::{Runtime, Source, SourceFuncs};
/// use std::cell::Cell;
///
/// /// Ready on every other cycle.
/// struct EveryOther(Cell<bool>);
///
/// impl SourceFuncs for EveryOther {
///     fn prepare(&self, _rt: &Runtime, _source: Source) -> bool {
///         let ready = !self.0.get();
///         self.0.set(ready);
///         ready
///     }
/// }
///
/// let rt = Runtime::new();
/// let source = rt.source_new_with_funcs(EveryOther(Cell::new(false)));
/// # let _ = source;
/// ```
pub trait SourceFuncs {
    /// Called in the Prepare phase; `true` moves the source to `Check`.
    fn prepare(&self, _rt: &Runtime, _source: Source) -> bool {
        true
    }

    /// Called in the Check phase; `true` moves the source to `Active`.
    fn check(&self, _rt: &Runtime, _source: Source) -> bool {
        true
    }

    /// Called in every Cleanup phase, after a pending detach.
    fn cleanup(&self, _rt: &Runtime, _source: Source) {}
}

/// Dispatch callback; returning `false` detaches the source.
pub type DispatchFn = Rc<dyn Fn(&Runtime, Source) -> bool>;

pub(crate) struct SourceRecord {
    pub(crate) id: u64,
    pub(crate) state: SourceState,
    pub(crate) funcs: Option<Rc<dyn SourceFuncs>>,
    pub(crate) callback: Option<DispatchFn>,
    pub(crate) owner: Option<MainLoop>,
    pub(crate) prev: Option<Source>,
    pub(crate) next: Option<Source>,
}

impl Runtime {
    /// Creates a source without hooks.
    pub fn source_new(&self) -> Source {
        self.insert_source(None)
    }

    /// Creates a source driven by `funcs`.
    pub fn source_new_with_funcs(&self, funcs: impl SourceFuncs + 'static) -> Source {
        self.insert_source(Some(Rc::new(funcs)))
    }

    fn insert_source(&self, funcs: Option<Rc<dyn SourceFuncs>>) -> Source {
        let id = self.next_source_id();
        let source = Source(self.sources.borrow_mut().insert(SourceRecord {
            id,
            state: SourceState::None,
            funcs,
            callback: None,
            owner: None,
            prev: None,
            next: None,
        }));
        debug!("created source {id}");
        source
    }

    /// Binds the dispatch callback, replacing any previous one.
    pub fn source_set_callback(&self, source: Source, callback: impl Fn(&Runtime, Source) -> bool + 'static) {
        match self.sources.borrow_mut().get_mut(source.0) {
            Some(record) => record.callback = Some(Rc::new(callback)),
            None => error!("source_set_callback on invalid source {:?}", source.0),
        }
    }

    /// Prepends `source` to the list of `main_loop` and puts it in `Prepare`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSource`] or [`Error::InvalidLoop`] for stale
    /// handles and [`Error::SourceAlreadyAttached`] if the source already
    /// belongs to a loop.
    pub fn source_attach(&self, source: Source, main_loop: MainLoop) -> Result<()> {
        let mut sources = self.sources.borrow_mut();
        let mut loops = self.loops.borrow_mut();

        let Some(lp) = loops.get_mut(main_loop.0) else {
            error!("source_attach to invalid loop {:?}", main_loop.0);
            return Err(Error::InvalidLoop);
        };
        let Some(record) = sources.get_mut(source.0) else {
            error!("source_attach of invalid source {:?}", source.0);
            return Err(Error::InvalidSource);
        };
        if record.owner.is_some() {
            error!("source {} is already attached", record.id);
            return Err(Error::SourceAlreadyAttached);
        }

        let old_head = lp.head.replace(source);
        record.owner = Some(main_loop);
        record.state = SourceState::Prepare;
        record.prev = None;
        record.next = old_head;
        let id = record.id;

        if let Some(head) = old_head {
            if let Some(head) = sources.get_mut(head.0) {
                head.prev = Some(source);
            }
        }

        let attached = lp.attached.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("attached source {id} to loop {:?} ({attached} attached)", main_loop.0);
        Ok(())
    }

    /// Marks `source` for detachment at its loop's next Cleanup phase.
    pub fn source_remove(&self, source: Source) {
        let mut sources = self.sources.borrow_mut();
        let Some(record) = sources.get_mut(source.0) else {
            error!("source_remove of invalid source {:?}", source.0);
            return;
        };
        if record.owner.is_none() {
            warn!("source_remove of source {} which is not attached", record.id);
            return;
        }
        record.state = SourceState::None;
        debug!("source {} marked for removal", record.id);
    }

    /// Frees `source`, unlinking it first if it is still attached.
    pub fn source_destroy(&self, source: Source) {
        if !self.sources.borrow().contains(source.0) {
            error!("source_destroy of invalid source {:?}", source.0);
            return;
        }

        self.detach_source(source);
        if let Some(record) = self.sources.borrow_mut().remove(source.0) {
            debug!("destroyed source {}", record.id);
        }
    }

    /// Unlinks `source` from its loop and decrements the loop's count.
    ///
    /// Returns `false` if the source was not attached.
    pub(crate) fn detach_source(&self, source: Source) -> bool {
        let mut sources = self.sources.borrow_mut();
        let mut loops = self.loops.borrow_mut();

        let Some(record) = sources.get_mut(source.0) else {
            return false;
        };
        let Some(owner) = record.owner.take() else {
            return false;
        };
        let prev = record.prev.take();
        let next = record.next.take();
        let id = record.id;

        if let Some(prev) = prev {
            if let Some(prev) = sources.get_mut(prev.0) {
                prev.next = next;
            }
        }
        if let Some(next) = next {
            if let Some(next) = sources.get_mut(next.0) {
                next.prev = prev;
            }
        }

        if let Some(lp) = loops.get_mut(owner.0) {
            if lp.head == Some(source) {
                lp.head = next;
            }
            let remaining = lp.attached.fetch_sub(1, Ordering::AcqRel) - 1;
            debug!("detached source {id} from loop {:?} ({remaining} attached)", owner.0);
        }
        true
    }

    /// Monotonic id assigned at creation, starting at 1.
    #[must_use]
    pub fn source_id(&self, source: Source) -> Option<u64> {
        self.sources.borrow().get(source.0).map(|record| record.id)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn source_state(&self, source: Source) -> Option<SourceState> {
        self.sources.borrow().get(source.0).map(|record| record.state)
    }

    /// Loop `source` is attached to.
    #[must_use]
    pub fn source_loop(&self, source: Source) -> Option<MainLoop> {
        self.sources.borrow().get(source.0).and_then(|record| record.owner)
    }

    /// Returns `true` if `source` is linked into a loop.
    #[must_use]
    pub fn source_is_attached(&self, source: Source) -> bool {
        self.source_loop(source).is_some()
    }
}
