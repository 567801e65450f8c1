//! Cooperative main loop.
//!
//! A loop advances its attached [`Source`]s through four phases, exactly one
//! phase per [`Runtime::loop_tick`]:
//!
//! | Phase    | Visits sources in | On success          | Otherwise        |
//! |----------|-------------------|---------------------|------------------|
//! | Prepare  | `Prepare`         | `Check`             | stays `Prepare`  |
//! | Check    | `Check`           | `Active`            | stays `Check`    |
//! | Dispatch | `Active` + callback | `Cleanup`         | `None` on `false`|
//! | Cleanup  | every source      | `Cleanup` → `Prepare` | `None` detached |
//!
//! Within a phase sources are visited in list order, most recently attached
//! first. Each phase walks a snapshot of the list taken when the phase
//! starts, so hooks may attach, remove or destroy sources freely.
//!
//! [`Runtime::loop_run`] ticks until a full cycle completes with the running
//! flag cleared or no sources attached. [`Runtime::loop_quit`] only clears
//! the flag, so the current cycle always finishes.

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::source::{Source, SourceFuncs, SourceState};
use sigrt_log::{debug, error, trace, warn};
use sigrt_mem::SlotKey;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Handle to a main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MainLoop(pub(crate) SlotKey);

/// Scheduler phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Prepare = 0,
    Check = 1,
    Dispatch = 2,
    Cleanup = 3,
}

impl Phase {
    /// Phase following `self`, wrapping after `Cleanup`.
    #[must_use]
    pub const fn next(self) -> Phase {
        match self {
            Phase::Prepare => Phase::Check,
            Phase::Check => Phase::Dispatch,
            Phase::Dispatch => Phase::Cleanup,
            Phase::Cleanup => Phase::Prepare,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Check => "check",
            Phase::Dispatch => "dispatch",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Observer for a loop's attached-source count.
///
/// Unlike the loop itself this handle is `Send + Sync`, so another thread
/// can watch the count drain.
#[derive(Debug, Clone)]
pub struct SourceCounter(Arc<AtomicUsize>);

impl SourceCounter {
    /// Current number of attached sources.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct LoopRecord {
    pub(crate) head: Option<Source>,
    pub(crate) attached: Arc<AtomicUsize>,
    pub(crate) phase: Phase,
    /// Quit flag; cleared by `loop_quit`.
    pub(crate) running: bool,
    /// Set for the whole body of `loop_run`.
    pub(crate) iterating: bool,
}

impl Runtime {
    /// Creates an idle loop with no sources.
    pub fn loop_new(&self) -> MainLoop {
        let main_loop = MainLoop(self.loops.borrow_mut().insert(LoopRecord {
            head: None,
            attached: Arc::new(AtomicUsize::new(0)),
            phase: Phase::Prepare,
            running: false,
            iterating: false,
        }));
        debug!("created loop {:?}", main_loop.0);
        main_loop
    }

    /// Runs `main_loop` until it is quit or has no sources left.
    ///
    /// Running a loop that is already running or has no attached sources
    /// logs a warning and returns immediately.
    pub fn loop_run(&self, main_loop: MainLoop) {
        {
            let mut loops = self.loops.borrow_mut();
            let Some(lp) = loops.get_mut(main_loop.0) else {
                error!("loop_run on invalid loop {:?}", main_loop.0);
                return;
            };
            if lp.iterating {
                warn!("loop {:?} is already running", main_loop.0);
                return;
            }
            if lp.attached.load(Ordering::Acquire) == 0 {
                warn!("loop {:?} has no attached sources", main_loop.0);
                return;
            }
            lp.running = true;
            lp.iterating = true;
        }
        debug!("loop {:?} started", main_loop.0);

        while let Some(ran) = self.loop_tick(main_loop) {
            if ran != Phase::Cleanup {
                continue;
            }
            let loops = self.loops.borrow();
            let Some(lp) = loops.get(main_loop.0) else {
                break;
            };
            if !lp.running || lp.attached.load(Ordering::Acquire) == 0 {
                break;
            }
        }

        if let Some(lp) = self.loops.borrow_mut().get_mut(main_loop.0) {
            lp.running = false;
            lp.iterating = false;
        }
        debug!("loop {:?} stopped", main_loop.0);
    }

    /// Clears the running flag; `loop_run` returns after the current cycle.
    pub fn loop_quit(&self, main_loop: MainLoop) {
        match self.loops.borrow_mut().get_mut(main_loop.0) {
            Some(lp) => {
                lp.running = false;
                debug!("loop {:?} quit requested", main_loop.0);
            }
            None => error!("loop_quit on invalid loop {:?}", main_loop.0),
        }
    }

    /// Runs the current phase and advances to the next one.
    ///
    /// Returns the phase that ran, or `None` for a stale handle.
    pub fn loop_tick(&self, main_loop: MainLoop) -> Option<Phase> {
        let phase = match self.loops.borrow().get(main_loop.0) {
            Some(lp) => lp.phase,
            None => {
                error!("loop_tick on invalid loop {:?}", main_loop.0);
                return None;
            }
        };

        trace!("loop {:?} {phase} phase", main_loop.0);
        match phase {
            Phase::Prepare => self.run_prepare(main_loop),
            Phase::Check => self.run_check(main_loop),
            Phase::Dispatch => self.run_dispatch(main_loop),
            Phase::Cleanup => self.run_cleanup(main_loop),
        }

        if let Some(lp) = self.loops.borrow_mut().get_mut(main_loop.0) {
            lp.phase = phase.next();
        }
        Some(phase)
    }

    fn run_prepare(&self, main_loop: MainLoop) {
        for source in self.loop_sources(main_loop) {
            let Some(funcs) = self.scheduled_funcs(source, main_loop, SourceState::Prepare) else {
                continue;
            };
            let ready = funcs.map_or(true, |funcs| funcs.prepare(self, source));
            if ready {
                self.advance(source, main_loop, SourceState::Prepare, SourceState::Check);
            }
        }
    }

    fn run_check(&self, main_loop: MainLoop) {
        for source in self.loop_sources(main_loop) {
            let Some(funcs) = self.scheduled_funcs(source, main_loop, SourceState::Check) else {
                continue;
            };
            let ready = funcs.map_or(true, |funcs| funcs.check(self, source));
            if ready {
                self.advance(source, main_loop, SourceState::Check, SourceState::Active);
            }
        }
    }

    fn run_dispatch(&self, main_loop: MainLoop) {
        for source in self.loop_sources(main_loop) {
            let callback = {
                let mut sources = self.sources.borrow_mut();
                let Some(record) = sources.get_mut(source.0) else {
                    continue;
                };
                if record.owner != Some(main_loop) || record.state != SourceState::Active {
                    continue;
                }
                let Some(callback) = record.callback.clone() else {
                    continue;
                };
                record.state = SourceState::Cleanup;
                callback
            };

            if !callback(self, source) {
                let mut sources = self.sources.borrow_mut();
                if let Some(record) = sources.get_mut(source.0) {
                    if record.owner == Some(main_loop) {
                        trace!("source {} finished", record.id);
                        record.state = SourceState::None;
                    }
                }
            }
        }
    }

    fn run_cleanup(&self, main_loop: MainLoop) {
        for source in self.loop_sources(main_loop) {
            let (pending_detach, funcs) = {
                let sources = self.sources.borrow();
                let Some(record) = sources.get(source.0) else {
                    continue;
                };
                let pending = record.owner == Some(main_loop) && record.state == SourceState::None;
                (pending, record.funcs.clone())
            };

            if pending_detach {
                self.detach_source(source);
            }
            if let Some(funcs) = funcs {
                funcs.cleanup(self, source);
            }

            self.advance(source, main_loop, SourceState::Cleanup, SourceState::Prepare);
        }
    }

    /// Hooks of `source` if it belongs to `main_loop` and is in `state`.
    #[allow(clippy::option_option)]
    fn scheduled_funcs(
        &self,
        source: Source,
        main_loop: MainLoop,
        state: SourceState,
    ) -> Option<Option<Rc<dyn SourceFuncs>>> {
        let sources = self.sources.borrow();
        let record = sources.get(source.0)?;
        (record.owner == Some(main_loop) && record.state == state).then(|| record.funcs.clone())
    }

    /// Moves `source` from `from` to `to` unless a hook changed it meanwhile.
    fn advance(&self, source: Source, main_loop: MainLoop, from: SourceState, to: SourceState) {
        let mut sources = self.sources.borrow_mut();
        if let Some(record) = sources.get_mut(source.0) {
            if record.owner == Some(main_loop) && record.state == from {
                record.state = to;
            }
        }
    }

    /// Attached sources in list order.
    #[must_use]
    pub fn loop_sources(&self, main_loop: MainLoop) -> Vec<Source> {
        let head = match self.loops.borrow().get(main_loop.0) {
            Some(lp) => lp.head,
            None => return Vec::new(),
        };

        let sources = self.sources.borrow();
        let mut list = Vec::new();
        let mut cursor = head;
        while let Some(source) = cursor {
            list.push(source);
            cursor = sources.get(source.0).and_then(|record| record.next);
        }
        list
    }

    /// Phase the next tick will run.
    #[must_use]
    pub fn loop_phase(&self, main_loop: MainLoop) -> Option<Phase> {
        self.loops.borrow().get(main_loop.0).map(|lp| lp.phase)
    }

    /// Returns `true` while `loop_run` is iterating and not yet quit.
    #[must_use]
    pub fn loop_is_running(&self, main_loop: MainLoop) -> bool {
        self.loops.borrow().get(main_loop.0).is_some_and(|lp| lp.running)
    }

    /// Number of attached sources.
    #[must_use]
    pub fn loop_source_count(&self, main_loop: MainLoop) -> usize {
        self.loops
            .borrow()
            .get(main_loop.0)
            .map_or(0, |lp| lp.attached.load(Ordering::Acquire))
    }

    /// Thread-safe observer of the attached-source count.
    #[must_use]
    pub fn loop_counter(&self, main_loop: MainLoop) -> Option<SourceCounter> {
        self.loops
            .borrow()
            .get(main_loop.0)
            .map(|lp| SourceCounter(Arc::clone(&lp.attached)))
    }

    /// Detaches every remaining source and frees the loop.
    ///
    /// Detached sources are left in state `None` and stay alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopRunning`] if `loop_run` is still iterating and
    /// [`Error::InvalidLoop`] for a stale handle.
    pub fn loop_destroy(&self, main_loop: MainLoop) -> Result<()> {
        match self.loops.borrow().get(main_loop.0) {
            Some(lp) if lp.iterating => {
                error!("loop_destroy on running loop {:?}", main_loop.0);
                return Err(Error::LoopRunning);
            }
            Some(_) => {}
            None => {
                error!("loop_destroy on invalid loop {:?}", main_loop.0);
                return Err(Error::InvalidLoop);
            }
        }

        for source in self.loop_sources(main_loop) {
            self.detach_source(source);
            if let Some(record) = self.sources.borrow_mut().get_mut(source.0) {
                record.state = SourceState::None;
            }
        }
        self.loops.borrow_mut().remove(main_loop.0);
        debug!("destroyed loop {:?}", main_loop.0);
        Ok(())
    }
}
