//! `sigrt`: Object Runtime and Cooperative Main Loop
//!
//! `sigrt` is the foundation layer that windowing, rendering and audio
//! subsystems build on. It provides:
//!
//! - **Type Registry** with single inheritance and lazily created classes
//! - **Reference-Counted Objects** with dispose/finalize chains and keyed user data
//! - **Signal Bus** for per-class named multicast events
//! - **Event Sources** driven through a four-phase lifecycle
//! - **Main Loop** advancing one phase per tick, without a thread per source
//!
//! # Architecture
//!
//! Everything lives in a [`Runtime`] context:
//!
//! - **Registry Layer**: class records in an id-indexed table, walked by parent id
//! - **Object Layer**: generational slot arena of instances
//! - **Scheduler Layer**: source and loop arenas with intrusive source lists
//!
//! Handles ([`ClassId`], [`Object`], [`SignalId`], [`Source`], [`MainLoop`])
//! are plain `Copy` values; stale handles are detected and reported.
//!
//! # Example
//!
//! ```rust
//! use sigrt::{ClassId, Runtime, TypeDescriptor};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//! let window = rt
//!     .type_register(
//!         TypeDescriptor::new(64)
//!             .with_name("Window")
//!             .with_class_init(|class| {
//!                 class.signal_new("close", false).unwrap();
//!             }),
//!         ClassId::ROOT,
//!     )
//!     .unwrap();
//!
//! let obj = rt.object_new(window).unwrap();
//! let closed = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&closed);
//! rt.signal_connect(obj, "close", move |_, _| flag.set(true)).unwrap();
//!
//! let close = rt.object_find_signal(obj, "close").unwrap();
//! rt.signal_emit(close);
//! assert!(closed.get());
//!
//! let main_loop = rt.loop_new();
//! let source = rt.source_new();
//! rt.source_set_callback(source, |_, _| false);
//! rt.source_attach(source, main_loop).unwrap();
//! rt.loop_run(main_loop);
//! assert_eq!(rt.loop_source_count(main_loop), 0);
//! ```

pub mod config;
pub mod error;
pub mod main_loop;
pub mod object;
pub mod registry;
pub mod runtime;
pub mod signal;
pub mod source;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use main_loop::{MainLoop, Phase, SourceCounter};
pub use object::{BASE_INSTANCE_SIZE, Object};
pub use registry::{ClassId, ClassInfo, ClassInit, LifecycleHook, TypeDescriptor};
pub use runtime::Runtime;
pub use signal::{HandlerId, SignalId};
pub use source::{DispatchFn, Source, SourceFuncs, SourceState};

pub use sigrt_log::Level;
