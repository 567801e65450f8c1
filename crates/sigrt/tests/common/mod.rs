// Common test utilities for integration tests
//
// Shared class fixtures and recording helpers used across the integration
// test binaries.

#![allow(dead_code)]

use sigrt::{ClassId, Object, Runtime, Source, TypeDescriptor};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared, ordered record of hook and listener invocations.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Shared invocation counter.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) -> usize {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Registers a class under `parent` whose dispose and finalize hooks record
/// `dispose:<name>` / `finalize:<name>` into `log`.
pub fn register_logged_class(rt: &Runtime, name: &str, parent: ClassId, log: &CallLog) -> ClassId {
    let dispose_log = log.clone();
    let finalize_log = log.clone();
    let dispose_tag = format!("dispose:{name}");
    let finalize_tag = format!("finalize:{name}");

    rt.type_register(
        TypeDescriptor::new(32)
            .with_name(name)
            .with_class_init(move |class| {
                class.set_dispose(move |_, _| dispose_log.push(dispose_tag.clone()));
                class.set_finalize(move |_, _| finalize_log.push(finalize_tag.clone()));
            }),
        parent,
    )
    .expect("Failed to register test class")
}

/// Registers a `Window`-like class declaring the usual platform signals.
pub fn register_window_class(rt: &Runtime) -> ClassId {
    rt.type_register(
        TypeDescriptor::new(64)
            .with_name("Window")
            .with_class_init(|class| {
                class.signal_new("close", false).expect("close");
                class.signal_new("resize", true).expect("resize");
                class.signal_new("key-down", true).expect("key-down");
            }),
        ClassId::ROOT,
    )
    .expect("Failed to register window class")
}

/// Registers an application class declaring `active` and `quit`.
pub fn register_app_class(rt: &Runtime) -> ClassId {
    rt.type_register(
        TypeDescriptor::new(32)
            .with_name("App")
            .with_class_init(|class| {
                class.signal_new("active", false).expect("active");
                class.signal_new("quit", false).expect("quit");
            }),
        ClassId::ROOT,
    )
    .expect("Failed to register app class")
}

/// Creates a hookless source whose callback counts dispatches and returns
/// `false` once `limit` dispatches have happened.
pub fn counting_source(rt: &Runtime, limit: usize) -> (Source, Counter) {
    let counter = Counter::new();
    let calls = counter.clone();
    let source = rt.source_new();
    rt.source_set_callback(source, move |_, _| calls.bump() < limit);
    (source, counter)
}

/// Creates an object and asserts it starts with one reference.
pub fn new_object(rt: &Runtime, class: ClassId) -> Object {
    let obj = rt.object_new(class).expect("Failed to create test object");
    assert_eq!(rt.object_refcount(obj), Some(1));
    obj
}
