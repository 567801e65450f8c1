//! Named multicast signals declared per class.
//!
//! A signal is declared once, from a class-init callback, and belongs to
//! that class. Listeners connect through an object; the listener remembers
//! the object it was connected from and receives it on every emission.
//! The listener chain lives on the signal, so it is shared by every
//! instance of the declaring class.
//!
//! # Listener chains
//!
//! Connecting prepends a listener and gives it a sequence id one greater
//! than the previous head's (1 for the first). Emission walks the chain
//! from the head, so listeners run last-connected first. There is no
//! disconnect: listeners live as long as the runtime.
//!
//! Emission works on the chain as it stood when the emission began.
//! A listener connected from inside a callback is placed at the head and
//! is first invoked by the next emission.
//!
//! # Lookup asymmetry
//!
//! [`Runtime::signal_connect`] looks the name up on the object's class and
//! then on each ancestor. [`Runtime::signal_connect_with_param`] only looks
//! at the object's own class, so a subclass instance cannot connect to a
//! one-argument signal declared by its parent.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::registry::{ClassId, ClassInit, TypeRegistry};
use crate::runtime::Runtime;
use sigrt_log::{error, trace};
use sigrt_mem::Symbol;
use std::any::Any;
use std::rc::Rc;

/// Handle to a declared signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u32);

impl SignalId {
    /// Raw index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Sequence id of a listener within its signal's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u32);

impl HandlerId {
    /// Raw sequence number, starting at 1.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone)]
pub(crate) enum Callback {
    Plain(Rc<dyn Fn(&Runtime, Object)>),
    WithParam(Rc<dyn Fn(&Runtime, Object, &dyn Any)>),
}

pub(crate) struct Handler {
    id: HandlerId,
    callback: Callback,
    instance: Object,
}

pub(crate) struct SignalRecord {
    name: Symbol,
    owner: ClassId,
    has_param: bool,
    /// Oldest first; the chain head is the last element.
    handlers: Vec<Handler>,
}

impl ClassInit<'_> {
    /// Declares a signal on the class being registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignalExists`] if the class already declares `name`.
    /// A subclass may redeclare a name used by an ancestor; lookups find
    /// the most-derived declaration.
    pub fn signal_new(&mut self, name: &str, has_param: bool) -> Result<SignalId> {
        let sym = self.names.intern(name);
        if self.record.signals.contains_key(&sym) {
            error!("signal '{name}' already declared on type {}", self.record.index.as_u32());
            return Err(Error::SignalExists { name: name.to_string() });
        }

        let id = SignalId(u32::try_from(self.signals.len()).expect("signal id overflow"));
        self.signals.push(SignalRecord {
            name: sym,
            owner: self.record.index,
            has_param,
            handlers: Vec::new(),
        });
        self.record.signals.insert(sym, id);
        Ok(id)
    }
}

impl TypeRegistry {
    fn find_signal(&self, class: ClassId, sym: Symbol, walk_parents: bool) -> Option<SignalId> {
        let mut chain = self.chain(class);
        if walk_parents {
            chain.find_map(|record| record.signals.get(&sym).copied())
        } else {
            chain.next().and_then(|record| record.signals.get(&sym).copied())
        }
    }
}

impl Runtime {
    /// Connects a zero-argument listener to `name`.
    ///
    /// The signal is looked up on the object's class, then on each ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObject`] for a freed object and
    /// [`Error::SignalKindMismatch`] if the signal carries a parameter.
    ///
    /// # Panics
    ///
    /// Panics if no class in the chain declares `name`.
    pub fn signal_connect(
        &self,
        obj: Object,
        name: &str,
        callback: impl Fn(&Runtime, Object) + 'static,
    ) -> Result<HandlerId> {
        self.connect_handler(obj, name, true, Callback::Plain(Rc::new(callback)))
    }

    /// Connects a one-argument listener to `name`.
    ///
    /// Only the object's own class is searched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObject`] for a freed object and
    /// [`Error::SignalKindMismatch`] if the signal takes no parameter.
    ///
    /// # Panics
    ///
    /// Panics if the object's class does not itself declare `name`.
    pub fn signal_connect_with_param(
        &self,
        obj: Object,
        name: &str,
        callback: impl Fn(&Runtime, Object, &dyn Any) + 'static,
    ) -> Result<HandlerId> {
        self.connect_handler(obj, name, false, Callback::WithParam(Rc::new(callback)))
    }

    fn connect_handler(
        &self,
        obj: Object,
        name: &str,
        walk_parents: bool,
        callback: Callback,
    ) -> Result<HandlerId> {
        let class = self.object_type(obj)?;

        let mut types = self.types.borrow_mut();
        let found = self.names.borrow().get(name).and_then(|sym| {
            types
                .as_ref()
                .and_then(|registry| registry.find_signal(class, sym, walk_parents))
        });
        let Some(id) = found else {
            panic!(
                "signal '{name}' is not declared on type {}{}",
                class.as_u32(),
                if walk_parents { " or its ancestors" } else { "" }
            );
        };

        let signal = types
            .as_mut()
            .and_then(|registry| registry.signals.get_mut(id.0 as usize))
            .ok_or(Error::InvalidSignal { id: id.0 })?;

        let wants_param = matches!(callback, Callback::WithParam(_));
        if signal.has_param != wants_param {
            error!(
                "listener variant does not match signal '{name}' (has_param = {})",
                signal.has_param
            );
            return Err(Error::SignalKindMismatch {
                name: name.to_string(),
                has_param: signal.has_param,
            });
        }

        let seq = HandlerId(signal.handlers.last().map_or(1, |head| head.id.0 + 1));
        signal.handlers.push(Handler {
            id: seq,
            callback,
            instance: obj,
        });
        trace!("connected listener {} to signal '{name}' from {:?}", seq.0, obj);
        Ok(seq)
    }

    /// Emits a zero-argument signal.
    ///
    /// Emitting a signal with no listeners does nothing.
    pub fn signal_emit(&self, signal: SignalId) {
        for (callback, instance) in self.snapshot_handlers(signal, false) {
            if let Callback::Plain(f) = callback {
                f(self, instance);
            }
        }
    }

    /// Emits a one-argument signal with `param`.
    pub fn signal_emit_with_param(&self, signal: SignalId, param: &dyn Any) {
        for (callback, instance) in self.snapshot_handlers(signal, true) {
            if let Callback::WithParam(f) = callback {
                f(self, instance, param);
            }
        }
    }

    /// Head-to-tail copy of the chain, empty on a precondition violation.
    fn snapshot_handlers(&self, signal: SignalId, with_param: bool) -> Vec<(Callback, Object)> {
        let types = self.types.borrow();
        let Some(record) = types.as_ref().and_then(|registry| registry.signals.get(signal.0 as usize))
        else {
            error!("emit on invalid signal {}", signal.0);
            return Vec::new();
        };

        if record.has_param != with_param {
            error!(
                "emission variant does not match signal {} (has_param = {})",
                signal.0, record.has_param
            );
            return Vec::new();
        }

        record
            .handlers
            .iter()
            .rev()
            .map(|handler| (handler.callback.clone(), handler.instance))
            .collect()
    }

    /// Finds `name` on `class` or one of its ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignalNotFound`] if no class in the chain declares it.
    pub fn signal_lookup(&self, class: ClassId, name: &str) -> Result<SignalId> {
        let types = self.types.borrow();
        let found = self.names.borrow().get(name).and_then(|sym| {
            types
                .as_ref()
                .filter(|registry| class.index() < registry.class_count())
                .and_then(|registry| registry.find_signal(class, sym, true))
        });

        found.ok_or_else(|| {
            error!("signal '{name}' not found on type {}", class.as_u32());
            Error::SignalNotFound { name: name.to_string() }
        })
    }

    /// Finds `name` starting at the class of `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObject`] or [`Error::SignalNotFound`].
    pub fn object_find_signal(&self, obj: Object, name: &str) -> Result<SignalId> {
        let class = self.object_type(obj)?;
        self.signal_lookup(class, name)
    }

    /// Number of listeners connected to `signal`.
    #[must_use]
    pub fn signal_listener_count(&self, signal: SignalId) -> usize {
        self.with_signal(signal, |record| record.handlers.len()).unwrap_or(0)
    }

    /// Name `signal` was declared with.
    #[must_use]
    pub fn signal_name(&self, signal: SignalId) -> Option<String> {
        let sym = self.with_signal(signal, |record| record.name)?;
        self.names.borrow().resolve(sym).map(str::to_string)
    }

    /// Whether `signal` carries a parameter.
    #[must_use]
    pub fn signal_has_param(&self, signal: SignalId) -> Option<bool> {
        self.with_signal(signal, |record| record.has_param)
    }

    /// Class that declared `signal`.
    #[must_use]
    pub fn signal_owner(&self, signal: SignalId) -> Option<ClassId> {
        self.with_signal(signal, |record| record.owner)
    }

    fn with_signal<R>(&self, signal: SignalId, f: impl FnOnce(&SignalRecord) -> R) -> Option<R> {
        let types = self.types.borrow();
        types
            .as_ref()
            .and_then(|registry| registry.signals.get(signal.0 as usize))
            .map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeDescriptor;
    use std::cell::{Cell, RefCell};

    fn window_class(rt: &Runtime) -> ClassId {
        rt.type_register(
            TypeDescriptor::new(16).with_name("Window").with_class_init(|class| {
                class.signal_new("close", false).unwrap();
                class.signal_new("resize", true).unwrap();
            }),
            ClassId::ROOT,
        )
        .unwrap()
    }

    #[test]
    fn test_listeners_run_last_connected_first() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["L1", "L2", "L3"] {
            let order = Rc::clone(&order);
            rt.signal_connect(obj, "close", move |_, _| order.borrow_mut().push(tag))
                .unwrap();
        }

        rt.signal_emit(rt.object_find_signal(obj, "close").unwrap());
        assert_eq!(*order.borrow(), ["L3", "L2", "L1"]);
    }

    #[test]
    fn test_sequence_ids_start_at_one() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();

        let first = rt.signal_connect(obj, "close", |_, _| {}).unwrap();
        let second = rt.signal_connect(obj, "close", |_, _| {}).unwrap();
        let other = rt.signal_connect_with_param(obj, "resize", |_, _, _| {}).unwrap();

        assert_eq!(first.as_u32(), 1);
        assert_eq!(second.as_u32(), 2);
        assert_eq!(other.as_u32(), 1);
    }

    #[test]
    fn test_emit_without_listeners() {
        let rt = Runtime::new();
        let class = window_class(&rt);
        let close = rt.signal_lookup(class, "close").unwrap();

        rt.signal_emit(close);
        assert_eq!(rt.signal_listener_count(close), 0);
    }

    #[test]
    fn test_listener_receives_originating_object() {
        let rt = Runtime::new();
        let class = window_class(&rt);
        let a = rt.object_new(class).unwrap();
        let b = rt.object_new(class).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for obj in [a, b] {
            let seen = Rc::clone(&seen);
            rt.signal_connect(obj, "close", move |_, instance| seen.borrow_mut().push(instance))
                .unwrap();
        }

        // The chain belongs to the class, so one emission reaches both.
        rt.signal_emit(rt.signal_lookup(class, "close").unwrap());
        assert_eq!(*seen.borrow(), [b, a]);
    }

    #[test]
    fn test_emit_with_param() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();
        let size = Rc::new(Cell::new((0u32, 0u32)));

        let sink = Rc::clone(&size);
        rt.signal_connect_with_param(obj, "resize", move |_, _, param| {
            if let Some(dims) = param.downcast_ref::<(u32, u32)>() {
                sink.set(*dims);
            }
        })
        .unwrap();

        let resize = rt.object_find_signal(obj, "resize").unwrap();
        rt.signal_emit_with_param(resize, &(800u32, 600u32));
        assert_eq!(size.get(), (800, 600));
    }

    #[test]
    fn test_variant_mismatch() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();
        let calls = Rc::new(Cell::new(0));

        let err = rt.signal_connect(obj, "resize", |_, _| {}).unwrap_err();
        assert_eq!(
            err,
            Error::SignalKindMismatch {
                name: "resize".into(),
                has_param: true
            }
        );

        let counter = Rc::clone(&calls);
        rt.signal_connect(obj, "close", move |_, _| counter.set(counter.get() + 1))
            .unwrap();
        let close = rt.object_find_signal(obj, "close").unwrap();

        rt.signal_emit_with_param(close, &1u8);
        assert_eq!(calls.get(), 0);
        rt.signal_emit(close);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_connect_walks_parents() {
        let rt = Runtime::new();
        let window = window_class(&rt);
        let dialog = rt.type_register(TypeDescriptor::new(16), window).unwrap();
        let obj = rt.object_new(dialog).unwrap();

        assert!(rt.signal_connect(obj, "close", |_, _| {}).is_ok());
        assert_eq!(
            rt.object_find_signal(obj, "close"),
            rt.signal_lookup(window, "close")
        );
    }

    #[test]
    #[should_panic(expected = "signal 'resize' is not declared")]
    fn test_connect_with_param_does_not_walk_parents() {
        let rt = Runtime::new();
        let window = window_class(&rt);
        let dialog = rt.type_register(TypeDescriptor::new(16), window).unwrap();
        let obj = rt.object_new(dialog).unwrap();

        let _ = rt.signal_connect_with_param(obj, "resize", |_, _, _| {});
    }

    #[test]
    #[should_panic(expected = "signal 'missing' is not declared")]
    fn test_connect_unknown_signal_panics() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();
        let _ = rt.signal_connect(obj, "missing", |_, _| {});
    }

    #[test]
    fn test_duplicate_signal_rejected_subclass_may_shadow() {
        let rt = Runtime::new();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);

        let base = rt
            .type_register(
                TypeDescriptor::new(8).with_class_init(move |class| {
                    sink.borrow_mut().push(class.signal_new("tick", false).is_ok());
                    sink.borrow_mut().push(class.signal_new("tick", false).is_ok());
                }),
                ClassId::ROOT,
            )
            .unwrap();
        assert_eq!(*results.borrow(), [true, false]);

        let leaf = rt
            .type_register(
                TypeDescriptor::new(8).with_class_init(|class| {
                    class.signal_new("tick", true).unwrap();
                }),
                base,
            )
            .unwrap();

        let inherited = rt.signal_lookup(base, "tick").unwrap();
        let shadowed = rt.signal_lookup(leaf, "tick").unwrap();
        assert_ne!(inherited, shadowed);
        assert_eq!(rt.signal_owner(shadowed), Some(leaf));
        assert_eq!(rt.signal_has_param(shadowed), Some(true));
    }

    #[test]
    fn test_connect_during_emission_waits_for_next_emission() {
        let rt = Runtime::new();
        let obj = rt.object_new(window_class(&rt)).unwrap();
        let late_calls = Rc::new(Cell::new(0));

        let late = Rc::clone(&late_calls);
        rt.signal_connect(obj, "close", move |rt, instance| {
            let late = Rc::clone(&late);
            rt.signal_connect(instance, "close", move |_, _| late.set(late.get() + 1))
                .unwrap();
        })
        .unwrap();

        let close = rt.object_find_signal(obj, "close").unwrap();
        rt.signal_emit(close);
        assert_eq!(late_calls.get(), 0);
        assert_eq!(rt.signal_listener_count(close), 2);

        rt.signal_emit(close);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_signal_metadata() {
        let rt = Runtime::new();
        let class = window_class(&rt);
        let resize = rt.signal_lookup(class, "resize").unwrap();

        assert_eq!(rt.signal_name(resize).as_deref(), Some("resize"));
        assert_eq!(rt.signal_has_param(resize), Some(true));
        assert_eq!(rt.signal_owner(resize), Some(class));
        assert_eq!(rt.class_of(class).unwrap().signal_count, 2);
        assert_eq!(
            rt.signal_lookup(class, "key-down"),
            Err(Error::SignalNotFound { name: "key-down".into() })
        );
    }
}
