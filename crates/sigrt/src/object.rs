//! Object allocation, reference counting and per-instance user data.
//!
//! # Architecture
//!
//! Objects live in the runtime's slot arena and are addressed through
//! [`Object`] handles (index plus generation). A handle is `Copy` and does
//! not own a reference: references are taken and dropped explicitly with
//! [`Runtime::object_ref`] and [`Runtime::object_unref`]. Once an object is
//! freed its handles stop resolving, and any further use is reported as a
//! precondition violation instead of touching a recycled slot.
//!
//! Each object owns:
//! - the type id of its class
//! - an atomic reference count, 1 at construction
//! - a zero-filled instance block of `max(instance_size, BASE_INSTANCE_SIZE)`
//!   bytes
//! - a keyed user-data store
//!
//! # Release protocol
//!
//! Every call to [`Runtime::object_unref`] first runs the dispose hook of
//! the object's class and of each ancestor, most-derived first, whether or
//! not this release is the last one. Only then is the count decremented.
//! If the count observed before the decrement was 1, the finalize hooks run
//! (most-derived first), the user-data store is torn down (running each
//! entry's destructor) and the object is freed.
//!
//! Calling `object_unref` three times on a fresh object therefore runs
//! dispose three times and finalize once.

use crate::error::{Error, Result};
use crate::registry::ClassId;
use crate::runtime::Runtime;
use fxhash::FxHashMap;
use sigrt_log::{error, trace};
use sigrt_mem::SlotKey;
use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Size of the object header every instance starts with: class pointer,
/// user-data table pointer and the reference count word.
pub const BASE_INSTANCE_SIZE: usize = 3 * std::mem::size_of::<usize>();

/// Handle to a runtime object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Object(pub(crate) SlotKey);

type DestroyFn = Box<dyn FnOnce(Rc<dyn Any>)>;

struct UserData {
    value: Rc<dyn Any>,
    destroy: Option<DestroyFn>,
}

impl UserData {
    fn release(self) {
        let UserData { value, destroy } = self;
        if let Some(destroy) = destroy {
            destroy(value);
        }
    }
}

pub(crate) struct ObjectRecord {
    pub(crate) class: ClassId,
    ref_count: AtomicU32,
    user_data: FxHashMap<Box<str>, UserData>,
    data: Box<[u8]>,
}

impl ObjectRecord {
    /// Runs every user-data destructor, skipping dispose and finalize.
    pub(crate) fn release_user_data(self) {
        for (_, entry) in self.user_data {
            entry.release();
        }
    }
}

impl Runtime {
    /// Creates an instance of `class` with a reference count of 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClass`] if `class` is not a registered type.
    pub fn object_new(&self, class: ClassId) -> Result<Object> {
        let size = {
            let types = self.types.borrow();
            match types.as_ref().and_then(|registry| registry.class(class)) {
                Some(record) => record.descriptor.instance_size().max(BASE_INSTANCE_SIZE),
                None => {
                    error!("cannot instantiate type id {}: not registered", class.as_u32());
                    return Err(Error::InvalidClass { id: class.as_u32() });
                }
            }
        };

        let record = ObjectRecord {
            class,
            ref_count: AtomicU32::new(1),
            user_data: FxHashMap::default(),
            data: vec![0u8; size].into_boxed_slice(),
        };
        let obj = Object(self.objects.borrow_mut().insert(record));
        trace!("new object {:?} of type {}", obj.0, class.as_u32());
        Ok(obj)
    }

    /// Takes a reference and returns the same handle.
    ///
    /// # Panics
    ///
    /// Panics if the reference count overflows.
    pub fn object_ref(&self, obj: Object) -> Object {
        let objects = self.objects.borrow();
        let Some(record) = objects.get(obj.0) else {
            error!("object_ref on invalid object {:?}", obj.0);
            return obj;
        };

        let old = record.ref_count.fetch_add(1, Ordering::AcqRel);
        if old == u32::MAX {
            panic!("Reference count overflow in object_ref");
        }
        obj
    }

    /// Drops a reference; see the module docs for the release protocol.
    pub fn object_unref(&self, obj: Object) {
        let class = {
            let objects = self.objects.borrow();
            match objects.get(obj.0) {
                Some(record) if record.ref_count.load(Ordering::Acquire) == 0 => {
                    error!("object_unref on object {:?} during finalization", obj.0);
                    return;
                }
                Some(record) => record.class,
                None => {
                    error!("object_unref on invalid object {:?}", obj.0);
                    return;
                }
            }
        };

        let (dispose, finalize) = self.lifecycle_hooks(class);
        for hook in &dispose {
            hook(self, obj);
        }

        let old = {
            let objects = self.objects.borrow();
            match objects.get(obj.0) {
                Some(record) => record.ref_count.fetch_sub(1, Ordering::AcqRel),
                None => {
                    error!("object {:?} was freed by its own dispose hook", obj.0);
                    return;
                }
            }
        };
        trace!("unref object {:?}: {} -> {}", obj.0, old, old - 1);

        if old != 1 {
            return;
        }

        for hook in &finalize {
            hook(self, obj);
        }

        let record = self.objects.borrow_mut().remove(obj.0);
        if let Some(record) = record {
            record.release_user_data();
        }
        trace!("freed object {:?}", obj.0);
    }

    /// Returns `true` while `obj` has not been freed.
    #[must_use]
    pub fn object_is_alive(&self, obj: Object) -> bool {
        self.objects.borrow().contains(obj.0)
    }

    /// Current reference count, `None` for a freed object.
    #[must_use]
    pub fn object_refcount(&self, obj: Object) -> Option<u32> {
        self.objects
            .borrow()
            .get(obj.0)
            .map(|record| record.ref_count.load(Ordering::Acquire))
    }

    /// Type id of `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObject`] for a freed object.
    pub fn object_type(&self, obj: Object) -> Result<ClassId> {
        match self.objects.borrow().get(obj.0) {
            Some(record) => Ok(record.class),
            None => {
                error!("object_type on invalid object {:?}", obj.0);
                Err(Error::InvalidObject)
            }
        }
    }

    /// Returns `true` if `obj` is an instance of `class` or of a subclass.
    #[must_use]
    pub fn object_is_a(&self, obj: Object, class: ClassId) -> bool {
        let Some(own) = self.objects.borrow().get(obj.0).map(|record| record.class) else {
            return false;
        };
        self.class_is_a(own, class)
    }

    /// Size of the instance block in bytes.
    #[must_use]
    pub fn object_instance_size(&self, obj: Object) -> Option<usize> {
        self.objects.borrow().get(obj.0).map(|record| record.data.len())
    }

    /// Runs `f` on the instance block of `obj`.
    ///
    /// The block is detached from the object while `f` runs, so `f` may call
    /// back into the runtime; reading the same object's block from inside `f`
    /// sees an empty slice.
    pub fn object_with_data<R>(&self, obj: Object, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut data = {
            let mut objects = self.objects.borrow_mut();
            let Some(record) = objects.get_mut(obj.0) else {
                error!("object_with_data on invalid object {:?}", obj.0);
                return None;
            };
            std::mem::take(&mut record.data)
        };

        let result = f(&mut data);

        if let Some(record) = self.objects.borrow_mut().get_mut(obj.0) {
            record.data = data;
        }
        Some(result)
    }

    /// Stores `value` under `key`; the value is dropped when replaced,
    /// removed or when the object is freed.
    pub fn object_set_user_data<T: Any>(&self, obj: Object, key: &str, value: T) {
        self.insert_user_data(
            obj,
            key,
            UserData {
                value: Rc::new(value),
                destroy: None,
            },
        );
    }

    /// Stores `value` under `key` with a destructor.
    ///
    /// `destroy` runs when the entry is replaced, removed with
    /// [`Runtime::object_remove_user_data`], or torn down with the object.
    pub fn object_set_user_data_full<T: Any>(
        &self,
        obj: Object,
        key: &str,
        value: T,
        destroy: impl FnOnce(Rc<T>) + 'static,
    ) {
        let destroy: DestroyFn = Box::new(move |value: Rc<dyn Any>| {
            if let Ok(value) = value.downcast::<T>() {
                destroy(value);
            }
        });
        self.insert_user_data(
            obj,
            key,
            UserData {
                value: Rc::new(value),
                destroy: Some(destroy),
            },
        );
    }

    /// Value stored under `key`, if present and of type `T`.
    #[must_use]
    pub fn object_get_user_data<T: Any>(&self, obj: Object, key: &str) -> Option<Rc<T>> {
        let objects = self.objects.borrow();
        let Some(record) = objects.get(obj.0) else {
            error!("object_get_user_data on invalid object {:?}", obj.0);
            return None;
        };
        let value = Rc::clone(&record.user_data.get(key)?.value);
        value.downcast::<T>().ok()
    }

    /// Removes the entry under `key`, running its destructor.
    ///
    /// Returns `true` if an entry was removed.
    pub fn object_remove_user_data(&self, obj: Object, key: &str) -> bool {
        match self.take_user_data(obj, key) {
            Some(entry) => {
                entry.release();
                true
            }
            None => false,
        }
    }

    /// Removes the entry under `key` without running its destructor.
    pub fn object_steal_user_data<T: Any>(&self, obj: Object, key: &str) -> Option<Rc<T>> {
        self.take_user_data(obj, key)?.value.downcast::<T>().ok()
    }

    fn insert_user_data(&self, obj: Object, key: &str, entry: UserData) {
        let previous = {
            let mut objects = self.objects.borrow_mut();
            let Some(record) = objects.get_mut(obj.0) else {
                error!("object_set_user_data on invalid object {:?}", obj.0);
                return;
            };
            record.user_data.insert(key.into(), entry)
        };

        if let Some(previous) = previous {
            previous.release();
        }
    }

    fn take_user_data(&self, obj: Object, key: &str) -> Option<UserData> {
        let mut objects = self.objects.borrow_mut();
        let Some(record) = objects.get_mut(obj.0) else {
            error!("user data access on invalid object {:?}", obj.0);
            return None;
        };
        record.user_data.remove(key)
    }
}
