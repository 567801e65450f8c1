//! Type registry: class records and single inheritance.
//!
//! Classes are registered with a [`TypeDescriptor`] and a parent type id
//! and receive the next integer id. Records are kept in a table indexed by
//! id; the parent link is an id too, so the inheritance chain is walked by
//! index rather than through pointers.
//!
//! # Architecture
//!
//! - Type id 0 is the implicit root class. It is created together with the
//!   table on the first registration and cannot be instantiated or looked
//!   up through [`Runtime::class_of`].
//! - Ids are assigned in registration order (the first user type is 1) and
//!   never reused. Records live as long as the [`Runtime`].
//! - A class-init callback runs once, during registration, with a
//!   [`ClassInit`] through which the class declares its signals and
//!   installs its dispose and finalize hooks.
//! - Dropping the runtime destroys every record; a descriptor's destroy
//!   callback runs at that point.

use crate::error::{Error, Result};
use crate::object::{BASE_INSTANCE_SIZE, Object};
use crate::runtime::Runtime;
use crate::signal::{SignalId, SignalRecord};
use fxhash::FxHashMap;
use sigrt_log::{debug, error};
use sigrt_mem::{StringInterner, Symbol};
use std::fmt;
use std::rc::Rc;

/// Integer type id of a registered class.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// The implicit root class.
    pub const ROOT: ClassId = ClassId(0);

    /// Builds an id from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Dispose or finalize hook.
///
/// Receives the object being released; the object is still alive while
/// the hook runs.
pub type LifecycleHook = Rc<dyn Fn(&Runtime, Object)>;

type ClassInitFn = Box<dyn FnOnce(&mut ClassInit<'_>)>;

/// Layout and callbacks of a class, handed to [`Runtime::type_register`].
///
/// # Example
///
/// ```rust
/// use sigrt::{ClassId, Runtime, TypeDescriptor};
///
/// let rt = Runtime::new();
/// let window = rt
///     .type_register(
///         TypeDescriptor::new(64).with_name("Window").with_class_init(|class| {
///             class.signal_new("close", false).unwrap();
///             class.signal_new("resize", true).unwrap();
///         }),
///         ClassId::ROOT,
///     )
///     .unwrap();
///
/// assert_eq!(rt.class_of(window).unwrap().name.as_deref(), Some("Window"));
/// ```
pub struct TypeDescriptor {
    name: Option<String>,
    instance_size: usize,
    class_init: Option<ClassInitFn>,
    destroy: Option<Box<dyn FnOnce()>>,
}

impl TypeDescriptor {
    /// Describes a class whose instances are `instance_size` bytes.
    #[must_use]
    pub fn new(instance_size: usize) -> Self {
        Self {
            name: None,
            instance_size,
            class_init: None,
            destroy: None,
        }
    }

    /// Diagnostic name used in logs and [`ClassInfo`].
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Callback run once during registration.
    #[must_use]
    pub fn with_class_init(mut self, init: impl FnOnce(&mut ClassInit<'_>) + 'static) -> Self {
        self.class_init = Some(Box::new(init));
        self
    }

    /// Callback run when the class record is destroyed.
    #[must_use]
    pub fn with_destroy(mut self, destroy: impl FnOnce() + 'static) -> Self {
        self.destroy = Some(Box::new(destroy));
        self
    }

    /// Declared instance size in bytes.
    #[must_use]
    pub fn instance_size(&self) -> usize {
        self.instance_size
    }
}

impl Drop for TypeDescriptor {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy.take() {
            destroy();
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("instance_size", &self.instance_size)
            .field("class_init", &self.class_init.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

pub(crate) struct ClassRecord {
    pub(crate) parent: Option<ClassId>,
    pub(crate) index: ClassId,
    pub(crate) descriptor: TypeDescriptor,
    pub(crate) signals: FxHashMap<Symbol, SignalId>,
    pub(crate) dispose: Option<LifecycleHook>,
    pub(crate) finalize: Option<LifecycleHook>,
}

impl ClassRecord {
    fn new(index: ClassId, parent: Option<ClassId>, descriptor: TypeDescriptor) -> Self {
        Self {
            parent,
            index,
            descriptor,
            signals: FxHashMap::default(),
            dispose: None,
            finalize: None,
        }
    }

    fn display_name(&self) -> String {
        match &self.descriptor.name {
            Some(name) => format!("{name}#{}", self.index.0),
            None => format!("#{}", self.index.0),
        }
    }
}

pub(crate) struct TypeRegistry {
    pub(crate) classes: Vec<ClassRecord>,
    pub(crate) signals: Vec<SignalRecord>,
}

impl TypeRegistry {
    fn new(capacity: usize) -> Self {
        let mut classes = Vec::with_capacity(capacity.max(1));
        classes.push(ClassRecord::new(
            ClassId::ROOT,
            None,
            TypeDescriptor::new(BASE_INSTANCE_SIZE).with_name("Root"),
        ));
        Self {
            classes,
            signals: Vec::new(),
        }
    }

    pub(crate) fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Record for a user type; the root is not addressable.
    pub(crate) fn class(&self, id: ClassId) -> Option<&ClassRecord> {
        if id == ClassId::ROOT {
            return None;
        }
        self.classes.get(id.index())
    }

    /// `id` followed by each ancestor, ending at the root.
    pub(crate) fn chain(&self, id: ClassId) -> impl Iterator<Item = &ClassRecord> {
        let mut next = self.classes.get(id.index());
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.and_then(|p| self.classes.get(p.index()));
            Some(current)
        })
    }
}

/// Handle given to a class-init callback.
///
/// Declares signals (see [`ClassInit::signal_new`]) and installs lifecycle
/// hooks on the class being registered.
pub struct ClassInit<'a> {
    pub(crate) record: &'a mut ClassRecord,
    pub(crate) signals: &'a mut Vec<SignalRecord>,
    pub(crate) names: &'a mut StringInterner,
}

impl ClassInit<'_> {
    /// Id the class will be registered under.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.record.index
    }

    /// Parent type id.
    #[must_use]
    pub fn parent(&self) -> ClassId {
        self.record.parent.unwrap_or(ClassId::ROOT)
    }

    /// Installs the dispose hook, run on every [`Runtime::object_unref`].
    pub fn set_dispose(&mut self, hook: impl Fn(&Runtime, Object) + 'static) {
        self.record.dispose = Some(Rc::new(hook));
    }

    /// Installs the finalize hook, run once on the last release.
    pub fn set_finalize(&mut self, hook: impl Fn(&Runtime, Object) + 'static) {
        self.record.finalize = Some(Rc::new(hook));
    }
}

/// Snapshot of a class record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub id: ClassId,
    /// Parent type id; [`ClassId::ROOT`] for direct subclasses of the root.
    pub parent: ClassId,
    pub name: Option<String>,
    pub instance_size: usize,
    pub has_dispose: bool,
    pub has_finalize: bool,
    /// Signals declared by this class itself.
    pub signal_count: usize,
}

impl Runtime {
    /// Registers a class under `parent` and returns its type id.
    ///
    /// The first call creates the table with the implicit root. The
    /// descriptor's class-init callback runs before the record is added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParent`] if `parent` is not in the table.
    ///
    /// # Panics
    ///
    /// Panics if the class-init callback calls back into this runtime's
    /// registry, or if more than `u32::MAX` classes are registered.
    pub fn type_register(&self, mut descriptor: TypeDescriptor, parent: ClassId) -> Result<ClassId> {
        let mut types = self.types.borrow_mut();
        let registry = types.get_or_insert_with(|| TypeRegistry::new(self.config().class_capacity));

        if parent.index() >= registry.classes.len() {
            error!("cannot register type: parent type id {} is not registered", parent.0);
            return Err(Error::InvalidParent { id: parent.0 });
        }

        let id = ClassId(u32::try_from(registry.classes.len()).expect("type id overflow"));
        let class_init = descriptor.class_init.take();
        let mut record = ClassRecord::new(id, Some(parent), descriptor);

        if let Some(init) = class_init {
            let mut names = self.names.borrow_mut();
            init(&mut ClassInit {
                record: &mut record,
                signals: &mut registry.signals,
                names: &mut *names,
            });
        }

        debug!(
            "registered type {} (parent {}, {} bytes, {} signals)",
            record.display_name(),
            parent.0,
            record.descriptor.instance_size,
            record.signals.len()
        );
        registry.classes.push(record);
        Ok(id)
    }

    /// Looks up a registered class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClass`] for the root id, an id past the end
    /// of the table, or any id before the first registration.
    pub fn class_of(&self, id: ClassId) -> Result<ClassInfo> {
        let types = self.types.borrow();
        let Some(record) = types.as_ref().and_then(|registry| registry.class(id)) else {
            error!("type id {} is not a registered type", id.0);
            return Err(Error::InvalidClass { id: id.0 });
        };

        Ok(ClassInfo {
            id: record.index,
            parent: record.parent.unwrap_or(ClassId::ROOT),
            name: record.descriptor.name.clone(),
            instance_size: record.descriptor.instance_size,
            has_dispose: record.dispose.is_some(),
            has_finalize: record.finalize.is_some(),
            signal_count: record.signals.len(),
        })
    }

    /// Returns `true` if `id` is `ancestor` or inherits from it.
    ///
    /// Every registered class is-a [`ClassId::ROOT`]. Unknown ids are never
    /// related to anything.
    #[must_use]
    pub fn class_is_a(&self, id: ClassId, ancestor: ClassId) -> bool {
        let types = self.types.borrow();
        let Some(registry) = types.as_ref() else {
            return false;
        };
        if id.index() >= registry.classes.len() {
            return false;
        }
        registry.chain(id).any(|record| record.index == ancestor)
    }

    /// Number of registered classes, the root included once the table exists.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.types.borrow().as_ref().map_or(0, TypeRegistry::class_count)
    }

    /// Dispose and finalize hooks from `id` up to the root.
    pub(crate) fn lifecycle_hooks(&self, id: ClassId) -> (Vec<LifecycleHook>, Vec<LifecycleHook>) {
        let types = self.types.borrow();
        let mut dispose = Vec::new();
        let mut finalize = Vec::new();

        if let Some(registry) = types.as_ref() {
            for record in registry.chain(id) {
                dispose.extend(record.dispose.clone());
                finalize.extend(record.finalize.clone());
            }
        }
        (dispose, finalize)
    }
}
