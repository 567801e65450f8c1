//! String interning with [`Symbol`] ids.
//!
//! Signal names and user-data keys are compared far more often than they
//! are created, so the runtime stores them once and passes 32-bit symbols
//! around instead.
//!
//! # Examples
//!
//! ```
//! use sigrt_mem::StringInterner;
//!
//! let mut interner = StringInterner::new();
//!
//! let close = interner.intern("close");
//! assert_eq!(interner.intern("close"), close);
//! assert_ne!(interner.intern("resize"), close);
//!
//! assert_eq!(interner.resolve(close), Some("close"));
//! assert_eq!(interner.get("key-down"), None);
//! ```

use hashbrown::HashMap;
use std::fmt;

/// Interned string id.
///
/// Ids are dense and assigned in interning order, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw id.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Raw id as an index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Bidirectional string table.
#[derive(Default)]
pub struct StringInterner {
    strings: Vec<Box<str>>,
    symbols: HashMap<Box<str>, Symbol>,
}

impl StringInterner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for `s`, interning it on first sight.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` distinct strings are interned.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.symbols.get(s) {
            return sym;
        }

        let id = u32::try_from(self.strings.len()).expect("interner symbol overflow");
        let sym = Symbol(id);
        self.strings.push(Box::from(s));
        self.symbols.insert(Box::from(s), sym);
        sym
    }

    /// Looks up `s` without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.symbols.get(s).copied()
    }

    /// Returns the string behind `sym`, or `None` for a foreign symbol.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.as_usize()).map(AsRef::as_ref)
    }

    /// Number of distinct strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.strings.iter()).finish()
    }
}
