//! Identifier interning.
//!
//! The parser interns every identifier it sees, so later stages compare and
//! hash names as plain integers. Only the printers and error messages ever
//! look the text back up.

use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData, num::NonZeroU32, rc::Rc};

/// A handle to a value owned by an [`Interner`]. Handles from different
/// interners must not be mixed.
pub struct Interned<T: ?Sized> {
    // Non-zero so that `Option<Interned<_>>` stays four bytes.
    id: NonZeroU32,
    _ty: PhantomData<fn() -> Rc<T>>,
}

impl<T: ?Sized> Interned<T> {
    fn new(id: NonZeroU32) -> Self {
        Interned {
            id,
            _ty: PhantomData,
        }
    }

    fn slot(self) -> usize {
        self.id.get() as usize - 1
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

impl<T: ?Sized> From<&Interned<T>> for Interned<T> {
    fn from(value: &Interned<T>) -> Self {
        *value
    }
}

/// Owns the interned values. Each distinct value is stored once, in
/// first-seen order.
pub struct Interner<T: ?Sized> {
    ids: HashMap<Rc<T>, Interned<T>>,
    values: Vec<Rc<T>>,
}

impl Interner<str> {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            ids: HashMap::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn intern(&mut self, name: &str) -> Interned<str> {
        if let Some(&interned) = self.ids.get(name) {
            return interned;
        }
        let id = u32::try_from(self.values.len() + 1)
            .ok()
            .and_then(NonZeroU32::new)
            .expect("too many distinct identifiers");
        let interned = Interned::new(id);
        let name: Rc<str> = Rc::from(name);
        self.values.push(Rc::clone(&name));
        self.ids.insert(name, interned);
        interned
    }

    /// Panics if the handle comes from another interner.
    pub fn get(&self, handle: impl Into<Interned<str>>) -> &str {
        &self.values[handle.into().slot()]
    }
}

impl fmt::Debug for Interner<str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.values).finish()
    }
}
