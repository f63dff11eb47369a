//! Printing of compiler data that refers to interned names.

use std::fmt;

use crate::util::intern::Interner;

pub mod error;
pub mod tree;

/// What printing needs besides the value itself.
pub struct Context<'ident> {
    pub ident_interner: &'ident Interner<str>,
}

/// Like [`fmt::Display`], for values that hold [`Interned`] names and so
/// can't print without the interner.
///
/// [`Interned`]: crate::util::intern::Interned
pub trait Show {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result;

    /// Pairs the value with `ctx` for use in `format!` and friends.
    fn display<'a>(&'a self, ctx: &'a Context<'_>) -> impl fmt::Display + 'a
    where
        Self: Sized,
    {
        Shown { value: self, ctx }
    }
}

struct Shown<'a, 'ident, T> {
    value: &'a T,
    ctx: &'a Context<'ident>,
}

impl<T: Show> fmt::Display for Shown<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.show(f, self.ctx)
    }
}
