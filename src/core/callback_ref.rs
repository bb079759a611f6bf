//! # Callback References
//!
//! A `CallbackRef` is a fixed-identity handle onto a callback slot. Whoever
//! owns the configuration calls `set()` with the freshest callback on every
//! pass; everyone else keeps the same handle and always reaches the latest
//! callback when they invoke it.
//!
//! ```text
//! set(Some(cb1)) ─┐
//! set(Some(cb2)) ─┼─►  slot  ◄── handle.invoke(..)   → runs cb2
//! set(None)      ─┘            handle.invoke(..)   → None (no-op)
//! ```
//!
//! The slot is read at invocation time, never captured, so there are no
//! stale closures. Swapping the callback does not change the handle, so it
//! never looks like a "new" value to logic that compares handles.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// A shared, swappable callback slot with a stable identity.
///
/// `F` is usually a trait object such as `dyn Fn(&str) + Send + Sync`.
/// Clones share the same slot (see [`CallbackRef::ptr_eq`]).
pub struct CallbackRef<F: ?Sized> {
    slot: Arc<ArcSwapOption<Box<F>>>,
}

impl<F: ?Sized> CallbackRef<F> {
    pub fn new(callback: Option<Box<F>>) -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::new(callback.map(Arc::new))),
        }
    }

    /// Creates a handle with nothing in the slot. Invoking it is a no-op.
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Replaces whatever callback is in the slot. `None` clears it.
    pub fn set(&self, callback: Option<Box<F>>) {
        self.slot.store(callback.map(Arc::new));
    }

    pub fn is_set(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Returns an owned reference to the current callback, if any.
    ///
    /// The returned `Arc` keeps that callback alive even if the slot is
    /// swapped afterwards.
    pub fn current(&self) -> Option<Arc<Box<F>>> {
        self.slot.load_full()
    }

    /// Runs `f` against the current callback and returns its result, or
    /// `None` when the slot is empty.
    ///
    /// The slot is not borrowed while `f` runs, so a callback may call
    /// `set()` on its own handle.
    pub fn invoke<R>(&self, f: impl FnOnce(&F) -> R) -> Option<R> {
        let current = self.slot.load_full()?;
        Some(f(&**current))
    }

    /// True if both handles point at the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<A, R> CallbackRef<dyn Fn(A) -> R + Send + Sync> {
    pub fn from_fn(callback: impl Fn(A) -> R + Send + Sync + 'static) -> Self {
        Self::new(Some(Box::new(callback)))
    }

    /// Forwards `arg` to the current callback.
    pub fn call(&self, arg: A) -> Option<R> {
        self.invoke(|f| f(arg))
    }
}

impl<F: ?Sized> Clone for CallbackRef<F> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<F: ?Sized> Default for CallbackRef<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackRef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRef")
            .field("set", &self.is_set())
            .finish()
    }
}
