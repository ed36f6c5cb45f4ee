//! Lightweight handle types for shared ownership and weak back-references.
//!
//! Provide two complementary handle types:
//! - [Handle<T>] owns a strong reference to an object using [alloc::sync::Arc]. Use it where
//!   shared, long-lived ownership is required (for example a registry entry that keeps a
//!   driver host alive).
//! - [HandleRef<T>] stores a weak reference ([alloc::sync::Weak]) and is suitable for
//!   back-references or pending continuations that must not keep the target alive.
//!
//! Key guarantees and semantics:
//! - Call [Handle::create_ref] to derive a [HandleRef] from an existing strong [Handle].
//! - Call [HandleRef::get_handle] to attempt an upgrade; it returns [None] if the strong owner(s)
//!   have dropped the object. **Consumers must handle the [None] case explicitly.**
use alloc::sync::{Arc, Weak};
use core::ops::Deref;

#[derive(Debug)]
/// Strong owning handle backed by [Arc<T>].
///
/// The inner value is reference-counted; cloning the handle increments the count.
/// Use [Handle<T>::create_ref] to produce a weak [HandleRef<T>] for back-references.
pub struct Handle<T: ?Sized> {
    inner: Arc<T>,
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl<T: ?Sized> From<Arc<T>> for Handle<T> {
    fn from(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Handle<T> {
    /// Construct a value that needs a weak reference to itself while it is being built.
    ///
    /// The [HandleRef<T>] passed to `build` cannot be upgraded until this call returns.
    pub fn new_cyclic(build: impl FnOnce(&HandleRef<T>) -> T) -> Handle<T> {
        let inner = Arc::new_cyclic(|weak| {
            build(&HandleRef {
                inner: weak.clone(),
            })
        });
        Handle { inner }
    }
}

impl<T: ?Sized> Handle<T> {
    /// Create a non-owning [HandleRef<T>] that refers to the same underlying object.
    ///
    /// The returned [HandleRef<T>] does not increment the strong reference count and
    /// must be upgraded with [HandleRef::get_handle] before use.
    pub fn create_ref(&self) -> HandleRef<T> {
        HandleRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Return true if both handles point at the same object.
    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Debug)]
/// Weak (non-owning) handle backed by [Weak<T>].
///
/// A [HandleRef<T>] represents an optional reference to an object which may be destroyed
/// independently of the referrers. Use [HandleRef<T>::get_handle] to attempt to obtain a strong [Handle<T>].
pub struct HandleRef<T: ?Sized> {
    inner: Weak<T>,
}

impl<T: ?Sized> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> HandleRef<T> {
    /// A reference that never upgrades.
    pub const fn new() -> HandleRef<T> {
        HandleRef { inner: Weak::new() }
    }
}

impl<T> Default for HandleRef<T> {
    fn default() -> Self {
        HandleRef::new()
    }
}

impl<T: ?Sized> HandleRef<T> {
    /// Attempt to upgrade the weak reference into a strong [Handle<T>].
    ///
    /// Return `Some(Handle<T>)` if the target is still alive, otherwise return `None`.
    /// **Always check the result** before dereferencing the returned handle.
    pub fn get_handle(&self) -> Option<Handle<T>> {
        Weak::upgrade(&self.inner).map(|inner| Handle { inner })
    }

    /// Return true once every strong owner has released the target.
    pub fn is_expired(&self) -> bool {
        self.inner.strong_count() == 0
    }

    /// Return true if both references point at the same allocation.
    pub fn ptr_eq(&self, other: &HandleRef<T>) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}
