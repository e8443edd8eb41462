//! An abstraction over whatever thread-safe shared pointer type (i.e. Arc<T>-like) 
//! the library has decided to use. 
//! 
//! This is used for registries shared between many agents (curves, world-state 
//! computations, operator factories), where we need cheap clone()s and dynamic dispatch.

use bevy::platform::sync::Arc;

/// The underlying 'backend' type for ThreadSafeRef
type ThreadSafeRefValue<T> = Arc<T>;

/// An abstraction over whatever thread-safe shared pointer type (i.e. [`Arc<T>`]-like) 
/// the library has decided to use.
/// 
/// The backing library's datatype should be treated as a hidden implementation detail. 
/// 
/// Note that this type does NOT provide weakrefs.
#[derive(Debug, Default)]
pub struct ThreadSafeRef<T: ?Sized> {
    wrapped: ThreadSafeRefValue<T>
}

impl<T> ThreadSafeRef<T> {
    #[inline]
    pub fn new(val: T) -> Self {
        Self { wrapped: Arc::new(val) }
    }
}

impl<T: Clone> ThreadSafeRef<T> {
    /// Copy-on-write access. 
    /// 
    /// If this is the only handle, mutates in place; otherwise clones the value first, 
    /// so any other holders keep seeing the old version.
    #[inline]
    pub fn make_mut(&mut self) -> &mut T {
        Arc::make_mut(&mut self.wrapped)
    }
}

impl<T: ?Sized> ThreadSafeRef<T> {
    #[inline]
    pub fn new_from_ref(val: ThreadSafeRefValue<T>) -> Self {
        Self { wrapped: val }
    }

    /// True if both handles point at the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.wrapped, &other.wrapped)
    }
}

impl<T: ?Sized> Clone for ThreadSafeRef<T> {
    fn clone(&self) -> Self {
        Self::new_from_ref(self.wrapped.clone())
    }
}

impl<T: ?Sized> From<Arc<T>> for ThreadSafeRef<T> {
    fn from(value: Arc<T>) -> Self {
        Self::new_from_ref(value)
    }
}

impl<T: ?Sized> core::ops::Deref for ThreadSafeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.wrapped.deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_mut_does_not_leak_into_other_handles() {
        let mut first = ThreadSafeRef::new(vec![1, 2]);
        let second = first.clone();
        assert!(first.ptr_eq(&second));

        first.make_mut().push(3);
        assert_eq!(*first, vec![1, 2, 3]);
        assert_eq!(*second, vec![1, 2]);
        assert!(!first.ptr_eq(&second));
    }
}
