use parking_lot::ReentrantMutex;
use std::cell::RefCell;

/// One lock domain: a set of caches that are always mutated together.
///
/// The lock is re-entrant, so a thread already holding it (for example while a guard is alive
/// around a batch) can acquire it again without deadlocking. Access to the value is not: the
/// closure passed to [`CacheGroup::with`] must never call `with` on the same group, because the
/// nested mutable borrow panics. Every caller inside this crate takes the value, finishes, and
/// returns before touching the group again.
pub(crate) struct CacheGroup<T> {
    name: &'static str,
    inner: ReentrantMutex<RefCell<T>>,
}

impl<T> CacheGroup<T> {
    pub(crate) fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: ReentrantMutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the group's caches. Not re-entrant; see the type docs.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let guard = self.inner.lock();
        let mut value = guard.borrow_mut();
        f(&mut value)
    }
}

impl<T> std::fmt::Debug for CacheGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGroup").field("name", &self.name).finish()
    }
}
