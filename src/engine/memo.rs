//! Per-instance memoization for immutable models.
//!
//! Models never change after construction, so a lazily computed result is
//! valid for the lifetime of the instance. [`Memo`] is transparent to
//! equality: two models with equal fields compare equal whether or not their
//! caches have been filled.

use crate::error::SimResult;
use std::sync::OnceLock;

/// Lazily initialised, thread-safe cache slot.
pub struct Memo<T>(OnceLock<T>);

impl<T> Memo<T> {
    /// Empty cache slot.
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Cached value, if already computed.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }

    /// Cached value, computing it with `init` on first access.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(init)
    }

    /// Cached value, computing it with the fallible `init` on first access.
    ///
    /// Failures are not cached; the next call retries `init`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `init`.
    pub fn get_or_try_init(&self, init: impl FnOnce() -> SimResult<T>) -> SimResult<&T> {
        if let Some(value) = self.0.get() {
            return Ok(value);
        }
        let value = init()?;
        Ok(self.0.get_or_init(|| value))
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

// A clone starts cold so that a modified copy never sees stale results.
impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.0.get().is_some() { "filled" } else { "empty" };
        write!(f, "Memo({state})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use std::cell::Cell;

    #[test]
    fn test_init_runs_once() {
        let memo = Memo::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let value = memo.get_or_init(|| {
                calls.set(calls.get() + 1);
                42
            });
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let memo: Memo<u32> = Memo::new();
        let err = memo.get_or_try_init(|| Err(SimError::config("boom")));
        assert!(err.is_err());
        assert!(memo.get().is_none());
        assert_eq!(*memo.get_or_try_init(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_clone_is_cold_and_equal() {
        let memo = Memo::new();
        memo.get_or_init(|| 1);
        let copy = memo.clone();
        assert!(copy.get().is_none());
        assert_eq!(memo, copy);
    }
}
