//! Scoped release of host resources.
//!
//! A [`Guard`] owns a value together with the action that releases it. The
//! action runs exactly once when the guard leaves scope, on normal return,
//! early return, `?` propagation and unwinding alike, unless the guard is
//! explicitly dismissed.

use std::fmt;
use std::ops::{Deref, DerefMut};

pub struct Guard<T, F>
where
    F: FnOnce(T),
{
    inner: Option<(T, F)>,
}

impl<T, F> Guard<T, F>
where
    F: FnOnce(T),
{
    pub fn new(value: T, release: F) -> Self {
        Self {
            inner: Some((value, release)),
        }
    }

    /// Keep the resource and skip the release action.
    pub fn dismiss(mut self) -> T {
        match self.inner.take() {
            Some((value, _)) => value,
            None => unreachable!("guard already released"),
        }
    }
}

/// Run `action` when the returned guard is dropped.
pub fn defer<F>(action: F) -> Guard<(), impl FnOnce(())>
where
    F: FnOnce(),
{
    Guard::new((), move |()| action())
}

impl<T, F> Deref for Guard<T, F>
where
    F: FnOnce(T),
{
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            Some((value, _)) => value,
            None => unreachable!("guard already released"),
        }
    }
}

impl<T, F> DerefMut for Guard<T, F>
where
    F: FnOnce(T),
{
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Some((value, _)) => value,
            None => unreachable!("guard already released"),
        }
    }
}

impl<T, F> Drop for Guard<T, F>
where
    F: FnOnce(T),
{
    fn drop(&mut self) {
        if let Some((value, release)) = self.inner.take() {
            release(value);
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Guard<T, F>
where
    F: FnOnce(T),
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&**self).finish()
    }
}
