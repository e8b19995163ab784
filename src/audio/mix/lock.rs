//! Lock events around the engine's structural critical section.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Notified whenever the mixer enters and leaves its structural critical
/// section. `lock` fires right after the mutex is acquired, `unlock` right
/// before it is released.
pub trait LockEvents: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

pub struct EventGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    events: Option<Arc<dyn LockEvents>>,
}

impl<'a, T> EventGuard<'a, T> {
    pub fn acquire(mutex: &'a Mutex<T>, events: Option<Arc<dyn LockEvents>>) -> Self {
        let guard = mutex.lock();
        if let Some(events) = &events {
            events.lock();
        }
        Self { guard, events }
    }
}

impl<T> Deref for EventGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for EventGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for EventGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(events) = &self.events {
            events.unlock();
        }
    }
}
