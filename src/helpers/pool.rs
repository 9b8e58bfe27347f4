//! Bounded object pool shared by all workers.
//!
//! Idle objects live in a lock-free `ArrayQueue`. `acquire` pops an idle object
//! or builds a fresh one; `release` resets the object and pushes it back, or
//! drops it when the queue is already full. The pool therefore never blocks and
//! never holds more than `capacity` idle objects.

use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Objects that can be returned to a [`Pool`].
pub trait Reset {
    /// Restores the freshly-constructed state.
    fn reset(&mut self);
}

impl<T: Reset + ?Sized> Reset for Box<T> {
    fn reset(&mut self) {
        (**self).reset()
    }
}

pub struct Pool<T> {
    idle: ArrayQueue<T>,
    make: Box<dyn Fn() -> T + Send + Sync>,
    created: AtomicUsize,
    reused: AtomicUsize,
}

impl<T: Reset> Pool<T> {
    pub fn new<F>(capacity: usize, make: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Pool {
            idle: ArrayQueue::new(capacity.max(1)),
            make: Box::new(make),
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    pub fn acquire(&self) -> T {
        match self.idle.pop() {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.make)()
            }
        }
    }

    pub fn release(&self, mut item: T) {
        item.reset();
        // Full queue: let the allocator have it.
        let _ = self.idle.push(item);
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Objects built because the pool was empty.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Acquisitions served from idle objects.
    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::Relaxed)
    }
}

impl<T: Reset + Default> Pool<T> {
    /// Scoped checkout, released on drop.
    pub fn checkout(&self) -> Pooled<'_, T> {
        Pooled {
            item: self.acquire(),
            pool: self,
        }
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle.len())
            .field("capacity", &self.idle.capacity())
            .field("created", &self.created.load(Ordering::Relaxed))
            .field("reused", &self.reused.load(Ordering::Relaxed))
            .finish()
    }
}

/// Object checked out of a [`Pool`]; goes back on drop. On drop the item is
/// swapped for `T::default()`, which should be cheap.
pub struct Pooled<'p, T: Reset + Default> {
    item: T,
    pool: &'p Pool<T>,
}

impl<T: Reset + Default> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Reset + Default> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Reset + Default> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.item));
    }
}
