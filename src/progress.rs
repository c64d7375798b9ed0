//! Advisory progress reporting for data-parallel phases
//!
//! Worker threads bump an atomic counter after finishing a plane; an optional
//! observer sees `(done, total)`. Updates may arrive out of order.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Plane counter shared by the workers of one phase.
pub struct Progress<'a> {
    done: AtomicUsize,
    total: usize,
    observer: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

impl<'a> Progress<'a> {
    pub fn new(total: usize) -> Self {
        Self { done: AtomicUsize::new(0), total, observer: None }
    }

    pub fn with_observer(total: usize, observer: &'a (dyn Fn(usize, usize) + Sync)) -> Self {
        Self { done: AtomicUsize::new(0), total, observer: Some(observer) }
    }

    /// Mark one unit complete and notify the observer.
    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(observer) = self.observer {
            observer(done, self.total);
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
