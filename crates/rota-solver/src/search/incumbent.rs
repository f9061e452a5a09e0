//! Best solution shared between workers.
//!
//! The objective of the incumbent is mirrored in an atomic so workers can
//! prune without locking; the mutex-guarded copy is authoritative.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incumbent {
    pub objective: i64,
    pub values: Vec<bool>,
}

#[derive(Debug)]
pub struct SharedIncumbent {
    /// `i64::MAX` until a solution is installed
    upper_bound: AtomicI64,
    best: Mutex<Option<Incumbent>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIncumbent {
    pub fn new() -> Self {
        Self {
            upper_bound: AtomicI64::new(i64::MAX),
            best: Mutex::new(None),
        }
    }

    #[inline]
    pub fn upper_bound(&self) -> i64 {
        self.upper_bound.load(Ordering::Relaxed)
    }

    /// Install a strictly better solution; returns whether it was installed
    pub fn try_install(&self, objective: i64, values: &[bool]) -> bool {
        if objective >= self.upper_bound() {
            return false;
        }
        let mut best = self.best.lock().unwrap_or_else(PoisonError::into_inner);
        // another worker may have installed something better while we waited
        if best.as_ref().is_some_and(|b| objective >= b.objective) {
            return false;
        }
        *best = Some(Incumbent {
            objective,
            values: values.to_vec(),
        });
        self.upper_bound.store(objective, Ordering::Relaxed);
        true
    }

    pub fn snapshot(&self) -> Option<Incumbent> {
        self.best.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn into_inner(self) -> Option<Incumbent> {
        self.best.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
