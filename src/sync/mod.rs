//! Lock primitives for the process-wide singletons: the raw-memory heap, the
//! narrow-width atomic locks, and the logger endpoint.
//!
//! Waiting is spin-then-yield; the runtime has no futex of its own.

pub mod mutex;

pub use self::mutex::{Mutex, MutexGuard};

use crate::platform::types::*;
use core::{
    hint,
    ops::Deref,
    sync::atomic::AtomicI32 as AtomicInt,
};

const SPIN_ATTEMPTS: usize = 999;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Desired,
    Waiting,
    Other,
}

pub fn wait_until_generic<F1, F2>(word: &AtomicInt, attempt: F1, mark_long: F2)
where
    F1: Fn(&AtomicInt) -> AttemptStatus,
    F2: Fn(&AtomicInt) -> AttemptStatus,
{
    // First, try spinning for really short durations
    for _ in 0..SPIN_ATTEMPTS {
        hint::spin_loop();
        if attempt(word) == AttemptStatus::Desired {
            return;
        }
    }

    let mut previous = attempt(word);

    // Contended: give the holder our time slice between attempts.
    loop {
        if previous == AttemptStatus::Desired {
            return;
        }

        if previous == AttemptStatus::Waiting || mark_long(word) != AttemptStatus::Desired {
            std::thread::yield_now();
        }

        previous = attempt(word);
    }
}

#[repr(C)]
pub(crate) struct AtomicLock {
    pub(crate) atomic: AtomicInt,
}
impl AtomicLock {
    pub const fn new(value: c_int) -> Self {
        Self {
            atomic: AtomicInt::new(value),
        }
    }

    /// Wait using two closures:
    ///
    /// - `attempt` = Attempt to modify the atomic value to any desired state.
    /// - `mark_long` = Attempt to flag that a waiter is parked.
    ///
    /// Both closures may spuriously report failure; they are only hints.
    pub fn wait_until<F1, F2>(&self, attempt: F1, mark_long: F2)
    where
        F1: Fn(&AtomicInt) -> AttemptStatus,
        F2: Fn(&AtomicInt) -> AttemptStatus,
    {
        wait_until_generic(&self.atomic, attempt, mark_long)
    }
}
impl Deref for AtomicLock {
    type Target = AtomicInt;

    fn deref(&self) -> &Self::Target {
        &self.atomic
    }
}
