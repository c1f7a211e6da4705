//! Host closures handed to translated code as function addresses.
//!
//! Translated C stores function pointers as plain integers. A host closure
//! is registered once, gets a nonzero [`FuncAddr`], and bridges such as
//! `Yqsort` resolve the address back to the closure before calling it.

use std::{collections::BTreeMap, sync::Arc};

use spin::Mutex;

use crate::{platform::types::*, tls::Tls};

/// Address of an extern function slot as seen by translated code.
pub type FuncAddr = uintptr_t;

/// `int (*)(const void *, const void *)` with the calling context prepended.
pub type CmpFn = dyn Fn(*mut Tls, uintptr_t, uintptr_t) -> c_int + Send + Sync;

/// Slot addresses start here and advance by this step; 0 is never issued.
const FIRST_ADDR: FuncAddr = 0x1000;
const ADDR_STEP: FuncAddr = 16;

enum Callback {
    Cmp(Box<CmpFn>),
}

/// A registered extern function slot.
pub struct ExternFn {
    addr: FuncAddr,
    arity: usize,
    callback: Callback,
}

impl ExternFn {
    pub fn addr(&self) -> FuncAddr {
        self.addr
    }

    /// Argument count, not counting the context.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call_cmp(&self, tls: *mut Tls, a: uintptr_t, b: uintptr_t) -> c_int {
        match &self.callback {
            Callback::Cmp(f) => f(tls, a, b),
        }
    }
}

struct Table {
    next: FuncAddr,
    slots: BTreeMap<FuncAddr, Arc<ExternFn>>,
}

impl Table {
    const fn new() -> Self {
        Self {
            next: FIRST_ADDR,
            slots: BTreeMap::new(),
        }
    }

    fn insert(&mut self, arity: usize, callback: Callback) -> FuncAddr {
        let addr = self.next;
        self.next = self.next.wrapping_add(ADDR_STEP).max(FIRST_ADDR);
        self.slots.insert(
            addr,
            Arc::new(ExternFn {
                addr,
                arity,
                callback,
            }),
        );
        addr
    }
}

static TABLE: Mutex<Table> = Mutex::new(Table::new());

/// Register a comparator and return its address.
pub fn register_cmp<F>(f: F) -> FuncAddr
where
    F: Fn(*mut Tls, uintptr_t, uintptr_t) -> c_int + Send + Sync + 'static,
{
    let addr = TABLE.lock().insert(2, Callback::Cmp(Box::new(f)));
    log::debug!("trampoline: comparator registered at {addr:#x}");
    addr
}

/// The comparator registered at `addr`. The table lock is released before
/// the slot is returned, so the comparator may itself register callbacks.
pub fn resolve_cmp(addr: FuncAddr) -> Option<Arc<ExternFn>> {
    let slot = TABLE.lock().slots.get(&addr).cloned()?;
    match slot.callback {
        Callback::Cmp(_) => Some(slot),
    }
}

/// Release the slot at `addr`; false if nothing was registered there.
pub fn unregister(addr: FuncAddr) -> bool {
    TABLE.lock().slots.remove(&addr).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_resolve_unregister() {
        let addr = register_cmp(|_, a, b| (a as c_int) - (b as c_int));
        assert_ne!(addr, 0);

        let slot = resolve_cmp(addr).unwrap();
        assert_eq!(slot.addr(), addr);
        assert_eq!(slot.arity(), 2);
        assert_eq!(slot.call_cmp(core::ptr::null_mut(), 5, 3), 2);

        assert!(unregister(addr));
        assert!(!unregister(addr));
        assert!(resolve_cmp(addr).is_none());
        assert!(resolve_cmp(0).is_none());
    }

    #[test]
    fn addresses_are_distinct() {
        let a = register_cmp(|_, _, _| 0);
        let b = register_cmp(|_, _, _| 0);
        assert_ne!(a, b);
        assert!(unregister(a));
        assert!(unregister(b));
    }
}
