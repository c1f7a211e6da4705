//! Compiler-intrinsic atomics over integer, pointer-width and float cells.
//!
//! 32-bit, 64-bit and pointer-width cells use the native instructions. 8- and
//! 16-bit cells are serialized behind one process-wide lock per width, so
//! every narrow operation is sequentially consistent whatever order was
//! requested. Float cells go through their bit pattern.

use core::{
    ops::Add,
    sync::atomic::{self, Ordering},
};

use crate::{platform::types::*, sync::Mutex};

mod abi;

pub use self::abi::*;

pub const __ATOMIC_RELAXED: c_int = 0;
pub const __ATOMIC_CONSUME: c_int = 1;
pub const __ATOMIC_ACQUIRE: c_int = 2;
pub const __ATOMIC_RELEASE: c_int = 3;
pub const __ATOMIC_ACQ_REL: c_int = 4;
pub const __ATOMIC_SEQ_CST: c_int = 5;

/// Map a C memory order. Consume is treated as acquire; unknown values as
/// sequentially consistent.
pub fn memory_order(order: c_int) -> Ordering {
    match order {
        __ATOMIC_RELAXED => Ordering::Relaxed,
        __ATOMIC_CONSUME | __ATOMIC_ACQUIRE => Ordering::Acquire,
        __ATOMIC_RELEASE => Ordering::Release,
        __ATOMIC_ACQ_REL => Ordering::AcqRel,
        _ => Ordering::SeqCst,
    }
}

fn load_order(order: c_int) -> Ordering {
    match memory_order(order) {
        Ordering::Release | Ordering::AcqRel => Ordering::Acquire,
        o => o,
    }
}

fn store_order(order: c_int) -> Ordering {
    match memory_order(order) {
        Ordering::Acquire | Ordering::AcqRel => Ordering::Release,
        o => o,
    }
}

fn failure_order(order: c_int) -> Ordering {
    match memory_order(order) {
        Ordering::Release => Ordering::Relaxed,
        Ordering::AcqRel => Ordering::Acquire,
        o => o,
    }
}

/// An integer type the atomic primitives operate on.
///
/// # Safety
///
/// Every method requires `ptr` to be valid and aligned for `Self`, and the
/// cell to be accessed only through these primitives while shared.
pub trait AtomicInt: Copy + Eq + Sized {
    unsafe fn atomic_load(ptr: *mut Self, order: Ordering) -> Self;
    unsafe fn atomic_store(ptr: *mut Self, val: Self, order: Ordering);
    unsafe fn atomic_swap(ptr: *mut Self, val: Self, order: Ordering) -> Self;
    unsafe fn atomic_compare_exchange(
        ptr: *mut Self,
        current: Self,
        new: Self,
        weak: bool,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
    unsafe fn atomic_fetch_add(ptr: *mut Self, val: Self, order: Ordering) -> Self;
    unsafe fn atomic_fetch_sub(ptr: *mut Self, val: Self, order: Ordering) -> Self;
    unsafe fn atomic_fetch_and(ptr: *mut Self, val: Self, order: Ordering) -> Self;
    unsafe fn atomic_fetch_or(ptr: *mut Self, val: Self, order: Ordering) -> Self;
    unsafe fn atomic_fetch_xor(ptr: *mut Self, val: Self, order: Ordering) -> Self;
}

macro_rules! native_atomic {
    ($($ty:ty => $atomic:ty),* $(,)?) => {
        $(
            impl AtomicInt for $ty {
                #[inline]
                unsafe fn atomic_load(ptr: *mut Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).load(order)
                }
                #[inline]
                unsafe fn atomic_store(ptr: *mut Self, val: Self, order: Ordering) {
                    <$atomic>::from_ptr(ptr).store(val, order)
                }
                #[inline]
                unsafe fn atomic_swap(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).swap(val, order)
                }
                #[inline]
                unsafe fn atomic_compare_exchange(
                    ptr: *mut Self,
                    current: Self,
                    new: Self,
                    weak: bool,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    let cell = <$atomic>::from_ptr(ptr);
                    if weak {
                        cell.compare_exchange_weak(current, new, success, failure)
                    } else {
                        cell.compare_exchange(current, new, success, failure)
                    }
                }
                #[inline]
                unsafe fn atomic_fetch_add(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).fetch_add(val, order)
                }
                #[inline]
                unsafe fn atomic_fetch_sub(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).fetch_sub(val, order)
                }
                #[inline]
                unsafe fn atomic_fetch_and(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).fetch_and(val, order)
                }
                #[inline]
                unsafe fn atomic_fetch_or(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).fetch_or(val, order)
                }
                #[inline]
                unsafe fn atomic_fetch_xor(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                    <$atomic>::from_ptr(ptr).fetch_xor(val, order)
                }
            }
        )*
    };
}

native_atomic! {
    i32 => atomic::AtomicI32,
    u32 => atomic::AtomicU32,
    i64 => atomic::AtomicI64,
    u64 => atomic::AtomicU64,
    isize => atomic::AtomicIsize,
    usize => atomic::AtomicUsize,
}

static LOCK8: Mutex<()> = Mutex::new(());
static LOCK16: Mutex<()> = Mutex::new(());

macro_rules! locked_atomic {
    (@rmw $lock:ident, $ptr:ident, $op:expr) => {{
        let _guard = $lock.lock();
        let old = $ptr.read_volatile();
        $ptr.write_volatile(($op)(old));
        old
    }};
    ($($ty:ty => $lock:ident),* $(,)?) => {
        $(
            impl AtomicInt for $ty {
                unsafe fn atomic_load(ptr: *mut Self, _: Ordering) -> Self {
                    let _guard = $lock.lock();
                    ptr.read_volatile()
                }
                unsafe fn atomic_store(ptr: *mut Self, val: Self, _: Ordering) {
                    let _guard = $lock.lock();
                    ptr.write_volatile(val)
                }
                unsafe fn atomic_swap(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    let _guard = $lock.lock();
                    let old = ptr.read_volatile();
                    ptr.write_volatile(val);
                    old
                }
                unsafe fn atomic_compare_exchange(
                    ptr: *mut Self,
                    current: Self,
                    new: Self,
                    _weak: bool,
                    _: Ordering,
                    _: Ordering,
                ) -> Result<Self, Self> {
                    let _guard = $lock.lock();
                    let old = ptr.read_volatile();
                    if old == current {
                        ptr.write_volatile(new);
                        Ok(old)
                    } else {
                        Err(old)
                    }
                }
                unsafe fn atomic_fetch_add(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    locked_atomic!(@rmw $lock, ptr, |old: Self| old.wrapping_add(val))
                }
                unsafe fn atomic_fetch_sub(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    locked_atomic!(@rmw $lock, ptr, |old: Self| old.wrapping_sub(val))
                }
                unsafe fn atomic_fetch_and(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    locked_atomic!(@rmw $lock, ptr, |old: Self| old & val)
                }
                unsafe fn atomic_fetch_or(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    locked_atomic!(@rmw $lock, ptr, |old: Self| old | val)
                }
                unsafe fn atomic_fetch_xor(ptr: *mut Self, val: Self, _: Ordering) -> Self {
                    locked_atomic!(@rmw $lock, ptr, |old: Self| old ^ val)
                }
            }
        )*
    };
}

locked_atomic! {
    i8 => LOCK8,
    u8 => LOCK8,
    i16 => LOCK16,
    u16 => LOCK16,
}

pub unsafe fn load<T: AtomicInt>(ptr: *mut T, order: c_int) -> T {
    T::atomic_load(ptr, load_order(order))
}

pub unsafe fn store<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) {
    T::atomic_store(ptr, val, store_order(order))
}

pub unsafe fn exchange<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_swap(ptr, val, memory_order(order))
}

/// Compare `*ptr` with `*expected`; on a match store `desired` and return
/// true, otherwise copy the observed value into `*expected` and return false.
pub unsafe fn compare_exchange<T: AtomicInt>(
    ptr: *mut T,
    expected: *mut T,
    desired: T,
    weak: bool,
    success: c_int,
    failure: c_int,
) -> bool {
    match T::atomic_compare_exchange(
        ptr,
        *expected,
        desired,
        weak,
        memory_order(success),
        failure_order(failure),
    ) {
        Ok(_) => true,
        Err(observed) => {
            *expected = observed;
            false
        }
    }
}

pub unsafe fn fetch_add<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_fetch_add(ptr, val, memory_order(order))
}

pub unsafe fn fetch_sub<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_fetch_sub(ptr, val, memory_order(order))
}

pub unsafe fn fetch_and<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_fetch_and(ptr, val, memory_order(order))
}

pub unsafe fn fetch_or<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_fetch_or(ptr, val, memory_order(order))
}

pub unsafe fn fetch_xor<T: AtomicInt>(ptr: *mut T, val: T, order: c_int) -> T {
    T::atomic_fetch_xor(ptr, val, memory_order(order))
}

/// Sequentially consistent CAS returning the value seen before the attempt.
pub unsafe fn sync_val_compare_and_swap<T: AtomicInt>(ptr: *mut T, old: T, new: T) -> T {
    match T::atomic_compare_exchange(ptr, old, new, false, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(prior) | Err(prior) => prior,
    }
}

pub unsafe fn sync_bool_compare_and_swap<T: AtomicInt>(ptr: *mut T, old: T, new: T) -> bool {
    T::atomic_compare_exchange(ptr, old, new, false, Ordering::SeqCst, Ordering::SeqCst).is_ok()
}

/// Full fence.
pub fn synchronize() {
    atomic::fence(Ordering::SeqCst);
}

/// Sequentially consistent load of the cell at a translated address.
pub unsafe fn load_at<T: AtomicInt>(addr: uintptr_t) -> T {
    load(addr as *mut T, __ATOMIC_SEQ_CST)
}

pub unsafe fn store_at<T: AtomicInt>(addr: uintptr_t, val: T) {
    store(addr as *mut T, val, __ATOMIC_SEQ_CST)
}

/// A float type stored in an integer cell of the same width.
pub trait AtomicFloat: Copy + Add<Output = Self> {
    type Bits: AtomicInt;

    fn to_raw(self) -> Self::Bits;
    fn from_raw(bits: Self::Bits) -> Self;
}

impl AtomicFloat for f32 {
    type Bits = u32;

    fn to_raw(self) -> u32 {
        self.to_bits()
    }
    fn from_raw(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl AtomicFloat for f64 {
    type Bits = u64;

    fn to_raw(self) -> u64 {
        self.to_bits()
    }
    fn from_raw(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

pub unsafe fn load_float<F: AtomicFloat>(ptr: *mut F, order: c_int) -> F {
    F::from_raw(load(ptr.cast::<F::Bits>(), order))
}

pub unsafe fn store_float<F: AtomicFloat>(ptr: *mut F, val: F, order: c_int) {
    store(ptr.cast::<F::Bits>(), val.to_raw(), order)
}

/// Add `delta` by retrying a compare-exchange on the bit pattern; returns the
/// prior value.
pub unsafe fn fetch_add_float<F: AtomicFloat>(ptr: *mut F, delta: F, order: c_int) -> F {
    let bits = ptr.cast::<F::Bits>();
    let mut old = <F::Bits as AtomicInt>::atomic_load(bits, Ordering::Relaxed);
    loop {
        let new = (F::from_raw(old) + delta).to_raw();
        match <F::Bits as AtomicInt>::atomic_compare_exchange(
            bits,
            old,
            new,
            true,
            memory_order(order),
            Ordering::Relaxed,
        ) {
            Ok(_) => return F::from_raw(old),
            Err(seen) => old = seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn orders_are_legalized() {
        assert_eq!(load_order(__ATOMIC_RELEASE), Ordering::Acquire);
        assert_eq!(load_order(__ATOMIC_CONSUME), Ordering::Acquire);
        assert_eq!(store_order(__ATOMIC_ACQ_REL), Ordering::Release);
        assert_eq!(failure_order(__ATOMIC_RELEASE), Ordering::Relaxed);
        assert_eq!(memory_order(42), Ordering::SeqCst);
    }

    #[test]
    fn exchange_then_load() {
        let mut x = 1u64;
        unsafe {
            assert_eq!(exchange(&mut x, 9, __ATOMIC_SEQ_CST), 1);
            assert_eq!(load(&mut x, __ATOMIC_ACQUIRE), 9);
        }
        let mut y = -1i8;
        unsafe {
            assert_eq!(exchange(&mut y, 5, __ATOMIC_RELAXED), -1);
            assert_eq!(load(&mut y, __ATOMIC_RELAXED), 5);
        }
    }

    #[test]
    fn compare_exchange_reports_observed() {
        let mut cell = 0i16;
        let mut expected = 0i16;
        unsafe {
            store(&mut cell, 3, __ATOMIC_SEQ_CST);
            assert!(!compare_exchange(&mut cell, &mut expected, 4, false, 5, 5));
            assert_eq!(expected, 3);
            assert!(compare_exchange(&mut cell, &mut expected, 4, false, 5, 5));
            assert_eq!(cell, 4);
            assert!(!compare_exchange(&mut cell, &mut expected, 5, true, 5, 5));
            assert_eq!(expected, 4);
        }
    }

    #[test]
    fn fetch_ops_return_prior() {
        let mut v = 0b1100u32;
        unsafe {
            assert_eq!(fetch_and(&mut v, 0b0100, 5), 0b1100);
            assert_eq!(fetch_or(&mut v, 0b0001, 5), 0b0100);
            assert_eq!(fetch_xor(&mut v, 0b0101, 5), 0b0101);
            assert_eq!(fetch_sub(&mut v, 1, 5), 0);
        }
        assert_eq!(v, u32::MAX);

        let mut b = 250u8;
        unsafe {
            assert_eq!(fetch_add(&mut b, 10, 0), 250);
        }
        assert_eq!(b, 4);
    }

    #[test]
    fn sync_cas_returns_prior_either_way() {
        let mut v = 7i64;
        unsafe {
            assert_eq!(sync_val_compare_and_swap(&mut v, 1, 2), 7);
            assert_eq!(v, 7);
            assert_eq!(sync_val_compare_and_swap(&mut v, 7, 2), 7);
            assert_eq!(v, 2);
            assert!(sync_bool_compare_and_swap(&mut v, 2, 3));
            assert!(!sync_bool_compare_and_swap(&mut v, 2, 4));
        }
        synchronize();
    }

    #[test]
    fn pointer_width_cells() {
        let mut p = 0x1000usize;
        let mut d = -8isize;
        unsafe {
            assert_eq!(fetch_add(&mut p, 0x10, __ATOMIC_SEQ_CST), 0x1000);
            assert_eq!(load_at::<usize>(&mut p as *mut usize as uintptr_t), 0x1010);
            store_at(&mut p as *mut usize as uintptr_t, 7usize);
            assert_eq!(sync_val_compare_and_swap(&mut d, -8, 8), -8);
        }
        assert_eq!((p, d), (7, 8));
    }

    #[test]
    fn float_cells() {
        let mut f = 0f32;
        let mut d = 1.5f64;
        unsafe {
            store_float(&mut f, 2.25, __ATOMIC_RELEASE);
            assert_eq!(load_float(&mut f, __ATOMIC_ACQUIRE), 2.25);
            assert_eq!(fetch_add_float(&mut f, -0.25, __ATOMIC_SEQ_CST), 2.25);
            assert_eq!(fetch_add_float(&mut d, 1.0, __ATOMIC_RELAXED), 1.5);
        }
        assert_eq!((f, d), (2.0, 2.5));
    }

    #[test]
    fn float_fetch_add_across_threads() {
        struct Cell(*mut f64);
        unsafe impl Sync for Cell {}
        impl Cell {
            fn get(&self) -> *mut f64 {
                self.0
            }
        }

        let mut total = 0f64;
        let cell = Cell(&mut total);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        unsafe { fetch_add_float(cell.get(), 1.0, __ATOMIC_SEQ_CST) };
                    }
                });
            }
        });
        assert_eq!(total, 8000.0);
    }

    #[test]
    fn narrow_fetch_add_across_threads() {
        struct Cell(*mut u16);
        unsafe impl Sync for Cell {}
        impl Cell {
            fn get(&self) -> *mut u16 {
                self.0
            }
        }

        let mut counter = 0u16;
        let cell = Cell(&mut counter);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        unsafe { fetch_add(cell.get(), 1, __ATOMIC_SEQ_CST) };
                    }
                });
            }
        });
        assert_eq!(counter, 8000);
    }
}
