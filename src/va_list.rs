//! C variable arguments as an in-memory buffer of 8-byte slots.
//!
//! Producers build a buffer from tagged [`VaArg`] values; consumers walk it
//! with an untyped [`VaList`] cursor and must know each slot's type from the
//! format string, exactly like C `va_arg`.

use core::{mem::size_of, ptr, slice};

use crate::platform::{allocator, types::*};

pub const VA_SLOT: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VaArg<'a> {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    /// Promoted to double, as in a C call.
    Float32(f32),
    Float64(f64),
    Uintptr(uintptr_t),
    /// Copied verbatim, padded to whole slots.
    Aggregate(&'a [u8]),
}

impl VaArg<'_> {
    pub fn slots(&self) -> usize {
        match self {
            VaArg::Aggregate(bytes) => bytes.len().div_ceil(VA_SLOT),
            _ => 1,
        }
    }

    fn slot_bits(&self) -> u64 {
        match *self {
            VaArg::Int8(v) => v as i64 as u64,
            VaArg::Int16(v) => v as i64 as u64,
            VaArg::Int32(v) => v as i64 as u64,
            VaArg::Int64(v) => v as u64,
            VaArg::Uint8(v) => v as u64,
            VaArg::Uint16(v) => v as u64,
            VaArg::Uint32(v) => v as u64,
            VaArg::Uint64(v) => v,
            VaArg::Float32(v) => (v as f64).to_bits(),
            VaArg::Float64(v) => v.to_bits(),
            VaArg::Uintptr(v) => v as u64,
            VaArg::Aggregate(_) => 0,
        }
    }
}

/// Slots needed to hold `args`.
pub fn va_list_slots(args: &[VaArg]) -> usize {
    args.iter().map(VaArg::slots).sum()
}

/// Raw buffer of `n` slots from the raw-memory facade; null when out of
/// memory. Release it with [`allocator::free`].
pub unsafe fn va_list_alloc(n: usize) -> *mut u8 {
    match n.checked_mul(VA_SLOT) {
        Some(size) => allocator::alloc(size).cast(),
        None => ptr::null_mut(),
    }
}

/// Write `args` into consecutive slots of `buf` and return `buf`.
pub unsafe fn va_list_fill(buf: *mut u8, args: &[VaArg]) -> *mut u8 {
    let mut p = buf;
    for arg in args {
        match arg {
            VaArg::Aggregate(bytes) => {
                let padded = arg.slots() * VA_SLOT;
                ptr::copy_nonoverlapping(bytes.as_ptr(), p, bytes.len());
                ptr::write_bytes(p.add(bytes.len()), 0, padded - bytes.len());
                p = p.add(padded);
            }
            _ => {
                p.cast::<u64>().write_unaligned(arg.slot_bits());
                p = p.add(VA_SLOT);
            }
        }
    }
    buf
}

/// Owned varargs buffer, freed on drop.
pub struct VaBuffer {
    buf: *mut u8,
    len: usize,
}

impl VaBuffer {
    /// `None` when the raw-memory facade is exhausted.
    pub fn new(args: &[VaArg]) -> Option<Self> {
        let len = va_list_slots(args);
        unsafe {
            let buf = va_list_alloc(len);
            if buf.is_null() {
                return None;
            }
            va_list_fill(buf, args);
            Some(Self { buf, len })
        }
    }

    pub fn addr(&self) -> uintptr_t {
        self.buf as uintptr_t
    }

    pub fn cursor(&self) -> VaList {
        VaList::new(self.addr())
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.buf, self.len * VA_SLOT) }
    }
}

impl Drop for VaBuffer {
    fn drop(&mut self) {
        unsafe { allocator::free(self.buf.cast()) }
    }
}

/// A value that occupies one slot.
pub trait VaPrimitive: Sized {
    fn from_slot(bits: u64) -> Self;
}

macro_rules! va_primitive_int {
    ($($ty:ty),*) => {
        $(
            impl VaPrimitive for $ty {
                #[inline]
                fn from_slot(bits: u64) -> Self {
                    bits as $ty
                }
            }
        )*
    };
}

va_primitive_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl VaPrimitive for f64 {
    fn from_slot(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl VaPrimitive for f32 {
    fn from_slot(bits: u64) -> Self {
        f64::from_bits(bits) as f32
    }
}

impl<T> VaPrimitive for *const T {
    fn from_slot(bits: u64) -> Self {
        bits as usize as *const T
    }
}

impl<T> VaPrimitive for *mut T {
    fn from_slot(bits: u64) -> Self {
        bits as usize as *mut T
    }
}

/// Read cursor over a varargs buffer. A zero cursor yields zeros forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaList {
    ap: uintptr_t,
}

impl VaList {
    pub fn new(ap: uintptr_t) -> Self {
        Self { ap }
    }

    pub fn addr(&self) -> uintptr_t {
        self.ap
    }

    /// Read the next slot as `T` and advance.
    pub unsafe fn arg<T: VaPrimitive>(&mut self) -> T {
        if self.ap == 0 {
            return T::from_slot(0);
        }
        let bits = (self.ap as *const u64).read_unaligned();
        self.ap += VA_SLOT;
        T::from_slot(bits)
    }

    /// Address of the next `size`-byte aggregate; advances past its slots.
    pub unsafe fn other(&mut self, size: usize) -> uintptr_t {
        if self.ap == 0 {
            return 0;
        }
        let p = self.ap;
        self.ap += size.div_ceil(VA_SLOT) * VA_SLOT;
        p
    }
}

unsafe fn with_cursor<T>(app: *mut uintptr_t, f: impl FnOnce(&mut VaList) -> T) -> T {
    let mut ap = VaList::new(*app);
    let v = f(&mut ap);
    *app = ap.addr();
    v
}

#[no_mangle]
pub unsafe extern "C" fn VaInt32(app: *mut uintptr_t) -> int32_t {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaUint32(app: *mut uintptr_t) -> uint32_t {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaInt64(app: *mut uintptr_t) -> int64_t {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaUint64(app: *mut uintptr_t) -> uint64_t {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaFloat32(app: *mut uintptr_t) -> c_float {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaFloat64(app: *mut uintptr_t) -> c_double {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaUintptr(app: *mut uintptr_t) -> uintptr_t {
    with_cursor(app, |ap| ap.arg())
}

#[no_mangle]
pub unsafe extern "C" fn VaOther(app: *mut uintptr_t, size: uint64_t) -> uintptr_t {
    with_cursor(app, |ap| ap.other(size as usize))
}

const _: () = assert!(size_of::<uintptr_t>() <= VA_SLOT);
