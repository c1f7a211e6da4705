//! The C stack: a doubly linked chain of raw-memory segments from which
//! translated code takes LIFO scratch allocations.
//!
//! Each segment starts with a [`StackHeader`]. The header of the top segment
//! lives in the context and the copy at the segment base is stale until the
//! segment stops being the top, at which point it is flushed back.

use core::{mem::size_of, ptr};

use super::{Tls, STACK_ALIGN, STACK_KEEPALIVE, STACK_SEGMENT_UNIT};
use crate::{error::ContextMisuse, platform::allocator};

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct StackHeader {
    /// Bytes left in the arena.
    pub free: usize,
    pub base: *mut u8,
    pub prev: *mut StackHeader,
    pub next: *mut StackHeader,
    /// Start of the next allocation.
    pub sp: *mut u8,
}

impl StackHeader {
    pub const EMPTY: Self = Self {
        free: 0,
        base: ptr::null_mut(),
        prev: ptr::null_mut(),
        next: ptr::null_mut(),
        sp: ptr::null_mut(),
    };
}

pub(crate) const HEADER_SIZE: usize = match round_up(size_of::<StackHeader>(), STACK_ALIGN) {
    Some(n) => n,
    None => unreachable!(),
};

/// `n` rounded up to a multiple of the power of two `to`; `None` on overflow.
#[inline]
pub(crate) const fn round_up(n: usize, to: usize) -> Option<usize> {
    match n.checked_add(to - 1) {
        Some(n) => Some(n & !(to - 1)),
        None => None,
    }
}

/// Size of a fresh segment able to hold `n` bytes after its header.
#[inline]
pub(crate) fn segment_size(n: usize) -> Option<usize> {
    n.checked_add(HEADER_SIZE)?
        .div_ceil(STACK_SEGMENT_UNIT)
        .checked_mul(STACK_SEGMENT_UNIT)
}

#[cold]
fn oversized_frame(n: usize) -> ! {
    log::error!("C stack: a {n} byte frame cannot be allocated");
    std::process::abort()
}

/// Free `segment` and every segment linked above it.
unsafe fn release_chain(mut segment: *mut StackHeader) -> i32 {
    let mut released = 0;
    while !segment.is_null() {
        let next = (*segment).next;
        allocator::free(segment.cast());
        released += 1;
        segment = next;
    }
    released
}

impl Tls {
    /// Allocate `n` bytes of scratch memory, rounded up to 16. The address is
    /// valid until the matching [`Tls::free`].
    pub fn alloc(&mut self, n: usize) -> *mut u8 {
        let Some(n) = round_up(n, STACK_ALIGN) else {
            oversized_frame(n)
        };
        self.enter();
        self.alloc_depth += 1;
        #[cfg(debug_assertions)]
        self.frames.push(n);

        let p = if n <= self.stack.free && !self.stack.sp.is_null() {
            self.bump(n)
        } else {
            unsafe { self.alloc_slow(n) }
        };

        self.leave();
        p
    }

    #[inline]
    fn bump(&mut self, n: usize) -> *mut u8 {
        let p = self.stack.sp;
        self.stack.sp = unsafe { p.add(n) };
        self.stack.free -= n;
        p
    }

    #[inline]
    unsafe fn flush_top(&mut self) {
        if !self.stack.base.is_null() {
            self.stack.base.cast::<StackHeader>().write(self.stack);
        }
    }

    #[cold]
    unsafe fn alloc_slow(&mut self, n: usize) -> *mut u8 {
        let next = self.stack.next;
        if !next.is_null() {
            if (*next).free >= n {
                self.flush_top();
                self.stack = next.read();
                return self.bump(n);
            }

            // The kept segments are too small for this frame.
            self.segments -= release_chain(next);
            self.stack.next = ptr::null_mut();
        }

        let Some(size) = segment_size(n) else {
            oversized_frame(n)
        };
        let base = allocator::alloc(size).cast::<u8>();
        if base.is_null() {
            log::error!("C stack: out of memory allocating a {size} byte segment");
            std::process::abort();
        }
        self.segments += 1;

        let prev = if self.stack.base.is_null() {
            ptr::null_mut()
        } else {
            self.stack.next = base.cast();
            self.flush_top();
            self.stack.base.cast()
        };

        self.stack = StackHeader {
            free: size - HEADER_SIZE,
            base,
            prev,
            next: ptr::null_mut(),
            sp: base.add(HEADER_SIZE),
        };
        self.bump(n)
    }

    /// Release the most recent `alloc(n)`.
    pub fn free(&mut self, n: usize) {
        let Some(n) = round_up(n, STACK_ALIGN) else {
            ContextMisuse::UnbalancedStack.raise()
        };
        self.enter();
        self.alloc_depth -= 1;
        #[cfg(debug_assertions)]
        match self.frames.pop() {
            Some(expected) if expected == n => (),
            Some(expected) => ContextMisuse::MismatchedFree { expected, got: n }.raise(),
            None => ContextMisuse::UnbalancedStack.raise(),
        }

        if self.stack.base.is_null() {
            if n != 0 {
                ContextMisuse::UnbalancedStack.raise();
            }
            self.leave();
            return;
        }

        let floor = unsafe { self.stack.base.add(HEADER_SIZE) };
        if (self.stack.sp as usize) < floor as usize + n {
            ContextMisuse::UnbalancedStack.raise();
        }
        self.stack.sp = unsafe { self.stack.sp.sub(n) };
        self.stack.free += n;

        if self.stack.sp == floor {
            unsafe { self.unwind_segment() };
        }
        self.leave();
    }

    /// The top segment just emptied.
    #[cold]
    unsafe fn unwind_segment(&mut self) {
        let prev = self.stack.prev;
        if prev.is_null() {
            self.flush_top();
            self.segments -= release_chain(self.stack.base.cast());
            self.stack = StackHeader::EMPTY;
            return;
        }

        if self.stack.next.is_null() {
            allocator::free(self.stack.base.cast());
            self.segments -= 1;
            (*prev).next = ptr::null_mut();
            self.stack = prev.read();
            return;
        }

        // Successors exist: the emptied segment and up to STACK_KEEPALIVE of
        // them stay linked above the new top, anything past that is released.
        self.flush_top();
        let mut last = self.stack.next;
        for _ in 1..STACK_KEEPALIVE {
            if (*last).next.is_null() {
                break;
            }
            last = (*last).next;
        }
        if !(*last).next.is_null() {
            self.segments -= release_chain((*last).next);
            (*last).next = ptr::null_mut();
        }

        self.stack = prev.read();
    }

    /// Free every segment, used and kept alike.
    pub(crate) unsafe fn release_stack(&mut self) {
        if self.stack.base.is_null() {
            return;
        }
        let mut bottom = self.stack.base.cast::<StackHeader>();
        self.flush_top();
        while !(*bottom).prev.is_null() {
            bottom = (*bottom).prev;
        }
        self.segments -= release_chain(bottom);
        self.stack = StackHeader::EMPTY;
    }

    /// Number of segments currently linked, including kept empty ones.
    pub fn stack_segments(&self) -> i32 {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_aligned() {
        assert_eq!(HEADER_SIZE % STACK_ALIGN, 0);
        assert!(HEADER_SIZE >= size_of::<StackHeader>());
    }

    /// Link `count` empty segments above the top, as an earlier unwind with
    /// successors would have left them.
    unsafe fn link_spares(tls: &mut Tls, count: usize) {
        let mut prev = tls.stack.base.cast::<StackHeader>();
        let mut first: *mut StackHeader = ptr::null_mut();
        for _ in 0..count {
            let base = allocator::alloc(STACK_SEGMENT_UNIT).cast::<u8>();
            assert!(!base.is_null());
            let segment = base.cast::<StackHeader>();
            segment.write(StackHeader {
                free: STACK_SEGMENT_UNIT - HEADER_SIZE,
                base,
                prev,
                next: ptr::null_mut(),
                sp: base.add(HEADER_SIZE),
            });
            if first.is_null() {
                first = segment;
            } else {
                (*prev).next = segment;
            }
            prev = segment;
            tls.segments += 1;
        }
        tls.stack.next = first;
    }

    #[test]
    fn segment_sizes_are_unit_multiples() {
        assert_eq!(segment_size(16), Some(STACK_SEGMENT_UNIT));
        assert_eq!(
            segment_size(STACK_SEGMENT_UNIT - HEADER_SIZE),
            Some(STACK_SEGMENT_UNIT)
        );
        assert_eq!(
            segment_size(STACK_SEGMENT_UNIT - HEADER_SIZE + 1),
            Some(2 * STACK_SEGMENT_UNIT)
        );
    }

    #[test]
    fn frame_size_arithmetic_overflow() {
        assert_eq!(round_up(17, STACK_ALIGN), Some(32));
        let top = usize::MAX - STACK_ALIGN + 1;
        assert_eq!(round_up(top, STACK_ALIGN), Some(top));
        assert_eq!(round_up(usize::MAX - 3, STACK_ALIGN), None);
        assert_eq!(segment_size(usize::MAX - 8), None);
        assert_eq!(segment_size(usize::MAX - HEADER_SIZE), None);
    }

    #[test]
    #[should_panic(expected = "unbalanced C stack")]
    fn free_of_unroundable_size_is_misuse() {
        let mut tls = Tls::new();
        tls.free(usize::MAX - 3);
    }

    #[test]
    fn lifo_restores_sp() {
        let mut tls = Tls::new();
        let outer = tls.alloc(8);
        let sp = tls.stack.sp;
        let a = tls.alloc(11);
        let b = tls.alloc(22);
        assert_eq!(a as usize % 16, 0);
        assert_eq!(b as usize, a as usize + 16);
        tls.free(22);
        tls.free(11);
        assert_eq!(tls.stack.sp, sp);
        tls.free(8);
        assert!(!outer.is_null());
        assert_eq!(tls.stack_segments(), 0);
        tls.close();
    }

    #[test]
    fn zero_sized_frames() {
        let mut tls = Tls::new();
        let p = tls.alloc(0);
        assert!(!p.is_null());
        let q = tls.alloc(0);
        assert_eq!(p, q);
        tls.free(0);
        tls.free(0);
        assert_eq!(tls.alloc_depth(), 0);
        tls.close();
    }

    #[test]
    fn oversized_frame_gets_its_own_segment() {
        let mut tls = Tls::new();
        let small = tls.alloc(16);
        let big = tls.alloc(3 * STACK_SEGMENT_UNIT);
        assert_eq!(tls.stack_segments(), 2);
        unsafe { big.write_bytes(0xaa, 3 * STACK_SEGMENT_UNIT) };
        tls.free(3 * STACK_SEGMENT_UNIT);
        assert_eq!(tls.stack.sp, unsafe { small.add(16) });
        tls.free(16);
        assert_eq!(tls.stack_segments(), 0);
        tls.close();
    }

    #[test]
    fn emptied_top_without_successors_is_released() {
        let mut tls = Tls::new();
        let unit = STACK_SEGMENT_UNIT - HEADER_SIZE;
        let bottom = tls.alloc(16);
        tls.alloc(unit);
        assert_eq!(tls.stack_segments(), 2);
        tls.free(unit);
        assert_eq!(tls.stack_segments(), 1);
        assert!(tls.stack.next.is_null());
        assert_eq!(tls.stack.sp, unsafe { bottom.add(16) });

        for _ in 0..5 {
            tls.alloc(unit);
        }
        assert_eq!(tls.stack_segments(), 6);
        for _ in 0..5 {
            tls.free(unit);
        }
        assert_eq!(tls.stack_segments(), 1);
        tls.free(16);
        assert_eq!(tls.stack_segments(), 0);
        tls.close();
    }

    #[test]
    fn emptied_segment_with_successors_is_kept_for_reuse() {
        let mut tls = Tls::new();
        let unit = STACK_SEGMENT_UNIT - HEADER_SIZE;
        tls.alloc(16);
        let first = tls.alloc(unit);
        unsafe { link_spares(&mut tls, STACK_KEEPALIVE + 1) };
        assert_eq!(tls.stack_segments(), 3 + STACK_KEEPALIVE as i32);

        // The emptied segment and STACK_KEEPALIVE successors stay.
        tls.free(unit);
        assert_eq!(tls.stack_segments(), 2 + STACK_KEEPALIVE as i32);

        let second = tls.alloc(unit);
        assert_eq!(first, second);
        assert_eq!(tls.stack_segments(), 2 + STACK_KEEPALIVE as i32);
        tls.free(unit);
        assert_eq!(tls.stack_segments(), 2 + STACK_KEEPALIVE as i32);

        tls.free(16);
        assert_eq!(tls.stack_segments(), 0);
        tls.close();
    }

    #[test]
    fn kept_segment_too_small_is_replaced() {
        let mut tls = Tls::new();
        tls.alloc(16);
        unsafe { link_spares(&mut tls, 2) };
        assert_eq!(tls.stack_segments(), 3);
        let big = tls.alloc(2 * STACK_SEGMENT_UNIT);
        assert!(!big.is_null());
        assert_eq!(tls.stack_segments(), 2);
        tls.free(2 * STACK_SEGMENT_UNIT);
        assert_eq!(tls.stack_segments(), 1);
        tls.free(16);
        assert_eq!(tls.stack_segments(), 0);
        tls.close();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "does not match")]
    fn out_of_order_free_is_detected() {
        let mut tls = Tls::new();
        tls.alloc(11);
        tls.alloc(22);
        tls.free(11);
    }
}
