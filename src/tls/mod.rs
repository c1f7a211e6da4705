//! Execution context of a thread running translated C code.

use core::{cell::RefCell, mem::size_of, ptr};
#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicI32, Ordering};

use crate::{
    error::ContextMisuse,
    header::errno::ENOMEM,
    platform::{allocator, logger, types::*},
};

use self::stack::StackHeader;

mod stack;

/// Successor segments kept linked when an emptied segment unwinds.
pub const STACK_KEEPALIVE: usize = 2;
/// Alignment and rounding granule of every C stack frame.
pub const STACK_ALIGN: usize = 16;
/// Segment sizes are multiples of this, leaving room for the heap's own
/// block header inside a page.
pub const STACK_SEGMENT_UNIT: usize = 4096 - 16;

const ALLOCA_MARKER: usize = STACK_ALIGN;

pub struct Tls {
    errno: *mut c_int,
    pub(crate) stack: StackHeader,
    pub(crate) alloc_depth: c_int,
    pub(crate) segments: i32,
    allocas: Vec<*mut c_void>,
    #[cfg(debug_assertions)]
    reentry: AtomicI32,
    #[cfg(debug_assertions)]
    pub(crate) frames: Vec<usize>,
}

// Ownership may move between threads once the caller has fenced.
unsafe impl Send for Tls {}

/// Returned by [`Tls::alloca_entry`]; hands the scope back to
/// [`Tls::alloca_exit`].
#[must_use]
#[derive(Debug)]
pub struct AllocaMark {
    allocas: usize,
}

impl Tls {
    pub fn new() -> Self {
        logger::init();
        let errno = unsafe { allocator::calloc(1, size_of::<c_int>()) }.cast::<c_int>();
        if errno.is_null() {
            log::error!("out of memory allocating the errno cell");
            std::process::abort();
        }
        Self {
            errno,
            stack: StackHeader::EMPTY,
            alloc_depth: 0,
            segments: 0,
            allocas: Vec::new(),
            #[cfg(debug_assertions)]
            reentry: AtomicI32::new(0),
            #[cfg(debug_assertions)]
            frames: Vec::new(),
        }
    }

    /// Tear the context down. Live scratch allocations or linked segments are
    /// a caller bug and panic with [`ContextMisuse`].
    pub fn close(&mut self) {
        if self.alloc_depth != 0 {
            ContextMisuse::LiveAllocations(self.alloc_depth).raise();
        }
        if self.segments != 0 {
            ContextMisuse::LiveSegments(self.segments).raise();
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        unsafe {
            for p in self.allocas.drain(..).rev() {
                allocator::free(p);
            }
            self.release_stack();
            allocator::free(self.errno.cast());
        }
        self.errno = ptr::null_mut();
        self.alloc_depth = 0;
        #[cfg(debug_assertions)]
        self.frames.clear();
    }

    #[inline(always)]
    pub(crate) fn enter(&self) {
        #[cfg(debug_assertions)]
        if self.reentry.swap(1, Ordering::Acquire) != 0 {
            ContextMisuse::ConcurrentUse.raise();
        }
    }

    #[inline(always)]
    pub(crate) fn leave(&self) {
        #[cfg(debug_assertions)]
        self.reentry.store(0, Ordering::Release);
    }

    pub fn errno(&self) -> c_int {
        unsafe { *self.errno }
    }

    pub fn set_errno(&mut self, value: c_int) {
        self.enter();
        unsafe { *self.errno = value };
        self.leave();
    }

    /// Stable address of the errno cell.
    pub fn errno_location(&self) -> *mut c_int {
        self.errno
    }

    pub fn alloc_depth(&self) -> c_int {
        self.alloc_depth
    }

    /// Open a scope for C `alloca`. A marker frame is pushed on the C stack so
    /// scratch frames inside the scope share its segment.
    pub fn alloca_entry(&mut self) -> AllocaMark {
        self.alloc(ALLOCA_MARKER);
        AllocaMark {
            allocas: self.allocas.len(),
        }
    }

    /// C `alloca`: released wholesale by the enclosing [`Tls::alloca_exit`].
    /// Null with `ENOMEM` on exhaustion.
    pub fn alloca(&mut self, size: size_t) -> *mut c_void {
        let p = unsafe { allocator::alloc(size) };
        if p.is_null() {
            self.set_errno(ENOMEM);
        } else {
            self.allocas.push(p);
        }
        p
    }

    pub fn alloca_exit(&mut self, mark: AllocaMark) {
        for p in self.allocas.drain(mark.allocas..).rev() {
            unsafe { allocator::free(p) };
        }
        self.free(ALLOCA_MARKER);
    }
}

impl Default for Tls {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tls {
    fn drop(&mut self) {
        if !self.errno.is_null() {
            self.teardown();
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Tls>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's default context, creating it on first use. The
/// context is torn down when the thread exits. Not reentrant.
pub fn with_current<F, R>(f: F) -> R
where
    F: FnOnce(&mut Tls) -> R,
{
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        f(slot.get_or_insert_with(Tls::new))
    })
}

#[no_mangle]
pub unsafe extern "C" fn Yalloca(tls: *mut Tls, size: size_t) -> uintptr_t {
    trace_expr!(tls, (*tls).alloca(size) as uintptr_t, "alloca({})", size)
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin_alloca(tls: *mut Tls, size: size_t) -> uintptr_t {
    Yalloca(tls, size)
}
