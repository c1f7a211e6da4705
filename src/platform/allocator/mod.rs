//! Raw-memory facade. Every address handed to translated code comes from here:
//! blocks never move while live and are aligned to `max_align_t`.
//!
//! Each block is preceded by a header holding its requested size, so `free`
//! and `usable_size` need only the address.

use core::{
    mem::{align_of, size_of},
    ptr,
};

use super::types::*;
use crate::sync::Mutex;
use dlmalloc::Dlmalloc;

const ALIGN: usize = align_of::<max_align_t>();
const HEADER: usize = size_of::<max_align_t>();

struct Heap(Dlmalloc);

// The heap is only reached through `ALLOCATOR`'s lock.
unsafe impl Send for Heap {}

static ALLOCATOR: Mutex<Heap> = Mutex::new(Heap(Dlmalloc::new()));

#[inline]
unsafe fn block_of(ptr: *mut c_void) -> (*mut u8, usize) {
    let block = ptr.cast::<u8>().sub(HEADER);
    (block, block.cast::<usize>().read())
}

#[inline]
unsafe fn finish(block: *mut u8, size: size_t) -> *mut c_void {
    if block.is_null() {
        return ptr::null_mut();
    }
    block.cast::<usize>().write(size);
    block.add(HEADER).cast()
}

pub unsafe fn alloc(size: size_t) -> *mut c_void {
    let Some(total) = size.checked_add(HEADER) else {
        return ptr::null_mut();
    };
    let block = ALLOCATOR.lock().0.malloc(total, ALIGN);
    finish(block, size)
}

/// Zeroed allocation of `nmemb * size` bytes; null on overflow.
pub unsafe fn calloc(nmemb: size_t, size: size_t) -> *mut c_void {
    let Some(size) = nmemb.checked_mul(size) else {
        return ptr::null_mut();
    };
    let Some(total) = size.checked_add(HEADER) else {
        return ptr::null_mut();
    };
    let block = ALLOCATOR.lock().0.calloc(total, ALIGN);
    finish(block, size)
}

pub unsafe fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    if ptr.is_null() {
        return alloc(size);
    }
    let Some(total) = size.checked_add(HEADER) else {
        return ptr::null_mut();
    };
    let (block, old_size) = block_of(ptr);
    let new = ALLOCATOR
        .lock()
        .0
        .realloc(block, old_size + HEADER, ALIGN, total);
    finish(new, size)
}

pub unsafe fn free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let (block, size) = block_of(ptr);
    ALLOCATOR.lock().0.free(block, size + HEADER, ALIGN)
}

pub unsafe fn alloc_usable_size(ptr: *mut c_void) -> size_t {
    if ptr.is_null() {
        return 0;
    }
    block_of(ptr).1
}
