//! Introsort over raw `width`-byte elements.

use core::mem::MaybeUninit;

use crate::platform::types::*;

pub fn introsort<C>(base: *mut u8, nel: size_t, width: size_t, mut comp: C)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    if nel < 2 || width == 0 {
        return;
    }
    let maxdepth = 2 * log2(nel);
    introsort_helper(base, nel, width, maxdepth, &mut comp);
}

// num must be nonzero
fn log2(num: size_t) -> size_t {
    (size_t::BITS - 1 - num.leading_zeros()) as size_t
}

fn introsort_helper<C>(
    mut base: *mut u8,
    mut nel: size_t,
    width: size_t,
    mut maxdepth: size_t,
    comp: &mut C,
) where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    const THRESHOLD: size_t = 8;

    // Recurse into the smaller half only; loop on the larger one.
    loop {
        if nel < THRESHOLD {
            insertion_sort(base, nel, width, comp);
            break;
        } else if maxdepth == 0 {
            heapsort(base, nel, width, comp);
            break;
        } else {
            let (left, right) = partition(base, nel, width, comp);
            let right_base = unsafe { base.add((right + 1) * width) };
            let right_nel = nel - (right + 1);
            maxdepth -= 1;
            if left < nel - right {
                introsort_helper(base, left, width, maxdepth, comp);
                base = right_base;
                nel = right_nel;
            } else {
                introsort_helper(right_base, right_nel, width, maxdepth, comp);
                nel = left;
            }
        }
    }
}

fn insertion_sort<C>(base: *mut u8, nel: size_t, width: size_t, comp: &mut C)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    for i in 0..nel {
        for j in (0..i).rev() {
            let current = unsafe { base.add(j * width) };
            let next = unsafe { base.add((j + 1) * width) };
            if comp(current.cast(), next.cast()) > 0 {
                swap(current, next, width);
            } else {
                break;
            }
        }
    }
}

fn heapsort<C>(base: *mut u8, nel: size_t, width: size_t, comp: &mut C)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    heapify(base, nel, width, comp);

    let mut end = nel - 1;
    while end > 0 {
        let end_ptr = unsafe { base.add(end * width) };
        swap(end_ptr, base, width);
        end -= 1;
        heap_sift_down(base, 0, end, width, comp);
    }
}

fn heapify<C>(base: *mut u8, nel: size_t, width: size_t, comp: &mut C)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    // parent of the last child
    let last_parent = (nel - 2) / 2;

    for start in (0..=last_parent).rev() {
        heap_sift_down(base, start, nel - 1, width, comp);
    }
}

fn heap_sift_down<C>(base: *mut u8, start: size_t, end: size_t, width: size_t, comp: &mut C)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    let left_child = |idx| 2 * idx + 1;

    let mut root = start;

    while left_child(root) <= end {
        let child = left_child(root);
        let mut swap_idx = root;

        let root_ptr = unsafe { base.add(root * width) };
        let mut swap_ptr = root_ptr;
        let first_child_ptr = unsafe { base.add(child * width) };

        if comp(swap_ptr.cast(), first_child_ptr.cast()) < 0 {
            swap_idx = child;
            swap_ptr = first_child_ptr;
        }
        if child < end {
            let second_child_ptr = unsafe { base.add((child + 1) * width) };
            if comp(swap_ptr.cast(), second_child_ptr.cast()) < 0 {
                swap_idx = child + 1;
                swap_ptr = second_child_ptr;
            }
        }

        if swap_idx == root {
            break;
        }
        swap(root_ptr, swap_ptr, width);
        root = swap_idx;
    }
}

/// Three-way partition around a median-of-three pivot. Returns the first
/// index not below the pivot and the last index not above it.
#[inline]
fn partition<C>(base: *mut u8, nel: size_t, width: size_t, comp: &mut C) -> (size_t, size_t)
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    let mut pivot = median_of_three(base, nel, width, comp);

    let mut i = 1;
    let mut j = 1;
    let mut n = nel - 2;

    while j <= n {
        let i_ptr = unsafe { base.add(i * width) };
        let j_ptr = unsafe { base.add(j * width) };
        let n_ptr = unsafe { base.add(n * width) };
        let pivot_ptr = unsafe { base.add(pivot * width) };

        let comparison = comp(j_ptr.cast(), pivot_ptr.cast());
        if comparison < 0 {
            swap(i_ptr, j_ptr, width);
            if i == pivot {
                pivot = j;
            }
            i += 1;
            j += 1;
        } else if comparison > 0 {
            swap(j_ptr, n_ptr, width);
            if n == pivot {
                pivot = j;
            }
            n -= 1;
        } else {
            j += 1;
        }
    }

    (i, n)
}

fn median_of_three<C>(base: *mut u8, nel: size_t, width: size_t, comp: &mut C) -> size_t
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    let pivot = nel / 2;

    let mid = unsafe { base.add(pivot * width) };
    let last = unsafe { base.add((nel - 1) * width) };
    if comp(mid.cast(), base.cast()) < 0 {
        swap(mid, base, width);
    }
    if comp(last.cast(), mid.cast()) < 0 {
        swap(mid, last, width);
        if comp(mid.cast(), base.cast()) < 0 {
            swap(mid, base, width);
        }
    }

    pivot
}

#[inline]
fn swap(mut ptr1: *mut u8, mut ptr2: *mut u8, mut width: size_t) {
    const BUFSIZE: usize = 128;

    if ptr1 == ptr2 {
        return;
    }
    let mut buffer = MaybeUninit::<[u8; BUFSIZE]>::uninit();
    while width > 0 {
        let copy_size = BUFSIZE.min(width);
        let buf = buffer.as_mut_ptr().cast::<u8>();

        unsafe {
            buf.copy_from_nonoverlapping(ptr1, copy_size);
            ptr1.copy_from_nonoverlapping(ptr2, copy_size);
            ptr2.copy_from_nonoverlapping(buf, copy_size);

            ptr1 = ptr1.add(copy_size);
            ptr2 = ptr2.add(copy_size);
        }
        width -= copy_size;
    }
}

/// Binary search over sorted `width`-byte elements; null when absent.
pub unsafe fn bsearch<C>(
    key: *const c_void,
    base: *const u8,
    nel: size_t,
    width: size_t,
    mut comp: C,
) -> *mut c_void
where
    C: FnMut(*const c_void, *const c_void) -> c_int,
{
    let mut start = base;
    let mut len = nel;
    while len > 0 {
        let med = start.add((len >> 1) * width);
        let diff = comp(key, med.cast());
        if diff == 0 {
            return med.cast_mut().cast();
        } else if diff > 0 {
            start = med.add(width);
            len -= 1;
        }
        len >>= 1;
    }
    core::ptr::null_mut()
}
