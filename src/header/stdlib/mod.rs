//! stdlib.h bridges: the raw-memory facade, sorting and process abort.

use crate::{
    c_str::CStr,
    header::errno::ENOMEM,
    platform::{allocator, types::*},
    tls::Tls,
    trampoline::{self, FuncAddr},
};

pub mod sort;

unsafe fn or_enomem(tls: *mut Tls, p: *mut c_void) -> uintptr_t {
    if p.is_null() {
        (*tls).set_errno(ENOMEM);
    }
    p as uintptr_t
}

#[no_mangle]
pub unsafe extern "C" fn Ymalloc(tls: *mut Tls, size: size_t) -> uintptr_t {
    trace_expr!(
        tls,
        or_enomem(tls, allocator::alloc(size)),
        "malloc({})",
        size
    )
}

#[no_mangle]
pub unsafe extern "C" fn Ycalloc(tls: *mut Tls, nmemb: size_t, size: size_t) -> uintptr_t {
    trace_expr!(
        tls,
        or_enomem(tls, allocator::calloc(nmemb, size)),
        "calloc({}, {})",
        nmemb,
        size
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yrealloc(tls: *mut Tls, ptr: uintptr_t, size: size_t) -> uintptr_t {
    trace_expr!(
        tls,
        or_enomem(tls, allocator::realloc(ptr as *mut c_void, size)),
        "realloc({:#x}, {})",
        ptr,
        size
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yreallocarray(
    tls: *mut Tls,
    ptr: uintptr_t,
    nmemb: size_t,
    size: size_t,
) -> uintptr_t {
    match nmemb.checked_mul(size) {
        Some(total) => Yrealloc(tls, ptr, total),
        None => {
            (*tls).set_errno(ENOMEM);
            0
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn Yfree(tls: *mut Tls, ptr: uintptr_t) {
    trace_expr!(
        tls,
        allocator::free(ptr as *mut c_void),
        "free({:#x})",
        ptr
    )
}

#[no_mangle]
pub unsafe extern "C" fn Ymalloc_usable_size(tls: *mut Tls, ptr: uintptr_t) -> size_t {
    trace_expr!(
        tls,
        allocator::alloc_usable_size(ptr as *mut c_void),
        "malloc_usable_size({:#x})",
        ptr
    )
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin_malloc(tls: *mut Tls, size: size_t) -> uintptr_t {
    Ymalloc(tls, size)
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin_free(tls: *mut Tls, ptr: uintptr_t) {
    Yfree(tls, ptr)
}

unsafe fn comparator(tls: *mut Tls, compar: FuncAddr) -> std::sync::Arc<trampoline::ExternFn> {
    match trampoline::resolve_cmp(compar) {
        Some(f) => f,
        None => {
            log::error!("no comparator registered at {compar:#x}");
            Yabort(tls)
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn Yqsort(
    tls: *mut Tls,
    base: uintptr_t,
    nmemb: size_t,
    size: size_t,
    compar: uintptr_t,
) {
    if nmemb < 2 || size == 0 {
        return;
    }
    let f = comparator(tls, compar);
    sort::introsort(base as *mut u8, nmemb, size, |a, b| {
        f.call_cmp(tls, a as uintptr_t, b as uintptr_t)
    });
}

#[no_mangle]
pub unsafe extern "C" fn Ybsearch(
    tls: *mut Tls,
    key: uintptr_t,
    base: uintptr_t,
    nmemb: size_t,
    size: size_t,
    compar: uintptr_t,
) -> uintptr_t {
    if nmemb == 0 {
        return 0;
    }
    let f = comparator(tls, compar);
    sort::bsearch(key as *const c_void, base as *const u8, nmemb, size, |a, b| {
        f.call_cmp(tls, a as uintptr_t, b as uintptr_t)
    }) as uintptr_t
}

#[no_mangle]
pub unsafe extern "C" fn Yabort(_tls: *mut Tls) -> ! {
    log::error!("abort()");
    std::process::abort()
}

#[no_mangle]
pub unsafe extern "C" fn Y__assert_fail(
    tls: *mut Tls,
    assertion: uintptr_t,
    file: uintptr_t,
    line: c_uint,
    function: uintptr_t,
) -> ! {
    let text = |addr| {
        CStr::from_addr(addr)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    eprintln!(
        "assertion failure: {}:{}.{}: {}",
        text(file),
        line,
        text(function),
        text(assertion),
    );
    Yabort(tls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trampoline::{register_cmp, unregister};

    fn cmp_u32(_: *mut Tls, a: uintptr_t, b: uintptr_t) -> c_int {
        let (a, b) = unsafe { (*(a as *const u32), *(b as *const u32)) };
        a.cmp(&b) as c_int
    }

    #[test]
    fn allocation_bridges() {
        let mut tls = Tls::new();
        unsafe {
            let p = Ymalloc(&mut tls, 0);
            assert_ne!(p, 0);
            Yfree(&mut tls, p);
            Yfree(&mut tls, 0);

            let p = Ycalloc(&mut tls, 4, 4);
            assert_eq!(core::slice::from_raw_parts(p as *const u8, 16), &[0; 16]);
            assert_eq!(Ymalloc_usable_size(&mut tls, p), 16);
            let p = Yrealloc(&mut tls, p, 64);
            assert_ne!(p, 0);
            assert_eq!(*(p as *const u8), 0);
            Y__builtin_free(&mut tls, p);

            assert_eq!(Ycalloc(&mut tls, usize::MAX, 2), 0);
            assert_eq!(tls.errno(), ENOMEM);
            tls.set_errno(0);
            assert_eq!(Yreallocarray(&mut tls, 0, usize::MAX, 2), 0);
            assert_eq!(tls.errno(), ENOMEM);
        }
        tls.close();
    }

    #[test]
    fn qsort_and_bsearch_through_trampolines() {
        let mut tls = Tls::new();
        let compar = register_cmp(cmp_u32);
        let mut v: Vec<u32> = (0..100).map(|i| (i * 31) % 100).collect();
        unsafe {
            Yqsort(&mut tls, v.as_mut_ptr() as uintptr_t, v.len(), 4, compar);
            assert_eq!(v, (0..100).collect::<Vec<_>>());

            let key = 42u32;
            let found = Ybsearch(
                &mut tls,
                &key as *const u32 as uintptr_t,
                v.as_ptr() as uintptr_t,
                v.len(),
                4,
                compar,
            );
            assert_eq!(found, v.as_ptr().add(42) as uintptr_t);

            let missing = 1000u32;
            let found = Ybsearch(
                &mut tls,
                &missing as *const u32 as uintptr_t,
                v.as_ptr() as uintptr_t,
                v.len(),
                4,
                compar,
            );
            assert_eq!(found, 0);
        }
        assert!(unregister(compar));
        tls.close();
    }
}
