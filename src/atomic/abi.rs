//! `Y__c11_atomic_*`, `Y__atomic_*` and `Y__sync_*` bridges, one per integer
//! and float type. The `__c11` and `_n` families pass values; the `__atomic`
//! load/store/exchange family passes them through addresses.

use paste::paste;

use crate::{platform::types::*, tls::Tls};

macro_rules! fetch_bridges {
    ($name:ident, $ty:ty; $($op:ident),*) => {
        paste! {
            $(
                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_fetch_ $op $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::[<fetch_ $op>](ptr as *mut $ty, val, order),
                        "__c11_atomic_fetch_{}{}({:#x}, {}, {})",
                        stringify!($op), stringify!($name), ptr, val, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_fetch_ $op $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) -> $ty {
                    [<Y__c11_atomic_fetch_ $op $name>](tls, ptr, val, order)
                }
            )*
        }
    };
}

macro_rules! atomic_bridges {
    ($($name:ident: $ty:ty),* $(,)?) => {
        paste! {
            $(
                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_load $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    order: c_int,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::load(ptr as *mut $ty, order),
                        "__c11_atomic_load{}({:#x}, {})", stringify!($name), ptr, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_store $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) {
                    trace_expr!(
                        tls,
                        super::store(ptr as *mut $ty, val, order),
                        "__c11_atomic_store{}({:#x}, {}, {})", stringify!($name), ptr, val, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_exchange $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::exchange(ptr as *mut $ty, val, order),
                        "__c11_atomic_exchange{}({:#x}, {}, {})", stringify!($name), ptr, val, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_compare_exchange_strong $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    expected: uintptr_t,
                    desired: $ty,
                    success: c_int,
                    failure: c_int,
                ) -> int32_t {
                    trace_expr!(
                        tls,
                        super::compare_exchange(
                            ptr as *mut $ty,
                            expected as *mut $ty,
                            desired,
                            false,
                            success,
                            failure,
                        ) as int32_t,
                        "__c11_atomic_compare_exchange_strong{}({:#x}, {:#x}, {})",
                        stringify!($name), ptr, expected, desired
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_compare_exchange_weak $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    expected: uintptr_t,
                    desired: $ty,
                    success: c_int,
                    failure: c_int,
                ) -> int32_t {
                    trace_expr!(
                        tls,
                        super::compare_exchange(
                            ptr as *mut $ty,
                            expected as *mut $ty,
                            desired,
                            true,
                            success,
                            failure,
                        ) as int32_t,
                        "__c11_atomic_compare_exchange_weak{}({:#x}, {:#x}, {})",
                        stringify!($name), ptr, expected, desired
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_load_n $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    order: c_int,
                ) -> $ty {
                    [<Y__c11_atomic_load $name>](tls, ptr, order)
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_store_n $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) {
                    [<Y__c11_atomic_store $name>](tls, ptr, val, order)
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_load $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    ret: uintptr_t,
                    order: c_int,
                ) {
                    *(ret as *mut $ty) = [<Y__c11_atomic_load $name>](tls, ptr, order);
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_store $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: uintptr_t,
                    order: c_int,
                ) {
                    [<Y__c11_atomic_store $name>](tls, ptr, *(val as *const $ty), order)
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_exchange $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: uintptr_t,
                    ret: uintptr_t,
                    order: c_int,
                ) {
                    *(ret as *mut $ty) =
                        [<Y__c11_atomic_exchange $name>](tls, ptr, *(val as *const $ty), order);
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_compare_exchange $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    expected: uintptr_t,
                    desired: uintptr_t,
                    weak: int32_t,
                    success: c_int,
                    failure: c_int,
                ) -> int32_t {
                    let desired = *(desired as *const $ty);
                    if weak != 0 {
                        [<Y__c11_atomic_compare_exchange_weak $name>](
                            tls, ptr, expected, desired, success, failure,
                        )
                    } else {
                        [<Y__c11_atomic_compare_exchange_strong $name>](
                            tls, ptr, expected, desired, success, failure,
                        )
                    }
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__sync_val_compare_and_swap $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    oldval: $ty,
                    newval: $ty,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::sync_val_compare_and_swap(ptr as *mut $ty, oldval, newval),
                        "__sync_val_compare_and_swap{}({:#x}, {}, {})",
                        stringify!($name), ptr, oldval, newval
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__sync_bool_compare_and_swap $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    oldval: $ty,
                    newval: $ty,
                ) -> int32_t {
                    trace_expr!(
                        tls,
                        super::sync_bool_compare_and_swap(ptr as *mut $ty, oldval, newval) as int32_t,
                        "__sync_bool_compare_and_swap{}({:#x}, {}, {})",
                        stringify!($name), ptr, oldval, newval
                    )
                }

                fetch_bridges!($name, $ty; add, sub, and, or, xor);
            )*
        }
    };
}

atomic_bridges! {
    Int8: int8_t,
    Uint8: uint8_t,
    Int16: int16_t,
    Uint16: uint16_t,
    Int32: int32_t,
    Uint32: uint32_t,
    Int64: int64_t,
    Uint64: uint64_t,
    Intptr: intptr_t,
    Uintptr: uintptr_t,
}

macro_rules! float_bridges {
    ($($name:ident: $ty:ty),* $(,)?) => {
        paste! {
            $(
                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_load $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    order: c_int,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::load_float(ptr as *mut $ty, order),
                        "__c11_atomic_load{}({:#x}, {})", stringify!($name), ptr, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_store $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) {
                    trace_expr!(
                        tls,
                        super::store_float(ptr as *mut $ty, val, order),
                        "__c11_atomic_store{}({:#x}, {}, {})", stringify!($name), ptr, val, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__c11_atomic_fetch_add $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) -> $ty {
                    trace_expr!(
                        tls,
                        super::fetch_add_float(ptr as *mut $ty, val, order),
                        "__c11_atomic_fetch_add{}({:#x}, {}, {})", stringify!($name), ptr, val, order
                    )
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_load_n $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    order: c_int,
                ) -> $ty {
                    [<Y__c11_atomic_load $name>](tls, ptr, order)
                }

                #[no_mangle]
                pub unsafe extern "C" fn [<Y__atomic_store_n $name>](
                    tls: *mut Tls,
                    ptr: uintptr_t,
                    val: $ty,
                    order: c_int,
                ) {
                    [<Y__c11_atomic_store $name>](tls, ptr, val, order)
                }
            )*
        }
    };
}

float_bridges! {
    Float32: c_float,
    Float64: c_double,
}

#[no_mangle]
pub unsafe extern "C" fn Y__sync_synchronize(tls: *mut Tls) {
    trace_expr!(tls, super::synchronize(), "__sync_synchronize()")
}

#[no_mangle]
pub unsafe extern "C" fn Y__sync_add_and_fetch_uint32(
    tls: *mut Tls,
    ptr: uintptr_t,
    val: uint32_t,
) -> uint32_t {
    trace_expr!(
        tls,
        super::fetch_add(ptr as *mut u32, val, super::__ATOMIC_SEQ_CST).wrapping_add(val),
        "__sync_add_and_fetch_uint32({:#x}, {})",
        ptr,
        val
    )
}

#[no_mangle]
pub unsafe extern "C" fn Y__sync_sub_and_fetch_uint32(
    tls: *mut Tls,
    ptr: uintptr_t,
    val: uint32_t,
) -> uint32_t {
    trace_expr!(
        tls,
        super::fetch_sub(ptr as *mut u32, val, super::__ATOMIC_SEQ_CST).wrapping_sub(val),
        "__sync_sub_and_fetch_uint32({:#x}, {})",
        ptr,
        val
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{__ATOMIC_ACQUIRE, __ATOMIC_RELAXED, __ATOMIC_SEQ_CST};

    #[test]
    fn pointer_style_bridges() {
        let mut tls = Tls::new();
        let mut cell = 0i16;
        let val = 12i16;
        let mut ret = 0i16;
        let p = &mut cell as *mut i16 as uintptr_t;
        unsafe {
            Y__atomic_storeInt16(&mut tls, p, &val as *const i16 as uintptr_t, __ATOMIC_SEQ_CST);
            Y__atomic_loadInt16(&mut tls, p, &mut ret as *mut i16 as uintptr_t, __ATOMIC_SEQ_CST);
            assert_eq!(ret, 12);

            let new = -1i16;
            Y__atomic_exchangeInt16(
                &mut tls,
                p,
                &new as *const i16 as uintptr_t,
                &mut ret as *mut i16 as uintptr_t,
                __ATOMIC_SEQ_CST,
            );
            assert_eq!(ret, 12);
            assert_eq!(cell, -1);
        }
        tls.close();
    }

    #[test]
    fn compare_exchange_bridges() {
        let mut tls = Tls::new();
        let mut cell = 5u64;
        let mut expected = 5u64;
        let desired = 6u64;
        let p = &mut cell as *mut u64 as uintptr_t;
        let e = &mut expected as *mut u64 as uintptr_t;
        unsafe {
            assert_eq!(
                Y__atomic_compare_exchangeUint64(
                    &mut tls,
                    p,
                    e,
                    &desired as *const u64 as uintptr_t,
                    0,
                    __ATOMIC_SEQ_CST,
                    __ATOMIC_SEQ_CST,
                ),
                1
            );
            assert_eq!(Y__c11_atomic_compare_exchange_strongUint64(&mut tls, p, e, 7, 5, 5), 0);
        }
        assert_eq!(expected, 6);
        assert_eq!(cell, 6);
        tls.close();
    }

    #[test]
    fn pointer_width_and_n_bridges() {
        let mut tls = Tls::new();
        let mut slot: uintptr_t = 0;
        let mut expected: uintptr_t = 0x2000;
        let p = &mut slot as *mut uintptr_t as uintptr_t;
        unsafe {
            Y__atomic_store_nUintptr(&mut tls, p, 0x2000, __ATOMIC_SEQ_CST);
            assert_eq!(Y__atomic_load_nUintptr(&mut tls, p, __ATOMIC_ACQUIRE), 0x2000);
            assert_eq!(Y__c11_atomic_fetch_addUintptr(&mut tls, p, 16, __ATOMIC_SEQ_CST), 0x2000);
            assert_eq!(
                Y__c11_atomic_compare_exchange_strongUintptr(
                    &mut tls,
                    p,
                    &mut expected as *mut uintptr_t as uintptr_t,
                    0,
                    __ATOMIC_SEQ_CST,
                    __ATOMIC_SEQ_CST,
                ),
                0
            );
            assert_eq!(expected, 0x2010);

            let mut n = 3i32;
            let q = &mut n as *mut i32 as uintptr_t;
            Y__atomic_store_nInt32(&mut tls, q, -3, __ATOMIC_RELAXED);
            assert_eq!(Y__atomic_load_nInt32(&mut tls, q, __ATOMIC_RELAXED), -3);
        }
        assert_eq!(slot, 0x2010);
        tls.close();
    }

    #[test]
    fn float_bridges() {
        let mut tls = Tls::new();
        let mut f = 0f32;
        let mut d = 0f64;
        let pf = &mut f as *mut f32 as uintptr_t;
        let pd = &mut d as *mut f64 as uintptr_t;
        unsafe {
            Y__c11_atomic_storeFloat32(&mut tls, pf, 0.5, __ATOMIC_SEQ_CST);
            assert_eq!(Y__c11_atomic_fetch_addFloat32(&mut tls, pf, 0.25, __ATOMIC_SEQ_CST), 0.5);
            assert_eq!(Y__atomic_load_nFloat32(&mut tls, pf, __ATOMIC_SEQ_CST), 0.75);

            Y__atomic_store_nFloat64(&mut tls, pd, -1.0, __ATOMIC_SEQ_CST);
            assert_eq!(Y__c11_atomic_fetch_addFloat64(&mut tls, pd, 3.0, __ATOMIC_SEQ_CST), -1.0);
            assert_eq!(Y__c11_atomic_loadFloat64(&mut tls, pd, __ATOMIC_SEQ_CST), 2.0);
        }
        tls.close();
    }

    #[test]
    fn fetch_and_sync_bridges() {
        let mut tls = Tls::new();
        let mut byte = 0x0fu8;
        let mut word = 10u32;
        let b = &mut byte as *mut u8 as uintptr_t;
        let w = &mut word as *mut u32 as uintptr_t;
        unsafe {
            assert_eq!(Y__c11_atomic_fetch_orUint8(&mut tls, b, 0xf0, 5), 0x0f);
            assert_eq!(Y__atomic_fetch_xorUint8(&mut tls, b, 0xff, 5), 0xff);
            assert_eq!(Y__sync_val_compare_and_swapUint8(&mut tls, b, 1, 2), 0);
            assert_eq!(Y__sync_add_and_fetch_uint32(&mut tls, w, 5), 15);
            assert_eq!(Y__sync_sub_and_fetch_uint32(&mut tls, w, 15), 0);
            assert_eq!(Y__sync_bool_compare_and_swapUint32(&mut tls, w, 0, 1), 1);
            Y__sync_synchronize(&mut tls);
        }
        assert_eq!(byte, 0);
        assert_eq!(word, 1);
        tls.close();
    }
}
