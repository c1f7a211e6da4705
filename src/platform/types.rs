pub use core::ffi::c_void;

pub type int8_t = i8;
pub type int16_t = i16;
pub type int32_t = i32;
pub type int64_t = i64;
pub type uint8_t = u8;
pub type uint16_t = u16;
pub type uint32_t = u32;
pub type uint64_t = u64;

pub type c_schar = i8;
pub type c_uchar = u8;
pub type c_short = i16;
pub type c_ushort = u16;
pub type c_int = i32;
pub type c_uint = u32;
pub type c_float = f32;
pub type c_double = f64;
pub type c_longlong = i64;
pub type c_ulonglong = u64;
pub type intmax_t = i64;
pub type uintmax_t = u64;

pub type size_t = usize;
pub type ptrdiff_t = isize;
pub type intptr_t = isize;
pub type uintptr_t = usize;
pub type ssize_t = isize;

pub type c_char = i8;
#[cfg(any(target_pointer_width = "32", windows))]
pub type c_long = i32;
#[cfg(any(target_pointer_width = "32", windows))]
pub type c_ulong = u32;
#[cfg(all(target_pointer_width = "64", not(windows)))]
pub type c_long = i64;
#[cfg(all(target_pointer_width = "64", not(windows)))]
pub type c_ulong = u64;

pub type wchar_t = i32;

/// Largest fundamental alignment; every raw-memory allocation honours it.
#[repr(C, align(16))]
pub struct max_align_t {
    _inner: [u8; 16],
}

#[cfg(all(feature = "check_against_libc_crate", unix))]
const _: () = {
    use libc as libc_crate;
    use core::mem::size_of;

    macro_rules! same_size {
        ($($name:ident),*) => {
            $(
                if size_of::<$name>() != size_of::<libc_crate::$name>() {
                    panic!(concat!("size mismatch for ", stringify!($name)));
                }
            )*
        };
    }

    same_size!(
        c_char, c_schar, c_uchar, c_short, c_ushort, c_int, c_uint, c_long, c_ulong, c_longlong,
        c_ulonglong, c_float, c_double, size_t, ssize_t, intptr_t, uintptr_t, ptrdiff_t,
        intmax_t, uintmax_t, wchar_t
    );
};
