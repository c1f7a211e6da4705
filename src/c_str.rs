use core::{marker::PhantomData, ptr::NonNull, str::Utf8Error};

use std::borrow::Cow;

use crate::{
    header::string::strlen,
    platform::types::{c_char, uintptr_t},
};

/// Borrowed NUL-terminated string living in raw memory.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct CStr<'a> {
    ptr: NonNull<c_char>,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> CStr<'a> {
    /// Safety
    ///
    /// The ptr must be valid up to and including the first NUL byte from the base ptr.
    pub const unsafe fn from_ptr(ptr: *const c_char) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr as *mut c_char),
            _marker: PhantomData,
        }
    }
    pub unsafe fn from_nullable_ptr(ptr: *const c_char) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self::from_ptr(ptr))
        }
    }
    /// A translated-code address; `None` for 0.
    pub unsafe fn from_addr(addr: uintptr_t) -> Option<Self> {
        Self::from_nullable_ptr(addr as *const c_char)
    }
    pub fn to_bytes_with_nul(self) -> &'a [u8] {
        unsafe {
            // SAFETY: The string must be valid at least until (and including) the NUL byte.
            let len = strlen(self.ptr.as_ptr());
            core::slice::from_raw_parts(self.ptr.as_ptr().cast(), len + 1)
        }
    }
    pub fn to_bytes(self) -> &'a [u8] {
        let s = self.to_bytes_with_nul();
        &s[..s.len() - 1]
    }
    pub fn to_str(self) -> Result<&'a str, Utf8Error> {
        core::str::from_utf8(self.to_bytes())
    }
    pub fn to_string_lossy(self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.to_bytes())
    }
    pub fn as_ptr(self) -> *const c_char {
        self.ptr.as_ptr()
    }
}

unsafe impl Send for CStr<'_> {}
unsafe impl Sync for CStr<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views() {
        let raw = b"abc\0";
        let s = unsafe { CStr::from_addr(raw.as_ptr() as uintptr_t) }.unwrap();
        assert_eq!(s.to_bytes(), b"abc");
        assert_eq!(s.to_bytes_with_nul(), b"abc\0");
        assert_eq!(s.to_str(), Ok("abc"));
        assert!(unsafe { CStr::from_addr(0) }.is_none());
    }
}
