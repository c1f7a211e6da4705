//! The handful of string.h routines the runtime itself leans on.

use core::{marker::PhantomData, ptr::NonNull};

use crate::platform::types::*;

/// Iterator over the bytes of a NUL-terminated buffer, terminator excluded.
pub struct NulTerminated<'a> {
    ptr: NonNull<c_char>,
    phantom: PhantomData<&'a c_char>,
}

impl<'a> NulTerminated<'a> {
    /// # Safety
    /// `ptr` must be non-null and a NUL must follow it within the same buffer.
    pub unsafe fn new(ptr: *const c_char) -> Self {
        NulTerminated {
            ptr: NonNull::new_unchecked(ptr.cast_mut()),
            phantom: PhantomData,
        }
    }
}

impl<'a> Iterator for NulTerminated<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = unsafe { *self.ptr.as_ptr() } as u8;
        if byte == 0 {
            None
        } else {
            self.ptr = unsafe { self.ptr.add(1) };
            Some(byte)
        }
    }
}

pub unsafe fn strlen(s: *const c_char) -> size_t {
    NulTerminated::new(s).count()
}

/// Length of `s`, reading at most `size` bytes.
pub unsafe fn strnlen(s: *const c_char, size: size_t) -> size_t {
    NulTerminated::new(s).take(size).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        let s = b"hello\0world\0";
        unsafe {
            assert_eq!(strlen(s.as_ptr().cast()), 5);
            assert_eq!(strnlen(s.as_ptr().cast(), 3), 3);
            assert_eq!(strnlen(s.as_ptr().cast(), 30), 5);
            assert_eq!(strlen(s.as_ptr().add(6).cast()), 5);
        }
    }
}
