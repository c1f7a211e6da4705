use std::fmt;

use crate::{header::errno::STR_ERROR, platform::types::c_int, tls::Tls};

/// Positive error codes (EINVAL, not -EINVAL).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Errno(pub c_int);

impl From<Errno> for std::io::Error {
    #[inline]
    fn from(Errno(errno): Errno) -> Self {
        Self::from_raw_os_error(errno)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match usize::try_from(self.0).ok().and_then(|i| STR_ERROR.get(i)) {
            Some(desc) => write!(f, "{desc}"),
            None => write!(f, "unknown error ({})", self.0),
        }
    }
}

impl std::error::Error for Errno {}

/// Contract violations on an execution context. These are bugs in the caller;
/// the context panics with the variant as its message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextMisuse {
    /// A free would move the stack pointer below the segment header.
    UnbalancedStack,
    /// `free(got)` does not pair with the most recent `alloc(expected)`.
    MismatchedFree { expected: usize, got: usize },
    /// Two threads entered the same context at once.
    ConcurrentUse,
    /// `close` with scratch allocations still live.
    LiveAllocations(c_int),
    /// `close` with stack segments still linked.
    LiveSegments(c_int),
}

impl fmt::Display for ContextMisuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnbalancedStack => write!(f, "context misuse: unbalanced C stack"),
            Self::MismatchedFree { expected, got } => write!(
                f,
                "context misuse: free({got}) does not match alloc({expected})"
            ),
            Self::ConcurrentUse => write!(f, "context misuse: concurrent use from two threads"),
            Self::LiveAllocations(n) => {
                write!(f, "context misuse: close with {n} live allocations")
            }
            Self::LiveSegments(n) => write!(f, "context misuse: close with {n} live stack segments"),
        }
    }
}

impl std::error::Error for ContextMisuse {}

impl ContextMisuse {
    #[cold]
    #[track_caller]
    pub fn raise(self) -> ! {
        log::error!("{self}");
        panic!("{self}")
    }
}

pub trait ResultExt<T> {
    fn or_minus_one_errno(self, tls: &mut Tls) -> T;
}
impl<T: From<i8>> ResultExt<T> for Result<T, Errno> {
    fn or_minus_one_errno(self, tls: &mut Tls) -> T {
        match self {
            Self::Ok(v) => v,
            Self::Err(Errno(errno)) => {
                tls.set_errno(errno);
                T::from(-1)
            }
        }
    }
}

pub trait ResultExtPtrMut<T> {
    fn or_errno_null_mut(self, tls: &mut Tls) -> *mut T;
}
impl<T> ResultExtPtrMut<T> for Result<*mut T, Errno> {
    fn or_errno_null_mut(self, tls: &mut Tls) -> *mut T {
        match self {
            Self::Ok(ptr) => ptr,
            Self::Err(Errno(errno)) => {
                tls.set_errno(errno);
                std::ptr::null_mut()
            }
        }
    }
}
