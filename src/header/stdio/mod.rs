//! stdio.h formatted I/O bridges over the printf and scanf engines.

use core::ptr;
use std::io::{self, Write};

use crate::{
    c_str::CStr,
    header::{
        errno::{EIO, ENOMEM},
        stdlib::Yabort,
    },
    platform::{allocator, types::*, FileReader, FileWriter, StringWriter, UnsafeStringWriter},
    sync::Mutex,
    tls::Tls,
    va_list::VaList,
};

pub use self::{
    printf::{printf, try_printf},
    scanf::{scanf, BufferReader, PushbackReader, Source},
};

pub mod printf;
pub mod scanf;

pub const EOF: c_int = -1;

/// Bytes handed back to standard input by earlier scans.
static STDIN_PUSHBACK: Mutex<Vec<u8>> = Mutex::new(Vec::new());

/// Release process-wide stdio state. Called once at process exit.
pub fn teardown() {
    let mut pushback = STDIN_PUSHBACK.lock();
    if !pushback.is_empty() {
        log::debug!("stdio: dropping {} unread stdin bytes", pushback.len());
    }
    *pushback = Vec::new();
}

fn set_io_errno(tls: *mut Tls, err: &io::Error) {
    let errno = err.raw_os_error().unwrap_or(EIO);
    unsafe { (*tls).set_errno(errno) };
}

unsafe fn print_to<W: Write>(tls: *mut Tls, w: W, format: uintptr_t, va: uintptr_t) -> c_int {
    match try_printf(w, format as *const c_char, VaList::new(va)) {
        Ok(n) => n,
        Err(err) => {
            set_io_errno(tls, &err);
            -1
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn Yprintf(tls: *mut Tls, format: uintptr_t, va: uintptr_t) -> c_int {
    trace_expr!(
        tls,
        print_to(tls, FileWriter::new(1), format, va),
        "printf({:#x}, {:#x})",
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvprintf(tls: *mut Tls, format: uintptr_t, va: uintptr_t) -> c_int {
    Yprintf(tls, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Ydprintf(
    tls: *mut Tls,
    fd: c_int,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    trace_expr!(
        tls,
        print_to(tls, FileWriter::new(fd), format, va),
        "dprintf({}, {:#x}, {:#x})",
        fd,
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvdprintf(
    tls: *mut Tls,
    fd: c_int,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ydprintf(tls, fd, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Ysprintf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    trace_expr!(
        tls,
        print_to(tls, UnsafeStringWriter(s as *mut u8), format, va),
        "sprintf({:#x}, {:#x}, {:#x})",
        s,
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvsprintf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysprintf(tls, s, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Ysnprintf(
    tls: *mut Tls,
    s: uintptr_t,
    size: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    if format == 0 {
        return 0;
    }
    trace_expr!(
        tls,
        print_to(tls, StringWriter::new(s as *mut u8, size), format, va),
        "snprintf({:#x}, {}, {:#x}, {:#x})",
        s,
        size,
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvsnprintf(
    tls: *mut Tls,
    s: uintptr_t,
    size: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysnprintf(tls, s, size, format, va)
}

/// Format into a fresh facade allocation stored at `*strp`. The caller
/// releases it with `Yfree`.
#[no_mangle]
pub unsafe extern "C" fn Yasprintf(
    tls: *mut Tls,
    strp: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    let mut out = Vec::new();
    let len = print_to(tls, &mut out, format, va);
    if len < 0 {
        return -1;
    }
    let buf = allocator::alloc(out.len() + 1).cast::<u8>();
    if buf.is_null() {
        (*tls).set_errno(ENOMEM);
        return -1;
    }
    ptr::copy_nonoverlapping(out.as_ptr(), buf, out.len());
    *buf.add(out.len()) = 0;
    *(strp as *mut uintptr_t) = buf as uintptr_t;
    len
}

#[no_mangle]
pub unsafe extern "C" fn Yvasprintf(
    tls: *mut Tls,
    strp: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Yasprintf(tls, strp, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin_snprintf(
    tls: *mut Tls,
    s: uintptr_t,
    size: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysnprintf(tls, s, size, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin_sprintf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysprintf(tls, s, format, va)
}

unsafe fn check_object_size(tls: *mut Tls, maxlen: size_t, os: size_t) {
    if os != size_t::MAX && maxlen > os {
        log::error!("snprintf: buffer of {os} bytes given a bound of {maxlen}");
        Yabort(tls);
    }
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin___snprintf_chk(
    tls: *mut Tls,
    s: uintptr_t,
    maxlen: size_t,
    _flag: c_int,
    os: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    check_object_size(tls, maxlen, os);
    Ysnprintf(tls, s, maxlen, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin___sprintf_chk(
    tls: *mut Tls,
    s: uintptr_t,
    _flag: c_int,
    os: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    if os == size_t::MAX {
        return Ysprintf(tls, s, format, va);
    }
    // Output and its NUL must fit the object.
    let n = Ysnprintf(tls, s, os, format, va);
    if n >= 0 && n as size_t >= os {
        log::error!("sprintf: {n} bytes of output overflow a {os} byte buffer");
        Yabort(tls);
    }
    n
}

#[no_mangle]
pub unsafe extern "C" fn Y__builtin___vsnprintf_chk(
    tls: *mut Tls,
    s: uintptr_t,
    maxlen: size_t,
    _flag: c_int,
    os: size_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    check_object_size(tls, maxlen, os);
    Ysnprintf(tls, s, maxlen, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Yputs(tls: *mut Tls, s: uintptr_t) -> c_int {
    let Some(s) = CStr::from_addr(s) else {
        return EOF;
    };
    let mut w = FileWriter::new(1);
    match w.write_all(s.to_bytes()).and_then(|()| w.write_all(b"\n")) {
        Ok(()) => 1,
        Err(err) => {
            set_io_errno(tls, &err);
            EOF
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn Ysscanf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    let Some(input) = CStr::from_addr(s) else {
        return EOF;
    };
    trace_expr!(
        tls,
        scanf(
            &mut BufferReader::new(input.to_bytes()),
            format as *const c_char,
            VaList::new(va),
        ),
        "sscanf({:#x}, {:#x}, {:#x})",
        s,
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvsscanf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysscanf(tls, s, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Y__isoc99_sscanf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysscanf(tls, s, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Y__isoc99_vsscanf(
    tls: *mut Tls,
    s: uintptr_t,
    format: uintptr_t,
    va: uintptr_t,
) -> c_int {
    Ysscanf(tls, s, format, va)
}

#[no_mangle]
pub unsafe extern "C" fn Yscanf(tls: *mut Tls, format: uintptr_t, va: uintptr_t) -> c_int {
    let mut pushback = STDIN_PUSHBACK.lock();
    trace_expr!(
        tls,
        scanf(
            &mut PushbackReader::new(FileReader(0), &mut pushback),
            format as *const c_char,
            VaList::new(va),
        ),
        "scanf({:#x}, {:#x})",
        format,
        va
    )
}

#[no_mangle]
pub unsafe extern "C" fn Yvscanf(tls: *mut Tls, format: uintptr_t, va: uintptr_t) -> c_int {
    Yscanf(tls, format, va)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        header::stdlib::Yfree,
        va_list::{VaArg, VaBuffer},
    };

    fn addr(s: &[u8]) -> uintptr_t {
        s.as_ptr() as uintptr_t
    }

    #[test]
    fn snprintf_truncates_and_reports_full_length() {
        let mut tls = Tls::new();
        let args = VaBuffer::new(&[VaArg::Int32(12345)]).unwrap();
        let mut buf = [0xffu8; 4];
        unsafe {
            let n = Ysnprintf(&mut tls, buf.as_mut_ptr() as uintptr_t, buf.len(), addr(b"n=%d\0"), args.addr());
            assert_eq!(n, 7);
            assert_eq!(&buf, b"n=1\0");

            buf = [0xff; 4];
            let n = Ysnprintf(&mut tls, buf.as_mut_ptr() as uintptr_t, 0, addr(b"n=%d\0"), args.addr());
            assert_eq!(n, 7);
            assert_eq!(buf, [0xff; 4]);

            assert_eq!(Ysnprintf(&mut tls, buf.as_mut_ptr() as uintptr_t, buf.len(), 0, args.addr()), 0);
        }
        tls.close();
    }

    #[test]
    fn sprintf_and_chk_variants() {
        let mut tls = Tls::new();
        let args = VaBuffer::new(&[VaArg::Uintptr(addr(b"ok\0"))]).unwrap();
        let mut buf = [0xffu8; 16];
        unsafe {
            assert_eq!(Ysprintf(&mut tls, buf.as_mut_ptr() as uintptr_t, addr(b"[%s]\0"), args.addr()), 4);
            assert_eq!(&buf[..5], b"[ok]\0");

            let n = Y__builtin___snprintf_chk(
                &mut tls,
                buf.as_mut_ptr() as uintptr_t,
                3,
                0,
                size_t::MAX,
                addr(b"[%s]\0"),
                args.addr(),
            );
            assert_eq!(n, 4);
            assert_eq!(&buf[..3], b"[o\0");

            let n = Y__builtin___vsnprintf_chk(
                &mut tls,
                buf.as_mut_ptr() as uintptr_t,
                8,
                0,
                16,
                addr(b"%s!\0"),
                args.addr(),
            );
            assert_eq!(n, 3);
            assert_eq!(&buf[..4], b"ok!\0");

            buf.fill(0xff);
            let n = Y__builtin___sprintf_chk(
                &mut tls,
                buf.as_mut_ptr() as uintptr_t,
                0,
                5,
                addr(b"[%s]\0"),
                args.addr(),
            );
            assert_eq!(n, 4);
            assert_eq!(&buf[..6], b"[ok]\0\xff");

            let n = Y__builtin___sprintf_chk(
                &mut tls,
                buf.as_mut_ptr() as uintptr_t,
                0,
                size_t::MAX,
                addr(b"%s\0"),
                args.addr(),
            );
            assert_eq!(n, 2);
        }
        tls.close();
    }

    #[test]
    fn asprintf_allocates() {
        let mut tls = Tls::new();
        let args = VaBuffer::new(&[VaArg::Int32(7), VaArg::Float64(0.5)]).unwrap();
        let mut out: uintptr_t = 0;
        unsafe {
            let n = Yasprintf(
                &mut tls,
                &mut out as *mut uintptr_t as uintptr_t,
                addr(b"%d/%g\0"),
                args.addr(),
            );
            assert_eq!(n, 5);
            assert_eq!(CStr::from_addr(out).unwrap().to_bytes(), b"7/0.5");
            Yfree(&mut tls, out);
        }
        tls.close();
    }

    #[test]
    fn sscanf_bridges() {
        let mut tls = Tls::new();
        let mut a = 0i32;
        let mut word = [0u8; 8];
        let args = VaBuffer::new(&[
            VaArg::Uintptr(&mut a as *mut i32 as uintptr_t),
            VaArg::Uintptr(word.as_mut_ptr() as uintptr_t),
        ])
        .unwrap();
        unsafe {
            let n = Y__isoc99_sscanf(&mut tls, addr(b"9 lives\0"), addr(b"%d %s\0"), args.addr());
            assert_eq!(n, 2);
            assert_eq!(Ysscanf(&mut tls, addr(b"\0"), addr(b"%d\0"), args.addr()), EOF);
        }
        assert_eq!(a, 9);
        assert_eq!(&word[..6], b"lives\0");
        tls.close();
    }

    #[test]
    fn teardown_clears_stdin_pushback() {
        STDIN_PUSHBACK.lock().extend_from_slice(b"xy");
        teardown();
        assert!(STDIN_PUSHBACK.lock().is_empty());
    }
}
