//! printf-family formatting engine.

use std::io::{self, Write};

use bitflags::bitflags;

use crate::{
    c_str::CStr,
    header::string::strnlen,
    platform::{types::*, CountingWriter},
    va_list::VaList,
};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FmtFlags: u8 {
        /// `#`
        const ALT = 1 << 0;
        /// `0`
        const ZERO = 1 << 1;
        /// `-`
        const LEFT = 1 << 2;
        /// ` `
        const SPACE = 1 << 3;
        /// `+`
        const PLUS = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IntKind {
    Byte,
    Short,
    Int,
    Long,
    LongLong,
    IntMax,
    PtrDiff,
    Size,
    Int32,
    Int64,
}

#[derive(Clone, Copy, Debug)]
struct Spec {
    flags: FmtFlags,
    width: usize,
    precision: Option<usize>,
}

unsafe fn signed_arg(ap: &mut VaList, kind: IntKind) -> i64 {
    match kind {
        IntKind::Byte => ap.arg::<c_schar>() as i64,
        IntKind::Short => ap.arg::<c_short>() as i64,
        IntKind::Int | IntKind::Int32 => ap.arg::<c_int>() as i64,
        IntKind::Long => ap.arg::<c_long>() as i64,
        IntKind::LongLong | IntKind::IntMax | IntKind::Int64 => ap.arg::<c_longlong>(),
        IntKind::PtrDiff | IntKind::Size => ap.arg::<ssize_t>() as i64,
    }
}

unsafe fn unsigned_arg(ap: &mut VaList, kind: IntKind) -> u64 {
    match kind {
        IntKind::Byte => ap.arg::<c_uchar>() as u64,
        IntKind::Short => ap.arg::<c_ushort>() as u64,
        IntKind::Int | IntKind::Int32 => ap.arg::<c_uint>() as u64,
        IntKind::Long => ap.arg::<c_ulong>() as u64,
        IntKind::LongLong | IntKind::IntMax | IntKind::Int64 => ap.arg::<c_ulonglong>(),
        IntKind::PtrDiff | IntKind::Size => ap.arg::<size_t>() as u64,
    }
}

/// Emit `head` (sign and prefix) and `body`, padded to `width`. Zero padding
/// goes between the two.
fn pad<W: Write>(
    w: &mut W,
    flags: FmtFlags,
    width: usize,
    zero: bool,
    head: &[u8],
    body: &[u8],
) -> io::Result<()> {
    let len = head.len() + body.len();
    let fill = width.saturating_sub(len);
    if flags.contains(FmtFlags::LEFT) {
        w.write_all(head)?;
        w.write_all(body)?;
        write_repeat(w, b' ', fill)
    } else if zero {
        w.write_all(head)?;
        write_repeat(w, b'0', fill)?;
        w.write_all(body)
    } else {
        write_repeat(w, b' ', fill)?;
        w.write_all(head)?;
        w.write_all(body)
    }
}

fn write_repeat<W: Write>(w: &mut W, byte: u8, n: usize) -> io::Result<()> {
    let chunk = [byte; 32];
    let mut left = n;
    while left > 0 {
        let step = left.min(chunk.len());
        w.write_all(&chunk[..step])?;
        left -= step;
    }
    Ok(())
}

fn sign_of(negative: bool, flags: FmtFlags) -> &'static [u8] {
    if negative {
        b"-"
    } else if flags.contains(FmtFlags::PLUS) {
        b"+"
    } else if flags.contains(FmtFlags::SPACE) {
        b" "
    } else {
        b""
    }
}

fn fmt_int<W: Write>(
    w: &mut W,
    spec: &Spec,
    conv: u8,
    negative: bool,
    magnitude: u64,
) -> io::Result<()> {
    let mut digits = match conv {
        b'o' => format!("{magnitude:o}"),
        b'x' => format!("{magnitude:x}"),
        b'X' => format!("{magnitude:X}"),
        b'b' => format!("{magnitude:b}"),
        _ => format!("{magnitude}"),
    }
    .into_bytes();

    if spec.precision == Some(0) && magnitude == 0 {
        digits.clear();
    }
    if let Some(precision) = spec.precision {
        if digits.len() < precision {
            let mut padded = vec![b'0'; precision - digits.len()];
            padded.extend_from_slice(&digits);
            digits = padded;
        }
    }

    let alt = spec.flags.contains(FmtFlags::ALT);
    if alt && conv == b'o' && digits.first() != Some(&b'0') {
        digits.insert(0, b'0');
    }

    let mut head = Vec::with_capacity(3);
    if matches!(conv, b'd' | b'i') {
        head.extend_from_slice(sign_of(negative, spec.flags));
    }
    if alt && magnitude != 0 {
        match conv {
            b'x' => head.extend_from_slice(b"0x"),
            b'X' => head.extend_from_slice(b"0X"),
            b'b' => head.extend_from_slice(b"0b"),
            _ => (),
        }
    }

    let zero = spec.flags.contains(FmtFlags::ZERO)
        && !spec.flags.contains(FmtFlags::LEFT)
        && spec.precision.is_none();
    pad(w, spec.flags, spec.width, zero, &head, &digits)
}

/// Rewrite Rust's `1.5e-9` exponent into C's `1.5e-09`.
fn c_exponent(rust: &str, upper: bool) -> (String, i32) {
    let (mantissa, exp) = rust.split_once('e').unwrap_or((rust, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    (
        format!("{mantissa}{e}{sign}{:02}", exp.unsigned_abs()),
        exp,
    )
}

fn strip_trailing_zeros(s: &mut String) {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
}

fn fmt_fixed(value: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{value:.precision$}");
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

fn fmt_exp(value: f64, precision: usize, alt: bool, upper: bool, strip: bool) -> String {
    let rust = format!("{value:.precision$e}");
    let (mantissa, exp) = rust.split_once('e').unwrap_or((&rust, "0"));
    let mut mantissa = mantissa.to_string();
    if strip {
        strip_trailing_zeros(&mut mantissa);
    } else if alt && precision == 0 {
        mantissa.push('.');
    }
    c_exponent(&format!("{mantissa}e{exp}"), upper).0
}

fn fmt_float<W: Write>(w: &mut W, spec: &Spec, conv: u8, value: f64) -> io::Result<()> {
    let upper = conv.is_ascii_uppercase();
    let negative = value.is_sign_negative();
    let head = sign_of(negative, spec.flags);
    let alt = spec.flags.contains(FmtFlags::ALT);

    if !value.is_finite() {
        let text = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        return pad(w, spec.flags, spec.width, false, head, text.as_bytes());
    }

    let value = value.abs();
    let precision = spec.precision.unwrap_or(6);
    let body = match conv {
        b'f' | b'F' => fmt_fixed(value, precision, alt),
        b'e' | b'E' => fmt_exp(value, precision, alt, upper, false),
        _ => {
            let p = precision.max(1);
            let (_, x) = c_exponent(&format!("{:.*e}", p - 1, value), upper);
            let x = x as i64;
            if (p as i64) > x && x >= -4 {
                let mut s = fmt_fixed(value, (p as i64 - 1 - x) as usize, alt);
                if !alt {
                    strip_trailing_zeros(&mut s);
                }
                s
            } else {
                fmt_exp(value, p - 1, alt, upper, !alt)
            }
        }
    };

    let zero = spec.flags.contains(FmtFlags::ZERO) && !spec.flags.contains(FmtFlags::LEFT);
    pad(w, spec.flags, spec.width, zero, head, body.as_bytes())
}

unsafe fn store_count(ap: &mut VaList, kind: IntKind, count: usize) {
    match kind {
        IntKind::Byte => *ap.arg::<*mut c_schar>() = count as c_schar,
        IntKind::Short => *ap.arg::<*mut c_short>() = count as c_short,
        IntKind::Int | IntKind::Int32 => *ap.arg::<*mut c_int>() = count as c_int,
        IntKind::Long => *ap.arg::<*mut c_long>() = count as c_long,
        IntKind::LongLong | IntKind::IntMax | IntKind::Int64 => {
            *ap.arg::<*mut c_longlong>() = count as c_longlong
        }
        IntKind::PtrDiff | IntKind::Size => *ap.arg::<*mut ssize_t>() = count as ssize_t,
    }
}

unsafe fn inner_printf<W: Write>(
    w: &mut CountingWriter<W>,
    format: &[u8],
    mut ap: VaList,
) -> io::Result<()> {
    let mut i = 0;
    while i < format.len() {
        let next = memchr::memchr(b'%', &format[i..]).map_or(format.len(), |p| i + p);
        w.write_all(&format[i..next])?;
        if next == format.len() {
            break;
        }
        let start = next;
        i = next + 1;

        let mut flags = FmtFlags::empty();
        while let Some(&b) = format.get(i) {
            flags |= match b {
                b'#' => FmtFlags::ALT,
                b'0' => FmtFlags::ZERO,
                b'-' => FmtFlags::LEFT,
                b' ' => FmtFlags::SPACE,
                b'+' => FmtFlags::PLUS,
                _ => break,
            };
            i += 1;
        }

        let mut width = 0usize;
        if format.get(i) == Some(&b'*') {
            i += 1;
            let arg = ap.arg::<c_int>();
            if arg < 0 {
                flags |= FmtFlags::LEFT;
            }
            width = arg.unsigned_abs() as usize;
        } else {
            while let Some(d) = format.get(i).filter(|b| b.is_ascii_digit()) {
                width = width.saturating_mul(10).saturating_add((d - b'0') as usize);
                i += 1;
            }
        }

        let mut precision = None;
        if format.get(i) == Some(&b'.') {
            i += 1;
            if format.get(i) == Some(&b'*') {
                i += 1;
                let arg = ap.arg::<c_int>();
                precision = usize::try_from(arg).ok();
            } else {
                let mut p = 0usize;
                while let Some(d) = format.get(i).filter(|b| b.is_ascii_digit()) {
                    p = p.saturating_mul(10).saturating_add((d - b'0') as usize);
                    i += 1;
                }
                precision = Some(p);
            }
        }

        let mut kind = IntKind::Int;
        while let Some(&b) = format.get(i) {
            kind = match b {
                b'h' if kind == IntKind::Short => IntKind::Byte,
                b'h' => IntKind::Short,
                b'l' if kind == IntKind::Long => IntKind::LongLong,
                b'l' => IntKind::Long,
                b'L' | b'q' => IntKind::LongLong,
                b'j' => IntKind::IntMax,
                b'z' | b'Z' => IntKind::Size,
                b't' => IntKind::PtrDiff,
                b'I' => {
                    if format[i + 1..].starts_with(b"32") {
                        i += 2;
                        IntKind::Int32
                    } else if format[i + 1..].starts_with(b"64") {
                        i += 2;
                        IntKind::Int64
                    } else {
                        IntKind::Size
                    }
                }
                _ => break,
            };
            i += 1;
        }

        let spec = Spec {
            flags,
            width,
            precision,
        };

        let Some(&conv) = format.get(i) else {
            w.write_all(&format[start..])?;
            break;
        };
        i += 1;

        match conv {
            b'%' => w.write_all(b"%")?,
            b'd' | b'i' => {
                let arg = signed_arg(&mut ap, kind);
                fmt_int(w, &spec, conv, arg < 0, arg.unsigned_abs())?;
            }
            b'u' | b'o' | b'x' | b'X' | b'b' => {
                let arg = unsigned_arg(&mut ap, kind);
                fmt_int(w, &spec, conv, false, arg)?;
            }
            b'e' | b'E' | b'f' | b'F' | b'g' | b'G' => {
                let arg = ap.arg::<c_double>();
                fmt_float(w, &spec, conv, arg)?;
            }
            b's' => {
                let arg = ap.arg::<*const c_char>();
                let bytes: &[u8] = match (CStr::from_nullable_ptr(arg), precision) {
                    (None, Some(max)) => &b"(null)"[..6.min(max)],
                    (None, None) => b"(null)",
                    (Some(_), Some(max)) => {
                        core::slice::from_raw_parts(arg.cast(), strnlen(arg, max))
                    }
                    (Some(s), None) => s.to_bytes(),
                };
                pad(w, flags, width, false, b"", bytes)?;
            }
            b'c' => {
                let arg = ap.arg::<c_int>() as u8;
                pad(w, flags, width, false, b"", &[arg])?;
            }
            b'p' => {
                let arg = ap.arg::<uintptr_t>();
                if cfg!(windows) {
                    let digits = 2 * core::mem::size_of::<uintptr_t>();
                    let body = format!("{arg:0digits$X}");
                    pad(w, flags, width, false, b"", body.as_bytes())?;
                } else {
                    let body = format!("{arg:x}");
                    pad(w, flags, width, false, b"0x", body.as_bytes())?;
                }
            }
            b'n' => store_count(&mut ap, kind, w.written),
            _ => {
                log::warn!(
                    "printf: unsupported conversion {:?}",
                    String::from_utf8_lossy(&format[start..i])
                );
                w.write_all(&format[start..i])?;
                break;
            }
        }
    }
    Ok(())
}

/// Format into `w`; returns the number of bytes produced. A null format
/// produces nothing.
pub unsafe fn try_printf<W: Write>(w: W, format: *const c_char, ap: VaList) -> io::Result<c_int> {
    let mut w = CountingWriter::new(w);
    let Some(format) = CStr::from_nullable_ptr(format) else {
        return Ok(0);
    };
    inner_printf(&mut w, format.to_bytes(), ap)?;
    Ok(c_int::try_from(w.written).unwrap_or(c_int::MAX))
}

/// [`try_printf`] with the C convention: -1 on a write error.
pub unsafe fn printf<W: Write>(w: W, format: *const c_char, ap: VaList) -> c_int {
    try_printf(w, format, ap).unwrap_or_else(|err| {
        log::debug!("printf: write failed: {err}");
        -1
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::va_list::{VaArg, VaBuffer};

    fn sprintf(format: &str, args: &[VaArg]) -> String {
        let format = format!("{format}\0");
        let buf = VaBuffer::new(args).unwrap();
        let mut out = Vec::new();
        let n = unsafe { printf(&mut out, format.as_ptr().cast(), buf.cursor()) };
        assert_eq!(n as usize, out.len());
        String::from_utf8(out).unwrap()
    }

    fn ptr(s: &[u8]) -> VaArg<'static> {
        VaArg::Uintptr(s.as_ptr() as uintptr_t)
    }

    #[test]
    fn integers() {
        assert_eq!(
            sprintf("%5d %#x %s\n", &[VaArg::Int32(-7), VaArg::Uint32(255), ptr(b"hi\0")]),
            "   -7 0xff hi\n"
        );
        assert_eq!(sprintf("%-5d|", &[VaArg::Int32(42)]), "42   |");
        assert_eq!(sprintf("%05d", &[VaArg::Int32(-42)]), "-0042");
        assert_eq!(sprintf("%+d % d", &[VaArg::Int32(3), VaArg::Int32(3)]), "+3  3");
        assert_eq!(sprintf("%.3d", &[VaArg::Int32(7)]), "007");
        assert_eq!(sprintf("%8.3d|", &[VaArg::Int32(-7)]), "    -007|");
        assert_eq!(sprintf("%u", &[VaArg::Int32(-1)]), "4294967295");
        assert_eq!(sprintf("%lld", &[VaArg::Int64(i64::MIN)]), "-9223372036854775808");
        assert_eq!(sprintf("%hhd %hd", &[VaArg::Int32(0x1ff), VaArg::Int32(0x18000)]), "-1 -32768");
    }

    #[test]
    fn zero_value_edge_cases() {
        assert_eq!(sprintf("[%.0d]", &[VaArg::Int32(0)]), "[]");
        assert_eq!(sprintf("%#x", &[VaArg::Uint32(0)]), "0");
        assert_eq!(sprintf("%#o", &[VaArg::Uint32(0)]), "0");
        assert_eq!(sprintf("%#o", &[VaArg::Uint32(8)]), "010");
        assert_eq!(sprintf("%#.0o", &[VaArg::Uint32(0)]), "0");
    }

    #[test]
    fn radix_conversions() {
        assert_eq!(sprintf("%X", &[VaArg::Uint32(0xbeef)]), "BEEF");
        assert_eq!(sprintf("%#X", &[VaArg::Uint32(0xbeef)]), "0XBEEF");
        assert_eq!(sprintf("%b %#b", &[VaArg::Uint32(5), VaArg::Uint32(5)]), "101 0b101");
        assert_eq!(sprintf("%#010x", &[VaArg::Uint32(0xff)]), "0x000000ff");
        assert_eq!(sprintf("%I64x", &[VaArg::Uint64(u64::MAX)]), "ffffffffffffffff");
        assert_eq!(sprintf("%I32d", &[VaArg::Int32(-5)]), "-5");
        assert_eq!(sprintf("%zu %jd", &[VaArg::Uint64(9), VaArg::Int64(-9)]), "9 -9");
    }

    #[test]
    fn star_width_and_precision() {
        assert_eq!(sprintf("%*d|", &[VaArg::Int32(4), VaArg::Int32(1)]), "   1|");
        assert_eq!(sprintf("%*d|", &[VaArg::Int32(-4), VaArg::Int32(1)]), "1   |");
        assert_eq!(
            sprintf("%.*s|", &[VaArg::Int32(2), ptr(b"abcdef\0")]),
            "ab|"
        );
        assert_eq!(
            sprintf("%.*d", &[VaArg::Int32(-1), VaArg::Int32(0)]),
            "0"
        );
    }

    #[test]
    fn floats() {
        assert_eq!(
            sprintf("%.2f %e", &[VaArg::Float64(3.1415), VaArg::Float64(1e-9)]),
            "3.14 1.000000e-09"
        );
        assert_eq!(sprintf("%f", &[VaArg::Float64(1.5)]), "1.500000");
        assert_eq!(sprintf("%.0f", &[VaArg::Float64(2.0)]), "2");
        assert_eq!(sprintf("%#.0f", &[VaArg::Float64(2.0)]), "2.");
        assert_eq!(sprintf("%E", &[VaArg::Float64(12345.678)]), "1.234568E+04");
        assert_eq!(sprintf("%8.2f|", &[VaArg::Float64(-1.5)]), "   -1.50|");
        assert_eq!(sprintf("%08.2f", &[VaArg::Float64(-1.5)]), "-0001.50");
        assert_eq!(sprintf("%+.1f", &[VaArg::Float64(0.5)]), "+0.5");
        assert_eq!(sprintf("%e", &[VaArg::Float64(0.0)]), "0.000000e+00");
        assert_eq!(sprintf("%.3e", &[VaArg::Float64(1e100)]), "1.000e+100");
    }

    #[test]
    fn general_floats() {
        assert_eq!(sprintf("%g", &[VaArg::Float64(100000.0)]), "100000");
        assert_eq!(sprintf("%g", &[VaArg::Float64(1000000.0)]), "1e+06");
        assert_eq!(sprintf("%g", &[VaArg::Float64(0.0001)]), "0.0001");
        assert_eq!(sprintf("%g", &[VaArg::Float64(0.00001)]), "1e-05");
        assert_eq!(sprintf("%g", &[VaArg::Float64(3.5)]), "3.5");
        assert_eq!(sprintf("%.0g", &[VaArg::Float64(3.5)]), "4");
        assert_eq!(sprintf("%#g", &[VaArg::Float64(3.5)]), "3.50000");
        assert_eq!(sprintf("%G", &[VaArg::Float64(1e-10)]), "1E-10");
        assert_eq!(sprintf("%g", &[VaArg::Float64(0.0)]), "0");
    }

    #[test]
    fn non_finite() {
        assert_eq!(sprintf("%f", &[VaArg::Float64(f64::NAN)]), "nan");
        assert_eq!(sprintf("%F", &[VaArg::Float64(f64::INFINITY)]), "INF");
        assert_eq!(sprintf("%e", &[VaArg::Float64(f64::NEG_INFINITY)]), "-inf");
        assert_eq!(sprintf("%5f|", &[VaArg::Float64(f64::INFINITY)]), "  inf|");
    }

    #[test]
    fn strings_chars_pointers() {
        assert_eq!(sprintf("%s", &[VaArg::Uintptr(0)]), "(null)");
        assert_eq!(sprintf("%-4s|%4s", &[ptr(b"ab\0"), ptr(b"cd\0")]), "ab  |  cd");
        assert_eq!(sprintf("%c%c", &[VaArg::Int32(b'o' as i32), VaArg::Int32(b'k' as i32)]), "ok");
        assert_eq!(sprintf("%3c|", &[VaArg::Int32(b'z' as i32)]), "  z|");
        assert_eq!(sprintf("100%%", &[]), "100%");
        if !cfg!(windows) {
            assert_eq!(sprintf("%p", &[VaArg::Uintptr(0x1234)]), "0x1234");
        }
    }

    #[test]
    fn count_written() {
        let mut n = 0i32;
        let mut h = 0i16;
        assert_eq!(
            sprintf(
                "abc%n%hn",
                &[
                    VaArg::Uintptr(&mut n as *mut i32 as uintptr_t),
                    VaArg::Uintptr(&mut h as *mut i16 as uintptr_t),
                ]
            ),
            "abc"
        );
        assert_eq!(n, 3);
        assert_eq!(h, 3);
    }

    #[test]
    fn unknown_conversion_halts() {
        assert_eq!(sprintf("a%yb%d", &[VaArg::Int32(1)]), "a%y");
        assert_eq!(sprintf("trailing %", &[]), "trailing %");
    }

    #[test]
    fn zero_cursor_prints_zeros() {
        let mut out = Vec::new();
        let n = unsafe { printf(&mut out, b"%d|%s\0".as_ptr().cast(), VaList::new(0)) };
        assert_eq!(out, b"0|(null)");
        assert_eq!(n, 8);
    }
}
