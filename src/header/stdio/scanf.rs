//! scanf-family input engine.

use std::io::{self, Read};

use cbitset::BitSet256;

use crate::{
    c_str::CStr,
    platform::types::*,
    va_list::VaList,
};

/// Byte source with pushback. Scanning may hand back up to three bytes in a
/// row (sign and a bare `0x` prefix).
pub trait Source {
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
    fn unread_byte(&mut self, byte: u8);
}

/// Source over an in-memory buffer.
pub struct BufferReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl Source for BufferReader<'_> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.buf.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn unread_byte(&mut self, _byte: u8) {
        self.pos = self.pos.saturating_sub(1);
    }
}

/// Source over a byte stream, with pushback kept by the caller so it can
/// outlive one scan.
pub struct PushbackReader<'a, R> {
    inner: R,
    pushback: &'a mut Vec<u8>,
}

impl<'a, R: Read> PushbackReader<'a, R> {
    pub fn new(inner: R, pushback: &'a mut Vec<u8>) -> Self {
        Self { inner, pushback }
    }
}

impl<R: Read> Source for PushbackReader<'_, R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pushback.pop() {
            return Ok(Some(byte));
        }
        let mut buf = [0];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn unread_byte(&mut self, byte: u8) {
        self.pushback.push(byte);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum IntKind {
    Byte,
    Short,
    Int,
    Long,
    LongLong,
    IntMax,
    PtrDiff,
    Size,
}

/// How a scan stopped early.
enum Stop {
    /// End of input or a read error.
    Input,
    /// A byte did not fit the directive; it has been pushed back.
    Matching,
}

struct Scanner<'s, S: ?Sized> {
    src: &'s mut S,
    count: usize,
}

impl<S: Source + ?Sized> Scanner<'_, S> {
    fn next(&mut self) -> Result<Option<u8>, Stop> {
        match self.src.read_byte() {
            Ok(Some(byte)) => {
                self.count += 1;
                Ok(Some(byte))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log::debug!("scanf: read failed: {err}");
                Err(Stop::Input)
            }
        }
    }

    fn unread(&mut self, byte: u8) {
        self.count -= 1;
        self.src.unread_byte(byte);
    }

    /// Next byte if `pred` accepts it; otherwise it is pushed back.
    fn take_if(&mut self, pred: impl Fn(u8) -> bool) -> Result<Option<u8>, Stop> {
        match self.next()? {
            Some(byte) if pred(byte) => Ok(Some(byte)),
            Some(byte) => {
                self.unread(byte);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Skip whitespace; false at end of input.
    fn skip_space(&mut self) -> Result<bool, Stop> {
        loop {
            match self.next()? {
                Some(byte) if byte.is_ascii_whitespace() => (),
                Some(byte) => {
                    self.unread(byte);
                    return Ok(true);
                }
                None => return Ok(false),
            }
        }
    }
}

fn digit_value(byte: u8, base: u32) -> Option<u32> {
    (byte as char).to_digit(base)
}

/// Integer lexeme: sign, optional prefix, digits. Returns the value bits.
fn scan_int<S: Source + ?Sized>(
    sc: &mut Scanner<S>,
    mut base: u32,
    mut width: usize,
) -> Result<u64, Stop> {
    let mut negative = false;
    let mut sign = None;
    if width > 0 {
        if let Some(byte) = sc.take_if(|b| b == b'+' || b == b'-')? {
            negative = byte == b'-';
            sign = Some(byte);
            width -= 1;
        }
    }

    let mut value = 0u64;
    let mut digits = 0usize;
    if matches!(base, 0 | 16) && width > 0 && sc.take_if(|b| b == b'0')?.is_some() {
        width -= 1;
        match width {
            0 => digits += 1,
            _ => match sc.take_if(|b| b == b'x' || b == b'X')? {
                Some(x) => {
                    width -= 1;
                    let hex = match width {
                        0 => None,
                        _ => sc.take_if(|b| b.is_ascii_hexdigit())?,
                    };
                    let Some(hex) = hex else {
                        sc.unread(x);
                        sc.unread(b'0');
                        if let Some(sign) = sign {
                            sc.unread(sign);
                        }
                        return Err(Stop::Matching);
                    };
                    sc.unread(hex);
                    base = 16;
                }
                None => {
                    digits += 1;
                    if base == 0 {
                        base = 8;
                    }
                }
            },
        }
    }
    if base == 0 {
        base = 10;
    }

    while width > 0 {
        let Some(byte) = sc.take_if(|b| digit_value(b, base).is_some())? else {
            break;
        };
        let d = digit_value(byte, base).unwrap_or(0);
        value = value.wrapping_mul(base as u64).wrapping_add(d as u64);
        digits += 1;
        width -= 1;
    }

    if digits == 0 {
        if let Some(sign) = sign {
            sc.unread(sign);
        }
        return Err(Stop::Matching);
    }
    Ok(if negative { value.wrapping_neg() } else { value })
}

/// Float lexeme `[+-]?([0-9]*\.)?[0-9]+([eE][+-]?[0-9]+)?`.
fn scan_float<S: Source + ?Sized>(sc: &mut Scanner<S>, mut width: usize) -> Result<f64, Stop> {
    let mut lexeme = String::new();
    macro_rules! take {
        ($pred:expr) => {{
            let taken = if width > 0 { sc.take_if($pred)? } else { None };
            if let Some(byte) = taken {
                width -= 1;
                lexeme.push(byte as char);
            }
            taken
        }};
    }

    take!(|b| b == b'+' || b == b'-');
    let mut int_digits = 0;
    while take!(|b: u8| b.is_ascii_digit()).is_some() {
        int_digits += 1;
    }
    let mut frac_digits = 0;
    if take!(|b| b == b'.').is_some() {
        while take!(|b: u8| b.is_ascii_digit()).is_some() {
            frac_digits += 1;
        }
        if frac_digits == 0 {
            lexeme.pop();
            sc.unread(b'.');
            width += 1;
        }
    }
    if int_digits + frac_digits == 0 {
        for byte in lexeme.bytes().rev() {
            sc.unread(byte);
        }
        return Err(Stop::Matching);
    }

    let mark = lexeme.len();
    if take!(|b| b == b'e' || b == b'E').is_some() {
        take!(|b| b == b'+' || b == b'-');
        let mut exp_digits = 0;
        while take!(|b: u8| b.is_ascii_digit()).is_some() {
            exp_digits += 1;
        }
        if exp_digits == 0 {
            for byte in lexeme.as_bytes()[mark..].iter().rev() {
                sc.unread(*byte);
            }
            lexeme.truncate(mark);
        }
    }

    lexeme.parse::<f64>().map_err(|_| Stop::Matching)
}

unsafe fn store_int(ap: &mut VaList, kind: IntKind, bits: u64) {
    match kind {
        IntKind::Byte => *ap.arg::<*mut c_schar>() = bits as c_schar,
        IntKind::Short => *ap.arg::<*mut c_short>() = bits as c_short,
        IntKind::Int => *ap.arg::<*mut c_int>() = bits as c_int,
        IntKind::Long => *ap.arg::<*mut c_long>() = bits as c_long,
        IntKind::LongLong | IntKind::IntMax => *ap.arg::<*mut c_longlong>() = bits as c_longlong,
        IntKind::PtrDiff => *ap.arg::<*mut ptrdiff_t>() = bits as ptrdiff_t,
        IntKind::Size => *ap.arg::<*mut size_t>() = bits as size_t,
    }
}

/// Parse the body of a `%[` directive starting after the bracket; returns the
/// set and the index just past the closing `]`.
fn parse_set(format: &[u8], mut i: usize) -> Option<(BitSet256, bool, usize)> {
    let mut set = BitSet256::new();
    let invert = format.get(i) == Some(&b'^');
    if invert {
        i += 1;
    }
    let mut prev = None;
    if format.get(i) == Some(&b']') {
        set.insert(b']' as usize);
        prev = Some(b']');
        i += 1;
    }
    loop {
        let c = *format.get(i)?;
        i += 1;
        match (c, prev, format.get(i)) {
            (b']', _, _) => return Some((set, invert, i)),
            (b'-', Some(lo), Some(&hi)) if hi != b']' => {
                for b in lo..=hi {
                    set.insert(b as usize);
                }
                prev = None;
                i += 1;
            }
            _ => {
                set.insert(c as usize);
                prev = Some(c);
            }
        }
    }
}

unsafe fn inner_scanf<S: Source + ?Sized>(
    src: &mut S,
    format: &[u8],
    mut ap: VaList,
) -> Result<c_int, (Stop, c_int)> {
    let mut sc = Scanner { src, count: 0 };
    let mut matched: c_int = 0;
    let mut i = 0;

    macro_rules! bail {
        ($stop:expr) => {
            return Err(($stop, matched))
        };
    }
    macro_rules! check {
        ($e:expr) => {
            match $e {
                Ok(v) => v,
                Err(stop) => bail!(stop),
            }
        };
    }

    while i < format.len() {
        let c = format[i];
        i += 1;

        if c.is_ascii_whitespace() {
            check!(sc.skip_space());
            continue;
        }
        if c != b'%' {
            match check!(sc.next()) {
                Some(byte) if byte == c => continue,
                Some(byte) => {
                    sc.unread(byte);
                    bail!(Stop::Matching);
                }
                None => bail!(Stop::Input),
            }
        }

        let ignore = format.get(i) == Some(&b'*');
        if ignore {
            i += 1;
        }

        let mut width = 0usize;
        while let Some(d) = format.get(i).filter(|b| b.is_ascii_digit()) {
            width = width.saturating_mul(10).saturating_add((d - b'0') as usize);
            i += 1;
        }
        let width = (width > 0).then_some(width);

        let mut kind = IntKind::Int;
        let mut long_float = false;
        while let Some(&b) = format.get(i) {
            kind = match b {
                b'h' if kind == IntKind::Short => IntKind::Byte,
                b'h' => IntKind::Short,
                b'l' if kind == IntKind::Long => IntKind::LongLong,
                b'l' => IntKind::Long,
                b'L' | b'q' => IntKind::LongLong,
                b'j' => IntKind::IntMax,
                b'z' => IntKind::Size,
                b't' => IntKind::PtrDiff,
                _ => break,
            };
            long_float = matches!(kind, IntKind::Long | IntKind::LongLong);
            i += 1;
        }

        let Some(&conv) = format.get(i) else {
            log::warn!("scanf: truncated conversion at end of format");
            bail!(Stop::Matching);
        };
        i += 1;

        match conv {
            b'n' => {
                if !ignore {
                    store_int(&mut ap, kind, sc.count as u64);
                }
                continue;
            }
            b'c' | b'[' => (),
            _ => {
                if !check!(sc.skip_space()) {
                    bail!(Stop::Input);
                }
            }
        }

        match conv {
            b'%' => match check!(sc.next()) {
                Some(b'%') => (),
                Some(byte) => {
                    sc.unread(byte);
                    bail!(Stop::Matching);
                }
                None => bail!(Stop::Input),
            },
            b'd' | b'i' | b'o' | b'u' | b'x' | b'X' | b'p' => {
                let base = match conv {
                    b'i' => 0,
                    b'o' => 8,
                    b'x' | b'X' | b'p' => 16,
                    _ => 10,
                };
                let bits = check!(scan_int(&mut sc, base, width.unwrap_or(usize::MAX)));
                if !ignore {
                    if conv == b'p' {
                        *ap.arg::<*mut uintptr_t>() = bits as uintptr_t;
                    } else {
                        store_int(&mut ap, kind, bits);
                    }
                    matched += 1;
                }
            }
            b'e' | b'E' | b'f' | b'F' | b'g' | b'G' | b'a' | b'A' => {
                let value = check!(scan_float(&mut sc, width.unwrap_or(usize::MAX)));
                if !ignore {
                    if long_float {
                        *ap.arg::<*mut c_double>() = value;
                    } else {
                        *ap.arg::<*mut c_float>() = value as c_float;
                    }
                    matched += 1;
                }
            }
            b's' => {
                let mut out: *mut u8 = if ignore { core::ptr::null_mut() } else { ap.arg() };
                let mut n = 0;
                while n < width.unwrap_or(usize::MAX) {
                    let Some(byte) = check!(sc.take_if(|b| !b.is_ascii_whitespace())) else {
                        break;
                    };
                    if !out.is_null() {
                        *out = byte;
                        out = out.add(1);
                    }
                    n += 1;
                }
                if !out.is_null() {
                    *out = 0;
                    matched += 1;
                }
            }
            b'c' => {
                let want = width.unwrap_or(1);
                let out: *mut u8 = if ignore { core::ptr::null_mut() } else { ap.arg() };
                // A short run is an input failure and assigns nothing.
                for n in 0..want {
                    match check!(sc.next()) {
                        Some(byte) if !out.is_null() => *out.add(n) = byte,
                        Some(_) => (),
                        None => bail!(Stop::Input),
                    }
                }
                if !out.is_null() {
                    matched += 1;
                }
            }
            b'[' => {
                let Some((set, invert, next)) = parse_set(format, i) else {
                    log::warn!("scanf: unterminated %[ set");
                    bail!(Stop::Matching);
                };
                i = next;

                let mut out: *mut u8 = if ignore { core::ptr::null_mut() } else { ap.arg() };
                let mut n = 0;
                while n < width.unwrap_or(usize::MAX) {
                    let Some(byte) = check!(sc.take_if(|b| set.contains(b as usize) != invert))
                    else {
                        break;
                    };
                    if !out.is_null() {
                        *out = byte;
                        out = out.add(1);
                    }
                    n += 1;
                }
                if n == 0 {
                    match check!(sc.next()) {
                        Some(byte) => {
                            sc.unread(byte);
                            bail!(Stop::Matching);
                        }
                        None => bail!(Stop::Input),
                    }
                }
                if !out.is_null() {
                    *out = 0;
                    matched += 1;
                }
            }
            _ => {
                log::warn!("scanf: unsupported conversion {:?}", conv as char);
                bail!(Stop::Matching);
            }
        }
    }
    Ok(matched)
}

/// Scan `src` against `format`; returns the number of assignments, or -1 when
/// input ran out before any.
pub unsafe fn scanf<S: Source + ?Sized>(src: &mut S, format: *const c_char, ap: VaList) -> c_int {
    let Some(format) = CStr::from_nullable_ptr(format) else {
        return -1;
    };
    match inner_scanf(src, format.to_bytes(), ap) {
        Ok(n) => n,
        Err((Stop::Input, 0)) => -1,
        Err((_, n)) => n,
    }
}
