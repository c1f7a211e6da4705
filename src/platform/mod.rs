use core::ptr;
use std::io::{self, Read, Write};

use self::types::*;

pub mod allocator;
pub mod logger;
pub mod types;

pub struct FileWriter(pub c_int);

impl FileWriter {
    pub fn new(fd: c_int) -> Self {
        Self(fd)
    }
}

#[cfg(unix)]
impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ret = unsafe { libc::write(self.0, buf.as_ptr().cast(), buf.len()) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(not(unix))]
impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0 {
            1 => io::stdout().write(buf),
            2 => io::stderr().write(buf),
            _ => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self.0 {
            1 => io::stdout().flush(),
            2 => io::stderr().flush(),
            _ => Ok(()),
        }
    }
}

impl core::fmt::Write for FileWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}

pub struct FileReader(pub c_int);

#[cfg(unix)]
impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ret = unsafe { libc::read(self.0, buf.as_mut_ptr().cast(), buf.len()) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }
}

#[cfg(not(unix))]
impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0 {
            0 => io::stdin().read(buf),
            _ => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }
}

/// Bounded destination with `snprintf` semantics: at most `size - 1` bytes
/// are stored and the result is always NUL-terminated when `size > 0`.
pub struct StringWriter(pub *mut u8, pub usize);

impl StringWriter {
    pub unsafe fn new(buf: *mut u8, size: usize) -> Self {
        if size > 0 {
            *buf = 0;
        }
        Self(buf, size)
    }
}

impl Write for StringWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.1 > 1 {
            let copy_size = buf.len().min(self.1 - 1);
            unsafe {
                ptr::copy_nonoverlapping(buf.as_ptr(), self.0, copy_size);
                self.1 -= copy_size;

                self.0 = self.0.add(copy_size);
                *self.0 = 0;
            }
        }

        // Report the whole slice as written: snprintf returns the length it
        // *would* have produced.
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unbounded destination with `sprintf` semantics.
pub struct UnsafeStringWriter(pub *mut u8);

impl Write for UnsafeStringWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        unsafe {
            ptr::copy_nonoverlapping(buf.as_ptr(), self.0, buf.len());
            self.0 = self.0.add(buf.len());
            *self.0 = b'\0';
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct CountingWriter<T> {
    pub inner: T,
    pub written: usize,
}
impl<T> CountingWriter<T> {
    pub fn new(writer: T) -> Self {
        Self {
            inner: writer,
            written: 0,
        }
    }
}
impl<T: Write> Write for CountingWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res = self.inner.write(buf);
        if let Ok(written) = res {
            self.written += written;
        }
        res
    }
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.inner.write_all(buf) {
            Ok(()) => (),
            Err(ref err) if err.kind() == io::ErrorKind::WriteZero => (),
            Err(err) => return Err(err),
        }
        self.written += buf.len();
        Ok(())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_writer_truncates_and_terminates() {
        let mut buf = [0xffu8; 4];
        let mut w = unsafe { StringWriter::new(buf.as_mut_ptr(), buf.len()) };
        assert_eq!(w.write(b"hello").unwrap(), 5);
        assert_eq!(&buf, b"hel\0");
    }

    #[test]
    fn string_writer_size_one_only_terminates() {
        let mut buf = [0xffu8; 2];
        let mut w = unsafe { StringWriter::new(buf.as_mut_ptr(), 1) };
        w.write_all(b"abc").unwrap();
        assert_eq!(buf, [0, 0xff]);
    }

    #[test]
    fn counting_writer_counts_what_passes_through() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"abc").unwrap();
        w.write_all(b"de").unwrap();
        assert_eq!(w.written, 5);
        assert_eq!(w.inner, b"abcde");
    }

    #[test]
    fn unsafe_string_writer_appends() {
        let mut buf = [0xffu8; 8];
        let mut w = UnsafeStringWriter(buf.as_mut_ptr());
        w.write_all(b"ab").unwrap();
        w.write_all(b"cd").unwrap();
        assert_eq!(&buf[..5], b"abcd\0");
    }
}
