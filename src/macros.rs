/// Print to stderr
#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = $crate::platform::FileWriter::new(2).write_fmt(format_args!($($arg)*));
    }};
}

/// Print with new line to stderr.
#[macro_export]
macro_rules! eprintln {
    () => {
        $crate::eprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::eprint!("{}\n", format_args!($($arg)*))
    };
}

/// Evaluate a bridge body, logging the call, its result and the errno it left
/// on the context. Compiled out unless the `trace` feature is enabled.
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_expr {
    ($tls:expr, $expr:expr, $($arg:tt)*) => {{
        let _ = $tls;
        $expr
    }};
}

#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_expr {
    ($tls:expr, $expr:expr, $($arg:tt)*) => ({
        use $crate::header::errno::STR_ERROR;

        $crate::platform::logger::init();
        log::trace!("{}", format_args!($($arg)*));

        let trace_tls: *mut $crate::tls::Tls = $tls;
        let trace_old_errno = unsafe { (*trace_tls).errno() };
        unsafe { (*trace_tls).set_errno(0) };

        let ret = $expr;

        let trace_errno = unsafe { (*trace_tls).errno() } as isize;
        if trace_errno == 0 {
            unsafe { (*trace_tls).set_errno(trace_old_errno) };
        }

        let trace_strerror = if trace_errno >= 0 && trace_errno < STR_ERROR.len() as isize {
            STR_ERROR[trace_errno as usize]
        } else {
            "Unknown error"
        };

        log::trace!("{} = {:?} ({}, {})", format_args!($($arg)*), ret, trace_errno, trace_strerror);

        ret
    });
}
