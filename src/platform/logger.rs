use core::{fmt, str::FromStr};
use std::io::Write;

use crate::sync::Mutex;

use log::{Metadata, Record};

const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const LOG_LEVEL_ENV: &str = "YLIBC_LOG_LEVEL";
const PROCESS_NAME: &str = "ylibc";

static INIT: spin::Once<()> = spin::Once::new();

/// Install the runtime logger. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let mut logger = YlibcLogger::new();
        if let Ok(env) = std::env::var(LOG_LEVEL_ENV) {
            if let Ok(level) = log::LevelFilter::from_str(&env) {
                logger = logger.with_output(OutputBuilder::stderr().with_filter(level).build());
            }
        }
        if logger.enable().is_err() {
            log::error!("Logger already initialized");
        }
    });
}

/// An output that will be logged to.
pub struct Output {
    endpoint: Mutex<Box<dyn Write + Send + 'static>>,

    // specifies the maximum log level possible
    filter: log::LevelFilter,
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Output")
            .field("endpoint", &"opaque")
            .field("filter", &self.filter)
            .finish()
    }
}

impl Default for Output {
    fn default() -> Self {
        OutputBuilder::stderr().build()
    }
}

pub struct OutputBuilder {
    endpoint: Box<dyn Write + Send + 'static>,
    filter: Option<log::LevelFilter>,
}
impl OutputBuilder {
    pub fn stderr() -> Self {
        Self::with_endpoint(crate::platform::FileWriter::new(2))
    }

    pub fn with_endpoint<T>(endpoint: T) -> Self
    where
        T: Write + Send + 'static,
    {
        Self {
            endpoint: Box::new(endpoint),
            filter: None,
        }
    }
    pub fn with_filter(mut self, filter: log::LevelFilter) -> Self {
        self.filter = Some(filter);
        self
    }
    pub fn build(self) -> Output {
        Output {
            endpoint: Mutex::new(self.endpoint),
            filter: self.filter.unwrap_or(DEFAULT_LOG_LEVEL),
        }
    }
}

#[derive(Debug, Default)]
pub struct YlibcLogger {
    output: Output,
}

impl YlibcLogger {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }
    pub fn enable(self) -> Result<&'static Self, log::SetLoggerError> {
        let leak = Box::leak(Box::new(self));
        log::set_logger(leak)?;
        log::set_max_level(leak.output.filter);
        Ok(leak)
    }
    fn write_record<W: Write + ?Sized>(record: &Record, writer: &mut W) -> std::io::Result<()> {
        let target = record.module_path().unwrap_or(record.target());
        let level = record.level();
        let message = record.args();
        let line = &LineFmt(record.line());
        writeln!(writer, "[{PROCESS_NAME}@{target}{line} {level}] {message}")
    }
}

impl log::Log for YlibcLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.output.filter
    }
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut endpoint_guard = self.output.endpoint.lock();
            let _ = Self::write_record(record, endpoint_guard.as_mut());
        }
    }
    fn flush(&self) {
        let _ = self.output.endpoint.lock().flush();
    }
}

struct LineFmt(Option<u32>);
impl fmt::Display for LineFmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(line) = self.0 {
            write!(f, ":{line}")
        } else {
            Ok(())
        }
    }
}
