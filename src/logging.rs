//! Logger implementation for the log crate.
//!
//! The core itself only uses the `log` macros. Embedders without a logger of their
//! own can install [`SimpleLogger`] and point it at a console through [`LogSink`].

use core::fmt::{self, Display};

use lazyinit::LazyInit;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::{NicError, NicResult};

/// Console the logger writes finished lines to.
pub trait LogSink: Sync {
    fn write_line(&self, args: fmt::Arguments);
}

static SINK: LazyInit<&'static dyn LogSink> = LazyInit::new();
static LOGGER: SimpleLogger = SimpleLogger;

pub struct SimpleLogger;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCode {
    Red = 31,
    Green = 32,
    Yellow = 33,
    Cyan = 36,
    BrightBlack = 90,
}

impl Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1B}[{}m", *self as u8)
    }
}

impl ColorCode {
    pub fn for_level(level: Level) -> Self {
        match level {
            Level::Error => Self::Red,
            Level::Warn => Self::Yellow,
            Level::Info => Self::Green,
            Level::Debug => Self::Cyan,
            Level::Trace => Self::BrightBlack,
        }
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = SINK.get() else {
            return;
        };

        let file = record.file().unwrap_or("none");
        let line = record.line().unwrap_or(0);
        let color = ColorCode::for_level(record.level());
        let color_reset = "\u{1B}[0m";

        sink.write_line(format_args!(
            "[{:<5} {file}:{line}] {color}{}{color_reset}",
            record.level(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Maps the value of the `LOG` build variable to a level filter.
pub fn level_filter(value: Option<&str>) -> LevelFilter {
    match value {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Initialize the logger.
pub fn init(sink: &'static dyn LogSink) -> NicResult {
    if SINK.is_inited() {
        return Err(NicError::LoggerInitFailed);
    }
    SINK.init_once(sink);
    log::set_logger(&LOGGER).map_err(|_| NicError::LoggerInitFailed)?;
    log::set_max_level(level_filter(option_env!("LOG")));
    Ok(())
}
