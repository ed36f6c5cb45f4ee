use core::fmt::Arguments;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

/// Destination for formatted log lines, provided by the embedding process.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: Arguments);
}

pub struct Logger {
    sink: Once<&'static dyn LogSink>,
}

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        self.sink.is_completed()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = self.sink.get() else {
            return;
        };
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 20,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        sink.write_line(format_args!(
            "\u{1B}[{}m[{:}] {}: {}\u{1B}[0m",
            color,
            record.level(),
            record.target(),
            record.args(),
        ));
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger { sink: Once::new() };

/// Install the driver manager logger. Only the first call installs a sink.
pub fn init(sink: &'static dyn LogSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log, Level};
            log!(target: $target, Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log, Level};
            log!(Level::Debug, $($arg)+)
        }
    }
}
