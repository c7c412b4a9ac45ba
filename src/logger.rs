use log::{Level, LevelFilter};

struct ScanLogger;

static LOGGER: ScanLogger = ScanLogger;

impl log::Log for ScanLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &log::Record) {
        let tag = match record.level() {
            Level::Error => "error",
            Level::Warn => "warn",
            _ => "debug",
        };
        println!("[{}] {}", tag, record.args());
    }

    fn flush(&self) {}
}

pub fn init() {
    // Called at most once, right after argument parsing.
    let _ = log::set_logger(&LOGGER).map(|_| log::set_max_level(LevelFilter::Debug));
}
