// Diagnostics - log targets and the callback event stream
//
// Every message in the crate goes through the `log` facade. Targets encode
// the category so an application can filter or forward them; the
// `CallbackLogger` turns records back into structured events for hosts that
// want a single callback instead of a logger backend.

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Log targets, one per category.
pub mod targets {
    pub const OTHER: &str = "tessera";
    pub const GENERAL: &str = "tessera::general";
    pub const PERFORMANCE: &str = "tessera::performance";
    pub const VALIDATION: &str = "tessera::validation";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Severity::Error,
            Level::Warn => Severity::Warning,
            Level::Info => Severity::Info,
            Level::Debug | Level::Trace => Severity::Verbose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Other,
    General,
    Performance,
    Validation,
}

impl Category {
    pub const fn target(self) -> &'static str {
        match self {
            Category::Other => targets::OTHER,
            Category::General => targets::GENERAL,
            Category::Performance => targets::PERFORMANCE,
            Category::Validation => targets::VALIDATION,
        }
    }

    /// Category for a log target, `None` if the target is not ours.
    pub fn from_target(target: &str) -> Option<Self> {
        match target {
            targets::GENERAL => Some(Category::General),
            targets::PERFORMANCE => Some(Category::Performance),
            targets::VALIDATION => Some(Category::Validation),
            t if t == targets::OTHER || t.starts_with("tessera::") => Some(Category::Other),
            _ => None,
        }
    }
}

/// One diagnostic event as delivered to a [`CallbackLogger`].
#[derive(Debug, Clone, Copy)]
pub struct LogEvent<'a> {
    pub severity: Severity,
    pub category: Category,
    pub message: &'a std::fmt::Arguments<'a>,
    pub line: Option<u32>,
    pub file: Option<&'a str>,
}

/// `log::Log` adapter forwarding crate diagnostics to a single callback.
///
/// Records from other crates are ignored so the callback only sees events
/// emitted by the graphics layer.
pub struct CallbackLogger<F> {
    callback: F,
    min_severity: Severity,
}

impl<F> CallbackLogger<F>
where
    F: Fn(&LogEvent<'_>) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            min_severity: Severity::Verbose,
        }
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }
}

impl<F> Log for CallbackLogger<F>
where
    F: Fn(&LogEvent<'_>) + Send + Sync,
{
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        Category::from_target(metadata.target()).is_some()
            && Severity::from(metadata.level()) >= self.min_severity
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(category) = Category::from_target(record.target()) else {
            return;
        };

        (self.callback)(&LogEvent {
            severity: record.level().into(),
            category,
            message: record.args(),
            line: record.line(),
            file: record.file(),
        });
    }

    fn flush(&self) {}
}

/// Install a callback as the process-wide logger.
pub fn install<F>(callback: F) -> Result<(), log::SetLoggerError>
where
    F: Fn(&LogEvent<'_>) + Send + Sync + 'static,
{
    log::set_boxed_logger(Box::new(CallbackLogger::new(callback)))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn capture() -> (CallbackLogger<impl Fn(&LogEvent<'_>) + Send + Sync>, Arc<Mutex<Vec<(Severity, Category, String, Option<u32>)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let logger = CallbackLogger::new(move |event: &LogEvent<'_>| {
            sink.lock().push((
                event.severity,
                event.category,
                event.message.to_string(),
                event.line,
            ));
        });
        (logger, events)
    }

    #[test]
    fn forwards_records_with_category_and_location() {
        let (logger, events) = capture();

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target(targets::VALIDATION)
                .args(format_args!("layout mismatch"))
                .line(Some(42))
                .file(Some("command.rs"))
                .build(),
        );

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::Warning);
        assert_eq!(events[0].1, Category::Validation);
        assert_eq!(events[0].2, "layout mismatch");
        assert_eq!(events[0].3, Some(42));
    }

    #[test]
    fn ignores_foreign_targets() {
        let (logger, events) = capture();

        logger.log(
            &Record::builder()
                .level(Level::Error)
                .target("winit::platform")
                .args(format_args!("not ours"))
                .build(),
        );

        assert!(events.lock().is_empty());
    }

    #[test]
    fn filters_below_min_severity() {
        let (logger, events) = capture();
        let logger = logger.with_min_severity(Severity::Info);

        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target(targets::GENERAL)
                .args(format_args!("chatty"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target(targets::PERFORMANCE)
                .args(format_args!("slow path"))
                .build(),
        );

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, Category::Performance);
    }

    #[test]
    fn module_targets_fall_back_to_other() {
        assert_eq!(
            Category::from_target("tessera::backend::vulkan::device"),
            Some(Category::Other)
        );
        assert_eq!(Category::from_target("tesseract"), None);
    }
}
