use anyhow::{Context, Result};
use log::LevelFilter;
use tracing::level_filters::LevelFilter as TraceFilter;
use tracing_log::{AsTrace, LogTracer};

/// Log verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Nothing = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
    All = 5,
}

impl LogLevel {
    /// Create a LogLevel from an integer, clamping out-of-range values
    pub fn from_i32(level: i32) -> Self {
        match level {
            i32::MIN..=0 => LogLevel::Nothing,
            1 => LogLevel::Error,
            2 => LogLevel::Warning,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::All,
        }
    }

    /// Parse a level name (case-insensitive) or number
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i32>() {
            return Some(Self::from_i32(n));
        }
        match s.to_lowercase().as_str() {
            "nothing" | "off" | "none" => Some(LogLevel::Nothing),
            "error" => Some(LogLevel::Error),
            "warning" | "warn" => Some(LogLevel::Warning),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "all" | "trace" => Some(LogLevel::All),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }

    pub fn to_tracing_filter(self) -> TraceFilter {
        self.to_level_filter().as_trace()
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warning
    }
}

/// Install a stderr `tracing` subscriber at `level` and route `log` records
/// into it.
///
/// Fails when a subscriber or a `log` backend is already installed; the
/// first installation keeps its level.
pub fn init(level: LogLevel) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.to_tracing_filter())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("A tracing subscriber is already installed")?;
    LogTracer::builder()
        .with_max_level(level.to_level_filter())
        .init()
        .context("A log backend is already installed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_i32() {
        assert_eq!(LogLevel::from_i32(-3), LogLevel::Nothing);
        assert_eq!(LogLevel::from_i32(0), LogLevel::Nothing);
        assert_eq!(LogLevel::from_i32(1), LogLevel::Error);
        assert_eq!(LogLevel::from_i32(2), LogLevel::Warning);
        assert_eq!(LogLevel::from_i32(3), LogLevel::Info);
        assert_eq!(LogLevel::from_i32(4), LogLevel::Debug);
        assert_eq!(LogLevel::from_i32(5), LogLevel::All);
        assert_eq!(LogLevel::from_i32(42), LogLevel::All);
    }

    #[test]
    fn test_log_level_from_name() {
        assert_eq!(LogLevel::from_name("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_name(" warn "), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_name("trace"), Some(LogLevel::All));
        assert_eq!(LogLevel::from_name("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_name("loud"), None);
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(LogLevel::Nothing.to_level_filter(), LevelFilter::Off);
        assert_eq!(LogLevel::Warning.to_level_filter(), LevelFilter::Warn);
        assert_eq!(LogLevel::All.to_level_filter(), LevelFilter::Trace);
    }

    #[test]
    fn test_tracing_filter() {
        assert_eq!(LogLevel::Nothing.to_tracing_filter(), TraceFilter::OFF);
        assert_eq!(LogLevel::Error.to_tracing_filter(), TraceFilter::ERROR);
        assert_eq!(LogLevel::Info.to_tracing_filter(), TraceFilter::INFO);
        assert_eq!(LogLevel::All.to_tracing_filter(), TraceFilter::TRACE);
    }

    #[test]
    fn test_init_twice() {
        init(LogLevel::Error).unwrap();
        assert!(init(LogLevel::Debug).is_err());
        // the first installation keeps its level
        assert_eq!(log::max_level(), LevelFilter::Error);
        log::error!("routed through the subscriber");
    }
}
