/*
================================================================================
                              Troggle Logging
================================================================================

Console logging through `env_logger`, plus an in-memory ring buffer of the
most recent lines from this crate so they can be exported on demand or dumped
into a crash log.

- `setup_logger()`: console + buffer logger. RUST_LOG wins when set; otherwise
  debug builds log DEBUG and above, release builds ERROR only. Other crates
  are filtered out.
- `setup_panic_hook()`: writes panic location, backtrace and the buffered log
  lines to `panic.log` in the log directory, and echoes them to stderr.
- `export_debug_logs()`: writes the buffer to `debug.log`.

Log directory: `<data dir>/<app name>/logs`, via the `dirs` crate.

================================================================================
*/

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{Level, LevelFilter, Metadata, Record};

#[allow(unused_imports)]
use log::{debug, info, warn, error};

const MAX_LOG_LINES: usize = 1000;
const LOG_TARGET_PREFIX: &str = "troggle";

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct BufferLogger {
    log_buffer: LogBuffer,
}

impl BufferLogger {
    fn new() -> Self {
        Self {
            log_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES))),
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str, line: Option<u32>) {
        if !target.starts_with(LOG_TARGET_PREFIX) {
            return;
        }

        let mut buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffer.len() == MAX_LOG_LINES {
            buffer.pop_front();
        }

        // The module is already in the target, so only add the line number
        let formatted_message = if let Some(line_num) = line {
            format!("{target}:{line_num} {message}")
        } else {
            format!("{target} {message}")
        };

        buffer.push_back(formatted_message);
    }

    fn get_shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(LOG_TARGET_PREFIX) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target(), record.line());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

/// Install the global logger and return the shared line buffer.
///
/// If a logger is already installed (e.g. the library was initialised twice)
/// the existing one is kept and the returned buffer stays empty.
pub fn setup_logger() -> LogBuffer {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else if cfg!(debug_assertions) {
        builder.filter(Some(LOG_TARGET_PREFIX), LevelFilter::Debug);
    } else {
        builder.filter(Some(LOG_TARGET_PREFIX), LevelFilter::Error);
    }

    // Filter out all other crates' logs
    builder.filter(None, LevelFilter::Off);

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let module_info = match (record.module_path(), record.line()) {
            (Some(module), Some(line)) => format!("{module}:{line}"),
            (Some(module), None) => module.to_string(),
            (None, Some(line)) => format!("line:{line}"),
            (None, None) => "unknown".to_string(),
        };

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        // Color::Rgb does not render on the macOS terminal
        #[cfg(target_os = "macos")]
        meta_style.set_color(Color::Blue);

        #[cfg(not(target_os = "macos"))]
        meta_style.set_color(Color::Rgb(120, 120, 120));

        writeln!(
            buf,
            "{} {} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info),
            record.args()
        )
    });

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger,
    };

    match log::set_boxed_logger(Box::new(composite_logger)) {
        // Filtering happens in the loggers, so let everything through the facade
        Ok(()) => log::set_max_level(LevelFilter::Trace),
        Err(e) => eprintln!("Logger already installed: {e}"),
    }

    shared_buffer
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

/// Export the buffered log lines to `debug.log` in the log directory.
///
/// Only output from the `log` macros is captured, not raw `println!`.
pub fn export_debug_logs(app_name: &str, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    let log_dir_path = get_log_directory(app_name);
    std::fs::create_dir_all(&log_dir_path)?;
    let debug_log_path = log_dir_path.join("debug.log");

    // Copy out first so logging below cannot contend for the lock
    let log_entries: Vec<String> = match log_buffer.lock() {
        Ok(buffer) => buffer.iter().cloned().collect(),
        Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&debug_log_path)?;
    write_log_export(&mut file, app_name, &log_entries)?;
    file.flush()?;

    info!("Debug logs exported to: {}", debug_log_path.display());
    Ok(debug_log_path)
}

fn write_log_export(out: &mut impl Write, app_name: &str, log_entries: &[String]) -> std::io::Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

    writeln!(out, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(out, "{timestamp} [DEBUG EXPORT] {app_name} Debug Log Export")?;
    writeln!(out, "{timestamp} [DEBUG EXPORT] Maximum captured entries: {MAX_LOG_LINES}")?;
    writeln!(out, "{timestamp} [DEBUG EXPORT] =====================================")?;
    writeln!(out)?;

    if log_entries.is_empty() {
        writeln!(out, "{timestamp} [DEBUG EXPORT] No log entries found in buffer")?;
    } else {
        writeln!(out, "{timestamp} [DEBUG EXPORT] Found {} log entries:", log_entries.len())?;
        for log_entry in log_entries {
            writeln!(out, "{timestamp} {log_entry}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{timestamp} [DEBUG EXPORT] Total entries exported: {}", log_entries.len())
}

pub fn setup_panic_hook(app_name: &str, log_buffer: LogBuffer) {
    let log_file_path = get_log_directory(app_name).join("panic.log");
    if let Some(parent) = log_file_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {e}", parent.display());
        }
    }

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = if let Some(location) = info.location() {
            format!("{}:{}", location.file(), location.line())
        } else {
            "unknown location".to_string()
        };

        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        let write_file = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&log_file_path)?;

            writeln!(file, "{timestamp} {header_msg}")?;
            writeln!(file, "{timestamp} [PANIC] Backtrace:")?;
            for line in &backtrace_lines {
                writeln!(file, "{timestamp} {line}")?;
            }
            writeln!(file)?;
            writeln!(file)?;

            writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
            // The panicking thread may hold the lock; never block here
            if let Ok(buffer) = log_buffer.try_lock() {
                for log in buffer.iter() {
                    writeln!(file, "{timestamp} {log}")?;
                }
            }
            Ok(())
        };

        eprintln!("\n\n{header_msg}");
        eprintln!("[PANIC] Backtrace:");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }

        match write_file() {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log {}: {e}", log_file_path.display()),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_keeps_only_own_targets() {
        let logger = BufferLogger::new();
        logger.log_to_buffer("INFO  hello", "troggle::host", Some(12));
        logger.log_to_buffer("INFO  ignored", "winit::platform", Some(1));
        logger.log_to_buffer("DEBUG no line", "troggle", None);

        let buffer = logger.get_shared_buffer();
        let lines: Vec<String> = buffer.lock().unwrap().iter().cloned().collect();
        assert_eq!(lines, vec![
            "troggle::host:12 INFO  hello".to_string(),
            "troggle DEBUG no line".to_string(),
        ]);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let logger = BufferLogger::new();
        for i in 0..(MAX_LOG_LINES + 5) {
            logger.log_to_buffer(&format!("line {i}"), "troggle", None);
        }

        let buffer = logger.get_shared_buffer();
        let buffer = buffer.lock().unwrap();
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer.front().unwrap(), "troggle line 5");
    }

    #[test]
    fn test_export_format() {
        let mut out = Vec::new();
        write_log_export(&mut out, "Troggle", &["troggle:1 INFO  a".to_string()]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Troggle Debug Log Export"));
        assert!(text.contains("Found 1 log entries"));
        assert!(text.contains("troggle:1 INFO  a"));
        assert!(text.contains("Total entries exported: 1"));
    }
}
