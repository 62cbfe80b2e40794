use chrono::{DateTime, Utc};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// LogLevel — detected from backend output text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static LOG_LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(trace|debug|info|warn(?:ing)?|error)\b"#).unwrap());

/// Detect log level from a line of text.
pub fn detect_log_level(text: &str) -> Option<LogLevel> {
    LOG_LEVEL_RE.find(text).and_then(|m| {
        let s = m.as_str().to_lowercase();
        match s.as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    })
}

// ---------------------------------------------------------------------------
// LogLine — one line of backend stdout/stderr
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub is_stderr: bool,
    pub level: Option<LogLevel>,
}

impl LogLine {
    pub fn new(text: String, is_stderr: bool) -> Self {
        let level = detect_log_level(&text);
        Self {
            timestamp: Utc::now(),
            text,
            is_stderr,
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// LogWriter — relays backend output to the host terminal
// ---------------------------------------------------------------------------

pub struct LogWriter {
    rx: broadcast::Receiver<LogLine>,
    cancel: CancellationToken,
}

impl LogWriter {
    pub fn new(rx: broadcast::Receiver<LogLine>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    pub async fn run(mut self) {
        let use_color = std::io::stderr().is_terminal();
        loop {
            tokio::select! {
                result = self.rx.recv() => match result {
                    Ok(line) => print_line(&line, use_color),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "log relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = self.cancel.cancelled() => break,
            }
        }
    }
}

fn print_line(line: &LogLine, use_color: bool) {
    let time = line.timestamp.format("%H:%M:%S");
    if !use_color {
        eprintln!("{} backend | {}", time, line.text);
        return;
    }

    let tag = if line.is_stderr {
        format!("{}", "backend".red())
    } else {
        format!("{}", "backend".cyan())
    };

    match line.level {
        Some(LogLevel::Error) => {
            eprintln!("{} {} | {}", time.dimmed(), tag, line.text.red())
        }
        Some(LogLevel::Warn) => {
            eprintln!("{} {} | {}", time.dimmed(), tag, line.text.yellow())
        }
        _ => eprintln!("{} {} | {}", time.dimmed(), tag, line.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_levels_case_insensitive() {
        assert_eq!(detect_log_level("INFO: listening"), Some(LogLevel::Info));
        assert_eq!(detect_log_level("warning: low disk"), Some(LogLevel::Warn));
        assert_eq!(
            detect_log_level("2024-01-01 ERROR boom"),
            Some(LogLevel::Error)
        );
        assert_eq!(detect_log_level("PORT=18080"), None);
    }

    #[test]
    fn log_line_captures_level() {
        let line = LogLine::new("error: adb device gone".to_string(), true);
        assert!(line.is_stderr);
        assert_eq!(line.level, Some(LogLevel::Error));
    }
}
