//! Output formatting and writing utilities
//!
//! Response bodies go to stdout in the selected format. Notifications,
//! status lines and progress bars go to stderr so stdout stays parseable.

use crate::cli::OutputFormat;
use crate::error::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kos_http::http::UploadProgress;
use kos_http::{Notification, NotificationKind, NotificationSink};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

/// Format a serializable value
pub fn format_value<T: Serialize>(format: OutputFormat, value: &T) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    writer: Box<dyn Write + Send>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool, progress: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: progress && !quiet && io::stderr().is_terminal(),
            quiet,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    #[cfg(test)]
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            use_color: false,
            show_progress: false,
            quiet: false,
            writer,
        }
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Status line on stderr
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "ℹ".blue(), message);
        } else {
            eprintln!("INFO: {}", message);
        }
    }

    /// Write data in the configured format
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let formatted = format_value(self.format, value)?;
        self.writeln(formatted.trim_end())
    }

    /// Progress bar for an upload, when progress display is enabled
    pub fn upload_progress(&self, message: &str) -> Option<UploadBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new(0);
        bar.set_style(upload_style());
        bar.set_message(message.to_string());
        Some(UploadBar { bar })
    }
}

/// An indicatif bar fed by upload progress reports
#[derive(Clone)]
pub struct UploadBar {
    bar: ProgressBar,
}

impl UploadBar {
    pub fn update(&self, progress: UploadProgress) {
        if self.bar.length() != Some(progress.total) {
            self.bar.set_length(progress.total);
        }
        self.bar.set_position(progress.loaded);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn upload_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders notifications on stderr
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    use_color: bool,
    quiet: bool,
    shown: Arc<Mutex<usize>>,
}

impl TerminalNotifier {
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            use_color,
            quiet,
            shown: Arc::default(),
        }
    }

    /// Number of notifications shown so far
    pub fn shown(&self) -> usize {
        self.shown.lock().map(|n| *n).unwrap_or_default()
    }
}

/// One line for a notification
pub fn render_notification(notification: &Notification, use_color: bool) -> String {
    let marker = match notification.kind {
        NotificationKind::Success => "✓",
        NotificationKind::Error => "✗",
    };
    if !use_color {
        return format!("{} {}: {}", marker, notification.title, notification.message);
    }
    match notification.kind {
        NotificationKind::Success => format!(
            "{} {}: {}",
            marker.green(),
            notification.title.green().bold(),
            notification.message
        ),
        NotificationKind::Error => format!(
            "{} {}: {}",
            marker.red(),
            notification.title.red().bold(),
            notification.message
        ),
    }
}

impl NotificationSink for TerminalNotifier {
    fn show(&self, notification: Notification) {
        if let Ok(mut shown) = self.shown.lock() {
            *shown += 1;
        }
        tracing::debug!(title = %notification.title, kind = ?notification.kind, "notification");
        if self.quiet && notification.kind == NotificationKind::Success {
            return;
        }
        eprintln!("{}", render_notification(&notification, self.use_color));
    }
}
