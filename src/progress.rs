//! Terminal progress reporting.
//!
//! The scan pipeline, deletion executor and maintenance passes report through
//! the [`ProgressCallback`] trait. [`Progress`] renders those reports with
//! `indicatif`: a spinner while walking and a bar for each counted phase.
//! Phases run one after another, so a single active bar is kept.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receiver for progress events.
///
/// Phase names used by the crate are `"walking"`, `"fingerprinting"`,
/// and `"deleting"`.
pub trait ProgressCallback: Send + Sync {
    /// A phase begins; `total` is 0 when the count is unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// `current` items of the phase are done, the latest being `path`.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` bytes finished.
    fn on_item_completed(&self, _bytes: u64) {}

    /// The phase finished or was cut short.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

/// `indicatif` renderer for [`ProgressCallback`] events.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    hidden: bool,
}

impl Progress {
    /// Create a renderer; `quiet` suppresses all drawing.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            bytes: AtomicU64::new(0),
            hidden: quiet,
        }
    }

    /// Bytes reported through `on_item_completed` in the current phase.
    #[must_use]
    pub fn bytes_completed(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn new_bar(&self, phase: &str, total: usize) -> ProgressBar {
        let bar = if total == 0 {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} files {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█>-"),
            );
            bar
        };
        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_prefix(phase_label(phase));
        bar
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        self.bytes.store(0, Ordering::Relaxed);
        let bar = self.new_bar(phase, total);
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        self.with_bar(|bar| {
            bar.set_position(current as u64);
            bar.set_message(truncate_path(path, 40));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        let bytes = self.bytes_completed();
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                let done = if bytes > 0 {
                    format!("{} complete ({})", phase_label(phase), ByteSize::b(bytes))
                } else {
                    format!("{} complete", phase_label(phase))
                };
                bar.finish_with_message(done);
            }
        }
    }

    fn on_message(&self, message: &str) {
        self.with_bar(|bar| bar.set_message(message.to_string()));
    }
}

fn phase_label(phase: &str) -> String {
    match phase {
        "walking" => "Walking".to_string(),
        "fingerprinting" => "Fingerprinting".to_string(),
        "deleting" => "Deleting".to_string(),
        other => other.to_string(),
    }
}

/// Shorten a path to at most `max_len` characters, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }
    format!(".../{file_name}")
}
