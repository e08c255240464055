//! Completion counting and throughput reporting for parallel batches
//!
//! Worker completions can race, so the counter is atomic. The counter only
//! drives log output and an optional progress bar, never control flow.

use indicatif::ProgressBar;
use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Format a duration in seconds as `" 1h  2m  5.50s"`
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds / 60.0).floor() as u64) % 60;
    format!("{:2}h {:2}m {:5.2}s", hours, minutes, seconds % 60.0)
}

/// Counts finished work items and periodically logs throughput and ETA
pub struct ProgressReporter {
    total: usize,
    report_every: usize,
    completed: AtomicUsize,
    started: Instant,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Create a reporter for `total` items that logs every `report_every` completions
    ///
    /// A `report_every` of zero disables the periodic log lines.
    pub fn new(total: usize, report_every: usize, bar: Option<ProgressBar>) -> Self {
        Self {
            total,
            report_every,
            completed: AtomicUsize::new(0),
            started: Instant::now(),
            bar,
        }
    }

    /// Record one completion and return the updated count
    pub fn record(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(bar) = &self.bar {
            bar.inc(1);
        }

        if self.report_every > 0 && done % self.report_every == 0 {
            info!("{}", self.status_line(done));
        }

        done
    }

    /// Number of completions recorded so far
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Human readable progress line for `done` completed items
    pub fn status_line(&self, done: usize) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        let total = self.total.max(1);
        let remaining = self.total.saturating_sub(done);
        let eta = if done > 0 {
            elapsed / done as f64 * remaining as f64
        } else {
            0.0
        };

        format!(
            "{:>width$}/{}: {:5.2}% computed  -  Time: {}  -  ETA: {}",
            done,
            self.total,
            done as f64 / total as f64 * 100.0,
            format_duration(elapsed),
            format_duration(eta),
            width = self.total.to_string().len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3725.5), " 1h  2m  5.50s");
        assert_eq!(format_duration(0.0), " 0h  0m  0.00s");
        assert_eq!(format_duration(-3.0), " 0h  0m  0.00s");
    }

    #[test]
    fn test_record_counts_every_completion() {
        let reporter = ProgressReporter::new(10, 3, None);
        for expected in 1..=10 {
            assert_eq!(reporter.record(), expected);
        }
        assert_eq!(reporter.completed(), 10);
    }

    #[test]
    fn test_concurrent_records() {
        let reporter = Arc::new(ProgressReporter::new(800, 0, None));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        r.record();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reporter.completed(), 800);
    }

    #[test]
    fn test_status_line_contents() {
        let reporter = ProgressReporter::new(200, 100, None);
        let line = reporter.status_line(50);
        assert!(line.starts_with(" 50/200: 25.00% computed"));
        assert!(line.contains("ETA:"));
    }

    #[test]
    fn test_progress_bar_is_advanced() {
        let bar = ProgressBar::hidden();
        bar.set_length(4);
        let reporter = ProgressReporter::new(4, 0, Some(bar.clone()));
        reporter.record();
        reporter.record();
        assert_eq!(bar.position(), 2);
    }
}
