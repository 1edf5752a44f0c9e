use std::time::{Duration, Instant};

/// Minimum time between two progress reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(20);

/// Time-windowed progress reporter for long item loops.
///
/// Callers poll [`Progress::check`] after each unit of work; a report is
/// produced only when the window since the previous one has elapsed.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    started: Instant,
    last_report: Instant,
    interval: Duration,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self::with_interval(total, REPORT_INTERVAL)
    }

    pub fn with_interval(total: usize, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            total,
            started: now,
            last_report: now,
            interval,
        }
    }

    /// Returns `(done/total) ETA hh:mm:ss` once the reporting window has
    /// elapsed, `None` otherwise.
    pub fn check(&mut self, done: usize) -> Option<String> {
        let now = Instant::now();
        if now.duration_since(self.last_report) < self.interval {
            return None;
        }
        self.last_report = now;
        Some(format!(
            "({}/{}) ETA {}",
            done,
            self.total,
            format_duration(self.eta(done, now.duration_since(self.started)))
        ))
    }

    /// Linear extrapolation of `elapsed` over the remaining items, saturating
    /// at `u64::MAX` nanoseconds.
    fn eta(&self, done: usize, elapsed: Duration) -> Duration {
        if done == 0 || done >= self.total {
            return Duration::ZERO;
        }
        let remaining = (self.total - done) as u128;
        let nanos = elapsed.as_nanos().saturating_mul(remaining) / done as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
