use std::time::Duration;

/// Formats a position in seconds as `m:ss`. Unknown, non-finite or
/// non-positive inputs render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }

    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Returns the duration if it is usable for display and seeking.
pub fn known_duration(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Snapshot of the media position reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub current: f64,
    pub duration: f64,
}

impl Default for PlaybackPosition {
    fn default() -> Self {
        Self {
            current: 0.0,
            duration: f64::NAN,
        }
    }
}

impl PlaybackPosition {
    /// Played fraction in `[0, 1]`, or `None` while the duration is unknown.
    pub fn progress(&self) -> Option<f64> {
        known_duration(self.duration).map(|d| (self.current / d).clamp(0.0, 1.0))
    }

    /// `(current, duration)` labels, or `None` while the duration is unknown
    /// so the caller keeps its previous display.
    pub fn labels(&self) -> Option<(String, String)> {
        known_duration(self.duration)
            .map(|d| (format_time(self.current), format_time(d)))
    }
}

/// Monotonic media clock advanced by the virtual backend.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    pub fn set(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }
}

/// Turns elapsed wall time into a count of display frames that are due.
///
/// The analyzer itself never schedules anything; whoever owns the frame
/// pump asks the scheduler how many ticks to run.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    carry: Duration,
    frames: u64,
}

impl FrameScheduler {
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            interval: Duration::from_secs(1) / fps,
            carry: Duration::ZERO,
            frames: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total frames handed out so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Accumulates `elapsed` and returns how many frames are now due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.carry += elapsed;
        let mut due = 0;
        while self.carry >= self.interval {
            self.carry -= self.interval;
            due += 1;
        }
        self.frames += u64::from(due);
        due
    }
}
