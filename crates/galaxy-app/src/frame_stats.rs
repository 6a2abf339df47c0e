//! Frame timing and periodic frame statistics.

use std::time::{Duration, Instant};

use galaxy_render::FrameOutcome;
use tracing::{info, warn};

/// Frames slower than this are reported as stalls.
pub const STALL_FRAME_TIME: Duration = Duration::from_millis(250);

/// Summary of one reporting window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub presented: u32,
    pub skipped: u32,
    pub average_frame_ms: f64,
    pub worst_frame_ms: f64,
}

impl FrameReport {
    pub fn fps(&self) -> f64 {
        if self.average_frame_ms > 0.0 {
            1000.0 / self.average_frame_ms
        } else {
            0.0
        }
    }
}

/// Counts frames and emits a [`FrameReport`] every `interval` frames.
pub struct FrameStats {
    interval: u32,
    previous: Option<Instant>,
    presented: u32,
    skipped: u32,
    total: Duration,
    worst: Duration,
}

impl FrameStats {
    /// `interval` of 0 disables reporting.
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            previous: None,
            presented: 0,
            skipped: 0,
            total: Duration::ZERO,
            worst: Duration::ZERO,
        }
    }

    /// Record a frame that finished now.
    pub fn tick(&mut self, outcome: FrameOutcome) -> Option<FrameReport> {
        let now = Instant::now();
        let frame_time = self
            .previous
            .map_or(Duration::ZERO, |prev| now.duration_since(prev));
        self.previous = Some(now);
        self.record(frame_time, outcome)
    }

    /// Record a frame with an explicit duration.
    pub fn record(&mut self, frame_time: Duration, outcome: FrameOutcome) -> Option<FrameReport> {
        if frame_time > STALL_FRAME_TIME {
            warn!(
                "Frame took {:.1}ms (stall threshold {:.1}ms)",
                frame_time.as_secs_f64() * 1000.0,
                STALL_FRAME_TIME.as_secs_f64() * 1000.0
            );
        }

        match outcome {
            FrameOutcome::Presented => self.presented += 1,
            FrameOutcome::Skipped => self.skipped += 1,
        }
        self.total += frame_time;
        self.worst = self.worst.max(frame_time);

        let frames = self.presented + self.skipped;
        if self.interval == 0 || frames < self.interval {
            return None;
        }

        let report = FrameReport {
            presented: self.presented,
            skipped: self.skipped,
            average_frame_ms: self.total.as_secs_f64() * 1000.0 / f64::from(frames),
            worst_frame_ms: self.worst.as_secs_f64() * 1000.0,
        };
        info!(
            "{:.1} fps ({:.2}ms avg, {:.2}ms worst), {} skipped",
            report.fps(),
            report.average_frame_ms,
            report.worst_frame_ms,
            report.skipped
        );

        self.presented = 0;
        self.skipped = 0;
        self.total = Duration::ZERO;
        self.worst = Duration::ZERO;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_after_interval() {
        let mut stats = FrameStats::new(3);
        let dt = Duration::from_millis(10);
        assert!(stats.record(dt, FrameOutcome::Presented).is_none());
        assert!(stats.record(dt, FrameOutcome::Skipped).is_none());
        let report = stats.record(Duration::from_millis(40), FrameOutcome::Presented);
        let report = report.unwrap();
        assert_eq!(report.presented, 2);
        assert_eq!(report.skipped, 1);
        assert!((report.average_frame_ms - 20.0).abs() < 1e-6);
        assert!((report.worst_frame_ms - 40.0).abs() < 1e-6);
        assert!((report.fps() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_resets_after_report() {
        let mut stats = FrameStats::new(2);
        let dt = Duration::from_millis(5);
        stats.record(dt, FrameOutcome::Presented);
        assert!(stats.record(dt, FrameOutcome::Presented).is_some());
        assert!(stats.record(dt, FrameOutcome::Presented).is_none());
        let report = stats.record(dt, FrameOutcome::Skipped).unwrap();
        assert_eq!(report.presented, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_zero_interval_never_reports() {
        let mut stats = FrameStats::new(0);
        for _ in 0..100 {
            assert!(stats.tick(FrameOutcome::Presented).is_none());
        }
    }

    #[test]
    fn test_zero_duration_fps() {
        let report = FrameReport {
            presented: 1,
            skipped: 0,
            average_frame_ms: 0.0,
            worst_frame_ms: 0.0,
        };
        assert_eq!(report.fps(), 0.0);
    }
}
