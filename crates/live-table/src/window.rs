//! Sliding Frequency Window

use std::collections::VecDeque;

/// Observation timestamps within a trailing time window
#[derive(Debug, Clone)]
pub struct FrequencyWindow {
    stamps: VecDeque<u64>,
    span_ms: u64,
}

impl FrequencyWindow {
    /// Create a window covering the last `span_ms` milliseconds
    pub fn new(span_ms: u64) -> Self {
        Self {
            stamps: VecDeque::new(),
            span_ms: span_ms.max(1),
        }
    }

    /// Record an observation at `now_ms`
    pub fn record(&mut self, now_ms: u64) {
        self.stamps.push_back(now_ms);
        self.prune(now_ms);
    }

    /// Drop observations more than the span older than `now_ms`
    pub fn prune(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.stamps.front() {
            if now_ms.saturating_sub(oldest) > self.span_ms {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Observations per second over the window, as of `now_ms`
    pub fn frequency_hz(&mut self, now_ms: u64) -> f64 {
        self.prune(now_ms);
        self.stamps.len() as f64 / (self.span_ms as f64 / 1000.0)
    }

    /// Observations currently held
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    /// Window span in milliseconds
    pub fn span_ms(&self) -> u64 {
        self.span_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_observations_in_five_seconds() {
        let mut window = FrequencyWindow::new(5000);
        for i in 0..10 {
            window.record(10_000 + i * 100);
        }
        assert!((window.frequency_hz(10_900) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_old_observations_pruned_on_read() {
        let mut window = FrequencyWindow::new(5000);
        for i in 0..10 {
            window.record(10_000 + i * 100);
        }
        // First stamp is exactly 5000 ms old: kept
        assert_eq!(window.frequency_hz(15_000), 2.0);
        // Now the first five are older than the span
        assert!((window.frequency_hz(15_450) - 1.0).abs() < 1e-9);
        assert_eq!(window.len(), 5);
        assert_eq!(window.frequency_hz(30_000), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_steady_rate_converges() {
        let mut window = FrequencyWindow::new(5000);
        let mut now = 0;
        // 20 Hz for eight seconds
        for _ in 0..160 {
            now += 50;
            window.record(now);
        }
        let hz = window.frequency_hz(now);
        assert!((hz - 20.0).abs() < 0.25, "got {}", hz);
    }
}
