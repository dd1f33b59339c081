//! Cosmetic progress phases shown while an analysis is running
//!
//! The phase is a function of time since submission only. It does not track
//! the model call, and it stays on the last phase until the answer arrives.

use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

pub const ANALYSIS_PHASES: [&str; 6] = [
    "Stadt & Region...",
    "Mietspiegel-Daten...",
    "Bodenrichtwerte...",
    "BGB-Faktoren...",
    "Marktspannbreite...",
    "KI-Gutachten...",
];

/// Current phase as reported to the widget
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProgressState {
    pub phase: usize,
    pub label: String,
    /// 0 on the first phase, 100 on the last
    pub percent: f64,
}

/// Timer-driven phase sequence
#[derive(Debug, Clone, Copy)]
pub struct ProgressIndicator {
    interval: Duration,
}

impl ProgressIndicator {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Phase reached `elapsed` after the submission started
    pub fn state_at(&self, elapsed: Duration) -> ProgressState {
        let last = ANALYSIS_PHASES.len() - 1;
        let phase = if self.interval.is_zero() {
            last
        } else {
            let ticks = elapsed.as_nanos() / self.interval.as_nanos();
            usize::try_from(ticks).unwrap_or(last).min(last)
        };

        ProgressState {
            phase,
            label: ANALYSIS_PHASES[phase].to_string(),
            percent: phase as f64 / last as f64 * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator() -> ProgressIndicator {
        ProgressIndicator::new(Duration::from_millis(1500))
    }

    #[test]
    fn test_starts_on_first_phase() {
        let state = indicator().state_at(Duration::ZERO);
        assert_eq!(state.phase, 0);
        assert_eq!(state.label, "Stadt & Region...");
        assert_eq!(state.percent, 0.0);
    }

    #[test]
    fn test_advances_once_per_interval() {
        let progress = indicator();
        assert_eq!(progress.state_at(Duration::from_millis(1499)).phase, 0);
        assert_eq!(progress.state_at(Duration::from_millis(1500)).phase, 1);

        let state = progress.state_at(Duration::from_millis(4600));
        assert_eq!(state.phase, 3);
        assert_eq!(state.label, "BGB-Faktoren...");
        assert!((state.percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_stalls_on_last_phase() {
        let state = indicator().state_at(Duration::from_secs(600));
        assert_eq!(state.phase, 5);
        assert_eq!(state.label, "KI-Gutachten...");
        assert_eq!(state.percent, 100.0);
    }

    #[test]
    fn test_zero_interval_jumps_to_last_phase() {
        let state = ProgressIndicator::new(Duration::ZERO).state_at(Duration::ZERO);
        assert_eq!(state.phase, 5);
    }
}
