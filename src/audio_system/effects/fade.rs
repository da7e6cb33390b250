/// Fade transitions
///
/// A fade moves a handle's volume linearly between two levels over a fixed
/// duration. Adapters without native fades step through `Fade::steps`.
use std::time::Duration;

use super::volume::clamp01;

/// Number of volume steps used when a fade is emulated
pub const FADE_STEPS: u32 = 50;

/// Fade configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub from: f32,
    pub to: f32,

    /// Fade duration in milliseconds
    pub duration_ms: u64,
}

impl Fade {
    /// Create a new fade; both levels are clamped to [0, 1]
    pub fn new(from: f32, to: f32, duration_ms: u64) -> Self {
        Self {
            from: clamp01(from),
            to: clamp01(to),
            duration_ms,
        }
    }

    /// Fade from silence up to `to`
    pub fn fade_in(to: f32, duration_ms: u64) -> Self {
        Self::new(0.0, to, duration_ms)
    }

    /// Fade from `from` down to silence
    pub fn fade_out(from: f32, duration_ms: u64) -> Self {
        Self::new(from, 0.0, duration_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn is_instant(&self) -> bool {
        self.duration_ms == 0
    }

    /// Volume at `elapsed_ms` into the fade
    pub fn level_at(&self, elapsed_ms: u64) -> f32 {
        if self.is_instant() || elapsed_ms >= self.duration_ms {
            return self.to;
        }
        let t = elapsed_ms as f32 / self.duration_ms as f32;
        clamp01(self.from + (self.to - self.from) * t)
    }

    /// Emulation plan: `count` pairs of (sleep before step, level after step)
    pub fn steps(&self, count: u32) -> impl Iterator<Item = (Duration, f32)> + '_ {
        let count = count.max(1);
        let step = Duration::from_millis(self.duration_ms / count as u64);
        (1..=count).map(move |i| {
            let elapsed = self.duration_ms * i as u64 / count as u64;
            (step, self.level_at(elapsed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_creation() {
        let fade = Fade::new(1.5, -1.0, 500);
        assert_eq!(fade.from, 1.0);
        assert_eq!(fade.to, 0.0);
        assert_eq!(fade.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_fade_in_levels() {
        let fade = Fade::fade_in(0.8, 1000);
        assert_eq!(fade.level_at(0), 0.0);
        assert!((fade.level_at(500) - 0.4).abs() < 1e-6);
        assert_eq!(fade.level_at(1000), 0.8);
        assert_eq!(fade.level_at(5000), 0.8);
    }

    #[test]
    fn test_instant_fade_jumps_to_target() {
        let fade = Fade::fade_out(0.7, 0);
        assert!(fade.is_instant());
        assert_eq!(fade.level_at(0), 0.0);
    }

    #[test]
    fn test_fade_out_steps_strictly_decrease() {
        let fade = Fade::fade_out(0.7, 2000);
        let levels: Vec<f32> = fade.steps(FADE_STEPS).map(|(_, level)| level).collect();

        assert_eq!(levels.len(), FADE_STEPS as usize);
        assert!(levels.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*levels.last().unwrap(), 0.0);
    }
}
