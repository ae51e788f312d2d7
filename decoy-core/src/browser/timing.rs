use std::time::Duration;

use rand::rngs::ThreadRng;
use rand::{thread_rng, Rng};
use tokio::time::sleep;

/// Produces the randomized delays every simulated behavior is paced with.
/// Samples are normal around the midpoint of the requested range rather than
/// uniform, which matches the spread of human reaction times.
#[derive(Debug)]
pub struct TimingModel {
    rng: ThreadRng,
}

impl Default for TimingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingModel {
    pub fn new() -> Self {
        Self { rng: thread_rng() }
    }

    /// Gaussian draw centered on `(min+max)/2` with sigma `(max-min)/4`,
    /// clamped into `[min, max]`. A degenerate range returns exactly `min`.
    pub fn sample(&mut self, min_ms: u64, max_ms: u64) -> Duration {
        let (min_ms, max_ms) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        if min_ms == max_ms {
            return Duration::from_millis(min_ms);
        }
        let min = min_ms as f64;
        let max = max_ms as f64;
        let mean = (min + max) / 2.0;
        let std_dev = (max - min) / 4.0;
        let value = (mean + self.standard_normal() * std_dev).clamp(min, max);
        Duration::from_micros((value * 1000.0) as u64)
    }

    /// Suspends the caller for a sampled delay. This is the single scheduling
    /// primitive all higher-level behaviors compose.
    pub async fn pause(&mut self, min_ms: u64, max_ms: u64) {
        let delay = self.sample(min_ms, max_ms);
        sleep(delay).await;
    }

    // Box-Muller transform from two independent uniform draws.
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_within_bounds() {
        let mut timing = TimingModel::new();
        for _ in 0..2_000 {
            let delay = timing.sample(100, 400).as_millis() as u64;
            assert!((100..=400).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn degenerate_range_is_exact() {
        let mut timing = TimingModel::new();
        for _ in 0..10 {
            assert_eq!(timing.sample(250, 250), Duration::from_millis(250));
        }
    }

    #[test]
    fn samples_concentrate_near_midpoint() {
        let mut timing = TimingModel::new();
        let n = 2_000usize;
        let total: f64 = (0..n)
            .map(|_| timing.sample(100, 200).as_secs_f64() * 1000.0)
            .sum();
        let mean = total / n as f64;
        // sigma is 25ms, so the sample mean sits well within +/-5ms of 150.
        assert!(
            (mean - 150.0).abs() < 5.0,
            "sample mean {mean} drifted from midpoint"
        );
    }

    #[test]
    fn inverted_bounds_are_normalized() {
        let mut timing = TimingModel::new();
        let delay = timing.sample(400, 100).as_millis() as u64;
        assert!((100..=400).contains(&delay));
    }
}
