//! Rolling window of recent mid prices.
//!
//! Fixed capacity, oldest sample evicted first. Samples are plain `f64`:
//! the window only feeds the statistical indicators, whose outputs are
//! re-quantized into `Decimal` before they touch any price arithmetic.

use std::collections::VecDeque;

use rand::Rng;

use crate::error::{StrategyError, StrategyResult};

/// Half-width of the multiplicative noise applied to seed samples.
const SEED_NOISE: f64 = 0.002;

/// Per-sample drift of the seed walk, relative to the window midpoint.
const SEED_DRIFT_PER_SAMPLE: f64 = 0.0001;

/// Fixed-capacity FIFO of mid prices.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    /// Create an empty window.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a window pre-filled with a synthetic walk around `base`.
    ///
    /// Sample `i` is `base * (1 + noise + drift)` with
    /// `noise ~ U(-0.002, 0.002)` and `drift = 0.0001 * (i - capacity / 2)`,
    /// so the walk trends gently upward through `base`.
    ///
    /// This exists so the indicators are defined from the very first tick
    /// during development and paper trading. The samples are not market data
    /// and bias the first `capacity` ticks of indicator output.
    pub fn seeded<R: Rng + ?Sized>(base: f64, capacity: usize, rng: &mut R) -> Self {
        let mut window = Self::new(capacity);
        let midpoint = (capacity / 2) as f64;
        for i in 0..capacity {
            let noise = rng.gen_range(-SEED_NOISE..=SEED_NOISE);
            let drift = SEED_DRIFT_PER_SAMPLE * (i as f64 - midpoint);
            window.push(base * (1.0 + noise + drift));
        }
        window
    }

    /// Append a sample, evicting the oldest if the window is full.
    pub fn push(&mut self, price: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(price);
    }

    /// The most recent `n` samples, oldest first.
    pub fn snapshot(&self, n: usize) -> StrategyResult<Vec<f64>> {
        let available = self.samples.len();
        if available < n {
            return Err(StrategyError::DataInsufficient {
                needed: n,
                available,
            });
        }
        Ok(self.samples.range(available - n..).copied().collect())
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_push_and_snapshot_order() {
        let mut window = PriceWindow::new(5);
        for px in [1.0, 2.0, 3.0] {
            window.push(px);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.snapshot(2).unwrap(), vec![2.0, 3.0]);
        assert_eq!(window.snapshot(3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(window.latest(), Some(3.0));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut window = PriceWindow::new(3);
        for px in 1..=5 {
            window.push(px as f64);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.snapshot(3).unwrap(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_snapshot_insufficient_data() {
        let mut window = PriceWindow::new(10);
        window.push(100.0);
        match window.snapshot(2) {
            Err(StrategyError::DataInsufficient { needed, available }) => {
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected DataInsufficient, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_zero_is_empty() {
        let window = PriceWindow::new(3);
        assert!(window.snapshot(0).unwrap().is_empty());
        assert!(window.is_empty());
    }

    #[test]
    fn test_zero_capacity_ignores_pushes() {
        let mut window = PriceWindow::new(0);
        window.push(1.0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_seeded_fills_to_capacity_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let window = PriceWindow::seeded(80_000.0, 100, &mut rng);
        assert_eq!(window.len(), 100);
        assert_eq!(window.capacity(), 100);

        // Worst case: |noise| 0.002 + |drift| 0.005
        for px in window.snapshot(100).unwrap() {
            assert!(px >= 80_000.0 * 0.992 && px <= 80_000.0 * 1.008, "px={px}");
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = PriceWindow::seeded(80_000.0, 50, &mut StdRng::seed_from_u64(7));
        let b = PriceWindow::seeded(80_000.0, 50, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.snapshot(50).unwrap(), b.snapshot(50).unwrap());
    }
}
