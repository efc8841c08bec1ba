//! Fixed-window moving average over the most recent valid samples.

use heapless::HistoryBuffer;

pub const BREW_FILTER_LEN: usize = 8;
pub const STEAM_FILTER_LEN: usize = 8;
pub const PRESSURE_FILTER_LEN: usize = 4;

pub struct MovingAverage<const N: usize> {
    ring: HistoryBuffer<f32, N>,
}

impl<const N: usize> MovingAverage<N> {
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuffer::new(),
        }
    }

    /// Push a sample and return the average of the window so far.
    pub fn push(&mut self, value: f32) -> f32 {
        self.ring.write(value);
        self.average().unwrap_or(value)
    }

    pub fn average(&self) -> Option<f32> {
        let n = self.ring.len();
        if n == 0 {
            return None;
        }
        let sum: f32 = self.ring.as_slice().iter().sum();
        Some(sum / n as f32)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Forget history, e.g. after a fault so stale values don't leak into
    /// the first good reading.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}
