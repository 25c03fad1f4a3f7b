// =============================================================================
// Market data primitives — OHLCV bars and bounded rolling windows
// =============================================================================
//
// The core consumes bar data only; how bars arrive (exchange stream, CSV
// replay, backtest harness) is the embedding application's concern. A `Bar`
// is validated once at the ingestion boundary so every downstream consumer
// can rely on the OHLC ordering invariant.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bar
// ---------------------------------------------------------------------------

/// A single OHLCV sample over a fixed timeframe, oldest-first per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Open time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub symbol: String,
}

impl Bar {
    /// Check the OHLC ordering invariant:
    /// `low <= min(open, close) <= max(open, close) <= high`, `volume >= 0`,
    /// and all price fields finite.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) || !self.volume.is_finite() {
            return false;
        }
        self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.volume >= 0.0
    }

    /// Typical price `(high + low + close) / 3`, used by CCI and MFI.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

// ---------------------------------------------------------------------------
// RollingWindow — bounded FIFO
// ---------------------------------------------------------------------------

/// Bounded FIFO of at most `capacity` elements; pushing to a full window
/// evicts the oldest element.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create an empty window. A zero capacity is clamped to 1 so that a
    /// push always retains at least the newest element.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, evicting the oldest element when full. Returns the
    /// evicted element, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-first iterator.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Materialize the window contents oldest-first. Indicator functions
    /// operate on slices, so callers snapshot before computing.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Convenience alias for the per-strategy candle history.
pub type BarWindow = RollingWindow<Bar>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::Bar;

    /// Build a bar with a sensible OHLC envelope around `close`.
    pub fn bar(timestamp: i64, close: f64) -> Bar {
        Bar {
            timestamp,
            open: close * 0.999,
            high: close * 1.002,
            low: close * 0.997,
            close,
            volume: 1_000.0,
            symbol: "BTCUSDT".to_string(),
        }
    }

    /// Build a bar with explicit OHLC values.
    pub fn bar_ohlc(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 1_000.0,
            symbol: "BTCUSDT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::bar_ohlc;
    use super::*;

    #[test]
    fn valid_bar_passes() {
        let b = bar_ohlc(0, 100.0, 102.0, 99.0, 101.0);
        assert!(b.is_valid());
    }

    #[test]
    fn inverted_ohlc_fails() {
        // High below close.
        let b = bar_ohlc(0, 100.0, 100.5, 99.0, 101.0);
        assert!(!b.is_valid());
        // Low above open.
        let b = bar_ohlc(0, 100.0, 102.0, 100.5, 101.0);
        assert!(!b.is_valid());
    }

    #[test]
    fn negative_volume_fails() {
        let mut b = bar_ohlc(0, 100.0, 102.0, 99.0, 101.0);
        b.volume = -1.0;
        assert!(!b.is_valid());
    }

    #[test]
    fn nan_price_fails() {
        let mut b = bar_ohlc(0, 100.0, 102.0, 99.0, 101.0);
        b.high = f64::NAN;
        assert!(!b.is_valid());
    }

    #[test]
    fn typical_price() {
        let b = bar_ohlc(0, 100.0, 103.0, 97.0, 100.0);
        assert!((b.typical_price() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn window_evicts_oldest_when_full() {
        let mut w: RollingWindow<i32> = RollingWindow::new(3);
        assert!(w.push(1).is_none());
        assert!(w.push(2).is_none());
        assert!(w.push(3).is_none());
        assert!(w.is_full());

        let evicted = w.push(4);
        assert_eq!(evicted, Some(1));
        assert_eq!(w.len(), 3);
        assert_eq!(w.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn window_size_never_exceeds_capacity() {
        let mut w: RollingWindow<usize> = RollingWindow::new(5);
        for i in 0..100 {
            w.push(i);
            assert!(w.len() <= 5);
        }
        assert_eq!(w.to_vec(), vec![95, 96, 97, 98, 99]);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut w: RollingWindow<i32> = RollingWindow::new(0);
        w.push(7);
        assert_eq!(w.len(), 1);
        assert_eq!(w.push(8), Some(7));
    }

    #[test]
    fn front_and_back() {
        let mut w: RollingWindow<i32> = RollingWindow::new(4);
        w.push(10);
        w.push(20);
        assert_eq!(w.front(), Some(&10));
        assert_eq!(w.back(), Some(&20));
    }
}
