//! Sliding Window - Bounded FIFO store of encoded samples
//!
//! Mỗi sample được lưu kèm feature vector tính tại thời điểm nhận,
//! để retrain dùng đúng vector đã được score.

use std::collections::VecDeque;
use std::sync::Arc;

use super::rolling::{aggregate_rows, Aggregate, RollingWindow};
use crate::constants::LAG_PLACEHOLDER;

// ============================================================================
// STORED SAMPLE
// ============================================================================

/// Immutable buffer entry, shared with retrain snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    /// Arrival sequence number
    pub seq: u64,
    /// Encoded raw row (schema order)
    pub raw: Vec<f64>,
    /// Full feature vector: raw + rolling + lags
    pub features: Vec<f64>,
}

// ============================================================================
// SLIDING WINDOW
// ============================================================================

#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    entries: VecDeque<Arc<StoredSample>>,
    rolling: Vec<RollingWindow>,
    aggregates: Vec<Aggregate>,
    lag_periods: Vec<usize>,
    next_seq: u64,
}

impl SlidingWindow {
    /// Rolling windows larger than `capacity` are clamped to it, zero sizes
    /// are skipped.
    pub fn new(
        capacity: usize,
        rolling_windows: &[usize],
        aggregates: &[Aggregate],
        lag_periods: &[usize],
    ) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            rolling: rolling_windows
                .iter()
                .filter(|&&w| w > 0)
                .map(|&w| RollingWindow::new(w.min(capacity)))
                .collect(),
            aggregates: aggregates.to_vec(),
            lag_periods: lag_periods.to_vec(),
            next_seq: 0,
        }
    }

    /// Append a raw row, computing its feature vector.
    ///
    /// Returns the evicted entry when the buffer was full.
    pub fn append(&mut self, raw: Vec<f64>) -> Option<Arc<StoredSample>> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };

        for window in &mut self.rolling {
            window.push(seq, &raw);
        }

        let mut features = raw.clone();
        for window in &self.rolling {
            for &agg in &self.aggregates {
                features.extend(window.aggregate(agg));
            }
        }
        // Lag p = entry p steps before the one being appended
        for &p in &self.lag_periods {
            match self.entries.len().checked_sub(p).and_then(|i| self.entries.get(i)) {
                Some(prev) => features.extend_from_slice(&prev.raw),
                None => features.extend(std::iter::repeat(LAG_PLACEHOLDER).take(raw.len())),
            }
        }

        self.entries.push_back(Arc::new(StoredSample { seq, raw, features }));
        evicted
    }

    /// Most recently appended entry
    pub fn latest(&self) -> Option<&Arc<StoredSample>> {
        self.entries.back()
    }

    /// Owned copy of the buffer in arrival order
    pub fn snapshot(&self) -> Vec<Arc<StoredSample>> {
        self.entries.iter().cloned().collect()
    }

    /// Rolling aggregates over the tail, ordered window -> aggregate -> field.
    ///
    /// Configured windows are served from the incremental state, any other
    /// size is computed directly from the buffer.
    pub fn rolling_features(&self, window_sizes: &[usize], aggregates: &[Aggregate]) -> Vec<f64> {
        let dim = self.dim();
        let mut out = Vec::with_capacity(window_sizes.len() * aggregates.len() * dim);

        for &w in window_sizes {
            let effective = w.min(self.capacity);
            let incremental = self.rolling.iter().find(|r| r.size() == effective);
            for &agg in aggregates {
                match incremental {
                    Some(r) if !r.is_empty() => out.extend(r.aggregate(agg)),
                    _ => {
                        let start = self.entries.len().saturating_sub(effective);
                        let rows = self.entries.iter().skip(start).map(|e| e.raw.as_slice());
                        out.extend(aggregate_rows(rows, dim, agg));
                    }
                }
            }
        }
        out
    }

    /// Raw values `p` steps before the tail (placeholder when absent)
    pub fn lag_features(&self, periods: &[usize]) -> Vec<f64> {
        let dim = self.dim();
        let mut out = Vec::with_capacity(periods.len() * dim);
        for &p in periods {
            let idx = self.entries.len().checked_sub(1 + p);
            match idx.and_then(|i| self.entries.get(i)) {
                Some(e) => out.extend_from_slice(&e.raw),
                None => out.extend(std::iter::repeat(LAG_PLACEHOLDER).take(dim)),
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        for window in &mut self.rolling {
            window.clear();
        }
        self.next_seq = 0;
    }

    fn dim(&self) -> usize {
        self.entries.back().map(|e| e.raw.len()).unwrap_or(0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_values(window: &SlidingWindow) -> Vec<f64> {
        window.snapshot().iter().map(|e| e.raw[0]).collect()
    }

    #[test]
    fn test_capacity_and_fifo() {
        let mut window = SlidingWindow::new(3, &[], &[], &[]);
        for x in 1..=4 {
            window.append(vec![x as f64]);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(raw_values(&window), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_rolling_size_is_skipped() {
        let mut window = SlidingWindow::new(4, &[0, 2], &[Aggregate::Mean], &[]);
        window.append(vec![1.0]);
        window.append(vec![3.0]);
        // raw + roll2_mean only
        assert_eq!(window.latest().unwrap().features, vec![3.0, 2.0]);
    }

    #[test]
    fn test_eviction_returns_oldest() {
        let mut window = SlidingWindow::new(2, &[], &[], &[]);
        assert!(window.append(vec![1.0]).is_none());
        assert!(window.append(vec![2.0]).is_none());
        let evicted = window.append(vec![3.0]).unwrap();
        assert_eq!(evicted.raw, vec![1.0]);
        assert_eq!(evicted.seq, 0);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut window = SlidingWindow::new(7, &[3], &Aggregate::ALL, &[1]);
        for i in 0..100 {
            window.append(vec![i as f64, (i * 2) as f64]);
            assert!(window.len() <= 7);
        }
        let seqs: Vec<u64> = window.snapshot().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (93..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_feature_vector_layout() {
        let mut window = SlidingWindow::new(5, &[2], &[Aggregate::Mean, Aggregate::Max], &[1]);
        window.append(vec![1.0, 10.0]);
        let first = window.latest().unwrap().features.clone();
        // raw, roll2_mean, roll2_max, lag1 (placeholder)
        assert_eq!(first, vec![1.0, 10.0, 1.0, 10.0, 1.0, 10.0, 0.0, 0.0]);

        window.append(vec![3.0, 20.0]);
        let second = window.latest().unwrap().features.clone();
        assert_eq!(second, vec![3.0, 20.0, 2.0, 15.0, 3.0, 20.0, 1.0, 10.0]);
    }

    #[test]
    fn test_lag_features_after_append() {
        let mut window = SlidingWindow::new(5, &[], &[], &[1, 2]);
        window.append(vec![1.0]);
        window.append(vec![2.0]);
        assert_eq!(window.lag_features(&[1, 2]), vec![1.0, 0.0]);
        window.append(vec![3.0]);
        assert_eq!(window.lag_features(&[1, 2]), vec![2.0, 1.0]);
    }

    #[test]
    fn test_rolling_features_incremental_and_direct_agree() {
        let mut window = SlidingWindow::new(10, &[4], &Aggregate::ALL, &[]);
        for x in [5.0, 1.0, 8.0, 3.0, 9.0, 2.0, 7.0] {
            window.append(vec![x]);
        }
        let configured = window.rolling_features(&[4], &Aggregate::ALL);

        // Same size served by the direct path through a fresh buffer
        let mut plain = SlidingWindow::new(10, &[], &[], &[]);
        for e in window.snapshot() {
            plain.append(e.raw.clone());
        }
        let direct = plain.rolling_features(&[4], &Aggregate::ALL);

        for (a, b) in configured.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        // tail [3, 9, 2, 7]
        assert!((configured[0] - 5.25).abs() < 1e-12);
        assert_eq!(configured[2], 2.0);
        assert_eq!(configured[3], 9.0);
    }

    #[test]
    fn test_clear() {
        let mut window = SlidingWindow::new(3, &[2], &[Aggregate::Mean], &[1]);
        window.append(vec![1.0]);
        window.append(vec![2.0]);
        window.clear();
        assert!(window.is_empty());
        assert!(window.latest().is_none());

        window.append(vec![9.0]);
        assert_eq!(window.latest().unwrap().features, vec![9.0, 9.0, 0.0]);
        assert_eq!(window.latest().unwrap().seq, 0);
    }
}
