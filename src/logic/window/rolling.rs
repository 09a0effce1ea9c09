//! Rolling Statistics - Incremental aggregates over the last `w` rows
//!
//! - mean / std: Welford add + remove (numerically stable, no sum-of-squares)
//! - min / max: monotonic deques keyed by arrival sequence

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Full recompute cadence to shed accumulated floating point error
const RESYNC_EVERY: u64 = 4096;

// ============================================================================
// AGGREGATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Mean,
    Std,
    Min,
    Max,
}

impl Aggregate {
    pub const ALL: [Aggregate; 4] =
        [Aggregate::Mean, Aggregate::Std, Aggregate::Min, Aggregate::Max];

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
            Aggregate::Std => "std",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

// ============================================================================
// WELFORD (add/remove)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        if self.count <= 1 {
            *self = Self::default();
            return;
        }
        let old_mean = self.mean;
        self.count -= 1;
        self.mean -= (x - self.mean) / self.count as f64;
        self.m2 -= (x - old_mean) * (x - self.mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    /// Sample standard deviation (ddof = 1), 0 with fewer than 2 values
    fn std(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

// ============================================================================
// ROLLING WINDOW
// ============================================================================

/// Incremental aggregates for one window size over every column
#[derive(Debug, Clone)]
pub struct RollingWindow {
    size: usize,
    rows: VecDeque<Vec<f64>>,
    stats: Vec<Welford>,
    /// (seq, value), values increasing front to back
    min_q: Vec<VecDeque<(u64, f64)>>,
    /// (seq, value), values decreasing front to back
    max_q: Vec<VecDeque<(u64, f64)>>,
    pushes: u64,
}

impl RollingWindow {
    /// A size of 0 is treated as 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            rows: VecDeque::with_capacity(size + 1),
            stats: Vec::new(),
            min_q: Vec::new(),
            max_q: Vec::new(),
            pushes: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Rows currently covered (<= size)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, seq: u64, row: &[f64]) {
        if self.stats.len() != row.len() {
            self.init_columns(row.len());
        }

        if self.rows.len() == self.size {
            if let Some(old) = self.rows.pop_front() {
                for (stat, x) in self.stats.iter_mut().zip(old.iter()) {
                    stat.remove(*x);
                }
            }
        }

        for (j, &x) in row.iter().enumerate() {
            self.stats[j].add(x);

            let q = &mut self.min_q[j];
            while q.back().map_or(false, |&(_, v)| v >= x) {
                q.pop_back();
            }
            q.push_back((seq, x));

            let q = &mut self.max_q[j];
            while q.back().map_or(false, |&(_, v)| v <= x) {
                q.pop_back();
            }
            q.push_back((seq, x));
        }

        // Expire entries that fell out of the window
        let oldest = seq.saturating_sub(self.size as u64 - 1);
        for q in self.min_q.iter_mut().chain(self.max_q.iter_mut()) {
            while q.front().map_or(false, |&(s, _)| s < oldest) {
                q.pop_front();
            }
        }

        self.rows.push_back(row.to_vec());

        self.pushes += 1;
        if self.pushes % RESYNC_EVERY == 0 {
            self.resync();
        }
    }

    /// Aggregate value for every column
    pub fn aggregate(&self, agg: Aggregate) -> Vec<f64> {
        match agg {
            Aggregate::Mean => self.stats.iter().map(|s| s.mean).collect(),
            Aggregate::Std => self.stats.iter().map(Welford::std).collect(),
            Aggregate::Min => self
                .min_q
                .iter()
                .map(|q| q.front().map(|&(_, v)| v).unwrap_or(0.0))
                .collect(),
            Aggregate::Max => self
                .max_q
                .iter()
                .map(|q| q.front().map(|&(_, v)| v).unwrap_or(0.0))
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.stats.clear();
        self.min_q.clear();
        self.max_q.clear();
        self.pushes = 0;
    }

    fn init_columns(&mut self, dim: usize) {
        self.rows.clear();
        self.stats = vec![Welford::default(); dim];
        self.min_q = vec![VecDeque::new(); dim];
        self.max_q = vec![VecDeque::new(); dim];
    }

    /// Rebuild mean/m2 exactly from the retained rows
    fn resync(&mut self) {
        for (j, stat) in self.stats.iter_mut().enumerate() {
            let mut fresh = Welford::default();
            for row in &self.rows {
                fresh.add(row[j]);
            }
            *stat = fresh;
        }
    }
}

/// Direct (non-incremental) aggregate over a set of rows
pub fn aggregate_rows<'a, I>(rows: I, dim: usize, agg: Aggregate) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut stats = vec![Welford::default(); dim];
    let mut mins = vec![f64::INFINITY; dim];
    let mut maxs = vec![f64::NEG_INFINITY; dim];

    for row in rows {
        for (j, &x) in row.iter().enumerate().take(dim) {
            stats[j].add(x);
            mins[j] = mins[j].min(x);
            maxs[j] = maxs[j].max(x);
        }
    }

    match agg {
        Aggregate::Mean => stats.iter().map(|s| s.mean).collect(),
        Aggregate::Std => stats.iter().map(Welford::std).collect(),
        Aggregate::Min => mins.into_iter().map(|v| if v.is_finite() { v } else { 0.0 }).collect(),
        Aggregate::Max => maxs.into_iter().map(|v| if v.is_finite() { v } else { 0.0 }).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(values: &[f64], agg: Aggregate) -> f64 {
        let rows: Vec<Vec<f64>> = values.iter().map(|v| vec![*v]).collect();
        aggregate_rows(rows.iter().map(|r| r.as_slice()), 1, agg)[0]
    }

    #[test]
    fn test_incremental_matches_direct() {
        let data = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0];
        let mut w = RollingWindow::new(4);

        for (i, &x) in data.iter().enumerate() {
            w.push(i as u64, &[x]);
            let start = (i + 1).saturating_sub(4);
            let tail = &data[start..=i];
            for agg in Aggregate::ALL {
                let got = w.aggregate(agg)[0];
                let want = naive(tail, agg);
                assert!((got - want).abs() < 1e-9, "{:?} at {}: {} vs {}", agg, i, got, want);
            }
        }
    }

    #[test]
    fn test_partial_window() {
        let mut w = RollingWindow::new(5);
        w.push(0, &[2.0, 10.0]);
        assert_eq!(w.aggregate(Aggregate::Mean), vec![2.0, 10.0]);
        assert_eq!(w.aggregate(Aggregate::Std), vec![0.0, 0.0]);
        w.push(1, &[4.0, 10.0]);
        assert_eq!(w.aggregate(Aggregate::Mean), vec![3.0, 10.0]);
        assert_eq!(w.aggregate(Aggregate::Min), vec![2.0, 10.0]);
        assert_eq!(w.aggregate(Aggregate::Max), vec![4.0, 10.0]);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn test_welford_stable_on_large_offset() {
        let mut w = RollingWindow::new(3);
        for (i, x) in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0].iter().enumerate() {
            w.push(i as u64, &[*x]);
        }
        // last 3: 7, 13, 16 offset -> sample std = 4.5825...
        let std = w.aggregate(Aggregate::Std)[0];
        assert!((std - 4.582575694955840).abs() < 1e-6);
    }

    #[test]
    fn test_long_run_std_does_not_drift() {
        let data: Vec<f64> = (0..4000).map(|i| 1e8 + ((i * 7) % 13) as f64).collect();
        let mut w = RollingWindow::new(16);
        for (i, &x) in data.iter().enumerate() {
            w.push(i as u64, &[x]);
        }
        let got = w.aggregate(Aggregate::Std)[0];
        let want = naive(&data[data.len() - 16..], Aggregate::Std);
        assert!(((got - want) / want).abs() < 1e-6, "{} vs {}", got, want);

        let mean = w.aggregate(Aggregate::Mean)[0];
        let want_mean = naive(&data[data.len() - 16..], Aggregate::Mean);
        assert!((mean - want_mean).abs() < 1e-6);
    }

    #[test]
    fn test_zero_size_acts_as_one() {
        let mut w = RollingWindow::new(0);
        assert_eq!(w.size(), 1);
        w.push(0, &[5.0]);
        w.push(1, &[2.0]);
        assert_eq!(w.aggregate(Aggregate::Mean), vec![2.0]);
    }

    #[test]
    fn test_window_of_one() {
        let mut w = RollingWindow::new(1);
        w.push(0, &[5.0]);
        w.push(1, &[2.0]);
        assert_eq!(w.aggregate(Aggregate::Min), vec![2.0]);
        assert_eq!(w.aggregate(Aggregate::Max), vec![2.0]);
        assert_eq!(w.aggregate(Aggregate::Mean), vec![2.0]);
    }
}
