// =============================================================================
// Correlation Analyzer — cross-strategy return statistics
// =============================================================================
//
// Keeps a rolling window of daily returns per strategy and answers the
// portfolio-level questions: how correlated are the books, which pairs are
// concentrated, and has a pair's correlation structure shifted between the
// first and second half of the window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CorrelationConfig;
use crate::market_data::RollingWindow;

/// A strategy pair with its Pearson correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub a: String,
    pub b: String,
    pub correlation: f64,
}

/// Symmetric matrix indexed by strategy id (ids sorted for determinism).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMatrix {
    pub ids: Vec<String>,
    /// Row-major `ids.len() x ids.len()` values.
    pub values: Vec<Vec<f64>>,
}

impl StrategyMatrix {
    /// Look up the entry for a pair of ids.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.ids.iter().position(|id| id == a)?;
        let j = self.ids.iter().position(|id| id == b)?;
        Some(self.values[i][j])
    }
}

/// Result of a split-window correlation shift probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationShift {
    pub detected: bool,
    pub first_half: f64,
    pub second_half: f64,
    pub change: f64,
}

/// Rolling cross-strategy correlation state.
///
/// A `BTreeMap` keeps iteration (and therefore matrix layout and pair
/// ordering) deterministic across runs.
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
    returns: BTreeMap<String, RollingWindow<f64>>,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            returns: BTreeMap::new(),
        }
    }

    /// Register a strategy with an empty return series. Idempotent.
    pub fn register_strategy(&mut self, id: &str) {
        let window = self.config.rolling_window;
        self.returns
            .entry(id.to_string())
            .or_insert_with(|| RollingWindow::new(window));
    }

    /// Drop a strategy's series entirely.
    pub fn remove_strategy(&mut self, id: &str) {
        self.returns.remove(id);
    }

    pub fn strategy_ids(&self) -> Vec<String> {
        self.returns.keys().cloned().collect()
    }

    /// Append one (daily) return observation for `id`. Unknown ids are
    /// registered on the fly.
    pub fn record_return(&mut self, id: &str, daily_return: f64) {
        if !daily_return.is_finite() {
            debug!(strategy = id, "ignoring non-finite return");
            return;
        }
        let window = self.config.rolling_window;
        self.returns
            .entry(id.to_string())
            .or_insert_with(|| RollingWindow::new(window))
            .push(daily_return);
    }

    /// Snapshot of one strategy's return series, oldest first.
    pub fn returns_of(&self, id: &str) -> Option<Vec<f64>> {
        self.returns.get(id).map(RollingWindow::to_vec)
    }

    /// Every recorded return across all strategies (for portfolio VaR).
    pub fn all_returns(&self) -> Vec<f64> {
        self.returns
            .values()
            .flat_map(|w| w.iter().copied().collect::<Vec<_>>())
            .collect()
    }

    /// Pairwise Pearson correlation matrix. Diagonal is 1 when the series
    /// has any samples, 0 otherwise; under-populated pairs read 0.
    pub fn correlation_matrix(&self) -> StrategyMatrix {
        self.build_matrix(|a, b| pearson(a, b).unwrap_or(0.0), Some(1.0))
    }

    /// Pairwise sample covariance matrix (diagonal is the variance).
    pub fn covariance_matrix(&self) -> StrategyMatrix {
        self.build_matrix(|a, b| covariance(a, b).unwrap_or(0.0), None)
    }

    fn build_matrix(
        &self,
        stat: impl Fn(&[f64], &[f64]) -> f64,
        diagonal_override: Option<f64>,
    ) -> StrategyMatrix {
        let ids: Vec<String> = self.returns.keys().cloned().collect();
        let series: Vec<Vec<f64>> = ids
            .iter()
            .map(|id| self.returns[id].to_vec())
            .collect();

        let n = ids.len();
        let mut values = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let v = match (i == j, diagonal_override) {
                    (true, Some(d)) if !series[i].is_empty() => d,
                    (true, Some(_)) => 0.0,
                    _ => {
                        let (a, b) = overlap(&series[i], &series[j]);
                        stat(a, b)
                    }
                };
                values[i][j] = v;
                values[j][i] = v;
            }
        }

        StrategyMatrix { ids, values }
    }

    /// Pairs with `|rho| >= threshold`, most correlated first.
    pub fn high_correlation_pairs(&self, threshold: f64) -> Vec<CorrelationPair> {
        self.pairs_filtered(|rho| rho.abs() >= threshold, true)
    }

    /// Pairs at or above the configured warning threshold.
    pub fn warning_pairs(&self) -> Vec<CorrelationPair> {
        self.high_correlation_pairs(self.config.high_correlation_warning)
    }

    /// Pairs with `|rho| <= low_correlation_threshold`, least correlated
    /// first — the diversification candidates.
    pub fn low_correlation_pairs(&self) -> Vec<CorrelationPair> {
        let threshold = self.config.low_correlation_threshold;
        self.pairs_filtered(|rho| rho.abs() <= threshold, false)
    }

    fn pairs_filtered(
        &self,
        keep: impl Fn(f64) -> bool,
        descending: bool,
    ) -> Vec<CorrelationPair> {
        let matrix = self.correlation_matrix();
        let n = matrix.ids.len();

        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let rho = matrix.values[i][j];
                if keep(rho) {
                    pairs.push(CorrelationPair {
                        a: matrix.ids[i].clone(),
                        b: matrix.ids[j].clone(),
                        correlation: rho,
                    });
                }
            }
        }

        pairs.sort_by(|x, y| {
            let ord = x
                .correlation
                .abs()
                .partial_cmp(&y.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        pairs
    }

    /// Compare a pair's correlation over the first vs second half of the
    /// overlapping window. `detected` when the absolute difference reaches
    /// `threshold`.
    pub fn correlation_regime_change(
        &self,
        a: &str,
        b: &str,
        threshold: f64,
    ) -> Option<CorrelationShift> {
        let series_a = self.returns.get(a)?.to_vec();
        let series_b = self.returns.get(b)?.to_vec();
        let (xs, ys) = overlap(&series_a, &series_b);

        // Both halves need at least 2 samples for Pearson.
        let n = xs.len();
        if n < 4 {
            return None;
        }
        let mid = n / 2;

        let first = pearson(&xs[..mid], &ys[..mid]).unwrap_or(0.0);
        let second = pearson(&xs[mid..], &ys[mid..]).unwrap_or(0.0);
        let change = (second - first).abs();

        Some(CorrelationShift {
            detected: change >= threshold,
            first_half: first,
            second_half: second,
            change,
        })
    }
}

/// Align two series on their overlapping tail.
fn overlap<'a>(a: &'a [f64], b: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let n = a.len().min(b.len());
    (&a[a.len() - n..], &b[b.len() - n..])
}

/// Pearson correlation; `None` with fewer than 2 samples or zero variance.
fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let xs = &xs[..n];
    let ys = &ys[..n];

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0_f64;
    let mut var_x = 0.0_f64;
    let mut var_y = 0.0_f64;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let rho = cov / (var_x.sqrt() * var_y.sqrt());
    rho.is_finite().then(|| rho.clamp(-1.0, 1.0))
}

/// Sample covariance; `None` with fewer than 2 samples.
fn covariance(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let xs = &xs[..n];
    let ys = &ys[..n];

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let cov = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>()
        / (n - 1) as f64;

    cov.is_finite().then_some(cov)
}
