// =============================================================================
// Capital Allocator — strategy weighting and rebalance accounting
// =============================================================================
//
// Seven selectable weighting methods over the registered strategy stats,
// all funneled through the same constraint pass: weights non-negative,
// summing to 1, each at most `max_weight`. The iterative methods
// (MinVariance, MaxSharpe) share one projected-gradient loop bounded by
// MAX_SOLVER_STEPS; RiskParity takes a single Newton step on top of the
// inverse-volatility seed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::correlation::StrategyMatrix;
use crate::error::{CoreError, CoreResult};

/// Upper bound on projected-gradient iterations.
const MAX_SOLVER_STEPS: usize = 200;
/// Convergence tolerance for the iterative solvers.
const SOLVER_EPSILON: f64 = 1e-8;
/// Mean-correlation ceiling for greedy MinCorrelation inclusion.
const MIN_CORR_INCLUSION: f64 = 0.7;
/// Volatility floor guarding the inverse-vol seed.
const VOL_FLOOR: f64 = 1e-6;
/// Rebalance adjustments below this |delta| are not reported.
const ADJUSTMENT_THRESHOLD: f64 = 0.01;

/// Selectable weighting method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllocationMethod {
    EqualWeight,
    #[default]
    RiskParity,
    MinVariance,
    MaxSharpe,
    MinCorrelation,
    Kelly,
    Custom,
}

impl std::fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EqualWeight => "equal_weight",
            Self::RiskParity => "risk_parity",
            Self::MinVariance => "min_variance",
            Self::MaxSharpe => "max_sharpe",
            Self::MinCorrelation => "min_correlation",
            Self::Kelly => "kelly",
            Self::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Per-strategy performance statistics feeding the allocator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Mean (daily) return estimate.
    pub expected_return: f64,
    /// Return standard deviation.
    pub volatility: f64,
    /// Fraction of winning trades, in [0, 1].
    pub win_rate: f64,
    /// Average winning trade (positive).
    pub avg_win: f64,
    /// Average losing trade magnitude (positive).
    pub avg_loss: f64,
}

/// Weight plus the capital it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyAllocation {
    pub weight: f64,
    pub amount: f64,
}

/// Outcome of one allocation computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub method: AllocationMethod,
    pub weights: BTreeMap<String, f64>,
    pub allocations: BTreeMap<String, StrategyAllocation>,
    pub total_capital: f64,
    pub timestamp: i64,
}

/// Per-strategy weight movement reported by a rebalance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationAdjustment {
    pub strategy_id: String,
    pub old_weight: f64,
    pub new_weight: f64,
    pub delta: f64,
    pub delta_amount: f64,
}

/// Capital allocator state.
pub struct CapitalAllocator {
    method: AllocationMethod,
    total_capital: f64,
    max_weight: f64,
    stats: BTreeMap<String, StrategyStats>,
    covariance: Option<StrategyMatrix>,
    correlation: Option<StrategyMatrix>,
    custom_weights: BTreeMap<String, f64>,
    current: Option<AllocationResult>,
}

impl CapitalAllocator {
    pub fn new(method: AllocationMethod, total_capital: f64, max_weight: f64) -> Self {
        Self {
            method,
            total_capital,
            max_weight,
            stats: BTreeMap::new(),
            covariance: None,
            correlation: None,
            custom_weights: BTreeMap::new(),
            current: None,
        }
    }

    pub fn method(&self) -> AllocationMethod {
        self.method
    }

    pub fn set_method(&mut self, method: AllocationMethod) {
        self.method = method;
    }

    pub fn total_capital(&self) -> f64 {
        self.total_capital
    }

    pub fn set_total_capital(&mut self, capital: f64) {
        self.total_capital = capital;
    }

    /// Register or refresh a strategy's statistics.
    pub fn upsert_stats(&mut self, id: &str, stats: StrategyStats) {
        self.stats.insert(id.to_string(), stats);
    }

    pub fn remove_strategy(&mut self, id: &str) {
        self.stats.remove(id);
        self.custom_weights.remove(id);
    }

    pub fn strategy_count(&self) -> usize {
        self.stats.len()
    }

    /// Latest covariance/correlation snapshot from the analyzer.
    pub fn update_matrices(&mut self, covariance: StrategyMatrix, correlation: StrategyMatrix) {
        self.covariance = Some(covariance);
        self.correlation = Some(correlation);
    }

    /// Caller-provided weights for `AllocationMethod::Custom` (normalized at
    /// computation time; unlisted strategies get zero).
    pub fn set_custom_weights(&mut self, weights: BTreeMap<String, f64>) {
        self.custom_weights = weights;
    }

    pub fn current_allocation(&self) -> Option<&AllocationResult> {
        self.current.as_ref()
    }

    /// Compute an allocation with the configured method.
    pub fn calculate_allocation(&mut self, timestamp: i64) -> CoreResult<AllocationResult> {
        self.calculate_with(self.method, timestamp)
    }

    /// Compute an allocation with an explicit method and store it as the
    /// current allocation.
    ///
    /// The sum-to-one and per-weight-cap invariants are only jointly
    /// satisfiable when `N * max_weight >= 1`; fewer strategies than
    /// `ceil(1 / max_weight)` is rejected as an invalid configuration
    /// instead of silently emitting cap-violating weights.
    pub fn calculate_with(
        &mut self,
        method: AllocationMethod,
        timestamp: i64,
    ) -> CoreResult<AllocationResult> {
        let ids: Vec<String> = self.stats.keys().cloned().collect();
        if ids.is_empty() {
            return Err(CoreError::InvalidConfig(
                "no strategies registered for allocation".into(),
            ));
        }
        if (ids.len() as f64) * self.max_weight < 1.0 - 1e-9 {
            return Err(CoreError::InvalidConfig(format!(
                "max weight {:.2} needs at least {} strategies to sum to 1, have {}",
                self.max_weight,
                min_strategies_for_cap(self.max_weight),
                ids.len()
            )));
        }

        let raw = match method {
            AllocationMethod::EqualWeight => vec![1.0 / ids.len() as f64; ids.len()],
            AllocationMethod::RiskParity => self.risk_parity_weights(&ids),
            AllocationMethod::MinVariance => self.min_variance_weights(&ids),
            AllocationMethod::MaxSharpe => self.max_sharpe_weights(&ids),
            AllocationMethod::MinCorrelation => self.min_correlation_weights(&ids),
            AllocationMethod::Kelly => self.kelly_weights(&ids),
            AllocationMethod::Custom => self.custom_weight_vector(&ids)?,
        };

        let weights_vec = apply_constraints(raw, self.max_weight);

        let mut weights = BTreeMap::new();
        let mut allocations = BTreeMap::new();
        for (id, w) in ids.iter().zip(&weights_vec) {
            weights.insert(id.clone(), *w);
            allocations.insert(
                id.clone(),
                StrategyAllocation {
                    weight: *w,
                    amount: w * self.total_capital,
                },
            );
        }

        let result = AllocationResult {
            method,
            weights,
            allocations,
            total_capital: self.total_capital,
            timestamp,
        };

        debug!(method = %method, strategies = ids.len(), "allocation computed");
        self.current = Some(result.clone());
        Ok(result)
    }

    /// Recompute and report the per-strategy adjustments versus the previous
    /// allocation (movements below 1 percentage point are dropped).
    pub fn rebalance(
        &mut self,
        trigger: &str,
        timestamp: i64,
    ) -> CoreResult<(AllocationResult, Vec<AllocationAdjustment>)> {
        let old_weights: BTreeMap<String, f64> = self
            .current
            .as_ref()
            .map(|r| r.weights.clone())
            .unwrap_or_default();

        let result = self.calculate_allocation(timestamp)?;

        let mut adjustments = Vec::new();
        for (id, &new_weight) in &result.weights {
            let old_weight = old_weights.get(id).copied().unwrap_or(0.0);
            let delta = new_weight - old_weight;
            if delta.abs() > ADJUSTMENT_THRESHOLD {
                adjustments.push(AllocationAdjustment {
                    strategy_id: id.clone(),
                    old_weight,
                    new_weight,
                    delta,
                    delta_amount: delta * self.total_capital,
                });
            }
        }
        // Strategies dropped since the last allocation unwind completely.
        for (id, &old_weight) in &old_weights {
            if !result.weights.contains_key(id) && old_weight.abs() > ADJUSTMENT_THRESHOLD {
                adjustments.push(AllocationAdjustment {
                    strategy_id: id.clone(),
                    old_weight,
                    new_weight: 0.0,
                    delta: -old_weight,
                    delta_amount: -old_weight * self.total_capital,
                });
            }
        }

        info!(
            trigger,
            adjustments = adjustments.len(),
            method = %result.method,
            "rebalance computed"
        );
        Ok((result, adjustments))
    }

    // -------------------------------------------------------------------------
    // Method implementations
    // -------------------------------------------------------------------------

    /// Inverse-volatility seed plus one Newton step equalizing the risk
    /// contributions `w_i * (Sigma w)_i`.
    fn risk_parity_weights(&self, ids: &[String]) -> Vec<f64> {
        let n = ids.len();
        let mut w: Vec<f64> = ids
            .iter()
            .map(|id| 1.0 / self.stats[id].volatility.max(VOL_FLOOR))
            .collect();
        normalize(&mut w);

        let Some(sigma) = self.matrix_for(ids, self.covariance.as_ref()) else {
            return w;
        };

        let marginal = mat_vec(&sigma, &w);
        let contributions: Vec<f64> = w.iter().zip(&marginal).map(|(wi, mi)| wi * mi).collect();
        let target = contributions.iter().sum::<f64>() / n as f64;

        for i in 0..n {
            if marginal[i].abs() > SOLVER_EPSILON {
                // Newton step on RC_i - target with d(RC_i)/d(w_i) ~ m_i.
                w[i] = (w[i] - (contributions[i] - target) / marginal[i]).max(0.0);
            }
        }
        w
    }

    /// Projected gradient descent on `w' Sigma w`.
    fn min_variance_weights(&self, ids: &[String]) -> Vec<f64> {
        let n = ids.len();
        let mut w = vec![1.0 / n as f64; n];
        let Some(sigma) = self.matrix_for(ids, self.covariance.as_ref()) else {
            return w;
        };

        let scale = matrix_scale(&sigma);
        let step = 0.1 / scale;

        for _ in 0..MAX_SOLVER_STEPS {
            let grad = mat_vec(&sigma, &w); // (1/2) gradient
            let mut next: Vec<f64> = w
                .iter()
                .zip(&grad)
                .map(|(wi, gi)| (wi - step * 2.0 * gi).max(0.0))
                .collect();
            normalize(&mut next);

            let delta = w
                .iter()
                .zip(&next)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            w = next;
            if delta < SOLVER_EPSILON {
                break;
            }
        }
        w
    }

    /// Projected gradient ascent on the Sharpe ratio (risk-free rate 0).
    fn max_sharpe_weights(&self, ids: &[String]) -> Vec<f64> {
        let n = ids.len();
        let mu: Vec<f64> = ids.iter().map(|id| self.stats[id].expected_return).collect();
        let mut w = vec![1.0 / n as f64; n];
        let Some(sigma) = self.matrix_for(ids, self.covariance.as_ref()) else {
            // Without a covariance matrix, tilt towards expected returns.
            let mut tilted: Vec<f64> = mu.iter().map(|m| m.max(0.0)).collect();
            if tilted.iter().sum::<f64>() <= 0.0 {
                return w;
            }
            normalize(&mut tilted);
            return tilted;
        };

        let scale = matrix_scale(&sigma);
        let step = 0.1 / scale.max(1.0);

        for _ in 0..MAX_SOLVER_STEPS {
            let sigma_w = mat_vec(&sigma, &w);
            let variance: f64 = w.iter().zip(&sigma_w).map(|(a, b)| a * b).sum();
            if variance <= 0.0 {
                break;
            }
            let vol = variance.sqrt();
            let ret: f64 = w.iter().zip(&mu).map(|(a, b)| a * b).sum();

            // d/dw of (mu'w)/sqrt(w'Sigma w).
            let mut next: Vec<f64> = (0..n)
                .map(|i| {
                    let grad = mu[i] / vol - ret * sigma_w[i] / (variance * vol);
                    (w[i] + step * grad).max(0.0)
                })
                .collect();
            normalize(&mut next);

            let delta = w
                .iter()
                .zip(&next)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            w = next;
            if delta < SOLVER_EPSILON {
                break;
            }
        }
        w
    }

    /// Greedy diversification: seed with the strategy least correlated to
    /// the field, then admit strategies while their mean |rho| to the chosen
    /// set stays under the inclusion ceiling; equal-weight the selection.
    ///
    /// The selection never shrinks below `ceil(1 / max_weight)` members:
    /// an equal split over fewer would put each weight above the cap, so
    /// the least-correlated rejects are admitted anyway.
    fn min_correlation_weights(&self, ids: &[String]) -> Vec<f64> {
        let n = ids.len();
        let Some(corr) = self.matrix_for(ids, self.correlation.as_ref()) else {
            return vec![1.0 / n as f64; n];
        };

        if n == 1 {
            return vec![1.0];
        }

        let min_select = min_strategies_for_cap(self.max_weight).min(n);

        // Seed: smallest mean |rho| against everyone else.
        let mean_abs = |i: usize, set: &[usize]| -> f64 {
            set.iter().map(|&j| corr[i][j].abs()).sum::<f64>() / set.len() as f64
        };
        let everyone: Vec<usize> = (0..n).collect();
        let seed = (0..n)
            .min_by(|&a, &b| {
                let others_a: Vec<usize> = everyone.iter().copied().filter(|&j| j != a).collect();
                let others_b: Vec<usize> = everyone.iter().copied().filter(|&j| j != b).collect();
                mean_abs(a, &others_a)
                    .partial_cmp(&mean_abs(b, &others_b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);

        let mut chosen = vec![seed];
        let mut remaining: Vec<usize> = (0..n).filter(|&i| i != seed).collect();

        while !remaining.is_empty() {
            let Some((pos, &candidate)) = remaining.iter().enumerate().min_by(|(_, &a), (_, &b)| {
                mean_abs(a, &chosen)
                    .partial_cmp(&mean_abs(b, &chosen))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                break;
            };

            if mean_abs(candidate, &chosen) > MIN_CORR_INCLUSION {
                if chosen.len() >= min_select {
                    break;
                }
                warn!(
                    candidate = %ids[candidate],
                    chosen = chosen.len(),
                    min_select,
                    "admitting correlated strategy to keep the cap satisfiable"
                );
            }
            chosen.push(candidate);
            remaining.remove(pos);
        }

        let share = 1.0 / chosen.len() as f64;
        let mut w = vec![0.0; n];
        for &i in &chosen {
            w[i] = share;
        }
        w
    }

    /// Kelly fraction per strategy, clamped and renormalized.
    fn kelly_weights(&self, ids: &[String]) -> Vec<f64> {
        let mut w: Vec<f64> = ids
            .iter()
            .map(|id| {
                let s = &self.stats[id];
                if s.avg_win <= 0.0 {
                    return 0.0;
                }
                let loss_rate = 1.0 - s.win_rate;
                let f = (s.win_rate * s.avg_win - loss_rate * s.avg_loss) / s.avg_win;
                f.clamp(0.0, self.max_weight)
            })
            .collect();

        if w.iter().sum::<f64>() <= 0.0 {
            // No strategy has positive edge: fall back to equal weight
            // rather than allocating nothing.
            return vec![1.0 / ids.len() as f64; ids.len()];
        }
        normalize(&mut w);
        w
    }

    fn custom_weight_vector(&self, ids: &[String]) -> CoreResult<Vec<f64>> {
        if self.custom_weights.is_empty() {
            return Err(CoreError::InvalidConfig(
                "custom allocation selected but no custom weights provided".into(),
            ));
        }
        let mut w: Vec<f64> = ids
            .iter()
            .map(|id| self.custom_weights.get(id).copied().unwrap_or(0.0).max(0.0))
            .collect();
        if w.iter().sum::<f64>() <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "custom weights sum to zero across registered strategies".into(),
            ));
        }
        normalize(&mut w);
        Ok(w)
    }

    /// Reindex a stored matrix onto `ids`; `None` when any id is missing or
    /// no matrix has been supplied yet.
    fn matrix_for(&self, ids: &[String], matrix: Option<&StrategyMatrix>) -> Option<Vec<Vec<f64>>> {
        let m = matrix?;
        let idx: Vec<usize> = ids
            .iter()
            .map(|id| m.ids.iter().position(|x| x == id))
            .collect::<Option<Vec<_>>>()?;
        Some(
            idx.iter()
                .map(|&i| idx.iter().map(|&j| m.values[i][j]).collect())
                .collect(),
        )
    }
}

// =============================================================================
// Constraint handling and small linear algebra helpers
// =============================================================================

/// Clip weights into `[0, max_weight]` and restore the sum to 1 by
/// spreading clipped-off mass equally across the entries still below the
/// cap (zero-weight entries included).
///
/// Precondition, enforced by `calculate_with`: `n * max_weight >= 1`, so a
/// distribution that respects both invariants always exists and the cap is
/// never exceeded in the output.
fn apply_constraints(mut weights: Vec<f64>, max_weight: f64) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return weights;
    }

    for w in weights.iter_mut() {
        if !w.is_finite() || *w < 0.0 {
            *w = 0.0;
        }
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        weights = vec![1.0 / n as f64; n];
    }
    normalize(&mut weights);

    // Cap-and-redistribute: each round clips the overweight entries and
    // hands the deficit equally to everyone with headroom. Every round
    // saturates at least one entry, so n rounds suffice.
    for _ in 0..n {
        for w in weights.iter_mut() {
            if *w > max_weight {
                *w = max_weight;
            }
        }

        let deficit = 1.0 - weights.iter().sum::<f64>();
        if deficit <= 1e-12 {
            break;
        }

        let free: Vec<usize> = (0..n)
            .filter(|&i| weights[i] < max_weight - 1e-12)
            .collect();
        if free.is_empty() {
            // Unreachable under the precondition: all entries at cap means
            // the sum is n * max_weight >= 1.
            break;
        }
        let share = deficit / free.len() as f64;
        for &i in &free {
            weights[i] = (weights[i] + share).min(max_weight);
        }
    }

    weights
}

/// Smallest strategy count for which equal shares fit under `max_weight`.
fn min_strategies_for_cap(max_weight: f64) -> usize {
    if max_weight <= 0.0 {
        return usize::MAX;
    }
    (1.0 / max_weight).ceil() as usize
}

fn normalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

/// Rough magnitude of a matrix for step-size scaling.
fn matrix_scale(m: &[Vec<f64>]) -> f64 {
    m.iter()
        .flat_map(|row| row.iter().map(|v| v.abs()))
        .fold(0.0_f64, f64::max)
        .max(VOL_FLOOR)
}
