//! Host scoring
//!
//! Normalized per-factor scores and the mode weight table. The formula
//! shape is fixed for compatibility with other marketplace clients:
//!
//! ```text
//! score = w.stake*stake + w.price*price + w.uptime*uptime + w.latency*latency
//! ```
//!
//! Uptime and latency factors come through the `ScoreTelemetry` seam so
//! the fixed placeholders can be swapped for live connection-metric data
//! without touching the formula.

use std::sync::Arc;

use crate::reputation::ReputationLedger;
use crate::types::{HostRecord, ScoreFactors, SelectionMode};

/// Stake above this contributes no additional score (10000 tokens, 18 decimals)
pub const MAX_STAKE: u128 = 10_000 * 10u128.pow(18);

/// Raw price at or below this scores 1.0 (PRICE_PRECISION-scaled)
pub const MIN_PRICE: u64 = 100;

/// Raw price at or above this scores 0.0 (PRICE_PRECISION-scaled)
pub const MAX_PRICE: u64 = 100_000;

/// Placeholder uptime factor until live telemetry is attached
const DEFAULT_UPTIME_SCORE: f64 = 0.95;

/// Placeholder latency factor until live telemetry is attached
const DEFAULT_LATENCY_SCORE: f64 = 0.9;

/// Latency at or above this scores 0.0 in ledger-derived telemetry
const LATENCY_SCORE_CEILING_MS: f64 = 1000.0;

/// Per-mode factor weights; each row sums to 1.0
#[derive(Debug, Clone, Copy)]
pub struct ModeWeights {
    pub stake: f64,
    pub price: f64,
    pub uptime: f64,
    pub latency: f64,
}

/// Weight row for a selection mode
///
/// SPECIFIC bypasses scoring entirely during selection; scoring it
/// directly falls back to the balanced AUTO row.
pub fn mode_weights(mode: SelectionMode) -> ModeWeights {
    match mode {
        SelectionMode::Auto | SelectionMode::Specific => ModeWeights {
            stake: 0.35,
            price: 0.30,
            uptime: 0.20,
            latency: 0.15,
        },
        SelectionMode::Cheapest => ModeWeights {
            stake: 0.15,
            price: 0.70,
            uptime: 0.10,
            latency: 0.05,
        },
        SelectionMode::Reliable => ModeWeights {
            stake: 0.50,
            price: 0.05,
            uptime: 0.40,
            latency: 0.05,
        },
        SelectionMode::Fastest => ModeWeights {
            stake: 0.10,
            price: 0.20,
            uptime: 0.10,
            latency: 0.60,
        },
    }
}

/// Stake factor: linear up to MAX_STAKE, capped at 1.0
pub fn stake_score(stake: u128) -> f64 {
    stake.min(MAX_STAKE) as f64 / MAX_STAKE as f64
}

/// Price factor: 1.0 at or below MIN_PRICE (free counts as best),
/// 0.0 at or above MAX_PRICE, linear in between
pub fn price_score(price: u64) -> f64 {
    if price <= MIN_PRICE {
        return 1.0;
    }
    if price >= MAX_PRICE {
        return 0.0;
    }
    ((MAX_PRICE - price) as f64 / (MAX_PRICE - MIN_PRICE) as f64).clamp(0.0, 1.0)
}

/// Supplier of the uptime and latency score factors
pub trait ScoreTelemetry: Send + Sync {
    fn uptime_score(&self, host: &HostRecord) -> f64;
    fn latency_score(&self, host: &HostRecord) -> f64;
}

/// Fixed placeholder factors (the production default until a live feed exists)
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTelemetry;

impl ScoreTelemetry for FixedTelemetry {
    fn uptime_score(&self, _host: &HostRecord) -> f64 {
        DEFAULT_UPTIME_SCORE
    }

    fn latency_score(&self, _host: &HostRecord) -> f64 {
        DEFAULT_LATENCY_SCORE
    }
}

/// Factors derived from the reputation ledger's observations
///
/// Uptime is the running success ratio; latency maps the average
/// connection latency linearly onto [0, 1] over 0..1000ms. Hosts with no
/// observations fall back to the fixed placeholders.
pub struct LedgerTelemetry {
    ledger: Arc<ReputationLedger>,
}

impl LedgerTelemetry {
    pub fn new(ledger: Arc<ReputationLedger>) -> Self {
        Self { ledger }
    }
}

impl ScoreTelemetry for LedgerTelemetry {
    fn uptime_score(&self, host: &HostRecord) -> f64 {
        let rep = self.ledger.get_peer_reputation(&host.address);
        if rep.successful_requests + rep.failed_requests == 0 {
            return DEFAULT_UPTIME_SCORE;
        }
        rep.score
    }

    fn latency_score(&self, host: &HostRecord) -> f64 {
        match self.ledger.get_connection_metrics(&host.address) {
            Some(metrics) => {
                (1.0 - metrics.average_latency_ms as f64 / LATENCY_SCORE_CEILING_MS).clamp(0.0, 1.0)
            }
            None => DEFAULT_LATENCY_SCORE,
        }
    }
}

/// Compute all four factors for a host
pub fn score_factors(host: &HostRecord, telemetry: &dyn ScoreTelemetry) -> ScoreFactors {
    ScoreFactors {
        stake_score: stake_score(host.stake),
        price_score: price_score(host.min_price_per_token_native),
        uptime_score: telemetry.uptime_score(host),
        latency_score: telemetry.latency_score(host),
    }
}

/// Weighted sum of the factors under the given mode, always in [0, 1]
pub fn weighted_score(factors: &ScoreFactors, mode: SelectionMode) -> f64 {
    let w = mode_weights(mode);
    w.stake * factors.stake_score
        + w.price * factors.price_score
        + w.uptime * factors.uptime_score
        + w.latency * factors.latency_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::{ConnectionSample, ReputationUpdate};
    use std::time::Duration;

    #[test]
    fn test_mode_weights_sum_to_one() {
        for mode in [
            SelectionMode::Auto,
            SelectionMode::Cheapest,
            SelectionMode::Reliable,
            SelectionMode::Fastest,
            SelectionMode::Specific,
        ] {
            let w = mode_weights(mode);
            let sum = w.stake + w.price + w.uptime + w.latency;
            assert!((sum - 1.0).abs() < 1e-9, "{:?} weights sum to {}", mode, sum);
        }
    }

    #[test]
    fn test_stake_score_monotonic_and_capped() {
        let one_token = 10u128.pow(18);
        assert_eq!(stake_score(0), 0.0);
        assert!(stake_score(100 * one_token) < stake_score(5_000 * one_token));
        assert_eq!(stake_score(MAX_STAKE), 1.0);
        assert_eq!(stake_score(MAX_STAKE * 50), 1.0);
    }

    #[test]
    fn test_price_score_piecewise() {
        assert_eq!(price_score(0), 1.0);
        assert_eq!(price_score(MIN_PRICE), 1.0);
        assert_eq!(price_score(MAX_PRICE), 0.0);
        assert_eq!(price_score(MAX_PRICE + 1), 0.0);

        let mid = price_score((MIN_PRICE + MAX_PRICE) / 2);
        assert!(mid > 0.49 && mid < 0.51);

        // Monotonically non-increasing
        let mut prev = 1.0;
        for p in (0..=MAX_PRICE).step_by(1000) {
            let s = price_score(p);
            assert!(s <= prev);
            prev = s;
        }
    }

    #[test]
    fn test_weighted_score_in_unit_interval() {
        let mut host = HostRecord::new("0x1", "test");
        host.stake = MAX_STAKE * 2;
        host.min_price_per_token_native = 0;

        for mode in [
            SelectionMode::Auto,
            SelectionMode::Cheapest,
            SelectionMode::Reliable,
            SelectionMode::Fastest,
        ] {
            let factors = score_factors(&host, &FixedTelemetry);
            let score = weighted_score(&factors, mode);
            assert!((0.0..=1.0).contains(&score), "{:?}: {}", mode, score);
        }
    }

    #[test]
    fn test_ledger_telemetry_uses_observations() {
        let ledger = Arc::new(ReputationLedger::new());
        let telemetry = LedgerTelemetry::new(ledger.clone());
        let host = HostRecord::new("0x1", "test");

        // No observations: placeholders
        assert_eq!(telemetry.uptime_score(&host), 0.95);
        assert_eq!(telemetry.latency_score(&host), 0.9);

        ledger.update_peer_reputation("0x1", ReputationUpdate::successes(4));
        ledger.update_peer_reputation("0x1", ReputationUpdate::failures(1));
        assert!((telemetry.uptime_score(&host) - 0.8).abs() < f64::EPSILON);

        ledger.record_connection_metrics("0x1", ConnectionSample::new(Duration::from_millis(250)));
        assert!((telemetry.latency_score(&host) - 0.75).abs() < 1e-9);
    }
}
