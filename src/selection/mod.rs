//! Host selection engine
//!
//! Turns a host population into a ranking or a single choice. Non-SPECIFIC
//! modes score every candidate and draw weighted-random so lower-scored
//! hosts still win occasionally; SPECIFIC is a deterministic lookup with
//! typed failures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::provider::HostInfoProvider;
use crate::types::{
    HostRecord, ProspectorError, RankedHost, Result, ScoreFactors, SelectionMode,
    UnavailableReason,
};

mod scoring;

pub use scoring::{
    mode_weights, FixedTelemetry, LedgerTelemetry, ModeWeights, ScoreTelemetry, MAX_PRICE,
    MAX_STAKE, MIN_PRICE,
};

/// Ranking length when the caller does not ask for one
pub const DEFAULT_RANK_LIMIT: usize = 10;

/// Scores, ranks, and picks hosts for a model under a selection mode
pub struct SelectionEngine {
    provider: Option<Arc<dyn HostInfoProvider>>,
    telemetry: Arc<dyn ScoreTelemetry>,
    rng: Mutex<StdRng>,
}

impl SelectionEngine {
    /// Create an engine with placeholder telemetry and an entropy-seeded rng
    pub fn new() -> Self {
        Self {
            provider: None,
            telemetry: Arc::new(FixedTelemetry),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Attach the host info provider (usually the discovery engine)
    pub fn with_provider(mut self, provider: Arc<dyn HostInfoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Swap the uptime/latency factor source
    pub fn with_telemetry(mut self, telemetry: Arc<dyn ScoreTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Seed the random draw for deterministic tests
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Attach or replace the provider after construction
    pub fn set_provider(&mut self, provider: Arc<dyn HostInfoProvider>) {
        self.provider = Some(provider);
    }

    /// All four normalized factors for a host
    pub fn get_score_factors(&self, host: &HostRecord) -> ScoreFactors {
        scoring::score_factors(host, self.telemetry.as_ref())
    }

    /// Mode-weighted score for a host, in [0, 1]
    pub fn calculate_host_score(&self, host: &HostRecord, mode: SelectionMode) -> f64 {
        let factors = self.get_score_factors(host);
        scoring::weighted_score(&factors, mode)
    }

    /// Hosts for a model, scored under `mode`, descending
    ///
    /// Ties keep input order (stable sort); `limit` of None truncates at
    /// `DEFAULT_RANK_LIMIT`.
    pub async fn get_ranked_hosts_for_model(
        &self,
        model: &str,
        mode: SelectionMode,
        limit: Option<usize>,
    ) -> Result<Vec<RankedHost>> {
        let mut ranked = self.rank_candidates(model, mode).await?;
        ranked.truncate(limit.unwrap_or(DEFAULT_RANK_LIMIT));
        Ok(ranked)
    }

    /// Pick one host for a model under the given mode
    ///
    /// SPECIFIC requires `preferred` and fails with a matchable error when
    /// the host is missing, inactive, or does not list the model. Other
    /// modes draw weighted-random over the scored candidates; an empty
    /// marketplace yields `Ok(None)`.
    pub async fn select_host_for_model(
        &self,
        model: &str,
        mode: SelectionMode,
        preferred: Option<&str>,
    ) -> Result<Option<HostRecord>> {
        if mode == SelectionMode::Specific {
            let address = preferred.ok_or(ProspectorError::PreferredHostRequired)?;
            return self.select_specific(model, address).await.map(Some);
        }

        let ranked = self.rank_candidates(model, mode).await?;
        if ranked.is_empty() {
            debug!(model = %model, ?mode, "No candidate hosts");
            return Ok(None);
        }

        let chosen = self.weighted_draw(&ranked);
        debug!(
            model = %model,
            ?mode,
            address = %chosen.address,
            "Selected host"
        );
        Ok(Some(chosen))
    }

    /// Deterministic SPECIFIC-mode lookup, no scoring
    async fn select_specific(&self, model: &str, address: &str) -> Result<HostRecord> {
        let provider = self.provider()?;

        let unavailable = |reason| ProspectorError::HostUnavailable {
            address: address.to_string(),
            model: model.to_string(),
            reason,
        };

        let host = provider
            .get_host_info(address)
            .await
            .ok_or_else(|| unavailable(UnavailableReason::NotFound))?;

        if !host.is_active {
            return Err(unavailable(UnavailableReason::Inactive));
        }
        if !host.supports_model(model) {
            return Err(unavailable(UnavailableReason::ModelNotSupported));
        }

        Ok(host)
    }

    /// Score the full candidate population, descending, untruncated
    async fn rank_candidates(&self, model: &str, mode: SelectionMode) -> Result<Vec<RankedHost>> {
        let provider = self.provider()?;
        let candidates = provider.find_hosts_for_model(model).await;

        let mut ranked: Vec<RankedHost> = candidates
            .into_iter()
            .filter(|h| h.is_active)
            .map(|host| {
                let factors = self.get_score_factors(&host);
                let score = scoring::weighted_score(&factors, mode);
                RankedHost {
                    host,
                    score,
                    factors,
                }
            })
            .collect();

        // Vec::sort_by is stable, so equal scores keep input order
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    /// Weighted-random draw over scores; uniform when every score is zero
    fn weighted_draw(&self, ranked: &[RankedHost]) -> HostRecord {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        let total: f64 = ranked.iter().map(|r| r.score).sum();
        if total <= 0.0 {
            // Degenerate population: pick uniformly instead of starving
            // everyone but the first entry.
            let index = rng.gen_range(0..ranked.len());
            return ranked[index].host.clone();
        }

        let mut remainder = rng.gen::<f64>() * total;
        for entry in ranked {
            remainder -= entry.score;
            if remainder <= 0.0 {
                return entry.host.clone();
            }
        }

        // Float rounding can leave a sliver; the last entry absorbs it.
        ranked[ranked.len() - 1].host.clone()
    }

    fn provider(&self) -> Result<&Arc<dyn HostInfoProvider>> {
        self.provider
            .as_ref()
            .ok_or(ProspectorError::ProviderNotConfigured)
    }
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubProvider {
        hosts: HashMap<String, HostRecord>,
    }

    impl StubProvider {
        fn new(hosts: Vec<HostRecord>) -> Self {
            Self {
                hosts: hosts.into_iter().map(|h| (h.address_key(), h)).collect(),
            }
        }
    }

    #[async_trait]
    impl HostInfoProvider for StubProvider {
        async fn get_host_info(&self, address: &str) -> Option<HostRecord> {
            self.hosts.get(&address.to_ascii_lowercase()).cloned()
        }

        async fn find_hosts_for_model(&self, model: &str) -> Vec<HostRecord> {
            let mut hosts: Vec<HostRecord> = self
                .hosts
                .values()
                .filter(|h| h.is_active && h.supports_model(model))
                .cloned()
                .collect();
            hosts.sort_by(|a, b| a.address.cmp(&b.address));
            hosts
        }
    }

    fn host(address: &str, stake_tokens: u128, price: u64) -> HostRecord {
        let mut h = HostRecord::new(address, "test");
        h.supported_models = vec!["llama-70b".to_string()];
        h.stake = stake_tokens * 10u128.pow(18);
        h.min_price_per_token_native = price;
        h
    }

    fn engine(hosts: Vec<HostRecord>) -> SelectionEngine {
        SelectionEngine::new()
            .with_provider(Arc::new(StubProvider::new(hosts)))
            .with_rng_seed(7)
    }

    #[tokio::test]
    async fn test_ranked_descending_and_limited() {
        let hosts: Vec<HostRecord> = (0..15)
            .map(|i| host(&format!("0x{:02}", i), 100 * (i as u128 + 1), 5_000))
            .collect();
        let engine = engine(hosts);

        let ranked = engine
            .get_ranked_hosts_for_model("llama-70b", SelectionMode::Auto, None)
            .await
            .unwrap();
        assert_eq!(ranked.len(), DEFAULT_RANK_LIMIT);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let top3 = engine
            .get_ranked_hosts_for_model("llama-70b", SelectionMode::Auto, Some(3))
            .await
            .unwrap();
        assert_eq!(top3.len(), 3);
    }

    #[tokio::test]
    async fn test_cheapest_mode_dominated_by_price() {
        let engine = engine(vec![]);
        let cheap = host("0x1", 100, 100);
        let pricey = host("0x2", 100, 90_000);

        let cheap_score = engine.calculate_host_score(&cheap, SelectionMode::Cheapest);
        let pricey_score = engine.calculate_host_score(&pricey, SelectionMode::Cheapest);
        assert!(cheap_score - pricey_score > 0.3);
    }

    #[tokio::test]
    async fn test_reliable_mode_prefers_stake_over_price() {
        let engine = engine(vec![]);
        let staked = host("0x1", 10_000, 50_000);
        let cheap_low_stake = host("0x2", 100, 0);

        let staked_score = engine.calculate_host_score(&staked, SelectionMode::Reliable);
        let cheap_score = engine.calculate_host_score(&cheap_low_stake, SelectionMode::Reliable);
        assert!(staked_score > cheap_score);
    }

    #[tokio::test]
    async fn test_specific_requires_preferred_address() {
        let engine = engine(vec![host("0x1", 100, 500)]);
        let err = engine
            .select_host_for_model("llama-70b", SelectionMode::Specific, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectorError::PreferredHostRequired));
    }

    #[tokio::test]
    async fn test_specific_unknown_host() {
        let engine = engine(vec![host("0x1", 100, 500)]);
        let err = engine
            .select_host_for_model("llama-70b", SelectionMode::Specific, Some("0x99"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProspectorError::HostUnavailable {
                reason: UnavailableReason::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_specific_inactive_host() {
        let mut inactive = host("0x1", 100, 500);
        inactive.is_active = false;
        let engine = engine(vec![inactive]);

        let err = engine
            .select_host_for_model("llama-70b", SelectionMode::Specific, Some("0x1"))
            .await
            .unwrap_err();
        match err {
            ProspectorError::HostUnavailable {
                address,
                model,
                reason,
            } => {
                assert_eq!(address, "0x1");
                assert_eq!(model, "llama-70b");
                assert_eq!(reason, UnavailableReason::Inactive);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_specific_model_not_supported() {
        let engine = engine(vec![host("0x1", 100, 500)]);
        let err = engine
            .select_host_for_model("mistral-7b", SelectionMode::Specific, Some("0x1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProspectorError::HostUnavailable {
                reason: UnavailableReason::ModelNotSupported,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_specific_returns_exact_host_unscored() {
        let engine = engine(vec![host("0x1", 100, 500), host("0x2", 10_000, 100)]);
        let chosen = engine
            .select_host_for_model("llama-70b", SelectionMode::Specific, Some("0x1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chosen.address, "0x1");
    }

    #[tokio::test]
    async fn test_empty_population_is_none_not_error() {
        let engine = engine(vec![]);
        let chosen = engine
            .select_host_for_model("llama-70b", SelectionMode::Auto, None)
            .await
            .unwrap();
        assert!(chosen.is_none());
    }

    #[tokio::test]
    async fn test_missing_provider_is_typed_error() {
        let engine = SelectionEngine::new();
        let err = engine
            .select_host_for_model("llama-70b", SelectionMode::Auto, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectorError::ProviderNotConfigured));
    }

    #[tokio::test]
    async fn test_weighted_draw_favors_but_does_not_starve() {
        // Strong host vs weak host: over many draws the weak one must win
        // sometimes, but clearly less often.
        let strong = host("0xstrong", 10_000, 100);
        let weak = host("0xweak", 10, 90_000);
        let engine = engine(vec![strong, weak]);

        let mut strong_wins = 0u32;
        let mut weak_wins = 0u32;
        for _ in 0..1000 {
            let chosen = engine
                .select_host_for_model("llama-70b", SelectionMode::Auto, None)
                .await
                .unwrap()
                .unwrap();
            if chosen.address == "0xstrong" {
                strong_wins += 1;
            } else {
                weak_wins += 1;
            }
        }

        assert!(weak_wins > 0, "weak host starved");
        assert!(strong_wins > weak_wins, "{strong_wins} vs {weak_wins}");
    }

    #[tokio::test]
    async fn test_zero_total_score_falls_back_to_uniform() {
        struct ZeroTelemetry;
        impl ScoreTelemetry for ZeroTelemetry {
            fn uptime_score(&self, _: &HostRecord) -> f64 {
                0.0
            }
            fn latency_score(&self, _: &HostRecord) -> f64 {
                0.0
            }
        }

        // Zero stake, max price, zero telemetry: every factor is 0
        let a = host("0xa", 0, MAX_PRICE);
        let b = host("0xb", 0, MAX_PRICE);
        let engine = SelectionEngine::new()
            .with_provider(Arc::new(StubProvider::new(vec![a, b])))
            .with_telemetry(Arc::new(ZeroTelemetry))
            .with_rng_seed(11);

        let mut a_wins = 0u32;
        for _ in 0..200 {
            let chosen = engine
                .select_host_for_model("llama-70b", SelectionMode::Auto, None)
                .await
                .unwrap()
                .unwrap();
            if chosen.address == "0xa" {
                a_wins += 1;
            }
        }

        // Uniform fallback: neither host monopolizes the draw
        assert!(a_wins > 0 && a_wins < 200, "a won {a_wins}/200");
    }
}
