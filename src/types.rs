//! Core types for host discovery and selection
//!
//! Everything that crosses the crate boundary lives here: the host record,
//! discovery options, selection modes, scoring output, and the error enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Fixed-point scale applied to on-chain price values.
/// True price = raw value / PRICE_PRECISION.
pub const PRICE_PRECISION: u64 = 1000;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, ProspectorError>;

/// Why a specifically-requested host could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailableReason {
    /// No record of this host in any source
    NotFound,
    /// Host exists but is not accepting work
    Inactive,
    /// Host does not list the requested model
    ModelNotSupported,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Inactive => write!(f, "inactive"),
            Self::ModelNotSupported => write!(f, "model not supported"),
        }
    }
}

/// Main error type for selection and discovery operations
///
/// Source-level fetch failures never reach this enum; they are absorbed
/// into per-source discovery stats. These variants are caller errors
/// that must stay matchable so orchestration code can branch on them.
#[derive(Debug, Error)]
pub enum ProspectorError {
    /// SPECIFIC mode was requested without a preferred host address
    #[error("SPECIFIC selection mode requires a preferred host address")]
    PreferredHostRequired,

    /// The preferred host cannot serve the request
    #[error("host {address} unavailable for model {model}: {reason}")]
    HostUnavailable {
        address: String,
        model: String,
        reason: UnavailableReason,
    },

    /// Selection was attempted before a host info provider was attached
    #[error("no host info provider configured")]
    ProviderNotConfigured,
}

/// Named weighting policy controlling how host scores are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Balanced default
    #[default]
    Auto,
    /// Price-dominated
    Cheapest,
    /// Stake/uptime-dominated
    Reliable,
    /// Latency-dominated
    Fastest,
    /// Deterministic lookup of a caller-named host, no scoring
    Specific,
}

/// One worker's advertised state, merged from discovery sources
///
/// `address` is the identity key; comparisons are case-insensitive since
/// marketplace addresses are hex strings. `stake` carries 18 implied
/// decimals and serializes as a decimal string (wei-style).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    /// Globally unique host address
    pub address: String,

    /// Transport endpoint, if the host advertises one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Name of the discovery source that produced/last updated this record
    #[serde(default)]
    pub source: String,

    /// Model identifiers this host can serve
    #[serde(default)]
    pub supported_models: Vec<String>,

    /// Collateral amount, fixed-point integer with 18 implied decimals
    #[serde(with = "stake_string", default)]
    pub stake: u128,

    /// Minimum price per token in the native token (PRICE_PRECISION-scaled)
    #[serde(default)]
    pub min_price_per_token_native: u64,

    /// Minimum price per token in the stable token (PRICE_PRECISION-scaled)
    #[serde(default)]
    pub min_price_per_token_stable: u64,

    /// Whether the host is accepting work
    #[serde(default)]
    pub is_active: bool,

    /// Geographic region, used only by discovery filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Last measured latency in milliseconds, used only by discovery filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// When the source last refreshed this record; drives merge precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl HostRecord {
    /// Create a minimal active record for the given address and source
    pub fn new(address: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            api_url: None,
            source: source.into(),
            supported_models: Vec::new(),
            stake: 0,
            min_price_per_token_native: 0,
            min_price_per_token_stable: 0,
            is_active: true,
            region: None,
            latency_ms: None,
            updated_at: None,
        }
    }

    /// Canonical lowercase form of the address, used as the merge/dedup key
    pub fn address_key(&self) -> String {
        self.address.to_ascii_lowercase()
    }

    /// Check whether this host lists the given model
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }
}

/// Options for a single discovery round
///
/// Post-filters are AND-combined and each is applied only when present.
/// Filters are never baked into the cache, so callers with different
/// filters share one cached merge.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Bypass the cache and re-poll all enabled sources
    pub force_refresh: bool,
    /// Keep only hosts listing this model
    pub model: Option<String>,
    /// Keep only hosts at or below this native price (PRICE_PRECISION-scaled)
    pub max_price: Option<u64>,
    /// Keep only hosts in this region
    pub region: Option<String>,
    /// Keep only hosts with measured latency at or above this bound
    pub min_latency_ms: Option<u64>,
    /// Keep only hosts with measured latency at or below this bound
    pub max_latency_ms: Option<u64>,
    /// Per-call cache TTL override
    pub ttl_override: Option<Duration>,
}

impl DiscoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_price(mut self, max_price: u64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn with_ttl_override(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }
}

/// Normalized per-factor scores, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactors {
    pub stake_score: f64,
    pub price_score: f64,
    pub uptime_score: f64,
    pub latency_score: f64,
}

/// A host with its mode-weighted score and the factors that produced it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedHost {
    pub host: HostRecord,
    pub score: f64,
    pub factors: ScoreFactors,
}

/// Serde for the u128 stake: decimal string on the wire, with tolerance
/// for sources that send a plain JSON number.
mod stake_string {
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(stake: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&stake.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct StakeVisitor;

        impl de::Visitor<'_> for StakeVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a decimal string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }
        }

        deserializer.deserialize_any(StakeVisitor)
    }
}
