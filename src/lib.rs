//! Prospector - host discovery and selection for decentralized AI compute
//!
//! A client of the compute marketplace needs a usable worker ("host") for
//! a given model, out of a fleet whose membership is learned from several
//! independently unreliable sources. Prospector polls those sources
//! concurrently, merges what comes back into one deduplicated view, keeps
//! a reputation and blacklist ledger per host, and picks a single host
//! under a caller-chosen policy.
//!
//! ```text
//! DiscoverySource ×N ──┐
//!  (local peers,       │ concurrent fan-out     ┌──────────────────┐
//!   global peers,      ├────────────────────────► DiscoveryEngine  │
//!   HTTP registry)     │  settle-all, no cross- │  merge / dedupe  │
//!                  ────┘  cancellation          │  TTL cache       │
//!                                               │  per-source stats│
//!        ReputationLedger ◄─────────────────────┤  blacklist filter│
//!         (scores, blacklist,                   └────────┬─────────┘
//!          connection metrics)                           │ HostInfoProvider
//!                                               ┌────────▼─────────┐
//!                                               │ SelectionEngine  │
//!                                               │  mode weights    │
//!                                               │  weighted-random │
//!                                               └──────────────────┘
//! ```
//!
//! ## Selection modes
//!
//! - **Auto**: balanced default
//! - **Cheapest** / **Reliable** / **Fastest**: one factor dominates
//! - **Specific**: deterministic lookup of a caller-named host
//!
//! Prospector is a library surface: payment/session orchestration and UI
//! layers own their own CLIs and configuration loading.

pub mod clock;
pub mod config;
pub mod discovery;
pub mod provider;
pub mod reputation;
pub mod selection;
pub mod sources;
pub mod types;

pub use config::DiscoveryConfig;
pub use discovery::{DiscoveryEngine, DiscoveryStats, SourceStats};
pub use provider::HostInfoProvider;
pub use reputation::{
    ConnectionMetrics, ConnectionQuality, ConnectionSample, PeerReputation, ReputationLedger,
    ReputationUpdate,
};
pub use selection::{LedgerTelemetry, ScoreTelemetry, SelectionEngine, DEFAULT_RANK_LIMIT};
pub use sources::{DiscoverySource, HttpRegistrySource, PeerStore, PeerStoreSource, SourceError};
pub use types::{
    DiscoveryOptions, HostRecord, ProspectorError, RankedHost, Result, ScoreFactors,
    SelectionMode, UnavailableReason, PRICE_PRECISION,
};
