//! Surf Network Filtering
//!
//! Classifies and optionally blocks every outgoing request of the
//! embedded engine.
//!
//! Architecture:
//! 1. Filter lists are fetched over HTTP and compiled off the async runtime
//! 2. The compiled rule set is swapped in atomically, per profile
//! 3. Each intercepted request is matched against the adblock engine
//! 4. Decision applied, recorded in a bounded telemetry log, reported to
//!    the network inspector
//!
//! Any internal failure lets the request through.

mod client;
mod coordinator;
mod fetcher;
mod filter;
mod filter_list;
mod interceptor;
mod resource;
mod telemetry;

pub use client::{HttpClient, HttpClientConfig, HttpError, Response};
pub use coordinator::{FilterCoordinator, FilterState, ProfileKind, ADBLOCK_LISTS_KEY, BLOCK_ADS_KEY};
pub use fetcher::{FetchError, RuleListCache, RuleListFetcher};
pub use filter::{DecisionReason, FilterDecision, RequestFilter};
pub use filter_list::{default_tracking_domains, CompileError, MatchContext, Matcher, MatcherError, RuleSet};
pub use interceptor::{
    InspectorReporter, InterceptAction, InterceptStats, InterceptedRequest, LogReporter, NetworkReport,
    UNKNOWN_INITIATOR,
};
pub use resource::ResourceKind;
pub use telemetry::{RequestRecord, TelemetrySink, Verdict, DEFAULT_CAPACITY};
