//! Filter Coordinator
//!
//! One per browsing profile. Owns the active rule set, drives fetches,
//! and routes every intercepted request through filter → telemetry →
//! inspector.
//!
//! Lifecycle:
//! ```text
//! Uninitialized → Fetching → Active | Disabled(reason)
//!                 Active → (refresh) → Active (new set, or prior set on failure)
//! ```
//!
//! Interception never waits on a fetch. Installation is a pointer swap.

use crate::fetcher::{FetchError, RuleListFetcher};
use crate::filter::{FilterDecision, RequestFilter};
use crate::filter_list::{Matcher, RuleSet};
use crate::interceptor::{InspectorReporter, InterceptAction, InterceptStats, InterceptedRequest, LogReporter, NetworkReport};
use crate::resource::ResourceKind;
use crate::telemetry::{RequestRecord, TelemetrySink, Verdict};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use surf_config::ConfigStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Settings key toggling filtering
pub const BLOCK_ADS_KEY: &str = "block_ads";
/// Settings key listing filter-list URLs
pub const ADBLOCK_LISTS_KEY: &str = "adblock_lists";

/// Maximum cached decisions per installed rule set
const DECISION_CACHE_LIMIT: usize = 4000;

/// Browsing profile a coordinator serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Standard,
    Private,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterState {
    Uninitialized,
    Fetching,
    Active,
    Disabled(String),
}

type CacheKey = (String, ResourceKind, Option<String>);

/// FIFO-bounded map of recent decisions
struct DecisionCache {
    entries: HashMap<CacheKey, bool>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl DecisionCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<bool> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: CacheKey, blocked: bool) {
        if self.entries.insert(key.clone(), blocked).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// An installed rule set and the decisions made against it. Swapped as
/// one unit, so a decision can only ever be cached next to its own set.
struct ActiveRules {
    set: Arc<RuleSet>,
    decisions: Mutex<DecisionCache>,
}

impl ActiveRules {
    fn new(set: Arc<RuleSet>) -> Self {
        Self {
            set,
            decisions: Mutex::new(DecisionCache::new(DECISION_CACHE_LIMIT)),
        }
    }

    fn decide(&self, request: &InterceptedRequest) -> FilterDecision {
        let key = (
            request.url.clone(),
            request.kind(),
            request.first_party_url.clone(),
        );
        if let Some(blocked) = self
            .decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return if blocked { FilterDecision::BLOCK } else { FilterDecision::ALLOW };
        }

        let decision = RequestFilter::decide(request, Some(self.set.as_ref() as &dyn Matcher), true);
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, decision.blocked);
        decision
    }

    fn cached(&self) -> usize {
        self.decisions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct FilterCoordinator {
    profile: ProfileKind,
    config: Arc<ConfigStore>,
    fetcher: Arc<RuleListFetcher>,
    telemetry: Arc<TelemetrySink>,
    reporter: Arc<dyn InspectorReporter>,
    active: RwLock<Option<Arc<ActiveRules>>>,
    state: Mutex<FilterState>,
    generation: AtomicU64,
    stats: InterceptStats,
}

impl FilterCoordinator {
    pub fn new(
        profile: ProfileKind,
        config: Arc<ConfigStore>,
        fetcher: Arc<RuleListFetcher>,
        telemetry: Arc<TelemetrySink>,
    ) -> Self {
        Self {
            profile,
            config,
            fetcher,
            telemetry,
            reporter: Arc::new(LogReporter),
            active: RwLock::new(None),
            state: Mutex::new(FilterState::Uninitialized),
            generation: AtomicU64::new(0),
            stats: InterceptStats::default(),
        }
    }

    /// Replace the inspector reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn InspectorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn profile(&self) -> ProfileKind {
        self.profile
    }

    pub fn state(&self) -> FilterState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Currently installed rule set
    pub fn rule_set(&self) -> Option<Arc<RuleSet>> {
        self.active().map(|active| Arc::clone(&active.set))
    }

    fn active(&self) -> Option<Arc<ActiveRules>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn telemetry(&self) -> &Arc<TelemetrySink> {
        &self.telemetry
    }

    pub fn stats(&self) -> &InterceptStats {
        &self.stats
    }

    /// Register a new fetch and return its generation.
    pub fn begin_fetch(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if *state != FilterState::Active {
            *state = FilterState::Fetching;
        }
        generation
    }

    /// Apply a fetch result. Returns true if a new rule set was installed.
    /// Results from superseded generations are dropped.
    pub fn complete_fetch(&self, generation: u64, result: Result<RuleSet, FetchError>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!("[{}] Dropping superseded fetch (generation {})", self.profile, generation);
            return false;
        }

        match result {
            Ok(set) => {
                self.swap(Arc::new(set));
                *state = FilterState::Active;
                true
            }
            Err(e) if self.rule_set().is_some() => {
                warn!("[{}] Filter list refresh failed, keeping previous rules: {}", self.profile, e);
                *state = FilterState::Active;
                false
            }
            Err(e) => {
                warn!("[{}] Ad blocking disabled: {}", self.profile, e);
                *state = FilterState::Disabled(e.to_string());
                false
            }
        }
    }

    /// Install a rule set directly, superseding any fetch in flight
    pub fn install(&self, set: RuleSet) {
        self.install_shared(Arc::new(set));
    }

    /// Install a rule set shared with other profiles
    pub fn install_shared(&self, set: Arc<RuleSet>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.swap(set);
        *state = FilterState::Active;
    }

    fn swap(&self, set: Arc<RuleSet>) {
        info!("[{}] Installed filter list '{}' ({} rules)", self.profile, set.name, set.rule_count());
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(ActiveRules::new(set)));
    }

    /// Fetch the configured lists and install the result
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let urls: Vec<String> = self
            .config
            .get_str_set(ADBLOCK_LISTS_KEY)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let generation = self.begin_fetch();
        info!("[{}] Fetching {} filter list(s)", self.profile, urls.len());

        let result = self.fetcher.fetch_many(&urls).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());
        self.complete_fetch(generation, result);
        outcome
    }

    /// Spawn the initial fetch on the runtime
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = coordinator.refresh().await {
                warn!("[{}] Initial filter list fetch failed: {}", coordinator.profile, e);
            }
        })
    }

    /// Decide on an intercepted request without side effects on telemetry
    pub fn decide(&self, request: &InterceptedRequest) -> FilterDecision {
        let enabled = self.config.get_bool(BLOCK_ADS_KEY).unwrap_or(true);
        match self.active().filter(|_| enabled) {
            Some(active) => active.decide(request),
            None => RequestFilter::decide(request, None, enabled),
        }
    }

    /// Handle one request from the engine's interceptor hook
    pub fn intercept(&self, request: &InterceptedRequest) -> InterceptAction {
        let start = Instant::now();
        let decision = self.decide(request);
        let elapsed = start.elapsed();

        self.stats.record(decision.blocked, elapsed);

        let kind = request.kind();
        let initiator = request.initiator();
        let (action, verdict) = if decision.blocked {
            debug!("[{}] Blocked {} ({}, initiator: {})", self.profile, request.url, kind, initiator);
            (InterceptAction::Block, Verdict::Blocked)
        } else {
            (InterceptAction::Allow, Verdict::Allowed)
        };

        self.reporter.report(&NetworkReport {
            url: request.url.clone(),
            status: format!("{:?}", verdict),
            resource_kind: kind,
            initiator: initiator.clone(),
            size: None,
            time: elapsed,
        });
        self.telemetry
            .record(RequestRecord::new(request.url.clone(), kind, verdict, initiator));

        action
    }

    /// Number of decisions cached against the installed rule set
    pub fn cached_decisions(&self) -> usize {
        self.active().map_or(0, |active| active.cached())
    }
}
