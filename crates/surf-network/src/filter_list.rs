//! Rule Set (EasyList / Adblock Plus network rules)
//!
//! Compiles filter-list lines into Brave's adblock engine and answers
//! per-request block queries against it. Anchors, wildcards, exception
//! rules and `$` options are all handled by the engine.
//!
//! Comments (!), headers ([Adblock Plus...]) and cosmetic rules (##,
//! #@#, #?#) are not network rules: they are counted as skipped and never
//! reach the engine.

use crate::resource::ResourceKind;
use adblock::Engine;
use adblock::lists::{FilterSet, ParseOptions};
use adblock::request::Request;
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;
use tracing::{debug, info, trace};
use url::Url;

/// Errors while compiling a rule list
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No usable rules in filter list '{0}'")]
    Empty(String),
}

/// Fault while matching a single request
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    #[error("Unparseable URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Engine rejected request for '{url}': {reason}")]
    Request { url: String, reason: String },
}

/// Per-request context handed to the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub kind: ResourceKind,
    /// URL of the top-level document that issued the request
    pub first_party_url: Option<String>,
}

impl MatchContext {
    /// Context with no first-party information
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            first_party_url: None,
        }
    }

    /// Attach the issuing document. Third-party options are resolved
    /// against it by the engine.
    pub fn with_first_party(mut self, first_party_url: Option<&str>) -> Self {
        self.first_party_url = first_party_url.map(str::to_string);
        self
    }
}

/// Compiled, queryable form of a rule list
pub trait Matcher: Send + Sync {
    fn should_block(&self, url: &str, ctx: &MatchContext) -> Result<bool, MatcherError>;
}

/// A compiled rule list
pub struct RuleSet {
    /// Name of the list (source URL or file)
    pub name: String,
    engine: Engine,
    rules: usize,
    lines: usize,
    skipped: usize,
}

impl RuleSet {
    /// Compile rule lines. Fails only if no line is a network rule.
    pub fn compile<I, S>(name: &str, lines: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept = Vec::new();
        let mut line_count = 0;
        let mut skipped = 0;

        for line in lines {
            let line = line.as_ref().trim();
            line_count += 1;
            if line.is_empty() {
                continue;
            }
            if is_network_rule(line) {
                kept.push(line.to_string());
            } else {
                trace!("Skipping non-network line: {}", line);
                skipped += 1;
            }
        }

        if kept.is_empty() {
            return Err(CompileError::Empty(name.to_string()));
        }

        let rules: Vec<&str> = kept.iter().map(String::as_str).collect();
        let mut filter_set = FilterSet::new(false);
        filter_set.add_filters(&rules, ParseOptions::default());
        let engine = Engine::from_filter_set(filter_set, true);

        info!(
            "Compiled filter list '{}': {} lines, {} rules, {} skipped",
            name,
            line_count,
            rules.len(),
            skipped
        );

        Ok(Self {
            name: name.to_string(),
            engine,
            rules: rules.len(),
            lines: line_count,
            skipped,
        })
    }

    /// Compile from a reader (local list file or cache)
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, CompileError> {
        let lines = BufReader::new(reader).lines().collect::<Result<Vec<_>, _>>()?;
        Self::compile(name, lines)
    }

    /// Number of network rules handed to the engine
    pub fn rule_count(&self) -> usize {
        self.rules
    }

    /// Lines read from the source
    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Non-empty lines that are not network rules
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl Matcher for RuleSet {
    fn should_block(&self, url: &str, ctx: &MatchContext) -> Result<bool, MatcherError> {
        let parsed = Url::parse(url).map_err(|e| MatcherError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        // data:, blob:, about: carry nothing a network rule can match
        if parsed.host_str().is_none() {
            return Ok(false);
        }

        let request_type = ctx.kind.filter_option();
        let source_url = ctx.first_party_url.as_deref().unwrap_or("");
        let request = Request::new(parsed.as_str(), source_url, request_type)
            .or_else(|_| Request::new(parsed.as_str(), "", request_type))
            .map_err(|e| MatcherError::Request {
                url: url.to_string(),
                reason: format!("{:?}", e),
            })?;

        let result = self.engine.check_network_request(&request);
        if result.matched {
            debug!("URL blocked by '{}': {}", self.name, url);
        }
        Ok(result.matched)
    }
}

/// Anything but comments, headers and cosmetic rules
fn is_network_rule(line: &str) -> bool {
    !(line.starts_with('!')
        || line.starts_with('[')
        || ["##", "#@#", "#?#", "#$#"].iter().any(|m| line.contains(m)))
}

/// Built-in tracker domains used when no list can be fetched
pub fn default_tracking_domains() -> Vec<&'static str> {
    vec![
        // Google Ads/Analytics
        "doubleclick.net",
        "googlesyndication.com",
        "googleadservices.com",
        "google-analytics.com",
        "googletagmanager.com",
        "googletagservices.com",
        // Facebook
        "connect.facebook.net",
        "pixel.facebook.com",
        // Twitter/X
        "ads-twitter.com",
        "analytics.twitter.com",
        // Amazon
        "amazon-adsystem.com",
        // Generic trackers
        "adnxs.com",
        "adsrvr.org",
        "criteo.com",
        "criteo.net",
        "outbrain.com",
        "taboola.com",
        "quantserve.com",
        "scorecardresearch.com",
        "hotjar.com",
        "mixpanel.com",
    ]
}
