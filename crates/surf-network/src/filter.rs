//! Request Filter
//!
//! Per-request decision over the active rule set. Never fails: a
//! disabled filter, a missing rule set and a matcher fault all let the
//! request through.

use crate::filter_list::{MatchContext, Matcher};
use crate::interceptor::InterceptedRequest;
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    /// Nothing blocked the request: no rule matched, filtering is off,
    /// no rule set is installed, or the matcher failed
    None,
    /// A block rule matched
    RuleMatch,
    /// Never produced by `RequestFilter::decide`
    Disabled,
}

/// Outcome for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub blocked: bool,
    pub reason: DecisionReason,
}

impl FilterDecision {
    pub const ALLOW: Self = Self {
        blocked: false,
        reason: DecisionReason::None,
    };

    pub const BLOCK: Self = Self {
        blocked: true,
        reason: DecisionReason::RuleMatch,
    };
}

/// Stateless decision function
pub struct RequestFilter;

impl RequestFilter {
    /// Decide whether `request` is blocked
    pub fn decide(
        request: &InterceptedRequest,
        matcher: Option<&dyn Matcher>,
        enabled: bool,
    ) -> FilterDecision {
        let Some(matcher) = matcher.filter(|_| enabled) else {
            return FilterDecision::ALLOW;
        };

        let kind = ResourceKind::from_code(request.resource_kind_code);
        let ctx = MatchContext::new(kind).with_first_party(request.first_party_url.as_deref());

        match matcher.should_block(&request.url, &ctx) {
            Ok(true) => {
                trace!("Blocked {} ({})", request.url, kind);
                FilterDecision::BLOCK
            }
            Ok(false) => FilterDecision::ALLOW,
            Err(e) => {
                warn!("Matcher fault, allowing request: {}", e);
                FilterDecision::ALLOW
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_list::{MatcherError, RuleSet};

    struct FailingMatcher;

    impl Matcher for FailingMatcher {
        fn should_block(&self, url: &str, _ctx: &MatchContext) -> Result<bool, MatcherError> {
            Err(MatcherError::InvalidUrl {
                url: url.to_string(),
                reason: "broken".into(),
            })
        }
    }

    fn request(url: &str, code: i32) -> InterceptedRequest {
        InterceptedRequest::new(url, code)
    }

    fn rules() -> RuleSet {
        RuleSet::compile("test", ["||ads.example.com^"]).unwrap()
    }

    #[test]
    fn test_blocks_matching_request() {
        let set = rules();
        let decision = RequestFilter::decide(
            &request("https://ads.example.com/x.js", 3),
            Some(&set),
            true,
        );
        assert_eq!(decision, FilterDecision::BLOCK);
    }

    #[test]
    fn test_allows_non_matching_request() {
        let set = rules();
        let decision = RequestFilter::decide(
            &request("https://example.com/index.html", 0),
            Some(&set),
            true,
        );
        assert_eq!(decision, FilterDecision::ALLOW);
    }

    #[test]
    fn test_disabled_or_missing_rules() {
        let set = rules();
        let req = request("https://ads.example.com/x.js", 3);
        let expected = FilterDecision {
            blocked: false,
            reason: DecisionReason::None,
        };
        assert_eq!(RequestFilter::decide(&req, Some(&set), false), expected);
        assert_eq!(RequestFilter::decide(&req, None, true), expected);
        assert_eq!(RequestFilter::decide(&req, None, false), expected);
    }

    #[test]
    fn test_matcher_fault_fails_open() {
        let decision = RequestFilter::decide(
            &request("https://ads.example.com/x.js", 3),
            Some(&FailingMatcher),
            true,
        );
        assert!(!decision.blocked);
        assert_eq!(decision.reason, DecisionReason::None);
    }

    #[test]
    fn test_first_party_context_reaches_matcher() {
        let set = RuleSet::compile("test", ["||cdn.net^$third-party"]).unwrap();
        let third = request("https://cdn.net/lib.js", 3).with_first_party("https://news.com/");
        let first = request("https://cdn.net/lib.js", 3).with_first_party("https://cdn.net/");
        assert!(RequestFilter::decide(&third, Some(&set), true).blocked);
        assert!(!RequestFilter::decide(&first, Some(&set), true).blocked);
    }
}
