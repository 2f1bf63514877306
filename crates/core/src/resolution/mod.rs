//! Resolution orchestrator
//!
//! `Resolver::resolve` is synchronous and pure: the same context, query and
//! index always yield the same outcome and next context. Timestamps are left
//! to the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogIndex;
use crate::config::MatchingConfig;
use crate::context::{
    Anchor, Carryover, CarryoverDecision, ContextManager, ContextState, ConversationContext,
    FollowUp,
};
use crate::domain::product::Product;
use crate::matching::sku::{sku_hits, SkuHit};
use crate::matching::{top_tier, MatchCandidate, MatchKind, TermMatcher};
use crate::text::{self, Vocabulary};

/// Query words that announce a product code.
const IDENTIFIER_CUES: &[&str] = &["sku", "codigo", "cod", "ref", "referencia"];

const DEFAULT_MAX_CANDIDATES: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolved {
    Product(Product),
    Category { type_token: String, products: Vec<Product> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundMatch {
    pub resolved: Resolved,
    pub matched_term: String,
    /// `None` when the answer was carried over from the previous turn.
    pub match_kind: Option<MatchKind>,
    pub carried_over: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Found(FoundMatch),
    Ambiguous(Vec<MatchCandidate>),
    NotFound,
}

impl ResolutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Ambiguous(_) => "ambiguous",
            Self::NotFound => "not_found",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn found_product(&self) -> Option<&Product> {
        match self {
            Self::Found(FoundMatch { resolved: Resolved::Product(product), .. }) => Some(product),
            _ => None,
        }
    }

    /// Every product the outcome points at, in presentation order.
    pub fn products(&self) -> Vec<&Product> {
        match self {
            Self::Found(found) => match &found.resolved {
                Resolved::Product(product) => vec![product],
                Resolved::Category { products, .. } => products.iter().collect(),
            },
            Self::Ambiguous(candidates) => {
                candidates.iter().map(|candidate| &candidate.product).collect()
            }
            Self::NotFound => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionTrace {
    pub tokens: Vec<String>,
    pub subject_terms: Vec<String>,
    pub sku_tokens: Vec<String>,
    pub carryover: CarryoverDecision,
    /// Name/type candidates before tiering and capping.
    pub considered: Vec<MatchCandidate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub context: ConversationContext,
    pub trace: ResolutionTrace,
}

#[derive(Debug)]
pub struct Resolver {
    vocabulary: Vocabulary,
    matcher: TermMatcher,
    context_manager: ContextManager,
    max_candidates: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl Resolver {
    pub fn new(matcher: TermMatcher, max_candidates: usize) -> Self {
        let vocabulary = matcher.vocabulary().clone();
        Self {
            context_manager: ContextManager::new(vocabulary.clone()),
            vocabulary,
            matcher,
            max_candidates: if max_candidates == 0 {
                DEFAULT_MAX_CANDIDATES
            } else {
                max_candidates
            },
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(TermMatcher::from_config(config), config.max_candidates)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn matcher(&self) -> &TermMatcher {
        &self.matcher
    }

    pub fn resolve(
        &self,
        raw_query: &str,
        context: &ConversationContext,
        index: &CatalogIndex,
    ) -> Resolution {
        let tokens = self.vocabulary.normalize(raw_query);
        let subject_terms = self.vocabulary.subject_terms(&tokens);
        let sku_tokens = text::sku_tokens(raw_query);
        let mut trace = ResolutionTrace {
            tokens,
            subject_terms,
            sku_tokens,
            ..ResolutionTrace::default()
        };

        let hits = sku_hits(&trace.sku_tokens, index);
        let (outcome, state) = match hits.as_slice() {
            [hit] => Self::resolve_single_sku(hit),
            [] => self.resolve_terms(context, index, &mut trace),
            many => (self.ambiguous_skus(many), ContextState::Empty),
        };

        let context = context.advance(state);
        debug!(
            event_name = "resolution.resolved",
            outcome = outcome.label(),
            carryover = ?trace.carryover,
            turn = context.turn,
            "query resolved"
        );

        Resolution { outcome, context, trace }
    }

    fn resolve_single_sku(hit: &SkuHit<'_>) -> (ResolutionOutcome, ContextState) {
        let state = ContextState::Anchored {
            anchor: Anchor::Product(hit.product.key()),
            term: vec![hit.token.clone()],
        };
        let outcome = ResolutionOutcome::Found(FoundMatch {
            resolved: Resolved::Product(hit.product.clone()),
            matched_term: hit.token.clone(),
            match_kind: Some(MatchKind::Sku),
            carried_over: false,
        });
        (outcome, state)
    }

    fn ambiguous_skus(&self, hits: &[SkuHit<'_>]) -> ResolutionOutcome {
        ResolutionOutcome::Ambiguous(
            hits.iter()
                .take(self.max_candidates)
                .map(|hit| {
                    let mut candidate =
                        MatchCandidate::new(hit.product, &hit.token, MatchKind::Sku);
                    candidate.coinciding_terms = 1;
                    candidate
                })
                .collect(),
        )
    }

    fn resolve_terms(
        &self,
        context: &ConversationContext,
        index: &CatalogIndex,
        trace: &mut ResolutionTrace,
    ) -> (ResolutionOutcome, ContextState) {
        let candidates = self.matcher.match_terms(&trace.subject_terms, index);
        trace.considered = candidates.clone();

        if candidates.is_empty() {
            return self.resolve_without_candidates(context, index, trace);
        }

        let mut tier = top_tier(&candidates);
        if let [best] = tier.as_slice() {
            let state = ContextState::Anchored {
                anchor: Anchor::Product(best.product.key()),
                term: trace.subject_terms.clone(),
            };
            let outcome = ResolutionOutcome::Found(FoundMatch {
                resolved: Resolved::Product(best.product.clone()),
                matched_term: best.matched_term.clone(),
                match_kind: Some(best.match_kind),
                carried_over: false,
            });
            return (outcome, state);
        }

        tier.truncate(self.max_candidates);
        let state = match shared_type(&tier) {
            Some(type_token) => ContextState::Anchored {
                anchor: Anchor::Category { type_token },
                term: trace.subject_terms.clone(),
            },
            None => ContextState::Empty,
        };
        (ResolutionOutcome::Ambiguous(tier), state)
    }

    fn resolve_without_candidates(
        &self,
        context: &ConversationContext,
        index: &CatalogIndex,
        trace: &mut ResolutionTrace,
    ) -> (ResolutionOutcome, ContextState) {
        let unmatched_identifier =
            trace.sku_tokens.iter().any(|token| text::looks_like_identifier(token))
                || trace.tokens.iter().any(|token| IDENTIFIER_CUES.contains(&token.as_str()));
        let follow_up = FollowUp { subject_terms: &trace.subject_terms, unmatched_identifier };

        let carryover = self.context_manager.carryover(context, follow_up, index);
        trace.carryover = carryover.decision();

        match carryover {
            Carryover::NotAttempted => (ResolutionOutcome::NotFound, ContextState::Empty),
            Carryover::Carried(resolved) => {
                let outcome = ResolutionOutcome::Found(FoundMatch {
                    resolved,
                    matched_term: context.last_matched_term().join(" "),
                    match_kind: None,
                    carried_over: true,
                });
                (outcome, context.state.clone())
            }
            Carryover::RejectedStale | Carryover::AnchorVanished => {
                (ResolutionOutcome::NotFound, ContextState::Empty)
            }
        }
    }
}

/// Display form of the type every candidate shares, if they share one.
fn shared_type(candidates: &[MatchCandidate]) -> Option<String> {
    let first = candidates.first()?;
    let type_stem = first.product.type_stem()?;
    candidates
        .iter()
        .all(|candidate| candidate.product.type_stem() == Some(type_stem))
        .then(|| first.product.inferred_type.clone())
        .flatten()
}
