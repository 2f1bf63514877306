//! Per-session conversation state
//!
//! The context is a plain value owned by whoever stores sessions. The
//! resolver takes it by reference and returns the next one; nothing here is
//! shared between sessions.
//!
//! [`ContextManager::carryover`] is the only place that turns a previous
//! anchor into an answer when the current query produced no candidates.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogIndex;
use crate::domain::product::ProductKey;
use crate::matching;
use crate::resolution::Resolved;
use crate::text::{self, Vocabulary};

/// What a conversation is currently about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    Product(ProductKey),
    Category { type_token: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContextState {
    #[default]
    Empty,
    Anchored {
        anchor: Anchor,
        /// Normalized query terms that produced the anchor.
        term: Vec<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub state: ContextState,
    pub turn: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        match &self.state {
            ContextState::Anchored { anchor, .. } => Some(anchor),
            ContextState::Empty => None,
        }
    }

    pub fn last_matched_term(&self) -> &[String] {
        match &self.state {
            ContextState::Anchored { term, .. } => term,
            ContextState::Empty => &[],
        }
    }

    pub fn is_anchored(&self) -> bool {
        matches!(self.state, ContextState::Anchored { .. })
    }

    /// Next turn's context with the given state. `updated_at` is left for the
    /// caller to stamp.
    pub fn advance(&self, state: ContextState) -> Self {
        Self { state, turn: self.turn.saturating_add(1), updated_at: self.updated_at }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryoverDecision {
    /// Candidates were found, or there was no anchor to consider.
    #[default]
    None,
    Carried,
    RejectedStale,
    AnchorVanished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Carryover {
    NotAttempted,
    Carried(Resolved),
    RejectedStale,
    AnchorVanished,
}

impl Carryover {
    pub fn decision(&self) -> CarryoverDecision {
        match self {
            Self::NotAttempted => CarryoverDecision::None,
            Self::Carried(_) => CarryoverDecision::Carried,
            Self::RejectedStale => CarryoverDecision::RejectedStale,
            Self::AnchorVanished => CarryoverDecision::AnchorVanished,
        }
    }
}

/// What the current query contributes to a carryover decision.
#[derive(Clone, Copy, Debug)]
pub struct FollowUp<'a> {
    pub subject_terms: &'a [String],
    /// An identifier-shaped token ("b99", "sku ...") that matched no SKU.
    pub unmatched_identifier: bool,
}

impl FollowUp<'_> {
    pub fn is_pure(&self) -> bool {
        self.subject_terms.is_empty() && !self.unmatched_identifier
    }
}

#[derive(Clone, Debug, Default)]
pub struct ContextManager {
    vocabulary: Vocabulary,
}

impl ContextManager {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Decide whether a query without candidates may reuse the anchor.
    ///
    /// The anchor is looked up again in `index`; a product that left the
    /// catalog cannot be answered from.
    pub fn carryover(
        &self,
        context: &ConversationContext,
        follow_up: FollowUp<'_>,
        index: &CatalogIndex,
    ) -> Carryover {
        let ContextState::Anchored { anchor, term } = &context.state else {
            return Carryover::NotAttempted;
        };

        let Some(resolved) = Self::reresolve(anchor, index) else {
            debug!(
                event_name = "context.carryover.anchor_vanished",
                anchor = ?anchor,
                "anchored product is no longer in the catalog"
            );
            return Carryover::AnchorVanished;
        };

        if follow_up.is_pure() {
            return Carryover::Carried(resolved);
        }
        if follow_up.unmatched_identifier {
            return Carryover::RejectedStale;
        }

        let anchor_stems = Self::anchor_stems(term, &resolved);
        let query_stems: Vec<String> =
            follow_up.subject_terms.iter().map(|term| text::stem(term)).collect();

        let overlaps = query_stems.iter().any(|stem| anchor_stems.contains(stem));
        let covered = query_stems.iter().all(|stem| {
            anchor_stems.contains(stem) || matching::is_modifier(&self.vocabulary, stem, index)
        });

        if overlaps && covered {
            Carryover::Carried(resolved)
        } else {
            debug!(
                event_name = "context.carryover.rejected_stale",
                terms = ?follow_up.subject_terms,
                anchor_term = ?term,
                "query does not continue the anchored reference"
            );
            Carryover::RejectedStale
        }
    }

    fn reresolve(anchor: &Anchor, index: &CatalogIndex) -> Option<Resolved> {
        match anchor {
            Anchor::Product(key) => index.find_by_key(key).cloned().map(Resolved::Product),
            Anchor::Category { type_token } => {
                let products: Vec<_> =
                    index.lookup_by_type(type_token).into_iter().cloned().collect();
                (!products.is_empty())
                    .then(|| Resolved::Category { type_token: type_token.clone(), products })
            }
        }
    }

    fn anchor_stems(term: &[String], resolved: &Resolved) -> BTreeSet<String> {
        let mut stems: BTreeSet<String> = term.iter().map(|word| text::stem(word)).collect();
        match resolved {
            Resolved::Product(product) => {
                stems.extend(product.name_stems().iter().cloned());
                stems.extend(product.type_stem().map(str::to_string));
            }
            Resolved::Category { type_token, .. } => {
                stems.insert(text::stem(&text::fold(type_token)));
            }
        }
        stems
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Anchor, Carryover, CarryoverDecision, ContextManager, ContextState, ConversationContext,
        FollowUp,
    };
    use crate::catalog::CatalogIndex;
    use crate::domain::product::ProductRecord;
    use crate::resolution::Resolved;

    fn index() -> CatalogIndex {
        CatalogIndex::from_records(vec![
            ProductRecord::new("Mochila", "K78"),
            ProductRecord::new("Llavero Camion", "B85"),
            ProductRecord::new("Llavero Metálico Destapador", "B90"),
        ])
    }

    fn anchored_to_mochila(index: &CatalogIndex) -> ConversationContext {
        ConversationContext {
            state: ContextState::Anchored {
                anchor: Anchor::Product(index.products()[0].key()),
                term: vec!["mochila".to_string()],
            },
            ..ConversationContext::default()
        }
    }

    fn follow_up(terms: &[String]) -> FollowUp<'_> {
        FollowUp { subject_terms: terms, unmatched_identifier: false }
    }

    #[test]
    fn empty_context_never_carries() {
        let manager = ContextManager::default();
        let carryover = manager.carryover(&ConversationContext::new(), follow_up(&[]), &index());

        assert_eq!(carryover, Carryover::NotAttempted);
        assert_eq!(carryover.decision(), CarryoverDecision::None);
    }

    #[test]
    fn pure_follow_up_carries_the_anchor() {
        let index = index();
        let manager = ContextManager::default();
        let carryover = manager.carryover(&anchored_to_mochila(&index), follow_up(&[]), &index);

        assert!(matches!(
            carryover,
            Carryover::Carried(Resolved::Product(ref product)) if product.sku == "K78"
        ));
    }

    #[test]
    fn disjoint_terms_reject_the_anchor() {
        let index = index();
        let manager = ContextManager::default();
        let terms = vec!["tazones".to_string()];

        assert_eq!(
            manager.carryover(&anchored_to_mochila(&index), follow_up(&terms), &index),
            Carryover::RejectedStale
        );
    }

    #[test]
    fn overlapping_term_with_unknown_noun_is_rejected() {
        let index = index();
        let manager = ContextManager::default();
        let terms = vec!["mochilas".to_string(), "cocina".to_string()];

        assert_eq!(
            manager.carryover(&anchored_to_mochila(&index), follow_up(&terms), &index),
            Carryover::RejectedStale
        );
    }

    #[test]
    fn overlapping_term_with_modifier_carries() {
        let index = index();
        let manager = ContextManager::default();
        let terms = vec!["mochila".to_string(), "roja".to_string()];

        assert_eq!(
            manager
                .carryover(&anchored_to_mochila(&index), follow_up(&terms), &index)
                .decision(),
            CarryoverDecision::Carried
        );
    }

    #[test]
    fn unmatched_identifier_is_not_a_follow_up() {
        let index = index();
        let manager = ContextManager::default();
        let follow_up = FollowUp { subject_terms: &[], unmatched_identifier: true };

        assert_eq!(
            manager.carryover(&anchored_to_mochila(&index), follow_up, &index),
            Carryover::RejectedStale
        );
    }

    #[test]
    fn vanished_anchor_is_reported() {
        let index = index();
        let context = anchored_to_mochila(&index);
        let refreshed =
            CatalogIndex::from_records(vec![ProductRecord::new("Llavero Camion", "B85")]);

        assert_eq!(
            ContextManager::default().carryover(&context, follow_up(&[]), &refreshed),
            Carryover::AnchorVanished
        );
    }

    #[test]
    fn category_anchor_carries_products_of_that_type() {
        let index = index();
        let context = ConversationContext {
            state: ContextState::Anchored {
                anchor: Anchor::Category { type_token: "llavero".to_string() },
                term: vec!["llaveros".to_string()],
            },
            ..ConversationContext::default()
        };

        let Carryover::Carried(Resolved::Category { type_token, products }) =
            ContextManager::default().carryover(&context, follow_up(&[]), &index)
        else {
            panic!("category anchor should carry");
        };
        assert_eq!(type_token, "llavero");
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn context_round_trips_through_json() {
        let index = index();
        let context = anchored_to_mochila(&index).advance(ContextState::Empty);
        let encoded = serde_json::to_string(&anchored_to_mochila(&index)).expect("serialize");
        let decoded: ConversationContext = serde_json::from_str(&encoded).expect("deserialize");

        assert_eq!(decoded, anchored_to_mochila(&index));
        assert_eq!(context.turn, 1);
        assert!(!context.is_anchored());
    }
}
