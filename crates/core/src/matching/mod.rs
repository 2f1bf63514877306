//! Candidate generation
//!
//! SKU hits come from [`sku`]. Name and type candidates come from a
//! [`TermMatcher`], which runs a list of [`MatchStrategy`] implementations
//! over every product and then applies the strict coverage rule: each
//! subject term of the query must coincide with the product, be explained by
//! a strategy (synonyms), or be a recognized modifier. Any other term rejects
//! the product.

pub mod sku;
pub mod strategy;

use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogIndex;
use crate::config::MatchingConfig;
use crate::domain::product::Product;
use crate::text::{self, Vocabulary};

pub use strategy::{
    ExactNameStrategy, MatchStrategy, NameTokenStrategy, SynonymTableStrategy, TypeTokenStrategy,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Sku,
    Name,
    Type,
    Modifier,
}

impl MatchKind {
    /// Lower is stronger.
    pub fn rank(self) -> u8 {
        match self {
            Self::Sku => 0,
            Self::Name => 1,
            Self::Type => 2,
            Self::Modifier => 3,
        }
    }

    pub fn confidence(self) -> u8 {
        match self {
            Self::Sku => 100,
            Self::Name => 90,
            Self::Type => 70,
            Self::Modifier => 40,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub product: Product,
    pub matched_term: String,
    pub match_kind: MatchKind,
    pub confidence: u8,
    pub coinciding_terms: usize,
}

impl MatchCandidate {
    pub fn new(product: &Product, matched_term: impl Into<String>, match_kind: MatchKind) -> Self {
        Self {
            product: product.clone(),
            matched_term: matched_term.into(),
            match_kind,
            confidence: match_kind.confidence(),
            coinciding_terms: 0,
        }
    }

    fn sort_key(&self) -> (u8, Reverse<usize>, usize) {
        (self.match_kind.rank(), Reverse(self.coinciding_terms), self.product.position)
    }
}

/// Subject terms of a query with their stems, deduplicated by stem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryTerms {
    terms: Vec<String>,
    stems: Vec<String>,
}

impl QueryTerms {
    pub fn new(subject_terms: &[String]) -> Self {
        let mut query = Self::default();
        for term in subject_terms {
            let term_stem = text::stem(term);
            if !query.stems.contains(&term_stem) {
                query.terms.push(term.clone());
                query.stems.push(term_stem);
            }
        }
        query
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn stems(&self) -> &[String] {
        &self.stems
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term_for_stem(&self, term_stem: &str) -> Option<&str> {
        self.stems
            .iter()
            .position(|candidate| candidate == term_stem)
            .and_then(|position| self.terms.get(position))
            .map(String::as_str)
    }
}

/// A stemmed term qualifies a product without naming another one.
///
/// Category nouns present in the index are never modifiers, whatever their
/// ending.
pub fn is_modifier(vocabulary: &Vocabulary, term_stem: &str, index: &CatalogIndex) -> bool {
    !index.has_type_stem(term_stem) && vocabulary.is_modifier_stem(term_stem)
}

/// Keep only the strongest tier: best kind, then most coinciding terms.
/// Input must already be sorted.
pub fn top_tier(candidates: &[MatchCandidate]) -> Vec<MatchCandidate> {
    let Some(best) = candidates.first() else {
        return Vec::new();
    };
    candidates
        .iter()
        .take_while(|candidate| {
            candidate.match_kind == best.match_kind
                && candidate.coinciding_terms == best.coinciding_terms
        })
        .cloned()
        .collect()
}

pub struct TermMatcher {
    vocabulary: Vocabulary,
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl fmt::Debug for TermMatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TermMatcher")
            .field("strategies", &self.strategy_names())
            .finish_non_exhaustive()
    }
}

impl TermMatcher {
    pub fn new(vocabulary: Vocabulary, strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { vocabulary, strategies }
    }

    /// Exact name, then type token, then name token. No synonyms.
    pub fn with_defaults(vocabulary: Vocabulary) -> Self {
        Self::new(
            vocabulary,
            vec![
                Box::new(ExactNameStrategy),
                Box::new(TypeTokenStrategy),
                Box::new(NameTokenStrategy),
            ],
        )
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(
            Vocabulary::from_config(config),
            vec![
                Box::new(ExactNameStrategy),
                Box::new(TypeTokenStrategy),
                Box::new(SynonymTableStrategy::new(&config.synonyms)),
                Box::new(NameTokenStrategy),
            ],
        )
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Candidates for the given subject terms, sorted strongest first.
    pub fn match_terms(
        &self,
        subject_terms: &[String],
        index: &CatalogIndex,
    ) -> Vec<MatchCandidate> {
        let query = QueryTerms::new(subject_terms);
        if query.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<MatchCandidate> = index
            .products()
            .iter()
            .filter_map(|product| self.match_product(&query, product, index))
            .collect();
        candidates.sort_by_key(MatchCandidate::sort_key);
        candidates
    }

    fn match_product(
        &self,
        query: &QueryTerms,
        product: &Product,
        index: &CatalogIndex,
    ) -> Option<MatchCandidate> {
        let (strategy, matched_term) = self.strategies.iter().find_map(|strategy| {
            strategy.anchor_term(query, product).map(|term| (strategy, term))
        })?;

        let mut coinciding_terms = 0;
        for term_stem in query.stems() {
            if coincides(term_stem, product)
                || self.strategies.iter().any(|other| other.accounts_for(term_stem, product))
            {
                coinciding_terms += 1;
            } else if !is_modifier(&self.vocabulary, term_stem, index) {
                return None;
            }
        }

        let mut candidate = MatchCandidate::new(product, matched_term, strategy.kind());
        candidate.coinciding_terms = coinciding_terms;
        Some(candidate)
    }
}

/// Strict coincidence: stem equality with a name token or the type token.
pub fn coincides(term_stem: &str, product: &Product) -> bool {
    product.type_stem() == Some(term_stem)
        || product.name_stems().iter().any(|name_stem| name_stem == term_stem)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{top_tier, MatchKind, TermMatcher};
    use crate::catalog::CatalogIndex;
    use crate::config::MatchingConfig;
    use crate::domain::product::ProductRecord;
    use crate::text::Vocabulary;

    fn index() -> CatalogIndex {
        CatalogIndex::from_records(vec![
            ProductRecord::new("Mochila", "K78"),
            ProductRecord::new("Mochila Antirrobo", "K80"),
            ProductRecord::new("Llavero Camion", "B85"),
            ProductRecord::new("Llavero Metálico Destapador", "B90"),
            ProductRecord::new("Tazón Mug", "T12"),
            ProductRecord::new("Tazón Cerveza", "T13"),
            ProductRecord::new("Taza Cerámica Blanca", "T20"),
        ])
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    fn names(candidates: &[super::MatchCandidate]) -> Vec<&str> {
        candidates.iter().map(|candidate| candidate.product.name.as_str()).collect()
    }

    #[test]
    fn exact_name_outranks_type_match() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());
        let candidates = matcher.match_terms(&terms(&["mochila"]), &index());

        assert_eq!(names(&candidates), vec!["Mochila", "Mochila Antirrobo"]);
        assert_eq!(candidates[0].match_kind, MatchKind::Name);
        assert_eq!(candidates[1].match_kind, MatchKind::Type);
        assert_eq!(top_tier(&candidates).len(), 1);
    }

    #[test]
    fn plural_query_matches_singular_type() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());
        let candidates = matcher.match_terms(&terms(&["tazones"]), &index());

        assert_eq!(names(&candidates), vec!["Tazón Mug", "Tazón Cerveza"]);
        assert!(candidates.iter().all(|candidate| candidate.match_kind == MatchKind::Type));
        assert_eq!(candidates[0].matched_term, "tazones");
    }

    #[test]
    fn no_substring_matching_across_words() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());

        assert!(matcher.match_terms(&terms(&["taz"]), &index()).is_empty());
        assert!(matcher.match_terms(&terms(&["mochilacocina"]), &index()).is_empty());
    }

    #[test]
    fn extra_qualifying_noun_rejects_candidate() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());

        assert!(matcher.match_terms(&terms(&["mochilas", "cocina"]), &index()).is_empty());
    }

    #[test]
    fn modifier_is_accepted_and_name_hits_rank_higher() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());
        let candidates = matcher.match_terms(&terms(&["llavero", "metalico"]), &index());

        assert_eq!(names(&candidates), vec!["Llavero Metálico Destapador", "Llavero Camion"]);
        assert_eq!(candidates[0].coinciding_terms, 2);
        assert_eq!(candidates[1].coinciding_terms, 1);
        assert_eq!(names(&top_tier(&candidates)), vec!["Llavero Metálico Destapador"]);
    }

    #[test]
    fn known_type_is_never_a_modifier() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());

        assert!(matcher.match_terms(&terms(&["mochila", "taza"]), &index()).is_empty());
    }

    #[test]
    fn name_token_match_is_weakest_kind() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());
        let candidates = matcher.match_terms(&terms(&["cerveza"]), &index());

        assert_eq!(names(&candidates), vec!["Tazón Cerveza"]);
        assert_eq!(candidates[0].match_kind, MatchKind::Modifier);
        assert_eq!(candidates[0].confidence, 40);
    }

    #[test]
    fn synonym_table_maps_words_to_types() {
        let config = MatchingConfig {
            synonyms: BTreeMap::from([("mug".to_string(), "tazón".to_string())]),
            ..MatchingConfig::default()
        };
        let matcher = TermMatcher::from_config(&config);
        let candidates = matcher.match_terms(&terms(&["mugs"]), &index());

        assert_eq!(names(&candidates), vec!["Tazón Mug", "Tazón Cerveza"]);
        assert_eq!(candidates[0].match_kind, MatchKind::Type);
        assert_eq!(candidates[1].match_kind, MatchKind::Type);
        assert_eq!(candidates[0].coinciding_terms, 1);
    }

    #[test]
    fn empty_terms_produce_no_candidates() {
        let matcher = TermMatcher::with_defaults(Vocabulary::default());

        assert!(matcher.match_terms(&[], &index()).is_empty());
    }
}
