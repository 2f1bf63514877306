use std::collections::{BTreeMap, BTreeSet};

use crate::domain::product::Product;
use crate::matching::{MatchKind, QueryTerms};
use crate::text;

/// One way of tying a query to a product.
///
/// `anchor_term` decides whether the strategy claims the product and with
/// which query term. The first strategy in a [`super::TermMatcher`] that
/// claims a product fixes the candidate's kind. `accounts_for` lets a strategy
/// explain a term that is not literally part of the product name.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> MatchKind;

    fn anchor_term(&self, query: &QueryTerms, product: &Product) -> Option<String>;

    fn accounts_for(&self, _term_stem: &str, _product: &Product) -> bool {
        false
    }
}

/// The query names the whole product: same set of name stems.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactNameStrategy;

impl MatchStrategy for ExactNameStrategy {
    fn name(&self) -> &'static str {
        "exact_name"
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Name
    }

    fn anchor_term(&self, query: &QueryTerms, product: &Product) -> Option<String> {
        let name_stems: BTreeSet<&str> = product.name_stems().iter().map(String::as_str).collect();
        let query_stems: BTreeSet<&str> = query.stems().iter().map(String::as_str).collect();

        (!name_stems.is_empty() && name_stems == query_stems).then(|| query.terms().join(" "))
    }
}

/// The query mentions the product's inferred type.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeTokenStrategy;

impl MatchStrategy for TypeTokenStrategy {
    fn name(&self) -> &'static str {
        "type_token"
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Type
    }

    fn anchor_term(&self, query: &QueryTerms, product: &Product) -> Option<String> {
        product.type_stem().and_then(|type_stem| query.term_for_stem(type_stem)).map(str::to_string)
    }
}

/// Curated word → type table ("mug" → "tazón").
#[derive(Clone, Debug, Default)]
pub struct SynonymTableStrategy {
    table: BTreeMap<String, String>,
}

impl SynonymTableStrategy {
    pub fn new(synonyms: &BTreeMap<String, String>) -> Self {
        let table = synonyms
            .iter()
            .map(|(word, type_token)| (stem_of(word), stem_of(type_token)))
            .filter(|(word, type_token)| !word.is_empty() && !type_token.is_empty())
            .collect();
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl MatchStrategy for SynonymTableStrategy {
    fn name(&self) -> &'static str {
        "synonym_table"
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Type
    }

    fn anchor_term(&self, query: &QueryTerms, product: &Product) -> Option<String> {
        query
            .stems()
            .iter()
            .find(|term_stem| self.accounts_for(term_stem, product))
            .and_then(|term_stem| query.term_for_stem(term_stem))
            .map(str::to_string)
    }

    fn accounts_for(&self, term_stem: &str, product: &Product) -> bool {
        product.type_stem().is_some_and(|type_stem| {
            self.table.get(term_stem).is_some_and(|mapped| mapped == type_stem)
        })
    }
}

/// Any non-type word of the name appears in the query ("cerveza").
#[derive(Clone, Copy, Debug, Default)]
pub struct NameTokenStrategy;

impl MatchStrategy for NameTokenStrategy {
    fn name(&self) -> &'static str {
        "name_token"
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Modifier
    }

    fn anchor_term(&self, query: &QueryTerms, product: &Product) -> Option<String> {
        query
            .stems()
            .iter()
            .find(|term_stem| product.name_stems().contains(*term_stem))
            .and_then(|term_stem| query.term_for_stem(term_stem))
            .map(str::to_string)
    }
}

fn stem_of(word: &str) -> String {
    text::stem(&text::fold(word.trim()))
}
