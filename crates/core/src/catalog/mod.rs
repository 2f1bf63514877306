//! Read-only catalog index
//!
//! Built wholesale from a provider's product list and never mutated
//! afterwards. Refreshing the catalog means building a new index and swapping
//! the pointer that readers clone.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::MatchingConfig;
use crate::domain::product::{Product, ProductKey, ProductRecord};
use crate::text::{self, Vocabulary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLimits {
    pub max_type_results: usize,
    pub max_known_types: usize,
}

impl Default for IndexLimits {
    fn default() -> Self {
        Self { max_type_results: 10, max_known_types: 30 }
    }
}

impl From<&MatchingConfig> for IndexLimits {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            max_type_results: config.max_type_results,
            max_known_types: config.max_known_types,
        }
    }
}

/// Counters collected while building; surfaced by the CLI `catalog` command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDiagnostics {
    pub rejected_unnamed: usize,
    pub skipped_empty_skus: usize,
    pub duplicate_skus: Vec<String>,
    pub untyped_products: usize,
}

#[derive(Clone, Debug)]
pub struct CatalogIndex {
    products: Vec<Product>,
    by_sku: HashMap<String, usize>,
    by_type: BTreeMap<String, Vec<usize>>,
    known_types: Vec<String>,
    limits: IndexLimits,
    fingerprint: String,
    built_at: DateTime<Utc>,
    diagnostics: IndexDiagnostics,
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl CatalogIndex {
    pub fn empty() -> Self {
        Self::build(Vec::new(), IndexLimits::default(), &Vocabulary::default())
    }

    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        Self::build(records, IndexLimits::default(), &Vocabulary::default())
    }

    pub fn build(
        records: Vec<ProductRecord>,
        limits: IndexLimits,
        vocabulary: &Vocabulary,
    ) -> Self {
        let fingerprint = fingerprint(&records);
        let mut diagnostics = IndexDiagnostics::default();
        let mut products = Vec::with_capacity(records.len());
        let mut by_sku = HashMap::new();
        let mut by_type: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut type_display: BTreeMap<String, String> = BTreeMap::new();
        let mut type_first_seen: Vec<String> = Vec::new();

        for record in records {
            let name = record.name.trim().to_string();
            if name.is_empty() {
                diagnostics.rejected_unnamed += 1;
                continue;
            }

            let position = products.len();
            let name_tokens = vocabulary.normalize(&name);
            let inferred_type = name_tokens.first().cloned();
            let type_stem = inferred_type.as_deref().map(text::stem);
            let sku = record.sku.map(|sku| sku.trim().to_string()).unwrap_or_default();

            let sku_key = text::normalize_sku(&sku);
            if sku_key.is_empty() {
                diagnostics.skipped_empty_skus += 1;
            } else if by_sku.contains_key(&sku_key) {
                if !diagnostics.duplicate_skus.contains(&sku_key) {
                    diagnostics.duplicate_skus.push(sku_key);
                }
            } else {
                by_sku.insert(sku_key, position);
            }

            match (&type_stem, &inferred_type) {
                (Some(stem), Some(display)) => {
                    if !by_type.contains_key(stem) {
                        type_first_seen.push(stem.clone());
                        type_display.insert(stem.clone(), display.clone());
                    }
                    by_type.entry(stem.clone()).or_default().push(position);
                }
                _ => diagnostics.untyped_products += 1,
            }

            products.push(Product {
                position,
                sku,
                name,
                inferred_type,
                price: record.price,
                stock: record.stock,
                name_stems: name_tokens.iter().map(|token| text::stem(token)).collect(),
                type_stem,
            });
        }

        let mut ranked_types = type_first_seen;
        // stable sort keeps catalog order among equally common types
        ranked_types.sort_by_key(|stem| std::cmp::Reverse(by_type.get(stem).map_or(0, Vec::len)));
        let known_types = ranked_types
            .into_iter()
            .take(limits.max_known_types)
            .filter_map(|stem| type_display.get(&stem).cloned())
            .collect();

        if !diagnostics.duplicate_skus.is_empty() {
            warn!(
                event_name = "catalog.index.duplicate_skus",
                duplicates = ?diagnostics.duplicate_skus,
                "duplicate SKUs found; first product in catalog order keeps the key"
            );
        }
        if diagnostics.rejected_unnamed > 0 {
            warn!(
                event_name = "catalog.index.unnamed_products",
                rejected = diagnostics.rejected_unnamed,
                "products without a name were left out of the index"
            );
        }

        let index = Self {
            products,
            by_sku,
            by_type,
            known_types,
            limits,
            fingerprint,
            built_at: Utc::now(),
            diagnostics,
        };

        info!(
            event_name = "catalog.index.built",
            products = index.products.len(),
            skus = index.by_sku.len(),
            types = index.by_type.len(),
            fingerprint = %index.fingerprint,
            "catalog index built"
        );

        index
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn sku_count(&self) -> usize {
        self.by_sku.len()
    }

    pub fn type_count(&self) -> usize {
        self.by_type.len()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn diagnostics(&self) -> &IndexDiagnostics {
        &self.diagnostics
    }

    pub fn limits(&self) -> IndexLimits {
        self.limits
    }

    /// Exact SKU lookup. Blank input never matches.
    pub fn lookup_by_sku(&self, sku: &str) -> Option<&Product> {
        let key = text::normalize_sku(sku);
        if key.is_empty() {
            return None;
        }
        self.by_sku.get(&key).and_then(|position| self.products.get(*position))
    }

    /// Products sharing an inferred type, singular or plural, capped at
    /// `max_type_results` in catalog order.
    pub fn lookup_by_type(&self, type_token: &str) -> Vec<&Product> {
        self.products_of_type_stem(&text::stem(&text::fold(type_token.trim())))
            .take(self.limits.max_type_results)
            .collect()
    }

    pub fn has_type_stem(&self, type_stem: &str) -> bool {
        self.by_type.contains_key(type_stem)
    }

    /// Most common inferred types, ties broken by first appearance.
    pub fn known_types(&self) -> &[String] {
        &self.known_types
    }

    pub fn find_by_key(&self, key: &ProductKey) -> Option<&Product> {
        if let Some(product) = key
            .sku
            .as_deref()
            .and_then(|sku| self.lookup_by_sku(sku))
            .filter(|product| product.key() == *key)
        {
            return Some(product);
        }
        // duplicate SKUs and SKU-less products are only reachable by scan
        self.products.iter().find(|product| product.key() == *key)
    }

    fn products_of_type_stem<'a>(
        &'a self,
        type_stem: &str,
    ) -> impl Iterator<Item = &'a Product> + 'a {
        self.by_type
            .get(type_stem)
            .map(|positions| positions.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |position| self.products.get(*position))
    }
}

fn fingerprint(records: &[ProductRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for record in records {
        hasher.update(record.name.trim().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(record.sku.as_deref().unwrap_or_default().trim().as_bytes());
        hasher.update(&[0x1f]);
        if let Some(price) = record.price {
            hasher.update(price.normalize().to_string().as_bytes());
        }
        hasher.update(&[0x1f]);
        if let Some(stock) = record.stock {
            hasher.update(stock.to_string().as_bytes());
        }
        hasher.update(&[0x1e]);
    }
    hasher.finalize().to_hex().to_string()
}
