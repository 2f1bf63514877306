use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text;

/// Product row as delivered by a catalog provider, before indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<u32>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, sku: impl Into<String>) -> Self {
        let sku = sku.into();
        Self {
            name: name.into(),
            sku: (!sku.trim().is_empty()).then_some(sku),
            price: None,
            stock: None,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }
}

/// Indexed, immutable catalog product.
///
/// `inferred_type` and the name stems are derived while the index is built and
/// are never taken from the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub position: usize,
    pub sku: String,
    pub name: String,
    pub inferred_type: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    #[serde(skip)]
    pub(crate) name_stems: Vec<String>,
    #[serde(skip)]
    pub(crate) type_stem: Option<String>,
}

impl Product {
    pub fn has_sku(&self) -> bool {
        !self.sku.trim().is_empty()
    }

    pub fn key(&self) -> ProductKey {
        ProductKey {
            sku: self.has_sku().then(|| text::normalize_sku(&self.sku)),
            name: text::fold(self.name.trim()),
        }
    }

    pub fn name_stems(&self) -> &[String] {
        &self.name_stems
    }

    pub fn type_stem(&self) -> Option<&str> {
        self.type_stem.as_deref()
    }
}

/// Lookup key for a product held outside the index (conversation anchors).
///
/// Survives catalog refreshes: the SKU is tried first, then the folded name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub sku: Option<String>,
    pub name: String,
}
