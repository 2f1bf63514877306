use crate::catalog::CatalogIndex;
use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkuHit<'a> {
    pub product: &'a Product,
    pub token: String,
}

/// Every distinct product whose SKU appears verbatim among the tokens, in
/// query order. Blank tokens are skipped by the index itself.
pub fn sku_hits<'a>(tokens: &[String], index: &'a CatalogIndex) -> Vec<SkuHit<'a>> {
    let mut hits: Vec<SkuHit<'a>> = Vec::new();
    for token in tokens {
        let Some(product) = index.lookup_by_sku(token) else {
            continue;
        };
        if hits.iter().all(|hit| hit.product.position != product.position) {
            hits.push(SkuHit { product, token: token.clone() });
        }
    }
    hits
}

/// The product identified by SKU, only when exactly one product is hit.
pub fn match_sku<'a>(tokens: &[String], index: &'a CatalogIndex) -> Option<&'a Product> {
    match sku_hits(tokens, index).as_slice() {
        [hit] => Some(hit.product),
        _ => None,
    }
}
