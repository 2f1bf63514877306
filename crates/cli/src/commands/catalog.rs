use std::path::Path;

use serde::Serialize;
use shelfbot_agent::CatalogHandle;
use shelfbot_core::catalog::IndexDiagnostics;

use crate::commands::{build_runtime, catalog_provider, CommandResult, GlobalOptions};

const COMMAND: &str = "catalog";

#[derive(Debug, Serialize)]
struct CatalogStats {
    source: String,
    products: usize,
    skus: usize,
    types: usize,
    known_types: Vec<String>,
    fingerprint: String,
    built_at: String,
    diagnostics: IndexDiagnostics,
}

pub fn run(global: &GlobalOptions, catalog: Option<&Path>) -> CommandResult {
    let config = match global.load_config(COMMAND, catalog) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let (provider, source) = catalog_provider(&config);
    let handle = CatalogHandle::from_config(&config.matching);
    let index = match runtime.block_on(handle.refresh(provider.as_ref())) {
        Ok(index) => index,
        Err(error) => {
            return CommandResult::failure(COMMAND, "catalog_unavailable", error.to_string(), 1)
        }
    };

    let stats = CatalogStats {
        source,
        products: index.len(),
        skus: index.sku_count(),
        types: index.type_count(),
        known_types: index.known_types().to_vec(),
        fingerprint: index.fingerprint().to_string(),
        built_at: index.built_at().to_rfc3339(),
        diagnostics: index.diagnostics().clone(),
    };
    let message = format!(
        "{} products, {} SKUs, {} types from {}",
        stats.products, stats.skus, stats.types, stats.source
    );

    CommandResult::success_with_details(COMMAND, message, serde_json::to_value(&stats).ok())
}
