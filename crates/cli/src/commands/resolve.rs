use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use shelfbot_agent::{CatalogHandle, InMemorySessionStore, ResolutionService, SessionId};
use shelfbot_core::errors::ApplicationError;
use shelfbot_core::resolution::Resolver;
use tracing::{info, warn};

use crate::commands::{
    build_runtime, catalog_provider, new_correlation_id, CommandResult, GlobalOptions,
};

const COMMAND: &str = "resolve";

/// Resolve queries in order within one session and print every report.
pub fn run(
    global: &GlobalOptions,
    catalog: Option<&Path>,
    session: Option<&str>,
    queries: &[String],
) -> CommandResult {
    let config = match global.load_config(COMMAND, catalog) {
        Ok(config) => config,
        Err(result) => return result,
    };
    if queries.iter().all(|query| query.trim().is_empty()) {
        return CommandResult::failure(COMMAND, "bad_request", "at least one query is required", 2);
    }

    let correlation_id = new_correlation_id();
    let session_id = match SessionId::parse(session.unwrap_or("cli")) {
        Ok(session_id) => session_id,
        Err(error) => {
            return CommandResult::from_application_error(COMMAND, error, &correlation_id)
        }
    };

    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let (provider, source) = catalog_provider(&config);
    let outcome = runtime.block_on(async {
        let handle = Arc::new(CatalogHandle::from_config(&config.matching));
        if let Err(error) = handle.refresh(provider.as_ref()).await {
            warn!(
                event_name = "cli.resolve.catalog_degraded",
                correlation_id = %correlation_id,
                source = %source,
                error = %error,
                "resolving against an empty catalog"
            );
        }

        let service = ResolutionService::new(
            Resolver::from_config(&config.matching),
            handle,
            InMemorySessionStore::default(),
        );

        let mut reports = Vec::with_capacity(queries.len());
        for query in queries {
            reports.push(service.resolve(&session_id, query).await?);
        }
        Ok::<_, ApplicationError>(reports)
    });

    let reports = match outcome {
        Ok(reports) => reports,
        Err(error) => {
            return CommandResult::from_application_error(COMMAND, error, &correlation_id)
        }
    };

    info!(
        event_name = "cli.resolve.completed",
        correlation_id = %correlation_id,
        session_id = %session_id,
        queries = reports.len(),
        "resolve command completed"
    );

    match serde_json::to_value(&reports).context("serializing resolution reports") {
        Ok(details) => CommandResult::success_with_details(
            COMMAND,
            format!("resolved {} queries against {source} catalog", reports.len()),
            Some(details),
        ),
        Err(error) => CommandResult::failure(COMMAND, "serialization", format!("{error:#}"), 1),
    }
}
