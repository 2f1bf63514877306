use std::path::Path;
use std::sync::Arc;

use shelfbot_agent::fixtures::{acceptance_scenarios, run_scenario};
use shelfbot_agent::{CatalogHandle, InMemorySessionStore, ResolutionService};
use shelfbot_core::errors::ApplicationError;
use shelfbot_core::resolution::Resolver;
use tracing::info;

use crate::commands::{
    build_runtime, catalog_provider, new_correlation_id, CommandResult, GlobalOptions,
};

const COMMAND: &str = "scenario";

/// Run the built-in acceptance conversations. Exit code 1 when any fails.
pub fn run(global: &GlobalOptions, catalog: Option<&Path>) -> CommandResult {
    let config = match global.load_config(COMMAND, catalog) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let correlation_id = new_correlation_id();
    let (provider, source) = catalog_provider(&config);

    let outcome = runtime.block_on(async {
        let handle = Arc::new(CatalogHandle::from_config(&config.matching));
        handle.refresh(provider.as_ref()).await?;
        let service = ResolutionService::new(
            Resolver::from_config(&config.matching),
            handle,
            InMemorySessionStore::default(),
        );

        let mut reports = Vec::new();
        for scenario in acceptance_scenarios() {
            reports.push(run_scenario(&service, &scenario).await?);
        }
        Ok::<_, ApplicationError>(reports)
    });

    let reports = match outcome {
        Ok(reports) => reports,
        Err(error) => {
            return CommandResult::from_application_error(COMMAND, error, &correlation_id)
        }
    };

    let failed: Vec<&str> =
        reports.iter().filter(|report| !report.passed).map(|report| report.name).collect();
    info!(
        event_name = "cli.scenario.completed",
        correlation_id = %correlation_id,
        scenarios = reports.len(),
        failed = failed.len(),
        "scenario run completed"
    );

    let details = serde_json::to_value(&reports).ok();
    if failed.is_empty() {
        CommandResult::success_with_details(
            COMMAND,
            format!("{} scenarios passed against {source} catalog", reports.len()),
            details,
        )
    } else {
        CommandResult::failure_with_details(
            COMMAND,
            "scenario_failed",
            format!("failed scenarios: {}", failed.join(", ")),
            1,
            details,
        )
    }
}
