use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use shelfbot_agent::{
    CatalogHandle, CatalogRefresher, InMemorySessionStore, ResolutionService, SessionId,
};
use shelfbot_core::resolution::Resolver;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::commands::{
    build_runtime, catalog_provider, new_correlation_id, CommandResult, GlobalOptions,
};

const COMMAND: &str = "chat";

/// Resolve queries read line by line from stdin within one session.
pub fn run(
    global: &GlobalOptions,
    catalog: Option<&Path>,
    session: Option<&str>,
) -> CommandResult {
    let stdout = std::io::stdout();
    run_with_io(global, catalog, session, BufReader::new(tokio::io::stdin()), stdout.lock())
}

/// One JSON report per input line goes to `output` as soon as it is resolved.
/// The catalog is refreshed in the background every
/// `catalog.refresh_interval_secs` for as long as input keeps coming.
pub fn run_with_io<R, W>(
    global: &GlobalOptions,
    catalog: Option<&Path>,
    session: Option<&str>,
    input: R,
    mut output: W,
) -> CommandResult
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let config = match global.load_config(COMMAND, catalog) {
        Ok(config) => config,
        Err(result) => return result,
    };

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
                event_name = "cli.chat.catalog_degraded",
                correlation_id = %correlation_id,
                source = %source,
                error = %error,
                "chat starts against an empty catalog"
            );
        }
        let refresher = CatalogRefresher::from_config(
            Arc::clone(&handle),
            Arc::clone(&provider),
            &config.catalog,
        );

        let service = ResolutionService::new(
            Resolver::from_config(&config.matching),
            handle,
            InMemorySessionStore::default(),
        );

        let mut lines = input.lines();
        let mut turns = 0_usize;
        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(turns),
                Err(error) => {
                    break Err(CommandResult::failure(
                        COMMAND,
                        "input",
                        format!("failed to read query: {error}"),
                        1,
                    ))
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let report = match service.resolve(&session_id, &line).await {
                Ok(report) => report,
                Err(error) => {
                    break Err(CommandResult::from_application_error(
                        COMMAND,
                        error,
                        &correlation_id,
                    ))
                }
            };
            let written = serde_json::to_string(&report)
                .context("serializing resolution report")
                .and_then(|json| {
                    writeln!(output, "{json}")
                        .and_then(|()| output.flush())
                        .context("writing resolution report")
                });
            if let Err(error) = written {
                break Err(CommandResult::failure(COMMAND, "output", format!("{error:#}"), 1));
            }
            turns += 1;
        };

        refresher.abort();
        result
    });

    match outcome {
        Ok(turns) => {
            info!(
                event_name = "cli.chat.completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                queries = turns,
                "chat input exhausted"
            );
            CommandResult::success(
                COMMAND,
                format!("resolved {turns} queries against {source} catalog"),
            )
        }
        Err(result) => result,
    }
}
