pub mod catalog;
pub mod chat;
pub mod config;
pub mod doctor;
pub mod resolve;
pub mod scenario;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shelfbot_agent::fixtures::demo_catalog;
use shelfbot_agent::{CatalogProvider, JsonFileCatalogProvider, StaticCatalogProvider};
use shelfbot_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use shelfbot_core::errors::ApplicationError;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_details(command, message, None)
    }

    pub fn success_with_details(
        command: &str,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            details,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_details(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_details(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        details: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            details,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Map an application error through the interface taxonomy, keeping the
    /// correlation id so the failure can be found in the logs.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id);
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(interface.error_class().to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(correlation_id.to_string()),
            details: None,
        };
        let exit_code = if interface.error_class() == "bad_request" { 2 } else { 1 };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Options shared by every command.
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_candidates: Option<usize>,
}

impl GlobalOptions {
    /// Command-line values enter the config pipeline as overrides, so they win
    /// over env and file and still go through validation.
    pub fn load_options(&self, catalog: Option<&Path>) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                catalog_path: catalog.map(Path::to_path_buf),
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                max_candidates: self.max_candidates,
            },
        }
    }

    pub fn load_config(
        &self,
        command: &str,
        catalog: Option<&Path>,
    ) -> Result<AppConfig, CommandResult> {
        AppConfig::load(self.load_options(catalog)).map_err(|error| {
            CommandResult::failure(command, "config_validation", error.to_string(), 2)
        })
    }
}

/// Where products come from for a command: the configured file (including a
/// `--catalog` override), or the built-in demo catalog.
pub(crate) fn catalog_provider(config: &AppConfig) -> (Arc<dyn CatalogProvider>, String) {
    match &config.catalog.path {
        Some(path) => {
            let label = format!("file ({})", path.display());
            (Arc::new(JsonFileCatalogProvider::new(path.clone())), label)
        }
        None => (Arc::new(StaticCatalogProvider::new(demo_catalog())), "demo".to_string()),
    }
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            1,
        )
    })
}

pub(crate) fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
