use serde::Serialize;
use shelfbot_agent::CatalogHandle;
use shelfbot_core::config::AppConfig;

use crate::commands::{build_runtime, catalog_provider, GlobalOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub struct DoctorOutput {
    pub healthy: bool,
    pub output: String,
}

pub fn run(global: &GlobalOptions, json_output: bool) -> DoctorOutput {
    let report = build_report(global);
    let healthy = report.overall_status != CheckStatus::Fail;

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    DoctorOutput { healthy, output }
}

fn build_report(global: &GlobalOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(global.load_options(None)) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("catalog_load"));
            checks.push(skipped("catalog_integrity"));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready, with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_catalog(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match build_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return vec![
                DoctorCheck {
                    name: "catalog_load",
                    status: CheckStatus::Fail,
                    details: "failed to initialize async runtime".to_string(),
                },
                skipped("catalog_integrity"),
            ];
        }
    };

    let (provider, source) = catalog_provider(config);
    let handle = CatalogHandle::from_config(&config.matching);
    let index = match runtime.block_on(handle.refresh(provider.as_ref())) {
        Ok(index) => index,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "catalog_load",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                skipped("catalog_integrity"),
            ];
        }
    };

    let load = DoctorCheck {
        name: "catalog_load",
        status: if index.is_empty() { CheckStatus::Warn } else { CheckStatus::Pass },
        details: format!("{} products indexed from {source}", index.len()),
    };

    let diagnostics = index.diagnostics();
    let mut problems = Vec::new();
    if !diagnostics.duplicate_skus.is_empty() {
        problems.push(format!("duplicate SKUs: {}", diagnostics.duplicate_skus.join(", ")));
    }
    if diagnostics.rejected_unnamed > 0 {
        problems.push(format!("{} products without a name", diagnostics.rejected_unnamed));
    }
    if diagnostics.untyped_products > 0 {
        problems.push(format!("{} products without a type word", diagnostics.untyped_products));
    }
    let integrity = if problems.is_empty() {
        DoctorCheck {
            name: "catalog_integrity",
            status: CheckStatus::Pass,
            details: format!(
                "{} products without SKU are matched by name only",
                diagnostics.skipped_empty_skus
            ),
        }
    } else {
        DoctorCheck {
            name: "catalog_integrity",
            status: CheckStatus::Warn,
            details: problems.join("; "),
        }
    };

    vec![load, integrity]
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because an earlier check failed".to_string(),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
