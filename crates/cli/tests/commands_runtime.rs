use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use shelfbot_cli::commands::{catalog, chat, config, doctor, resolve, scenario, GlobalOptions};
use shelfbot_core::config::LogFormat;

#[test]
fn resolve_carries_context_across_queries_in_one_session() {
    with_env(&[], || {
        let queries = vec!["tienen mochila?".to_string(), "y el precio?".to_string()];
        let result = resolve::run(&GlobalOptions::default(), None, Some("cli-test"), &queries);
        assert_eq!(result.exit_code, 0, "expected successful resolve: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "resolve");
        assert_eq!(payload["status"], "ok");

        let reports = payload["details"].as_array().expect("details should be a report list");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0]["session_id"], "cli-test");
        assert_eq!(reports[0]["outcome"], "found");
        assert_eq!(reports[0]["detail"]["resolved"]["sku"], "K78");
        assert_eq!(reports[1]["outcome"], "found");
        assert_eq!(reports[1]["detail"]["carried_over"], true);
        assert_eq!(reports[1]["context"]["turn"], 2);
        assert_eq!(reports[1]["degraded"], false);
    });
}

#[test]
fn resolve_rejects_blank_queries() {
    with_env(&[], || {
        let queries = vec!["   ".to_string()];
        let result = resolve::run(&GlobalOptions::default(), None, None, &queries);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "bad_request");
    });
}

#[test]
fn resolve_runs_degraded_when_catalog_file_is_unreadable() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = dir.path().join("products.json");
        fs::write(&broken, "{ not json").expect("write catalog");

        let queries = vec!["sku: K78".to_string()];
        let result = resolve::run(&GlobalOptions::default(), Some(&broken), None, &queries);
        assert_eq!(result.exit_code, 0, "degraded resolve still answers: {}", result.output);

        let payload = parse_payload(&result.output);
        let reports = payload["details"].as_array().expect("report list");
        assert_eq!(reports[0]["degraded"], true);
        assert_eq!(reports[0]["outcome"], "not_found");
    });
}

#[test]
fn commands_fail_config_validation_for_missing_config_file() {
    with_env(&[], || {
        let global = GlobalOptions {
            config_path: Some(PathBuf::from("/nonexistent/shelfbot.toml")),
            ..GlobalOptions::default()
        };

        let result = resolve::run(&global, None, None, &["mochila".to_string()]);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "resolve");
        assert_eq!(payload["error_class"], "config_validation");

        let result = catalog::run(&global, None);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn scenario_runs_every_acceptance_conversation() {
    with_env(&[], || {
        let result = scenario::run(&GlobalOptions::default(), None);
        assert_eq!(result.exit_code, 0, "expected all scenarios to pass: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "scenario");
        let reports = payload["details"].as_array().expect("scenario reports");
        assert_eq!(reports.len(), 7);
        assert!(reports.iter().all(|report| report["passed"] == true));
    });
}

#[test]
fn catalog_reports_stats_and_diagnostics_for_a_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.json");
        fs::write(
            &path,
            r#"[
                {"name": "Mochila Urbana", "sku": "K78", "price": "59.90", "stock": 4},
                {"name": "Tazon Ceramico", "sku": "T10"},
                {"name": "Tazon Azul", "sku": "T10"},
                {"name": "Llavero Linterna", "sku": ""},
                {"name": "   ", "sku": "X01"}
            ]"#,
        )
        .expect("write catalog");

        let result = catalog::run(&GlobalOptions::default(), Some(&path));
        assert_eq!(result.exit_code, 0, "expected catalog stats: {}", result.output);

        let details = &parse_payload(&result.output)["details"];
        assert_eq!(details["products"], 4);
        assert_eq!(details["skus"], 2);
        assert_eq!(details["known_types"][0], "tazon");
        assert_eq!(details["diagnostics"]["rejected_unnamed"], 1);
        assert_eq!(details["diagnostics"]["skipped_empty_skus"], 1);
        assert_eq!(details["diagnostics"]["duplicate_skus"][0], "T10");
        assert_eq!(details["fingerprint"].as_str().map(str::len), Some(64));
    });
}

#[test]
fn catalog_fails_when_file_is_missing() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.json");

        let result = catalog::run(&GlobalOptions::default(), Some(&missing));
        assert_eq!(result.exit_code, 1);
        assert_eq!(parse_payload(&result.output)["error_class"], "catalog_unavailable");
    });
}

#[test]
fn config_attributes_env_and_file_sources() {
    with_env(&[("SHELFBOT_MATCHING_MAX_CANDIDATES", "4")], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shelfbot.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").expect("write config");

        let global = GlobalOptions { config_path: Some(path.clone()), ..GlobalOptions::default() };
        let output = config::run(&global);
        assert!(output.contains(
            "- matching.max_candidates = 4 (source: env (SHELFBOT_MATCHING_MAX_CANDIDATES))"
        ));
        assert!(output
            .contains(&format!("- logging.level = debug (source: file ({}))", path.display())));
        assert!(output.contains("- catalog.path = <unset: demo catalog> (source: default)"));
    });
}

#[test]
fn doctor_passes_with_demo_catalog() {
    with_env(&[], || {
        let report = doctor::run(&GlobalOptions::default(), true);
        assert!(report.healthy);

        let payload = parse_payload(&report.output);
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "catalog_load");
        assert_eq!(payload["checks"][1]["status"], "pass");
    });
}

#[test]
fn doctor_fails_and_skips_catalog_checks_on_bad_config() {
    with_env(&[("SHELFBOT_MATCHING_MAX_CANDIDATES", "many")], || {
        let report = doctor::run(&GlobalOptions::default(), true);
        assert!(!report.healthy);

        let payload = parse_payload(&report.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[], || {
        let report = doctor::run(&GlobalOptions::default(), false);
        assert!(report.output.starts_with("doctor:"));
        assert!(report.output.contains("- [ok] config_validation"));
    });
}

#[test]
fn chat_streams_one_report_per_line_within_one_session() {
    with_env(&[], || {
        let input = "tienen mochila?\n\ny el precio?\n".as_bytes();
        let mut written = Vec::new();
        let global = GlobalOptions::default();
        let result = chat::run_with_io(&global, None, Some("chat-test"), input, &mut written);
        assert_eq!(result.exit_code, 0, "expected chat to finish: {}", result.output);

        let summary = parse_payload(&result.output);
        assert_eq!(summary["command"], "chat");
        assert_eq!(summary["status"], "ok");

        let text = String::from_utf8(written).expect("chat output is utf-8");
        let reports: Vec<Value> = text.lines().map(parse_payload).collect();
        assert_eq!(reports.len(), 2, "blank lines are skipped");
        assert_eq!(reports[0]["session_id"], "chat-test");
        assert_eq!(reports[0]["detail"]["resolved"]["sku"], "K78");
        assert_eq!(reports[1]["detail"]["carried_over"], true);
        assert_eq!(reports[1]["context"]["turn"], 2);
    });
}

#[test]
fn chat_rejects_an_invalid_session_id() {
    with_env(&[], || {
        let mut written = Vec::new();
        let result = chat::run_with_io(
            &GlobalOptions::default(),
            None,
            Some("   "),
            "mochila\n".as_bytes(),
            &mut written,
        );
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "bad_request");
        assert!(written.is_empty());
    });
}

#[test]
fn command_line_overrides_win_over_env_and_are_attributed() {
    with_env(&[("SHELFBOT_MATCHING_MAX_CANDIDATES", "4"), ("SHELFBOT_LOG_LEVEL", "warn")], || {
        let global = GlobalOptions {
            log_level: Some("debug".to_string()),
            log_format: Some(LogFormat::Json),
            max_candidates: Some(6),
            ..GlobalOptions::default()
        };
        let output = config::run(&global);
        assert!(output.contains("- logging.level = debug (source: override (--log-level))"));
        assert!(output.contains("- logging.format = json (source: override (--log-format))"));
        assert!(output
            .contains("- matching.max_candidates = 6 (source: override (--max-candidates))"));
    });
}

#[test]
fn invalid_command_line_overrides_fail_config_validation() {
    with_env(&[], || {
        let global =
            GlobalOptions { log_level: Some("loud".to_string()), ..GlobalOptions::default() };
        let result = resolve::run(&global, None, None, &["mochila".to_string()]);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");

        let global = GlobalOptions { max_candidates: Some(0), ..GlobalOptions::default() };
        let result = scenario::run(&global, None);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn catalog_override_replaces_the_configured_path() {
    with_env(&[("SHELFBOT_CATALOG_PATH", "/nonexistent/products.json")], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.json");
        fs::write(&path, r#"[{"name": "Mochila Urbana", "sku": "K78"}]"#).expect("write catalog");

        let result = catalog::run(&GlobalOptions::default(), Some(&path));
        assert_eq!(result.exit_code, 0, "override should win over env: {}", result.output);
        assert_eq!(parse_payload(&result.output)["details"]["products"], 1);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHELFBOT_CATALOG_PATH",
        "SHELFBOT_CATALOG_REFRESH_INTERVAL_SECS",
        "SHELFBOT_MATCHING_MAX_TYPE_RESULTS",
        "SHELFBOT_MATCHING_MAX_KNOWN_TYPES",
        "SHELFBOT_MATCHING_MAX_CANDIDATES",
        "SHELFBOT_MATCHING_EXTRA_STOP_WORDS",
        "SHELFBOT_MATCHING_EXTRA_FILLER_WORDS",
        "SHELFBOT_MATCHING_MODIFIERS",
        "SHELFBOT_LOGGING_LEVEL",
        "SHELFBOT_LOGGING_FORMAT",
        "SHELFBOT_LOG_LEVEL",
        "SHELFBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
