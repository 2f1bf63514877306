use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::commands::GlobalOptions;

pub fn run(global: &GlobalOptions) -> String {
    let config = match global.load_config("config", None) {
        Ok(config) => config,
        Err(result) => return result.output,
    };

    let config_file_path = detect_config_path(global.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset: demo catalog>".to_string());
    lines.push(render_line(
        "catalog.path",
        &catalog_path,
        source("catalog.path", &["SHELFBOT_CATALOG_PATH"]),
    ));
    lines.push(render_line(
        "catalog.refresh_interval_secs",
        &config.catalog.refresh_interval_secs.to_string(),
        source("catalog.refresh_interval_secs", &["SHELFBOT_CATALOG_REFRESH_INTERVAL_SECS"]),
    ));

    let matching = &config.matching;
    lines.push(render_line(
        "matching.max_type_results",
        &matching.max_type_results.to_string(),
        source("matching.max_type_results", &["SHELFBOT_MATCHING_MAX_TYPE_RESULTS"]),
    ));
    lines.push(render_line(
        "matching.max_known_types",
        &matching.max_known_types.to_string(),
        source("matching.max_known_types", &["SHELFBOT_MATCHING_MAX_KNOWN_TYPES"]),
    ));
    let max_candidates_source = if global.max_candidates.is_some() {
        "override (--max-candidates)".to_string()
    } else {
        source("matching.max_candidates", &["SHELFBOT_MATCHING_MAX_CANDIDATES"])
    };
    lines.push(render_line(
        "matching.max_candidates",
        &matching.max_candidates.to_string(),
        max_candidates_source,
    ));
    lines.push(render_line(
        "matching.extra_stop_words",
        &render_list(&matching.extra_stop_words),
        source("matching.extra_stop_words", &["SHELFBOT_MATCHING_EXTRA_STOP_WORDS"]),
    ));
    lines.push(render_line(
        "matching.extra_filler_words",
        &render_list(&matching.extra_filler_words),
        source("matching.extra_filler_words", &["SHELFBOT_MATCHING_EXTRA_FILLER_WORDS"]),
    ));
    lines.push(render_line(
        "matching.modifiers",
        &render_list(&matching.modifiers),
        source("matching.modifiers", &["SHELFBOT_MATCHING_MODIFIERS"]),
    ));

    let synonyms: Vec<String> = matching
        .synonyms
        .iter()
        .map(|(word, type_token)| format!("{word}->{type_token}"))
        .collect();
    lines.push(render_line(
        "matching.synonyms",
        &render_list(&synonyms),
        source("matching.synonyms", &[]),
    ));

    let level_source = if global.log_level.is_some() {
        "override (--log-level)".to_string()
    } else {
        source("logging.level", &["SHELFBOT_LOGGING_LEVEL", "SHELFBOT_LOG_LEVEL"])
    };
    lines.push(render_line("logging.level", &config.logging.level, level_source));
    let format_source = if global.log_format.is_some() {
        "override (--log-format)".to_string()
    } else {
        source("logging.format", &["SHELFBOT_LOGGING_FORMAT", "SHELFBOT_LOG_FORMAT"])
    };
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        format_source,
    ));

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let root = PathBuf::from("shelfbot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/shelfbot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        "[]".to_string()
    } else {
        format!("[{}]", values.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, render_list};

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[matching]\nmax_candidates = 4\n".parse().expect("toml");

        assert!(contains_path(&doc, "matching.max_candidates"));
        assert!(!contains_path(&doc, "matching.synonyms"));
        assert!(!contains_path(&doc, "catalog.path"));
    }

    #[test]
    fn lists_render_compactly() {
        assert_eq!(render_list(&[]), "[]");
        assert_eq!(render_list(&["rojo".to_string(), "azul".to_string()]), "[rojo, azul]");
    }
}
