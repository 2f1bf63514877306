use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
    pub refresh_interval_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchingConfig {
    pub max_type_results: usize,
    pub max_known_types: usize,
    pub max_candidates: usize,
    pub extra_stop_words: Vec<String>,
    pub extra_filler_words: Vec<String>,
    pub modifiers: Vec<String>,
    pub synonyms: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_candidates: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_type_results: 10,
            max_known_types: 30,
            max_candidates: 10,
            extra_stop_words: Vec::new(),
            extra_filler_words: Vec::new(),
            modifiers: Vec::new(),
            synonyms: BTreeMap::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig { path: None, refresh_interval_secs: 300 },
            matching: MatchingConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shelfbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
            if let Some(refresh_interval_secs) = catalog.refresh_interval_secs {
                self.catalog.refresh_interval_secs = refresh_interval_secs;
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(max_type_results) = matching.max_type_results {
                self.matching.max_type_results = max_type_results;
            }
            if let Some(max_known_types) = matching.max_known_types {
                self.matching.max_known_types = max_known_types;
            }
            if let Some(max_candidates) = matching.max_candidates {
                self.matching.max_candidates = max_candidates;
            }
            if let Some(extra_stop_words) = matching.extra_stop_words {
                self.matching.extra_stop_words = extra_stop_words;
            }
            if let Some(extra_filler_words) = matching.extra_filler_words {
                self.matching.extra_filler_words = extra_filler_words;
            }
            if let Some(modifiers) = matching.modifiers {
                self.matching.modifiers = modifiers;
            }
            if let Some(synonyms) = matching.synonyms {
                self.matching.synonyms = synonyms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHELFBOT_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SHELFBOT_CATALOG_REFRESH_INTERVAL_SECS") {
            self.catalog.refresh_interval_secs =
                parse_u64("SHELFBOT_CATALOG_REFRESH_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("SHELFBOT_MATCHING_MAX_TYPE_RESULTS") {
            self.matching.max_type_results =
                parse_usize("SHELFBOT_MATCHING_MAX_TYPE_RESULTS", &value)?;
        }
        if let Some(value) = read_env("SHELFBOT_MATCHING_MAX_KNOWN_TYPES") {
            self.matching.max_known_types =
                parse_usize("SHELFBOT_MATCHING_MAX_KNOWN_TYPES", &value)?;
        }
        if let Some(value) = read_env("SHELFBOT_MATCHING_MAX_CANDIDATES") {
            self.matching.max_candidates = parse_usize("SHELFBOT_MATCHING_MAX_CANDIDATES", &value)?;
        }
        if let Some(value) = read_env("SHELFBOT_MATCHING_EXTRA_STOP_WORDS") {
            self.matching.extra_stop_words = parse_list(&value);
        }
        if let Some(value) = read_env("SHELFBOT_MATCHING_EXTRA_FILLER_WORDS") {
            self.matching.extra_filler_words = parse_list(&value);
        }
        if let Some(value) = read_env("SHELFBOT_MATCHING_MODIFIERS") {
            self.matching.modifiers = parse_list(&value);
        }

        let log_level =
            read_env("SHELFBOT_LOGGING_LEVEL").or_else(|| read_env("SHELFBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHELFBOT_LOGGING_FORMAT").or_else(|| read_env("SHELFBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(max_candidates) = overrides.max_candidates {
            self.matching.max_candidates = max_candidates;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_matching(&self.matching)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shelfbot.toml"), PathBuf::from("config/shelfbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(path) = &catalog.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "catalog.path must not be empty when set".to_string(),
            ));
        }
    }

    if catalog.refresh_interval_secs == 0 || catalog.refresh_interval_secs > 86_400 {
        return Err(ConfigError::Validation(
            "catalog.refresh_interval_secs must be in range 1..=86400".to_string(),
        ));
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.max_type_results == 0 {
        return Err(ConfigError::Validation(
            "matching.max_type_results must be greater than zero".to_string(),
        ));
    }
    if matching.max_known_types == 0 {
        return Err(ConfigError::Validation(
            "matching.max_known_types must be greater than zero".to_string(),
        ));
    }
    if matching.max_candidates == 0 || matching.max_candidates > 100 {
        return Err(ConfigError::Validation(
            "matching.max_candidates must be in range 1..=100".to_string(),
        ));
    }

    if let Some((word, _)) = matching
        .synonyms
        .iter()
        .find(|(word, type_token)| word.trim().is_empty() || type_token.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "matching.synonyms entry `{word}` must map a non-empty word to a non-empty type"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    matching: Option<MatchingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    max_type_results: Option<usize>,
    max_known_types: Option<usize>,
    max_candidates: Option<usize>,
    extra_stop_words: Option<Vec<String>>,
    extra_filler_words: Option<Vec<String>>,
    modifiers: Option<Vec<String>>,
    synonyms: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
