//! YAML file configuration tier.
//!
//! The file is named by `AXONFLOW_CONFIG_FILE` or
//! `AXONFLOW_LLM_CONFIG_FILE`. `${VAR}` substrings in string fields are
//! expanded from the process environment at load time.

use std::collections::HashMap;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::LlmRouterConfig;

/// Environment variables naming the config file, in priority order.
const FILE_ENV_VARS: [&str; 2] = ["AXONFLOW_CONFIG_FILE", "AXONFLOW_LLM_CONFIG_FILE"];

/// Provider names the file tier recognizes.
const KNOWN_PROVIDERS: [&str; 5] = ["openai", "anthropic", "gemini", "bedrock", "ollama"];

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("var regex"));

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    #[allow(dead_code)]
    version: String,
    #[serde(default)]
    llm_providers: HashMap<String, ProviderSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSection {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    credentials: HashMap<String, String>,
    #[serde(default)]
    config: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

/// The configured file path, if any.
pub fn config_file_path() -> Option<PathBuf> {
    FILE_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

/// Load the file tier. Missing or unreadable files degrade to an empty
/// tier with a warning; they never abort resolution.
pub fn load_file_tier() -> LlmRouterConfig {
    let Some(path) = config_file_path() else {
        return LlmRouterConfig::default();
    };
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read config file");
            return LlmRouterConfig::default();
        }
    };
    match parse_yaml(&text, &|name| std::env::var(name).ok()) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse config file");
            LlmRouterConfig::default()
        }
    }
}

/// Parse the YAML shape with an injectable environment lookup.
pub(crate) fn parse_yaml(
    text: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmRouterConfig, serde_yaml::Error> {
    let file: ConfigFile = serde_yaml::from_str(text)?;
    let mut config = LlmRouterConfig::default();

    for (name, section) in &file.llm_providers {
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            tracing::warn!(provider = %name, "ignoring unknown provider in config file");
            continue;
        }
        if !section.enabled {
            tracing::debug!(provider = %name, "provider disabled in config file");
            continue;
        }
        let credential = |key: &str| {
            section
                .credentials
                .get(key)
                .map(|raw| expand_vars(raw, lookup))
                .filter(|v| !v.trim().is_empty())
        };
        let setting = |key: &str| {
            section
                .config
                .get(key)
                .map(|raw| expand_vars(raw, lookup))
                .filter(|v| !v.trim().is_empty())
        };

        match name.as_str() {
            "openai" => config.openai_api_key = credential("api_key"),
            "anthropic" => config.anthropic_api_key = credential("api_key"),
            "gemini" => {
                config.gemini_api_key = credential("api_key");
                config.gemini_model = setting("model");
            }
            "bedrock" => {
                config.bedrock_region = setting("region");
                config.bedrock_model = setting("model");
            }
            "ollama" => {
                config.ollama_endpoint = setting("endpoint");
                config.ollama_model = setting("model");
            }
            _ => {}
        }
    }
    Ok(config)
}

/// Expand every `${VAR}` in a string field. Unset variables expand to the
/// empty string with a warning.
fn expand_vars(raw: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    VAR_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                tracing::warn!(var = %name, "environment variable not set, expanding to empty");
                String::new()
            })
        })
        .into_owned()
}
