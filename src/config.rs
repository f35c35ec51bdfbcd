#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything the exporter needs besides the channel itself.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub api_key: String,
    pub api_base: String,
    pub output_dir: PathBuf,
    pub max_pages: Option<usize>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_key: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_pages: Option<usize>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<ExportSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings(&file_vars, env_var_string, overrides)
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<ExportSettings> {
    let api_key = overrides
        .api_key
        .and_then(non_blank)
        .or_else(|| lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set"))?;
    let api_base = lookup_value("YOUTUBE_API_BASE", file_vars, &env_lookup)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let output_dir = overrides
        .output_dir
        .map(|path| path.to_string_lossy().into_owned())
        .and_then(non_blank)
        .or_else(|| lookup_value("EXPORT_OUTPUT_DIR", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
    // Zero means "no ceiling", same as leaving it unset.
    let max_pages = overrides
        .max_pages
        .or_else(|| {
            lookup_value("EXPORT_MAX_PAGES", file_vars, &env_lookup)
                .and_then(|value| value.parse::<usize>().ok())
        })
        .filter(|pages| *pages > 0);
    let timeout_secs = lookup_value("EXPORT_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Ok(ExportSettings {
        api_key,
        api_base,
        output_dir: PathBuf::from(output_dir),
        max_pages,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Reads `KEY=value` pairs from an env file. A missing file is an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    Ok(content.lines().filter_map(parse_env_line).collect())
}

/// Accepts `KEY=value`, `export KEY=value` and quoted values; comments,
/// blank lines and lines without a key yield `None`.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
