// src/ingest/config.rs
//! Loader for the polled-handle list. Supports TOML or JSON formats.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "SOURCE_HANDLES_PATH";

/// Accounts polled when no handle config is present.
pub const DEFAULT_HANDLES: &[&str] = &["Redcross", "FEMA", "NWS", "UNOCHA"];

/// Load handles from an explicit path.
pub fn load_handles_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading handles from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_handles(&content, ext.as_str())
}

/// Load handles using env var + fallbacks:
/// 1) $SOURCE_HANDLES_PATH
/// 2) config/source_handles.toml
/// 3) config/source_handles.json
/// 4) the built-in [`DEFAULT_HANDLES`]
pub fn load_handles_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_handles_from(&pb);
        } else {
            return Err(anyhow!("SOURCE_HANDLES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/source_handles.toml");
    if toml_p.exists() {
        return load_handles_from(&toml_p);
    }
    let json_p = PathBuf::from("config/source_handles.json");
    if json_p.exists() {
        return load_handles_from(&json_p);
    }
    Ok(DEFAULT_HANDLES.iter().map(|s| s.to_string()).collect())
}

fn parse_handles(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    let try_toml = hint_ext == "toml" || s.contains("handles");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported handles format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlHandles {
        handles: Vec<String>,
    }
    let v: TomlHandles = toml::from_str(s)?;
    Ok(clean_list(v.handles))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop empties, dedup while keeping first-seen order. Poll order is
/// shuffled per cycle anyway, so config order carries no meaning, but stable
/// output keeps logs and tests readable.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
