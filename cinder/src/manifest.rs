#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fs;
use std::path::{Path, PathBuf};

use cinder_core::{CheckerConfig, Location};
use cinder_parse::ParseConfig;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "Cinder.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("manifest error: {message}")]
#[diagnostic(code(cinder::manifest))]
pub struct ManifestError {
    pub message: String,
}

/// Project settings after merging `Cinder.toml` with defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub manifest_path: Option<PathBuf>,
    pub any_type: bool,
    /// Location that declared types are qualified with.
    pub location: Option<String>,
    pub parse: ParseConfig,
}

impl ResolvedManifest {
    pub fn empty() -> Self {
        Self {
            manifest_path: None,
            any_type: false,
            location: None,
            parse: ParseConfig::default(),
        }
    }

    /// Checker settings; `--any` on the command line can only enable `Any`.
    pub fn checker_config(&self, any_flag: bool) -> CheckerConfig {
        let mut config = CheckerConfig::default().with_any_type(self.any_type || any_flag);
        if let Some(location) = &self.location {
            config = config.with_location(Location::String(location.clone()));
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    checker: CheckerSection,
    #[serde(default)]
    parser: ParserSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CheckerSection {
    #[serde(default)]
    any_type: bool,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ParserSection {
    #[serde(default)]
    max_type_depth: Option<usize>,
    #[serde(default)]
    max_expression_depth: Option<usize>,
}

/// Walk up from `start` to the nearest directory holding a `Cinder.toml`.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !cur.pop() {
            return None;
        }
    }
}

/// Settings for sources under `start`; defaults when no manifest is found.
pub fn load_resolved_manifest(start: &Path) -> Result<ResolvedManifest, ManifestError> {
    match find_manifest(start) {
        Some(path) => load_manifest_file(&path),
        None => Ok(ResolvedManifest::empty()),
    }
}

pub fn load_manifest_file(path: &Path) -> Result<ResolvedManifest, ManifestError> {
    let raw = fs::read_to_string(path).map_err(|e| ManifestError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let mut resolved = parse_manifest(&raw).map_err(|e| ManifestError {
        message: format!("{}: {}", path.display(), e.message),
    })?;
    resolved.manifest_path = Some(path.to_path_buf());
    Ok(resolved)
}

pub fn parse_manifest(raw: &str) -> Result<ResolvedManifest, ManifestError> {
    let parsed: Manifest = toml::from_str(raw).map_err(|e| ManifestError {
        message: format!("failed to parse manifest: {e}"),
    })?;

    let mut resolved = ResolvedManifest::empty();
    resolved.any_type = parsed.checker.any_type;
    resolved.location = parsed.checker.location;

    if let Some(depth) = parsed.parser.max_type_depth {
        resolved.parse.max_type_depth = positive("max-type-depth", depth)?;
    }
    if let Some(depth) = parsed.parser.max_expression_depth {
        resolved.parse.max_expression_depth = positive("max-expression-depth", depth)?;
    }
    Ok(resolved)
}

fn positive(key: &str, value: usize) -> Result<usize, ManifestError> {
    if value == 0 {
        return Err(ManifestError {
            message: format!("`parser.{key}` must be at least 1"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_uses_defaults() {
        let resolved = parse_manifest("").expect("empty manifest");
        assert_eq!(resolved, ResolvedManifest::empty());
        assert!(!resolved.checker_config(false).any_type_enabled);
    }

    #[test]
    fn reads_checker_and_parser_sections() {
        let resolved = parse_manifest(
            "[checker]\nany-type = true\nlocation = \"vaults\"\n\n[parser]\nmax-type-depth = 8\n",
        )
        .expect("manifest");
        assert!(resolved.any_type);
        assert_eq!(resolved.parse.max_type_depth, 8);
        assert_eq!(resolved.parse.max_expression_depth, 64);

        let config = resolved.checker_config(false);
        assert!(config.any_type_enabled);
        assert_eq!(config.location, Location::String("vaults".to_string()));
    }

    #[test]
    fn command_line_flag_enables_any() {
        let resolved = ResolvedManifest::empty();
        assert!(resolved.checker_config(true).any_type_enabled);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_depths() {
        let err = parse_manifest("[checker]\nany = true\n").expect_err("unknown key");
        assert!(err.message.contains("failed to parse manifest"), "{}", err.message);

        let err = parse_manifest("[parser]\nmax-expression-depth = 0\n").expect_err("zero depth");
        assert!(err.message.contains("max-expression-depth"), "{}", err.message);
    }
}
