//! Configuration discovery and effective settings resolution.
//!
//! Vigil reads `vigil.toml|yaml|yml` from the target directory (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `threads`: 0 (sequential)
//! - `output`: `human`
//! - `benchmark`: false
//! - `timeout_secs`: none
//! - `kind`: `code`
//! - `walk.exclude_dirs`: `.git`, `node_modules`
//! - `walk.exclude_extensions`: `jar`, `png`, `jpg`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::module::ScanKind;
use crate::target::WalkOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 3] = ["vigil.toml", "vigil.yaml", "vigil.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Directory walk section under `[walk]`.
pub struct WalkCfg {
    pub exclude_dirs: Option<Vec<String>>,
    pub exclude_extensions: Option<Vec<String>>,
    /// Glob patterns relative to the target root.
    pub exclude: Option<Vec<String>>,
    pub include_hidden: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `vigil.toml|yaml`.
pub struct VigilConfig {
    pub ruleset: Option<String>,
    pub threads: Option<usize>,
    pub output: Option<String>,
    pub benchmark: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub kind: Option<String>,
    pub walk: Option<WalkCfg>,
}

#[derive(Debug, Default, Clone)]
/// Values given on the command line; `None` defers to the config file.
pub struct CliOverrides {
    pub target: Option<String>,
    pub ruleset: Option<String>,
    pub threads: Option<usize>,
    pub output: Option<String>,
    pub benchmark: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    /// Directory (or file) to scan, as given.
    pub target: PathBuf,
    /// Directory where configuration was discovered.
    pub config_root: PathBuf,
    /// Repository root that unit names (and diff paths) are relative to.
    pub repo_root: PathBuf,
    pub config_found: bool,
    /// Ruleset path; config-relative paths are resolved against `config_root`.
    pub ruleset: Option<PathBuf>,
    pub threads: usize,
    pub output: String,
    pub benchmark: bool,
    pub timeout_secs: Option<u64>,
    pub kind: ScanKind,
    pub walk: WalkOptions,
}

/// Walk upward from `start` to detect the configuration root.
///
/// Stops when a `vigil.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_config_root(start: &Path) -> PathBuf {
    let start_dir = if start.is_file() {
        start.parent().unwrap_or(start)
    } else {
        start
    };
    let mut cur = start_dir;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start_dir.to_path_buf(),
        }
    }
}

/// Load `VigilConfig` from `vigil.toml` or `vigil.yaml|yml` if present.
/// A file that fails to parse is reported and treated as absent.
pub fn load_config(root: &Path) -> Option<VigilConfig> {
    let toml_path = root.join("vigil.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path).ok()?;
        return match toml::from_str::<VigilConfig>(&s) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %toml_path.display(), "ignoring invalid config: {}", e);
                None
            }
        };
    }
    for yml in ["vigil.yaml", "vigil.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p).ok()?;
            return match serde_yaml::from_str::<VigilConfig>(&s) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!(path = %p.display(), "ignoring invalid config: {}", e);
                    None
                }
            };
        }
    }
    None
}

/// Closest ancestor of `start` holding a `.git` entry, as an absolute path.
pub fn detect_repo_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;
    let mut cur: &Path = if start.is_file() { start.parent()? } else { &start };
    loop {
        if cur.join(".git").exists() {
            return Some(cur.to_path_buf());
        }
        cur = cur.parent()?;
    }
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective, String> {
    let target = PathBuf::from(cli.target.as_deref().unwrap_or("."));
    let config_root = detect_config_root(&target);
    let repo_root = detect_repo_root(&target).unwrap_or_else(|| config_root.clone());
    let loaded = load_config(&config_root);
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let ruleset = match (&cli.ruleset, &cfg.ruleset) {
        (Some(p), _) => Some(PathBuf::from(p)),
        (None, Some(p)) => Some(config_root.join(p)),
        (None, None) => None,
    };

    let threads = cli.threads.or(cfg.threads).unwrap_or(0);

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if !matches!(output.as_str(), "human" | "json" | "markdown") {
        return Err(format!(
            "Unknown output mode: {} (expected human|json|markdown)",
            output
        ));
    }

    let benchmark = cli.benchmark.or(cfg.benchmark).unwrap_or(false);
    let timeout_secs = cli.timeout_secs.or(cfg.timeout_secs).filter(|s| *s > 0);

    let kind = match cli.kind.as_deref().or(cfg.kind.as_deref()) {
        Some(k) => k.parse::<ScanKind>()?,
        None => ScanKind::Code,
    };

    let walk_cfg = cfg.walk.unwrap_or_default();
    let defaults = WalkOptions::default();
    let walk = WalkOptions {
        exclude_dirs: walk_cfg.exclude_dirs.unwrap_or(defaults.exclude_dirs),
        exclude_extensions: walk_cfg
            .exclude_extensions
            .unwrap_or(defaults.exclude_extensions),
        exclude: Vec::new(),
        include_hidden: walk_cfg.include_hidden.unwrap_or(defaults.include_hidden),
    }
    .with_exclude_globs(walk_cfg.exclude.unwrap_or_default())
    .map_err(|e| format!("Invalid walk.exclude pattern: {}", e))?;

    Ok(Effective {
        target,
        config_root,
        repo_root,
        config_found,
        ruleset,
        threads,
        output,
        benchmark,
        timeout_secs,
        kind,
        walk,
    })
}
