//! Target enumeration: turning a scan target into scannable units.
//!
//! Enumeration is the only place a scan touches the target before work is
//! dispatched. An unreadable root is fatal; an unreadable entry below the
//! root is recorded as a `ScanError` and the walk continues.

use crate::error::ScanFailure;
use crate::models::ScanError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
/// One file to scan. `name` is root-relative with `/` separators and is what
/// violations report as their file.
pub struct ScanUnit {
    pub path: PathBuf,
    pub name: String,
}

impl ScanUnit {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Enumeration {
    pub units: Vec<ScanUnit>,
    /// Entries that could not be read; carried into the final report.
    pub errors: Vec<ScanError>,
}

/// Source of scannable units for one scan call.
pub trait TargetSource: Send + Sync {
    fn enumerate(&self) -> Result<Enumeration, ScanFailure>;

    /// Short description used in logs and benchmark labels.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
/// Directory walk filters.
pub struct WalkOptions {
    /// Directory names pruned from the walk (case-insensitive).
    pub exclude_dirs: Vec<String>,
    /// File extensions skipped, without the leading dot.
    pub exclude_extensions: Vec<String>,
    /// Glob patterns matched against the path relative to the walked directory.
    pub exclude: Vec<glob::Pattern>,
    pub include_hidden: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![".git".into(), "node_modules".into()],
            exclude_extensions: vec!["jar".into(), "png".into(), "jpg".into()],
            exclude: Vec::new(),
            include_hidden: false,
        }
    }
}

impl WalkOptions {
    /// Compile exclusion globs; invalid ones are reported back to the caller.
    pub fn with_exclude_globs<I, S>(mut self, globs: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for g in globs {
            self.exclude.push(glob::Pattern::new(g.as_ref())?);
        }
        Ok(self)
    }

    fn keeps_file(&self, name: &str, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if self
                .exclude_extensions
                .iter()
                .any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(ext))
            {
                return false;
            }
        }
        !self.exclude.iter().any(|p| p.matches(name))
    }
}

#[derive(Debug, Clone)]
/// Recursive walk of a checkout on disk.
pub struct DirectorySource {
    root: PathBuf,
    /// Base that unit names are relative to; defaults to `root`.
    name_root: Option<PathBuf>,
    options: WalkOptions,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name_root: None,
            options: WalkOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    /// Name units relative to `base` (usually the repository root) instead of
    /// the walked directory, so they line up with diff paths.
    pub fn with_name_root(mut self, base: impl Into<PathBuf>) -> Self {
        self.name_root = Some(base.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Offset of the walked directory inside the name root, as `dir/` or empty.
    fn name_prefix(&self) -> String {
        let Some(base) = &self.name_root else {
            return String::new();
        };
        let (Ok(base), Ok(root)) = (base.canonicalize(), self.root.canonicalize()) else {
            return String::new();
        };
        let dir: &Path = if root.is_file() {
            root.parent().unwrap_or(&root)
        } else {
            &root
        };
        let offset = relative_name(&base, dir);
        if offset.is_empty() || offset == "." {
            String::new()
        } else if offset.starts_with("..") || Path::new(&offset).is_absolute() {
            tracing::debug!(root = %root.display(), base = %base.display(), "target is outside the name root");
            String::new()
        } else {
            format!("{}/", offset)
        }
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if !self.options.include_hidden && name.starts_with('.') {
            return false;
        }
        if entry.file_type().is_dir()
            && self
                .options
                .exclude_dirs
                .iter()
                .any(|d| name.eq_ignore_ascii_case(d))
        {
            return false;
        }
        true
    }
}

impl TargetSource for DirectorySource {
    fn enumerate(&self) -> Result<Enumeration, ScanFailure> {
        let prefix = self.name_prefix();
        // A single file is a valid target of one unit.
        if self.root.is_file() {
            let name = self
                .root
                .file_name()
                .map(|n| format!("{}{}", prefix, n.to_string_lossy()))
                .unwrap_or_default();
            return Ok(Enumeration {
                units: vec![ScanUnit::new(self.root.clone(), name)],
                errors: Vec::new(),
            });
        }
        fs::read_dir(&self.root).map_err(|source| ScanFailure::Enumeration {
            path: self.root.clone(),
            source,
        })?;

        let mut out = Enumeration::default();
        let walker = WalkDir::new(&self.root).sort_by_file_name();
        for entry in walker.into_iter().filter_entry(|e| self.should_descend(e)) {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let walked = relative_name(&self.root, entry.path());
                    if self.options.keeps_file(&walked, entry.path()) {
                        let name = format!("{}{}", prefix, walked);
                        out.units.push(ScanUnit::new(entry.into_path(), name));
                    }
                }
                Err(err) => {
                    let where_ = err
                        .path()
                        .map(|p| relative_name(&self.root, p))
                        .unwrap_or_default();
                    tracing::warn!(path = %where_, "skipping unreadable entry: {}", err);
                    out.errors
                        .push(ScanError::new(format!("Could not enumerate: {}", where_)));
                }
            }
        }
        tracing::debug!(units = out.units.len(), root = %self.root.display(), "enumerated target");
        Ok(out)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// A fixed list of units, for targets whose files were materialized by a
/// collaborator (an extracted image layer, a set of files touched by a diff).
#[derive(Debug, Clone, Default)]
pub struct UnitList {
    label: String,
    units: Vec<ScanUnit>,
}

impl UnitList {
    pub fn new(label: impl Into<String>, units: Vec<ScanUnit>) -> Self {
        Self {
            label: label.into(),
            units,
        }
    }
}

impl TargetSource for UnitList {
    fn enumerate(&self) -> Result<Enumeration, ScanFailure> {
        Ok(Enumeration {
            units: self.units.clone(),
            errors: Vec::new(),
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Root-relative path with forward slashes.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_walk_skips_excluded_dirs_hidden_and_extensions() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("src/a.rs"), "a").unwrap();
        fs::write(root.join("src/nested/b.rs"), "b").unwrap();
        fs::write(root.join("src/logo.PNG"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".hidden/secret"), "x").unwrap();
        fs::write(root.join(".env"), "x").unwrap();

        let e = DirectorySource::new(root).enumerate().unwrap();
        let names: Vec<&str> = e.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["src/a.rs", "src/nested/b.rs"]);
        assert!(e.errors.is_empty());
    }

    #[test]
    fn test_include_hidden_and_globs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("gen")).unwrap();
        fs::write(root.join(".env"), "x").unwrap();
        fs::write(root.join("gen/out.rs"), "x").unwrap();
        fs::write(root.join("main.rs"), "x").unwrap();

        let opts = WalkOptions {
            include_hidden: true,
            ..Default::default()
        }
        .with_exclude_globs(["gen/**"])
        .unwrap();
        let e = DirectorySource::new(root).with_options(opts).enumerate().unwrap();
        let names: Vec<&str> = e.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec![".env", "main.rs"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = DirectorySource::new(dir.path().join("nope"))
            .enumerate()
            .unwrap_err();
        assert!(matches!(err, ScanFailure::Enumeration { .. }));
    }

    #[test]
    fn test_single_file_target() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("one.txt");
        fs::write(&f, "x").unwrap();
        let e = DirectorySource::new(&f).enumerate().unwrap();
        assert_eq!(e.units.len(), 1);
        assert_eq!(e.units[0].name, "one.txt");
    }

    #[test]
    fn test_names_are_relative_to_name_root() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("src/gen")).unwrap();
        fs::write(root.join("src/a.rs"), "a").unwrap();
        fs::write(root.join("src/nested/b.rs"), "b").unwrap();
        fs::write(root.join("src/gen/c.rs"), "c").unwrap();

        let opts = WalkOptions::default().with_exclude_globs(["gen/**"]).unwrap();
        let e = DirectorySource::new(root.join("src"))
            .with_options(opts)
            .with_name_root(root)
            .enumerate()
            .unwrap();
        let names: Vec<&str> = e.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["src/a.rs", "src/nested/b.rs"]);

        let single = DirectorySource::new(root.join("src/nested/b.rs"))
            .with_name_root(root)
            .enumerate()
            .unwrap();
        assert_eq!(single.units[0].name, "src/nested/b.rs");

        // Same directory as the name root: no prefix.
        let same = DirectorySource::new(root.join("src"))
            .with_name_root(root.join("src"))
            .enumerate()
            .unwrap();
        assert_eq!(same.units[0].name, "a.rs");
    }
}
