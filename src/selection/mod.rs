//! File selection
//!
//! Resolves a [`FileSelectionSpec`] into the ordered set of source files an
//! ingestion call should process. Precedence is explicit files, then include
//! patterns, then everything discoverable; excludes are applied last and the
//! recognized-extension filter after that.

pub mod pattern;

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, VaultError};
use crate::types::FileSelectionSpec;

pub use pattern::{matches, Pattern};

/// Directory listing capability used by the selector
pub trait DirectoryLister {
    /// All discoverable files below `base`
    fn list_files(&self, base: &Path) -> Result<Vec<PathBuf>>;

    /// Whether `path` names an existing regular file
    fn is_file(&self, path: &Path) -> bool;
}

/// Lists files from the local filesystem
#[derive(Debug, Clone)]
pub struct FsLister {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Follow .gitignore / .ignore rules
    pub respect_gitignore: bool,
}

impl Default for FsLister {
    fn default() -> Self {
        Self {
            recursive: true,
            respect_gitignore: true,
        }
    }
}

impl DirectoryLister for FsLister {
    fn list_files(&self, base: &Path) -> Result<Vec<PathBuf>> {
        if !base.is_dir() {
            return Err(VaultError::io(
                base,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let mut walker = WalkBuilder::new(base);
        walker
            .hidden(false)
            .parents(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore);
        if !self.recursive {
            walker.max_depth(Some(1));
        }

        let mut files = Vec::new();
        for entry in walker.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("Error walking directory: {}", err);
                    continue;
                }
            };
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Compute the final file set for a selection spec.
///
/// `extensions` is the recognized source-extension set (without dots).
/// An empty result is an error so callers can tell a misconfigured
/// selection apart from an up-to-date index.
pub fn select(
    spec: &FileSelectionSpec,
    lister: &dyn DirectoryLister,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let includes = pattern::compile_all(&spec.include_patterns)?;
    let excludes = pattern::compile_all(&spec.exclude_patterns)?;

    let candidates: Vec<PathBuf> = if !spec.explicit_files.is_empty() {
        spec.explicit_files
            .iter()
            .map(|f| resolve_path(&spec.base_dir, f))
            .filter(|p| {
                let exists = lister.is_file(p);
                if !exists {
                    debug!("Explicit file does not exist: {}", p.display());
                }
                exists
            })
            .collect()
    } else if !includes.is_empty() {
        lister
            .list_files(&spec.base_dir)?
            .into_iter()
            .filter(|p| {
                let rel = match_path(&spec.base_dir, p);
                includes.iter().any(|i| i.matches(&rel))
            })
            .collect()
    } else {
        lister.list_files(&spec.base_dir)?
    };

    let selected: BTreeSet<PathBuf> = candidates
        .into_iter()
        .filter(|p| {
            let rel = match_path(&spec.base_dir, p);
            match excludes.iter().find(|e| e.matches(&rel)) {
                Some(e) => {
                    debug!("Excluded {} by '{}'", rel, e.as_str());
                    false
                }
                None => true,
            }
        })
        .filter(|p| has_recognized_extension(p, extensions))
        .collect();

    if selected.is_empty() {
        return Err(VaultError::NoFilesMatched {
            base_dir: spec.base_dir.clone(),
        });
    }

    Ok(selected.into_iter().collect())
}

/// Whether the file's extension is in the recognized set
pub fn has_recognized_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// The string patterns are evaluated against: the path relative to the
/// base directory, or the whole path for files outside it.
fn match_path(base_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Resolve a possibly relative path against the base directory, dropping
/// `.` components and folding `..` lexically.
pub fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug, Default, Deserialize)]
struct ProjectFileList {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

/// Name of the project file whose lists drive selection
pub const PROJECT_CONFIG: &str = "tsconfig.json";

/// Absolute, lexically normalized form of `path`
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(resolve_path(Path::new("/"), path));
    }
    let cwd = std::env::current_dir().map_err(|e| VaultError::io(path, e))?;
    Ok(resolve_path(&cwd, path))
}

/// Nearest `tsconfig.json` in the target's directory or one of its
/// ancestors. The search starts at `target` when it is a directory and at
/// its parent otherwise, and stops below the filesystem root.
pub fn find_project_config(target: &Path) -> Option<PathBuf> {
    let mut dir = if target.is_dir() {
        target
    } else {
        target.parent()?
    };
    loop {
        let parent = dir.parent()?;
        let candidate = dir.join(PROJECT_CONFIG);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = parent;
    }
}

/// Build the selection spec for an add or inspect target.
///
/// The nearest project config at or above the target supplies the `files`,
/// `include` and `exclude` lists, and its directory becomes the base that
/// patterns are matched against. Without one the base is the target
/// directory (or a file target's parent). A file target is always selected
/// explicitly. Callers restrict listing to the target with [`ScopedLister`].
pub fn spec_for_target(target: &Path) -> Result<FileSelectionSpec> {
    let target = absolute(target)?;
    let is_dir = target.is_dir();
    if !is_dir && !target.is_file() {
        return Err(VaultError::io(
            &target,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        ));
    }

    let fallback_base = if is_dir {
        target.clone()
    } else {
        target.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let mut spec = match find_project_config(&target) {
        Some(config_path) => {
            let base = config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| fallback_base.clone());
            read_project_lists(&config_path, FileSelectionSpec::new(base))
        }
        None => FileSelectionSpec::new(fallback_base),
    };

    if !is_dir {
        spec.explicit_files = vec![target];
        spec.include_patterns.clear();
    }
    Ok(spec)
}

fn read_project_lists(config_path: &Path, mut spec: FileSelectionSpec) -> FileSelectionSpec {
    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(err) => {
            warn!("Could not read {}: {}", config_path.display(), err);
            return spec;
        }
    };

    match serde_json::from_str::<ProjectFileList>(&content) {
        Ok(list) => {
            debug!("Using file lists from {}", config_path.display());
            spec.explicit_files = list.files.into_iter().map(PathBuf::from).collect();
            spec.include_patterns = list.include;
            spec.exclude_patterns = list.exclude;
        }
        Err(err) => {
            warn!(
                "Could not read file lists from {}, selecting all files: {}",
                config_path.display(),
                err
            );
        }
    }
    spec
}

/// Restricts another lister to the files at or below `scope`.
///
/// Selection lists the project base, which may be an ancestor of the
/// directory being added; only the added directory's files are wanted.
pub struct ScopedLister<L> {
    inner: L,
    scope: PathBuf,
}

impl<L: DirectoryLister> ScopedLister<L> {
    pub fn new(inner: L, scope: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }
}

impl<L: DirectoryLister> DirectoryLister for ScopedLister<L> {
    fn list_files(&self, base: &Path) -> Result<Vec<PathBuf>> {
        if self.scope.starts_with(base) {
            return self.inner.list_files(&self.scope);
        }
        Ok(self
            .inner
            .list_files(base)?
            .into_iter()
            .filter(|p| p.starts_with(&self.scope))
            .collect())
    }

    fn is_file(&self, path: &Path) -> bool {
        path.starts_with(&self.scope) && self.inner.is_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Lister over a fixed set of paths
    struct MemoryLister {
        files: Vec<PathBuf>,
    }

    impl MemoryLister {
        fn new(files: &[&str]) -> Self {
            Self {
                files: files.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl DirectoryLister for MemoryLister {
        fn list_files(&self, base: &Path) -> Result<Vec<PathBuf>> {
            Ok(self
                .files
                .iter()
                .filter(|f| f.starts_with(base))
                .cloned()
                .collect())
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.iter().any(|f| f == path)
        }
    }

    fn exts() -> Vec<String> {
        ["ts", "tsx", "js", "jsx"].iter().map(|s| s.to_string()).collect()
    }

    fn paths(v: &[&str]) -> Vec<PathBuf> {
        v.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let lister = MemoryLister::new(&["/src/a.ts", "/src/a.test.ts"]);
        let spec = FileSelectionSpec {
            include_patterns: vec!["src/**/*.ts".to_string()],
            exclude_patterns: vec!["**/*.test.ts".to_string()],
            ..FileSelectionSpec::new("/")
        };
        let selected = select(&spec, &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/src/a.ts"]));
    }

    #[test]
    fn test_no_patterns_selects_everything_recognized() {
        let lister = MemoryLister::new(&["/p/b.ts", "/p/a.js", "/p/readme.md", "/p/x/c.tsx"]);
        let selected = select(&FileSelectionSpec::new("/p"), &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/p/a.js", "/p/b.ts", "/p/x/c.tsx"]));
    }

    #[test]
    fn test_explicit_files_take_precedence() {
        let lister = MemoryLister::new(&["/p/a.ts", "/p/b.ts", "/p/c.ts"]);
        let spec = FileSelectionSpec {
            explicit_files: paths(&["b.ts", "./sub/../c.ts", "missing.ts"]),
            include_patterns: vec!["a.ts".to_string()],
            ..FileSelectionSpec::new("/p")
        };
        let selected = select(&spec, &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/p/b.ts", "/p/c.ts"]));
    }

    #[test]
    fn test_explicit_files_still_filtered_by_exclude_and_extension() {
        let lister = MemoryLister::new(&["/p/a.ts", "/p/notes.txt", "/p/gen/g.ts"]);
        let spec = FileSelectionSpec {
            explicit_files: paths(&["a.ts", "notes.txt", "gen/g.ts"]),
            exclude_patterns: vec!["gen/**".to_string()],
            ..FileSelectionSpec::new("/p")
        };
        let selected = select(&spec, &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/p/a.ts"]));
    }

    #[test]
    fn test_bare_include_selects_top_level_only() {
        let lister = MemoryLister::new(&["/p/a.ts", "/p/sub/b.ts"]);
        let spec = FileSelectionSpec {
            include_patterns: vec!["*.ts".to_string()],
            ..FileSelectionSpec::new("/p")
        };
        let selected = select(&spec, &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/p/a.ts"]));
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let lister = MemoryLister::new(&["/p/readme.md"]);
        let err = select(&FileSelectionSpec::new("/p"), &lister, &exts()).unwrap_err();
        assert!(matches!(err, VaultError::NoFilesMatched { .. }));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let lister = MemoryLister::new(&["/p/a.ts"]);
        let spec = FileSelectionSpec {
            exclude_patterns: vec!["{oops".to_string()],
            ..FileSelectionSpec::new("/p")
        };
        let err = select(&spec, &lister, &exts()).unwrap_err();
        assert!(matches!(err, VaultError::InvalidPattern { .. }));
    }

    #[test]
    fn test_fs_lister_recursive_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.ts"), "export const b = 2;").unwrap();

        let recursive = FsLister {
            recursive: true,
            respect_gitignore: false,
        };
        let found: HashSet<PathBuf> = recursive.list_files(dir.path()).unwrap().into_iter().collect();
        assert!(found.contains(&dir.path().join("a.ts")));
        assert!(found.contains(&dir.path().join("sub/b.ts")));

        let flat = FsLister {
            recursive: false,
            respect_gitignore: false,
        };
        let found = flat.list_files(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("a.ts")]);
    }

    #[test]
    fn test_spec_reads_tsconfig_lists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "compilerOptions": {}, "include": ["src/**/*"], "exclude": ["**/*.spec.ts"] }"#,
        )
        .unwrap();

        let spec = spec_for_target(dir.path()).unwrap();
        assert_eq!(spec.base_dir, dir.path());
        assert_eq!(spec.include_patterns, vec!["src/**/*".to_string()]);
        assert_eq!(spec.exclude_patterns, vec!["**/*.spec.ts".to_string()]);
        assert!(spec.explicit_files.is_empty());
    }

    #[test]
    fn test_spec_ignores_unreadable_tsconfig() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tsconfig.json"), "{ not json").unwrap();
        let spec = spec_for_target(dir.path()).unwrap();
        assert_eq!(spec, FileSelectionSpec::new(dir.path()));
    }

    #[test]
    fn test_project_config_found_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src/util");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("a.ts"), "export const a = 1;").unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "exclude": ["**/*.test.ts"] }"#,
        )
        .unwrap();

        let config = dir.path().join("tsconfig.json");
        assert_eq!(find_project_config(&nested), Some(config.clone()));
        assert_eq!(find_project_config(&nested.join("a.ts")), Some(config));

        let spec = spec_for_target(&nested).unwrap();
        assert_eq!(spec.base_dir, dir.path());
        assert_eq!(spec.exclude_patterns, vec!["**/*.test.ts".to_string()]);

        let file_spec = spec_for_target(&nested.join("a.ts")).unwrap();
        assert_eq!(file_spec.base_dir, dir.path());
        assert_eq!(file_spec.explicit_files, vec![nested.join("a.ts")]);
    }

    #[test]
    fn test_nearest_project_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("packages/core");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
        std::fs::write(package.join("tsconfig.json"), "{}").unwrap();

        assert_eq!(
            find_project_config(&package),
            Some(package.join("tsconfig.json"))
        );
        assert_eq!(spec_for_target(&package).unwrap().base_dir, package);
    }

    #[test]
    fn test_spec_for_missing_target_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = spec_for_target(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, VaultError::Io { .. }));
    }

    #[test]
    fn test_scoped_lister_limits_listing_to_scope() {
        let lister = ScopedLister::new(
            MemoryLister::new(&["/p/a.ts", "/p/src/b.ts", "/p/src/c.test.ts"]),
            "/p/src",
        );
        let spec = FileSelectionSpec {
            exclude_patterns: vec!["**/*.test.ts".to_string()],
            ..FileSelectionSpec::new("/p")
        };
        let selected = select(&spec, &lister, &exts()).unwrap();
        assert_eq!(selected, paths(&["/p/src/b.ts"]));
        assert!(!lister.is_file(Path::new("/p/a.ts")));
    }
}
