//! Shell-style glob matching with path anchoring rules
//!
//! Syntax is `*`, `?`, `**` and `{a,b}`, matched case-insensitively with
//! `*` and `?` never crossing a `/`. How much of the path a pattern is
//! compared against depends on its shape:
//!
//! - `/src/*.ts` (leading separator): the whole path, anchored at the root
//! - `src/**/*.ts` (contains a separator): any suffix of the path's segments
//! - `*.ts` (no separator): only a path that is itself a single segment

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Root,
    Suffix,
    Segment,
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    anchor: Anchor,
    matcher: GlobMatcher,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let normalized = normalize(pattern);
        let anchor = if normalized.starts_with('/') {
            Anchor::Root
        } else if normalized.contains('/') {
            Anchor::Suffix
        } else {
            Anchor::Segment
        };

        let glob = GlobBuilder::new(&normalized)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| VaultError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.kind().to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            anchor,
            matcher: glob.compile_matcher(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        match self.anchor {
            Anchor::Root => {
                if path.starts_with('/') {
                    self.matcher.is_match(&path)
                } else {
                    self.matcher.is_match(format!("/{}", path))
                }
            }
            Anchor::Suffix => {
                let segments: Vec<&str> = path.split('/').collect();
                (0..segments.len()).any(|i| self.matcher.is_match(segments[i..].join("/")))
            }
            Anchor::Segment => !path.contains('/') && self.matcher.is_match(&path),
        }
    }
}

/// Check a path against a single pattern. Invalid patterns match nothing.
pub fn matches(path: &str, pattern: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(path),
        Err(err) => {
            tracing::warn!("{}", err);
            false
        }
    }
}

/// Compile a list of patterns, failing on the first invalid one
pub fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| Pattern::new(p)).collect()
}

/// Unify separators to `/` and collapse repeated separators
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if !prev_sep {
                out.push(c);
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }
    out
}
