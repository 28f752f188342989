//! Locating artifact files on disk from a glob pattern.
//!
//! A pattern is split into a literal directory prefix and a glob remainder;
//! only the prefix directory is walked. `*` does not cross `/`, `**` does.

use std::path::{Path, PathBuf};

use bibliothek_shared::{BibliothekError, MatchOptions, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Resolve `pattern` and require exactly one matching file.
pub fn locate_one(pattern: &str, options: &MatchOptions) -> Result<PathBuf> {
    let mut matches = locate(pattern, options)?;
    if matches.len() != 1 {
        return Err(BibliothekError::AmbiguousArtifact {
            pattern: pattern.to_string(),
            matches,
        });
    }
    Ok(matches.remove(0))
}

/// Resolve `pattern` to all matching files (directories excluded), sorted.
pub fn locate(pattern: &str, options: &MatchOptions) -> Result<Vec<PathBuf>> {
    let base = match &options.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().map_err(|e| BibliothekError::io(".", e))?,
    };

    let (prefix, remainder) = split_pattern(pattern);
    let root = if prefix.is_absolute() {
        prefix
    } else if prefix == Path::new(".") {
        base.clone()
    } else {
        base.join(prefix)
    };

    if !root.is_dir() {
        debug!(?root, pattern, "pattern root does not exist");
        return Ok(Vec::new());
    }

    let matcher = compile(&remainder, options.nocase)?;
    let ignore = compile_set(&options.ignore, options.nocase)?;
    let allow_hidden = options.dot || remainder.split('/').any(|c| c.starts_with('.'));
    let max_depth = if remainder.contains("**") {
        usize::MAX
    } else {
        remainder.split('/').count()
    };

    let mut matches = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(options.follow)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| allow_hidden || entry.depth() == 0 || !is_hidden(entry.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            BibliothekError::io(path, e.into())
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Ok(relative) = path.strip_prefix(&root) else {
            continue;
        };
        if !matcher.is_match(relative) {
            continue;
        }

        let from_base = path.strip_prefix(&base).unwrap_or(path);
        if ignore.is_match(from_base) {
            debug!(?path, "ignored by pattern");
            continue;
        }

        matches.push(path.to_path_buf());
    }

    Ok(matches)
}

/// Split a pattern into its literal leading directories and the glob rest.
///
/// The last component always belongs to the rest, so a fully literal
/// pattern still matches exactly that file.
fn split_pattern(pattern: &str) -> (PathBuf, String) {
    let components: Vec<&str> = pattern.split('/').collect();
    let last = components.len() - 1;

    let literal_len = components[..last]
        .iter()
        .take_while(|c| !c.contains(GLOB_META))
        .count();

    let mut prefix = components[..literal_len].join("/");
    if prefix.is_empty() && pattern.starts_with('/') {
        prefix.push('/');
    }
    let remainder = components[literal_len..]
        .iter()
        .filter(|c| !c.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");

    let prefix = if prefix.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(prefix)
    };
    (prefix, remainder)
}

fn compile(pattern: &str, nocase: bool) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(nocase)
        .build()
        .map_err(|e| BibliothekError::config(format!("invalid artifact pattern '{pattern}': {e}")))?
        .compile_matcher())
}

fn compile_set(patterns: &[String], nocase: bool) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(nocase)
            .build()
            .map_err(|e| {
                BibliothekError::config(format!("invalid ignore pattern '{pattern}': {e}"))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BibliothekError::config(format!("invalid ignore patterns: {e}")))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel.as_bytes()).unwrap();
    }

    fn options(root: &Path) -> MatchOptions {
        MatchOptions {
            cwd: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn split_literal_prefix() {
        let (prefix, rest) = split_pattern("build/libs/*.jar");
        assert_eq!(prefix, PathBuf::from("build/libs"));
        assert_eq!(rest, "*.jar");

        let (prefix, rest) = split_pattern("**/*.zip");
        assert_eq!(prefix, PathBuf::from("."));
        assert_eq!(rest, "**/*.zip");

        let (prefix, rest) = split_pattern("/opt/out/app.tar.gz");
        assert_eq!(prefix, PathBuf::from("/opt/out"));
        assert_eq!(rest, "app.tar.gz");
    }

    #[test]
    fn single_star_stays_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "build/libs/foo.jar");
        touch(dir.path(), "build/libs/nested/bar.jar");

        let found = locate("build/libs/*.jar", &options(dir.path())).unwrap();
        assert_eq!(found, vec![dir.path().join("build/libs/foo.jar")]);
    }

    #[test]
    fn double_star_recurses() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/one.zip");
        touch(dir.path(), "a/b/two.zip");

        let found = locate("**/*.zip", &options(dir.path())).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn directories_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "out/app.jar/inner.txt");
        touch(dir.path(), "out/real.jar");

        let found = locate("out/*.jar", &options(dir.path())).unwrap();
        assert_eq!(found, vec![dir.path().join("out/real.jar")]);
    }

    #[test]
    fn hidden_files_need_dot_option() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "out/.cache/app.jar");

        assert!(locate("out/**/*.jar", &options(dir.path())).unwrap().is_empty());

        let with_dot = MatchOptions {
            dot: true,
            ..options(dir.path())
        };
        assert_eq!(locate("out/**/*.jar", &with_dot).unwrap().len(), 1);
    }

    #[test]
    fn ignore_and_nocase() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "dist/App.EXE");
        touch(dir.path(), "dist/App-debug.exe");

        let opts = MatchOptions {
            nocase: true,
            ignore: vec!["dist/*-debug.exe".into()],
            ..options(dir.path())
        };
        let found = locate_one("dist/*.exe", &opts).unwrap();
        assert_eq!(found, dir.path().join("dist/App.EXE"));
    }

    #[test]
    fn zero_or_many_matches_are_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "libs/a.jar");
        touch(dir.path(), "libs/b.jar");

        let err = locate_one("libs/*.jar", &options(dir.path())).unwrap_err();
        match err {
            BibliothekError::AmbiguousArtifact { matches, .. } => assert_eq!(matches.len(), 2),
            other => panic!("unexpected error: {other}"),
        }

        let err = locate_one("missing/*.jar", &options(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            BibliothekError::AmbiguousArtifact { matches: ref found, .. } if found.is_empty()
        ));
    }
}
