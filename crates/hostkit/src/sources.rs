//! Layered configuration sources.
//!
//! Tool configuration fragments are looked up in prioritized directories:
//! built-in sources, the home directory, the working directory and the user
//! configuration directory. Later directories win over earlier ones.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A configuration fragment: file name and path.
pub type Source = (String, PathBuf);

/// Canonicalized existing source directories, in ascending priority.
///
/// A directory listed twice keeps its highest priority position.
pub fn source_dirs(builtin: Option<&Path>, home: &Path, user_config: Option<&Path>) -> Vec<PathBuf> {
    let candidates = builtin
        .into_iter()
        .chain([home, Path::new(".")])
        .chain(user_config);

    let mut dirs: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        match candidate.canonicalize() {
            Ok(dir) if dir.is_dir() => {
                dirs.retain(|d| d != &dir);
                dirs.push(dir);
            }
            Ok(_) => log::debug!("Ignoring source {}: not a directory", candidate.display()),
            Err(e) => log::debug!("Ignoring source {}: {e}", candidate.display()),
        }
    }
    dirs
}

/// Primary provider: the first comma separated token.
pub fn primary_provider(provider: &str) -> &str {
    provider.split(',').next().unwrap_or_default().trim()
}

/// Lowercase fragment name prefixes to use for a host.
pub fn source_filters(provider: &str, application_type: Option<&str>) -> Vec<String> {
    ["common", primary_provider(provider), application_type.unwrap_or_default()]
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether a lowercase file name is selected by `filters` (first dot token).
pub fn matches_filters(name: &str, filters: &[String]) -> bool {
    let stem = name.split('.').next().unwrap_or_default();
    filters.iter().any(|f| f == stem)
}

/// Files of `dirs` selected by `filters` and extension lists.
///
/// Names are compared and returned lowercase, so fragments differing only in
/// case share one name. Results keep directory priority order and are sorted
/// by name inside each directory.
pub fn list_sources(
    dirs: &[PathBuf],
    filters: &[String],
    include: &[&str],
    exclude: &[&str],
) -> Result<Vec<Source>> {
    let mut sources = Vec::new();

    for dir in dirs {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if matches_filters(&name, filters)
                && include.iter().any(|ext| name.ends_with(ext))
                && !exclude.iter().any(|ext| name.ends_with(ext))
            {
                found.push((name, path));
            }
        }
        found.sort();
        sources.extend(found);
    }

    log::debug!("Found {} source(s) for {:?}", sources.len(), filters);
    Ok(sources)
}

// ============================================================================
// Deep merge
// ============================================================================

/// Merge `update` into `target`: mappings recursively, anything else replaced.
pub fn deep_merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target), serde_json::Value::Object(update)) => {
            for (key, value) in update {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge_json(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, update) => *target = update,
    }
}

/// Merge `update` into `target`: mappings recursively, anything else replaced.
pub fn deep_merge_yaml(target: &mut serde_yaml_ng::Value, update: serde_yaml_ng::Value) {
    match (target, update) {
        (serde_yaml_ng::Value::Mapping(target), serde_yaml_ng::Value::Mapping(update)) => {
            for (key, value) in update {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_mapping() && value.is_mapping() => {
                        deep_merge_yaml(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, update) => *target = update,
    }
}

/// Deep merge JSON files in order.
pub fn merge_json(sources: &[Source]) -> Result<serde_json::Value> {
    let mut merged = serde_json::Value::Object(serde_json::Map::new());
    for (_, path) in sources {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let value = serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("Invalid JSON in {}: {e}", path.display())))?;
        deep_merge_json(&mut merged, value);
    }
    Ok(merged)
}

// ============================================================================
// Links
// ============================================================================

/// Link `dst` to the canonical path of `src`. An existing `dst` is kept.
pub fn symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = src.canonicalize().map_err(|e| Error::io(src, e))?;

    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(&target, dst);
    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(&target, dst)
    } else {
        std::os::windows::fs::symlink_file(&target, dst)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::io(dst, e)),
    }
}

/// Link `dst` to `src`, replacing any existing file or link.
pub fn replace_symlink(src: &Path, dst: &Path) -> Result<()> {
    remove_entry(dst)?;
    symlink(src, dst)
}

/// Remove a file, link or directory if present. Links are never followed.
pub fn remove_entry(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::io(path, e))
}

/// Write `value` as pretty JSON.
pub fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// Read a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_source_filters() {
        assert_eq!(
            source_filters("AWS_F1,eu-west-1", Some("container_service")),
            vec!["common", "aws_f1", "container_service"]
        );
        assert_eq!(source_filters("", None), vec!["common"]);
        assert_eq!(primary_provider("aws_f1,eu-west-1"), "aws_f1");
    }

    #[test]
    fn test_source_dirs_skips_missing_and_dedups() {
        let dir = TempDir::new().unwrap();
        let builtin = dir.path().join("builtin");
        let home = dir.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let dirs = source_dirs(Some(&builtin), &home, Some(&home));
        let home = home.canonicalize().unwrap();
        let cwd = Path::new(".").canonicalize().unwrap();

        assert!(!dirs.iter().any(|d| d.ends_with("builtin")));
        assert_eq!(dirs.last(), Some(&home));
        assert_eq!(dirs.iter().filter(|d| **d == home).count(), 1);
        assert!(dirs.contains(&cwd));
    }

    #[test]
    fn test_list_sources_filters() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "common.tf", "");
        touch(dir.path(), "AWS_F1.tf.json", "{}");
        touch(dir.path(), "aws_f1.tfvars", "");
        touch(dir.path(), "ovh.tf", "");
        touch(dir.path(), "common.json", "{}");
        touch(dir.path(), "commonality.tf", "");
        fs::create_dir(dir.path().join("common.tf.d")).unwrap();

        let filters = source_filters("aws_f1", None);
        let sources = list_sources(
            &[dir.path().to_path_buf()],
            &filters,
            &[".tf", ".tfvars", ".tf.json", ".tfvars.json"],
            &[],
        )
        .unwrap();
        let names: Vec<_> = sources.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["aws_f1.tf.json", "aws_f1.tfvars", "common.tf"]);
    }

    #[test]
    fn test_list_sources_ignores_case() {
        let low = TempDir::new().unwrap();
        let high = TempDir::new().unwrap();
        touch(low.path(), "common.tf", "");
        let common = touch(high.path(), "Common.tf", "");
        touch(high.path(), "AWS.TF", "");

        let sources = list_sources(
            &[low.path().to_path_buf(), high.path().to_path_buf()],
            &["common".to_string(), "aws".to_string()],
            &[".tf"],
            &[],
        )
        .unwrap();
        let names: Vec<_> = sources.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["common.tf", "aws.tf", "common.tf"]);

        // Collapsing by name keeps the higher priority copy
        let deduped: std::collections::BTreeMap<_, _> = sources.into_iter().collect();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped["common.tf"], common);
    }

    #[test]
    fn test_list_sources_excludes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "common.json", "{}");
        touch(dir.path(), "common.tf.json", "{}");
        touch(dir.path(), "common.tfvars.json", "{}");

        let sources = list_sources(
            &[dir.path().to_path_buf()],
            &["common".to_string()],
            &[".json"],
            &[".tf.json", ".tfvars.json"],
        )
        .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].0, "common.json");
    }

    #[test]
    fn test_deep_merge_json() {
        let mut target = json!({"a": {"x": 1, "y": [1, 2]}, "b": 1});
        deep_merge_json(&mut target, json!({"a": {"y": [3], "z": true}, "b": {"c": 2}}));
        assert_eq!(target, json!({"a": {"x": 1, "y": [3], "z": true}, "b": {"c": 2}}));
    }

    #[test]
    fn test_deep_merge_yaml() {
        let mut target: serde_yaml_ng::Value = serde_yaml_ng::from_str("a:\n  x: 1\n  y: 1\nlist: [1, 2]\n").unwrap();
        let update: serde_yaml_ng::Value = serde_yaml_ng::from_str("a:\n  y: 2\nlist: [3]\n").unwrap();
        deep_merge_yaml(&mut target, update);
        let expected: serde_yaml_ng::Value = serde_yaml_ng::from_str("a:\n  x: 1\n  y: 2\nlist: [3]\n").unwrap();
        assert_eq!(target, expected);
    }

    #[test]
    fn test_merge_json_invalid() {
        let dir = TempDir::new().unwrap();
        let bad = touch(dir.path(), "common.json", "{");
        let err = merge_json(&[("common.json".into(), bad)]).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_and_replace() {
        let dir = TempDir::new().unwrap();
        let first = touch(dir.path(), "first", "1");
        let second = touch(dir.path(), "second", "2");
        let link = dir.path().join("link");

        symlink(&first, &link).unwrap();
        // Existing link is kept
        symlink(&second, &link).unwrap();
        assert_eq!(fs::read_to_string(&link).unwrap(), "1");

        replace_symlink(&second, &link).unwrap();
        assert_eq!(fs::read_to_string(&link).unwrap(), "2");

        remove_entry(&link).unwrap();
        assert!(!link.exists());
        assert!(second.exists());
    }
}
