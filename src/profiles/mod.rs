//! Profile discovery, loading, and inheritance resolution.
//!
//! Profiles are YAML or JSON files discovered across an ordered list of
//! directories; the first match by name wins. Resolved profiles (inheritance
//! flattened) are cached by name.

mod resolve;

pub use resolve::{detect_conflicts, merge_into_child, resolve_conflicts};

use crate::error::{Error, Result};
use crate::models::profile::{ConflictStrategy, RedactionProfile};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Profile file extensions recognized during discovery.
const PROFILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Serialization format for saved profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    Yaml,
    Json,
}

/// Loads, validates, resolves, and caches redaction profiles.
pub struct ProfileManager {
    search_dirs: Vec<PathBuf>,
    cache: RwLock<HashMap<String, RedactionProfile>>,
}

impl ProfileManager {
    /// Create a manager over an ordered list of search directories.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// List profile names discoverable across the search path.
    ///
    /// Deduplicates by name; an earlier directory shadows a later one.
    pub fn list(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for dir in &self.search_dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                if !PROFILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if seen.insert(stem.to_string()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        names.sort();
        names
    }

    /// Find the file backing a profile name, first match wins.
    fn find_profile_file(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.search_dirs {
            for ext in PROFILE_EXTENSIONS {
                let candidate = dir.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Load a profile by name, optionally resolving inheritance.
    ///
    /// Resolved profiles are cached; raw loads bypass the cache.
    pub fn load(&self, name: &str, resolve_inheritance: bool) -> Result<RedactionProfile> {
        if resolve_inheritance {
            if let Some(cached) = self
                .cache
                .read()
                .map_err(|_| Error::Internal("profile cache lock poisoned".into()))?
                .get(name)
            {
                debug!("Profile cache hit for '{}'", name);
                return Ok(cached.clone());
            }
        }

        let raw = self.load_raw(name)?;

        let profile = if resolve_inheritance {
            let mut seen = HashSet::new();
            let resolved = self.resolve(raw, &mut seen)?;
            self.cache
                .write()
                .map_err(|_| Error::Internal("profile cache lock poisoned".into()))?
                .insert(name.to_string(), resolved.clone());
            resolved
        } else {
            raw
        };

        Ok(profile)
    }

    /// Load a profile file without touching inheritance or the cache.
    fn load_raw(&self, name: &str) -> Result<RedactionProfile> {
        let path = self
            .find_profile_file(name)
            .ok_or_else(|| Error::profile_validation(format!("profile '{}' not found", name)))?;

        let profile = load_profile_file(&path)?;
        let errors = profile.validate();
        if !errors.is_empty() {
            return Err(Error::profile_validation(format!(
                "profile '{}' is invalid: {}",
                name,
                errors.join("; ")
            )));
        }
        Ok(profile)
    }

    /// Depth-first inheritance resolution with cycle detection.
    fn resolve(
        &self,
        profile: RedactionProfile,
        seen: &mut HashSet<String>,
    ) -> Result<RedactionProfile> {
        if !seen.insert(profile.name.clone()) {
            return Err(Error::profile_validation(format!(
                "circular inheritance involving '{}'",
                profile.name
            )));
        }

        if profile.inherits_from.is_empty() {
            seen.remove(&profile.name);
            return Ok(profile);
        }

        // Resolve parents recursively, then merge left-to-right: later
        // parents override earlier ones, and the child overlays the result.
        let mut base: Option<RedactionProfile> = None;
        for parent_name in &profile.inherits_from {
            let parent_raw = self.load_raw(parent_name)?;
            let parent = self.resolve(parent_raw, seen)?;
            base = Some(match base {
                None => parent,
                Some(acc) => merge_into_child(acc, parent),
            });
        }

        seen.remove(&profile.name);

        let mut resolved = match base {
            Some(parents) => merge_into_child(parents, profile.clone()),
            None => profile.clone(),
        };
        resolved.name = profile.name;
        resolved.inherits_from.clear();
        Ok(resolved)
    }

    /// Save a profile into a directory under `<name>.<ext>`.
    pub fn save(
        &self,
        profile: &RedactionProfile,
        dir: impl AsRef<Path>,
        format: ProfileFormat,
    ) -> Result<PathBuf> {
        let errors = profile.validate();
        if !errors.is_empty() {
            return Err(Error::profile_validation(errors.join("; ")));
        }

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = match format {
            ProfileFormat::Yaml => {
                let path = dir.join(format!("{}.yaml", profile.name));
                profile.save_yaml(&path)?;
                path
            }
            ProfileFormat::Json => {
                let path = dir.join(format!("{}.json", profile.name));
                profile.save_json(&path)?;
                path
            }
        };
        Ok(path)
    }

    /// Validate a profile, returning one message per problem.
    pub fn validate(&self, profile: &RedactionProfile) -> Vec<String> {
        profile.validate()
    }

    /// Merge several profiles into a composite under a new name.
    ///
    /// Later profiles override earlier ones, mirroring inheritance order.
    pub fn create_composite(&self, names: &[&str], new_name: &str) -> Result<RedactionProfile> {
        if names.is_empty() {
            return Err(Error::profile_validation(
                "composite requires at least one source profile".to_string(),
            ));
        }

        let mut acc: Option<RedactionProfile> = None;
        for name in names {
            let profile = self.load(name, true)?;
            acc = Some(match acc {
                None => profile,
                Some(base) => merge_into_child(base, profile),
            });
        }

        let mut composite = acc.expect("names checked non-empty");
        composite.name = new_name.to_string();
        composite.inherits_from.clear();
        Ok(composite)
    }

    /// Resolve conflicts between two loaded profiles under a strategy.
    pub fn resolve_with_strategy(
        &self,
        a: &str,
        b: &str,
        strategy: ConflictStrategy,
        new_name: &str,
    ) -> Result<RedactionProfile> {
        let left = self.load(a, true)?;
        let right = self.load(b, true)?;
        let mut merged = resolve_conflicts(&left, &right, strategy)?;
        merged.name = new_name.to_string();
        Ok(merged)
    }

    /// Drop all cached resolved profiles.
    pub fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(_) => warn!("profile cache lock poisoned during clear"),
        }
    }
}

/// Load a profile from a YAML or JSON file based on its extension.
pub fn load_profile_file(path: &Path) -> Result<RedactionProfile> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("yaml") | Some("yml") => RedactionProfile::from_yaml_file(path),
        Some("json") => RedactionProfile::from_json_file(path),
        _ => Err(Error::profile_validation(format!(
            "unsupported profile extension for {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_profile(dir: &Path, profile: &RedactionProfile) {
        profile.save_yaml(dir.join(format!("{}.yaml", profile.name))).unwrap();
    }

    fn manager(dir: &Path) -> ProfileManager {
        ProfileManager::new(vec![dir.to_path_buf()])
    }

    #[test]
    fn test_list_and_load() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), &RedactionProfile::named("alpha"));

        let beta = RedactionProfile::named("beta");
        beta.save_json(dir.path().join("beta.json")).unwrap();

        let m = manager(dir.path());
        assert_eq!(m.list(), vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(m.load("alpha", true).unwrap().name, "alpha");
        assert_eq!(m.load("beta", true).unwrap().name, "beta");
        assert!(m.load("gamma", true).is_err());
    }

    #[test]
    fn test_first_directory_wins() {
        let dir1 = tempfile::tempdir().unwrap();
        let dir2 = tempfile::tempdir().unwrap();

        let mut first = RedactionProfile::named("shared");
        first.description = "from dir1".to_string();
        write_profile(dir1.path(), &first);

        let mut second = RedactionProfile::named("shared");
        second.description = "from dir2".to_string();
        write_profile(dir2.path(), &second);

        let m = ProfileManager::new(vec![dir1.path().to_path_buf(), dir2.path().to_path_buf()]);
        assert_eq!(m.load("shared", true).unwrap().description, "from dir1");
    }

    #[test]
    fn test_inheritance_resolution() {
        let dir = tempfile::tempdir().unwrap();

        let mut parent1 = RedactionProfile::named("parent1");
        parent1.visual_rules.insert("face".to_string(), true);
        write_profile(dir.path(), &parent1);

        let mut parent2 = RedactionProfile::named("parent2");
        parent2.visual_rules.insert("signature".to_string(), true);
        write_profile(dir.path(), &parent2);

        let mut child = RedactionProfile::named("child");
        child.visual_rules.insert("barcode".to_string(), true);
        child.inherits_from = vec!["parent1".to_string(), "parent2".to_string()];
        write_profile(dir.path(), &child);

        let resolved = manager(dir.path()).load("child", true).unwrap();
        assert!(resolved.inherits_from.is_empty());
        assert_eq!(resolved.visual_rules["face"], true);
        assert_eq!(resolved.visual_rules["signature"], true);
        assert_eq!(resolved.visual_rules["barcode"], true);
    }

    #[test]
    fn test_child_overrides_parent() {
        let dir = tempfile::tempdir().unwrap();

        let mut parent = RedactionProfile::named("parent");
        parent.visual_rules.insert("face".to_string(), true);
        parent.confidence_threshold = 0.6;
        write_profile(dir.path(), &parent);

        let mut child = RedactionProfile::named("child");
        child.visual_rules.insert("face".to_string(), false);
        child.confidence_threshold = 0.9;
        child.inherits_from = vec!["parent".to_string()];
        write_profile(dir.path(), &child);

        let resolved = manager(dir.path()).load("child", true).unwrap();
        assert_eq!(resolved.visual_rules["face"], false);
        assert_eq!(resolved.confidence_threshold, 0.9);
    }

    #[test]
    fn test_circular_inheritance_fails() {
        let dir = tempfile::tempdir().unwrap();

        let mut a = RedactionProfile::named("a");
        a.inherits_from = vec!["b".to_string()];
        write_profile(dir.path(), &a);

        let mut b = RedactionProfile::named("b");
        b.inherits_from = vec!["a".to_string()];
        write_profile(dir.path(), &b);

        let err = manager(dir.path()).load("a", true).unwrap_err();
        assert!(matches!(err, Error::ProfileValidation(_)));
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_unresolved_load_keeps_inherits_from() {
        let dir = tempfile::tempdir().unwrap();

        let parent = RedactionProfile::named("parent");
        write_profile(dir.path(), &parent);

        let mut child = RedactionProfile::named("child");
        child.inherits_from = vec!["parent".to_string()];
        write_profile(dir.path(), &child);

        let raw = manager(dir.path()).load("child", false).unwrap();
        assert_eq!(raw.inherits_from, vec!["parent".to_string()]);
    }

    #[test]
    fn test_cache_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), &RedactionProfile::named("cached"));

        let m = manager(dir.path());
        m.load("cached", true).unwrap();

        // Replace the file on disk; the cache still serves the old copy.
        let mut updated = RedactionProfile::named("cached");
        updated.description = "updated".to_string();
        write_profile(dir.path(), &updated);
        assert_eq!(m.load("cached", true).unwrap().description, "");

        m.clear_cache();
        assert_eq!(m.load("cached", true).unwrap().description, "updated");
    }

    #[test]
    fn test_composite() {
        let dir = tempfile::tempdir().unwrap();

        let mut a = RedactionProfile::named("a");
        a.text_rules.insert("email".to_string(), true);
        write_profile(dir.path(), &a);

        let mut b = RedactionProfile::named("b");
        b.text_rules.insert("phone".to_string(), true);
        write_profile(dir.path(), &b);

        let composite = manager(dir.path()).create_composite(&["a", "b"], "ab").unwrap();
        assert_eq!(composite.name, "ab");
        assert!(composite.text_rules["email"]);
        assert!(composite.text_rules["phone"]);
    }
}
