//! Service registry: which services exist, according to the manifests on disk.

use crate::error::RegistryError;
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use walkdir::WalkDir;

/// What to do with a manifest that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Abort the build.
    Strict,
    /// Skip it and report it.
    Lenient,
}

impl ParsePolicy {
    pub fn from_skip_invalid(skip_invalid: bool) -> Self {
        if skip_invalid {
            Self::Lenient
        } else {
            Self::Strict
        }
    }
}

/// A manifest and where it was found.
#[derive(Debug, Clone)]
struct Registered {
    manifest: Manifest,
    path: PathBuf,
}

/// Two manifests declaring the same service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateService {
    pub service_name: String,
    /// The manifest that won (later in walk order).
    pub kept: PathBuf,
    pub replaced: PathBuf,
}

/// Immutable snapshot of the services found under one root.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Registered>,
    duplicates: Vec<DuplicateService>,
}

impl ServiceRegistry {
    /// Scan `root`; the first unparsable manifest aborts the build.
    pub fn build(root: &Path) -> Result<Self, RegistryError> {
        Self::load(root, ParsePolicy::Strict).map(|(registry, _)| registry)
    }

    /// Scan `root`, skipping (and returning) whatever could not be read.
    pub fn build_lenient(root: &Path) -> (Self, Vec<RegistryError>) {
        match Self::load(root, ParsePolicy::Lenient) {
            Ok(loaded) => loaded,
            Err(e) => (Self::default(), vec![e]),
        }
    }

    /// Scan `root` under `policy`.
    ///
    /// The walk visits entries in file-name order within each directory, so
    /// when two manifests declare the same name the lexicographically last
    /// path wins.
    pub fn load(root: &Path, policy: ParsePolicy) -> Result<(Self, Vec<RegistryError>), RegistryError> {
        let strict = policy == ParsePolicy::Strict;
        let mut registry = Self::default();
        let mut skipped = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let err = RegistryError::Walk {
                        path: e.path().unwrap_or(root).to_path_buf(),
                        reason: e.to_string(),
                    };
                    if strict {
                        return Err(err);
                    }
                    warn!(error = %err, "Skipping unreadable path");
                    skipped.push(err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE_NAME {
                continue;
            }

            match Manifest::from_file(entry.path()) {
                Ok(manifest) => registry.insert(manifest, entry.path().to_path_buf()),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Skipping invalid service manifest");
                    skipped.push(e);
                }
            }
        }

        info!(
            root = %root.display(),
            services = registry.len(),
            skipped = skipped.len(),
            "Service registry built"
        );
        Ok((registry, skipped))
    }

    fn insert(&mut self, manifest: Manifest, path: PathBuf) {
        let name = manifest.service_name.clone();
        let registered = Registered {
            manifest,
            path: path.clone(),
        };
        if let Some(previous) = self.services.insert(name.clone(), registered) {
            warn!(
                service = %name,
                kept = %path.display(),
                replaced = %previous.path.display(),
                "Duplicate service name"
            );
            self.duplicates.push(DuplicateService {
                service_name: name,
                kept: path,
                replaced: previous.path,
            });
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Manifest> {
        self.services.get(name).map(|r| &r.manifest)
    }

    /// Path of the manifest that defines `name`.
    pub fn manifest_path(&self, name: &str) -> Option<&Path> {
        self.services.get(name).map(|r| r.path.as_path())
    }

    /// Service names, ascending.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn duplicates(&self) -> &[DuplicateService] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Write the diagnostic export to `path`, creating parent directories:
    /// `<services>` with one `<service name=".."/>` per service, sorted by name.
    pub fn export_xml(&self, path: &Path) -> Result<(), RegistryError> {
        let fail = |reason: String| RegistryError::Export {
            path: path.to_path_buf(),
            reason,
        };
        let xml = self.render_xml().map_err(fail)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        std::fs::write(path, xml).map_err(|e| fail(e.to_string()))?;
        info!(path = %path.display(), services = self.len(), "Registry exported");
        Ok(())
    }

    fn render_xml(&self) -> Result<String, String> {
        let export = Export {
            services: self
                .names()
                .into_iter()
                .map(|name| ExportedService { name })
                .collect(),
        };
        let mut buffer = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
        serializer.indent(' ', 2);
        export.serialize(serializer).map_err(|e| e.to_string())?;
        buffer.push('\n');
        Ok(buffer)
    }
}

#[derive(Serialize)]
#[serde(rename = "services")]
struct Export<'a> {
    #[serde(rename = "service")]
    services: Vec<ExportedService<'a>>,
}

#[derive(Serialize)]
struct ExportedService<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
}

/// Shared, swappable registry snapshot.
///
/// Readers clone the inner `Arc` and query it without holding the lock, so a
/// refresh never blocks or disturbs an in-flight lookup.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    root: PathBuf,
    current: Arc<RwLock<Arc<ServiceRegistry>>>,
}

impl RegistryHandle {
    pub fn new(root: impl Into<PathBuf>, registry: ServiceRegistry) -> Self {
        Self {
            root: root.into(),
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ServiceRegistry> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.snapshot().exists(name)
    }

    pub fn replace(&self, registry: ServiceRegistry) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(registry);
    }

    /// Rebuild from disk and swap in the result.
    ///
    /// On a strict failure the previous snapshot stays in place. Returns the
    /// manifests skipped under [`ParsePolicy::Lenient`].
    pub fn refresh(&self, policy: ParsePolicy) -> Result<Vec<RegistryError>, RegistryError> {
        let (registry, skipped) = ServiceRegistry::load(&self.root, policy)?;
        self.replace(registry);
        Ok(skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, dir: &str, body: &str) -> PathBuf {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn service(name: &str) -> String {
        format!(r#"<manifest service="{name}" deployable="false"/>"#)
    }

    #[test]
    fn test_strict_build_accepts_capitalised_deployable() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "alpha",
            r#"<manifest service="alpha" deployable="True"/>"#,
        );
        write_manifest(tmp.path(), "beta", r#"<manifest service="beta" deployable=""/>"#);

        let registry = ServiceRegistry::build(tmp.path()).unwrap();
        assert!(registry.get("alpha").unwrap().deployable);
        assert!(!registry.get("beta").unwrap().deployable);
    }

    #[test]
    fn test_build_finds_nested_manifests() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "auxo/alpha", &service("alpha"));
        write_manifest(tmp.path(), "auxo/sim/beta", &service("beta"));
        std::fs::write(tmp.path().join("auxo/README.md"), "not a manifest").unwrap();
        std::fs::write(tmp.path().join("auxo/servicemanifest.xml"), "<junk").unwrap();

        let registry = ServiceRegistry::build(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.exists("alpha"));
        assert!(registry.exists("beta"));
        assert!(!registry.exists("gamma"));
        assert_eq!(registry.names(), vec!["alpha", "beta"]);
        assert!(!registry.get("alpha").unwrap().deployable);
    }

    #[test]
    fn test_duplicate_name_last_path_wins() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "b",
            r#"<manifest service="dup" deployable="true"/>"#,
        );
        let first = write_manifest(tmp.path(), "a", &service("dup"));
        let last = write_manifest(tmp.path(), "c", &service("dup"));

        let registry = ServiceRegistry::build(tmp.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.manifest_path("dup"), Some(last.as_path()));
        assert!(!registry.get("dup").unwrap().deployable);

        let dups = registry.duplicates();
        assert_eq!(dups.len(), 2);
        assert_eq!(dups[0].replaced, first);
        assert_eq!(dups[1].kept, last);
    }

    #[test]
    fn test_strict_build_fails_on_bad_manifest() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "alpha", &service("alpha"));
        let bad = write_manifest(tmp.path(), "broken", "<manifest");

        match ServiceRegistry::build(tmp.path()) {
            Err(RegistryError::ManifestParse { path, .. }) => assert_eq!(path, bad),
            other => panic!("Expected ManifestParse, got {other:?}"),
        }
    }

    #[test]
    fn test_lenient_build_skips_bad_manifest() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "alpha", &service("alpha"));
        write_manifest(tmp.path(), "broken", r#"<manifest deployable="true"/>"#);
        write_manifest(tmp.path(), "gamma", &service("gamma"));

        let (registry, skipped) = ServiceRegistry::build_lenient(tmp.path());
        assert_eq!(registry.names(), vec!["alpha", "gamma"]);
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], RegistryError::ManifestParse { .. }));
    }

    #[test]
    fn test_missing_root() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            ServiceRegistry::build(&missing),
            Err(RegistryError::Walk { .. })
        ));
        let (registry, skipped) = ServiceRegistry::build_lenient(&missing);
        assert!(registry.is_empty());
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_export_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("services");
        write_manifest(&root, "z", &service("alpha"));
        write_manifest(&root, "a", &service("gamma"));
        write_manifest(&root, "m", &service("beta"));

        let registry = ServiceRegistry::build(&root).unwrap();
        let out = tmp.path().join("registry/registry.xml");
        registry.export_xml(&out).unwrap();

        let xml = std::fs::read_to_string(&out).unwrap();
        assert!(xml.trim_start().starts_with("<services>"));
        let alpha = xml.find(r#"<service name="alpha"/>"#).unwrap();
        let beta = xml.find(r#"<service name="beta"/>"#).unwrap();
        let gamma = xml.find(r#"<service name="gamma"/>"#).unwrap();
        assert!(alpha < beta && beta < gamma);
    }

    #[test]
    fn test_handle_refresh_swaps_snapshot() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "alpha", &service("alpha"));
        let handle = RegistryHandle::new(
            tmp.path(),
            ServiceRegistry::build(tmp.path()).unwrap(),
        );
        let before = handle.snapshot();
        assert!(handle.exists("alpha"));
        assert!(!handle.exists("beta"));

        write_manifest(tmp.path(), "beta", &service("beta"));
        assert!(handle.refresh(ParsePolicy::Strict).unwrap().is_empty());
        assert!(handle.exists("beta"));
        // Old snapshot is untouched.
        assert!(!before.exists("beta"));

        write_manifest(tmp.path(), "broken", "<manifest");
        assert!(handle.refresh(ParsePolicy::Strict).is_err());
        assert!(handle.exists("beta"));

        let skipped = handle.refresh(ParsePolicy::Lenient).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(handle.snapshot().len(), 2);
    }
}
