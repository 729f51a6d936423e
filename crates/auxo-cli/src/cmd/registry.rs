//! `auxo registry refresh`.

use anyhow::Context;
use auxo_registry::ServiceRegistry;
use auxo_types::config::OracleConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Strict rebuild and export. Returns the number of registered services.
pub fn refresh(root: &Path, output: &Path) -> anyhow::Result<usize> {
    let registry = ServiceRegistry::build(root)
        .with_context(|| format!("Failed to build registry from {}", root.display()))?;
    registry
        .export_xml(output)
        .with_context(|| format!("Failed to export registry to {}", output.display()))?;
    Ok(registry.len())
}

pub fn cmd_registry_refresh(
    config: &OracleConfig,
    root: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = root.unwrap_or_else(|| config.services_root.clone());
    let output = output
        .or_else(|| config.registry_output.clone())
        .context("No registry output path: pass --output or set oracle.registry_output")?;
    let count = refresh(&root, &output)?;
    info!(services = count, output = %output.display(), "Successfully updated the registry");
    println!("Registered {count} service(s) into {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, dir: &str, body: &str) {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ServiceManifest.xml"), body).unwrap();
    }

    #[test]
    fn test_refresh_writes_export() {
        let tree = TempDir::new().unwrap();
        write_manifest(tree.path(), "alpha", r#"<manifest service="alpha" deployable="true"/>"#);
        write_manifest(tree.path(), "beta", r#"<manifest service="beta"/>"#);
        let output = tree.path().join("out").join("registry.xml");

        assert_eq!(refresh(tree.path(), &output).unwrap(), 2);
        let xml = std::fs::read_to_string(&output).unwrap();
        assert!(xml.contains(r#"name="alpha""#));
        assert!(xml.contains(r#"name="beta""#));
    }

    #[test]
    fn test_refresh_is_strict() {
        let tree = TempDir::new().unwrap();
        write_manifest(tree.path(), "alpha", r#"<manifest service="alpha"/>"#);
        write_manifest(tree.path(), "broken", r#"<manifest service=""/>"#);
        let output = tree.path().join("registry.xml");

        assert!(refresh(tree.path(), &output).is_err());
        assert!(!output.exists());
    }
}
