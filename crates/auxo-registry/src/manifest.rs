//! `ServiceManifest.xml` parsing.
//!
//! ```xml
//! <manifest service="pendulum" deployable="true"/>
//! ```

use crate::error::RegistryError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// File name the registry scans for.
pub const MANIFEST_FILE_NAME: &str = "ServiceManifest.xml";

const ROOT_ELEMENT: &str = "manifest";

/// One service's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(rename = "@service")]
    pub service_name: String,
    #[serde(rename = "@deployable", default, deserialize_with = "lenient_bool")]
    pub deployable: bool,
}

impl Manifest {
    /// Parse manifest XML. `path` is only used for error reporting.
    pub fn parse(xml: &str, path: &Path) -> Result<Self, RegistryError> {
        let fail = |reason: String| RegistryError::ManifestParse {
            path: path.to_path_buf(),
            reason,
        };

        let root = root_element(xml).map_err(fail)?;
        if root != ROOT_ELEMENT {
            return Err(fail(format!(
                "expected <{ROOT_ELEMENT}> root element, found <{root}>"
            )));
        }

        let manifest: Manifest = quick_xml::de::from_str(xml).map_err(|e| fail(e.to_string()))?;
        if manifest.service_name.trim().is_empty() {
            return Err(fail("service name is empty".to_string()));
        }
        Ok(manifest)
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let xml = std::fs::read_to_string(path).map_err(|e| RegistryError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&xml, path)
    }
}

/// `true`/`false` in the spellings manifests are written with: `1`, `t`,
/// `T`, `TRUE`, `true`, `True` and their false counterparts. Surrounding
/// whitespace is ignored and an empty value is false.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "" | "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "invalid deployable value {other:?}"
        ))),
    }
}

fn root_element(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err("document has no root element".to_string()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Manifest, RegistryError> {
        Manifest::parse(xml, Path::new("ServiceManifest.xml"))
    }

    #[test]
    fn test_parse_manifest() {
        let m = parse(r#"<?xml version="1.0"?><manifest service="pendulum" deployable="true"/>"#)
            .unwrap();
        assert_eq!(m.service_name, "pendulum");
        assert!(m.deployable);

        for (value, expected) in [
            ("True", true),
            ("TRUE", true),
            ("t", true),
            ("T", true),
            ("1", true),
            (" true ", true),
            ("False", false),
            ("F", false),
            ("0", false),
            ("", false),
        ] {
            let m = parse(&format!(r#"<manifest service="alpha" deployable="{value}"/>"#))
                .unwrap_or_else(|e| panic!("{value:?} gave {e:?}"));
            assert_eq!(m.deployable, expected, "{value:?}");
        }
    }

    #[test]
    fn test_deployable_defaults_false() {
        let m = parse(r#"<manifest service="alpha"></manifest>"#).unwrap();
        assert!(!m.deployable);
    }

    #[test]
    fn test_invalid_manifests() {
        for bad in [
            "",
            "<manifest",
            r#"<service name="alpha"/>"#,
            r#"<manifest deployable="true"/>"#,
            r#"<manifest service=""/>"#,
            r#"<manifest service="alpha" deployable="maybe"/>"#,
            r#"<manifest service="alpha" deployable="yes"/>"#,
            r#"<manifest service="alpha" deployable="tRuE"/>"#,
        ] {
            match parse(bad) {
                Err(RegistryError::ManifestParse { path, .. }) => {
                    assert_eq!(path, Path::new("ServiceManifest.xml"));
                }
                other => panic!("{bad:?} gave {other:?}"),
            }
        }
    }
}
