//! Versioned system prompts loaded from YAML files.
//!
//! Each `*.yaml` / `*.yml` file in the prompt directory holds one version of
//! one named prompt:
//!
//! ```yaml
//! name: customer_support
//! version: "1.1"
//! description: Stricter grounding
//! system_prompt: |
//!   You are a helpful customer support assistant...
//! ```
//!
//! The directory is re-read on every lookup so edits take effect without a
//! restart.

use crate::error::{ConfigError, NotFoundError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One version of a named system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    pub version: String,
    pub system_prompt: String,
    #[serde(default)]
    pub description: String,
}

/// Listing entry for one prompt version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSummary {
    pub version: String,
    pub description: String,
    pub file: String,
}

/// On-disk shape; every field optional so missing ones can be reported by name.
#[derive(Debug, Deserialize)]
struct PromptFile {
    name: Option<String>,
    version: Option<serde_yaml::Value>,
    system_prompt: Option<String>,
    description: Option<String>,
}

/// Versions may be written as YAML numbers (`1.0`) or strings (`"1.0"`).
fn version_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(if let Some(i) = n.as_i64() {
            i.to_string()
        } else if let Some(u) = n.as_u64() {
            u.to_string()
        } else {
            // Debug keeps the trailing ".0" that Display would drop.
            format!("{:?}", n.as_f64()?)
        }),
        _ => None,
    }
}

/// Pick the lexicographically greatest version string ("2" sorts after "10").
pub fn latest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max()
}

/// Loads prompt definitions from a directory.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    dir: PathBuf,
}

impl PromptRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Prompt files in the directory, sorted by file name.
    fn prompt_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|_| ConfigError::PromptDirMissing {
            path: self.dir.clone(),
        })?;
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|e| e == "yaml" || e == "yml")
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Parse one prompt file.
    pub fn load_file(path: &Path) -> Result<PromptDefinition> {
        let malformed = |message: String| ConfigError::MalformedPrompt {
            path: path.to_path_buf(),
            message,
        };
        let content =
            std::fs::read_to_string(path).map_err(|e| malformed(format!("unreadable: {e}")))?;
        let raw: PromptFile =
            serde_yaml::from_str(&content).map_err(|e| malformed(e.to_string()))?;

        let name = raw
            .name
            .ok_or_else(|| malformed("missing field 'name'".into()))?;
        let version = raw
            .version
            .as_ref()
            .and_then(version_string)
            .ok_or_else(|| malformed("missing or non-scalar field 'version'".into()))?;
        let system_prompt = raw
            .system_prompt
            .ok_or_else(|| malformed("missing field 'system_prompt'".into()))?;

        Ok(PromptDefinition {
            name,
            version,
            system_prompt,
            description: raw.description.unwrap_or_default(),
        })
    }

    fn load_all(&self) -> Result<Vec<(PathBuf, PromptDefinition)>> {
        self.prompt_files()?
            .into_iter()
            .map(|path| Self::load_file(&path).map(|def| (path, def)))
            .collect()
    }

    /// Look up a prompt by name, either a specific version or the latest one.
    pub fn get_prompt(&self, name: &str, version: Option<&str>) -> Result<PromptDefinition> {
        let candidates: Vec<PromptDefinition> = self
            .load_all()?
            .into_iter()
            .map(|(_, def)| def)
            .filter(|def| def.name == name)
            .collect();

        if candidates.is_empty() {
            return Err(NotFoundError::Prompt {
                name: name.to_string(),
            }
            .into());
        }

        let wanted = match version {
            Some(v) => v.to_string(),
            None => latest_version(candidates.iter().map(|c| c.version.as_str()))
                .unwrap_or_default()
                .to_string(),
        };

        let available: Vec<String> = candidates.iter().map(|c| c.version.clone()).collect();
        let found = candidates
            .into_iter()
            .find(|c| c.version == wanted)
            .ok_or_else(|| NotFoundError::PromptVersion {
                name: name.to_string(),
                version: wanted.clone(),
                available,
            })?;
        debug!(name = %found.name, version = %found.version, "Resolved prompt");
        Ok(found)
    }

    /// Every prompt version grouped by name. A missing directory lists nothing.
    pub fn list_prompts(&self) -> Result<BTreeMap<String, Vec<PromptSummary>>> {
        if !self.dir.is_dir() {
            return Ok(BTreeMap::new());
        }
        let mut prompts: BTreeMap<String, Vec<PromptSummary>> = BTreeMap::new();
        for (path, def) in self.load_all()? {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            prompts.entry(def.name).or_default().push(PromptSummary {
                version: def.version,
                description: def.description,
                file,
            });
        }
        for versions in prompts.values_mut() {
            versions.sort_by(|a, b| a.version.cmp(&b.version));
        }
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RagError};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, body: &str) {
        std::fs::write(dir.join(file), body).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "customer_support_v1.0.yaml",
            "name: customer_support\nversion: 1.0\ndescription: Baseline\nsystem_prompt: Answer from context.\n",
        );
        write(
            dir.path(),
            "customer_support_v1.1.yml",
            "name: customer_support\nversion: \"1.1\"\ndescription: Stricter\nsystem_prompt: Answer ONLY from context.\n",
        );
        write(
            dir.path(),
            "billing.yaml",
            "name: billing\nversion: 2\nsystem_prompt: Billing help.\n",
        );
        write(dir.path(), "notes.txt", "not a prompt");
        dir
    }

    #[test]
    fn test_get_latest_version() {
        let dir = fixture();
        let registry = PromptRegistry::new(dir.path());
        let prompt = registry.get_prompt("customer_support", None).unwrap();
        assert_eq!(prompt.version, "1.1");
        assert_eq!(prompt.system_prompt, "Answer ONLY from context.");
    }

    #[test]
    fn test_get_specific_numeric_version() {
        let dir = fixture();
        let registry = PromptRegistry::new(dir.path());
        let prompt = registry.get_prompt("customer_support", Some("1.0")).unwrap();
        assert_eq!(prompt.version, "1.0");
        assert_eq!(prompt.description, "Baseline");

        let billing = registry.get_prompt("billing", None).unwrap();
        assert_eq!(billing.version, "2");
        assert_eq!(billing.description, "");
    }

    #[test]
    fn test_unknown_version_lists_available() {
        let dir = fixture();
        let registry = PromptRegistry::new(dir.path());
        let err = registry
            .get_prompt("customer_support", Some("3.0"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let msg = err.to_string();
        assert!(msg.contains("3.0"));
        assert!(msg.contains("1.0, 1.1"));
    }

    #[test]
    fn test_unknown_name_not_found() {
        let dir = fixture();
        let err = PromptRegistry::new(dir.path())
            .get_prompt("sales", None)
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::NotFound(NotFoundError::Prompt { ref name }) if name == "sales"
        ));
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let registry = PromptRegistry::new("/definitely/not/here");
        let err = registry.get_prompt("customer_support", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(registry.list_prompts().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.yaml", "name: [unclosed\n");
        let err = PromptRegistry::new(dir.path())
            .get_prompt("anything", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_missing_system_prompt_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "p.yaml", "name: p\nversion: \"1\"\n");
        let err = PromptRegistry::new(dir.path())
            .get_prompt("p", None)
            .unwrap_err();
        assert!(err.to_string().contains("system_prompt"));
    }

    #[test]
    fn test_latest_is_lexicographic() {
        assert_eq!(latest_version(["1.0", "1.1"]), Some("1.1"));
        assert_eq!(latest_version(["2", "10"]), Some("2"));
        assert_eq!(latest_version(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_list_prompts_grouped() {
        let dir = fixture();
        let listing = PromptRegistry::new(dir.path()).list_prompts().unwrap();
        assert_eq!(
            listing.keys().cloned().collect::<Vec<_>>(),
            vec!["billing".to_string(), "customer_support".to_string()]
        );
        let versions: Vec<&str> = listing["customer_support"]
            .iter()
            .map(|s| s.version.as_str())
            .collect();
        assert_eq!(versions, vec!["1.0", "1.1"]);
        assert_eq!(listing["customer_support"][1].file, "customer_support_v1.1.yml");
    }

    #[test]
    fn test_edits_visible_without_reload() {
        let dir = fixture();
        let registry = PromptRegistry::new(dir.path());
        assert_eq!(
            registry.get_prompt("customer_support", None).unwrap().version,
            "1.1"
        );
        write(
            dir.path(),
            "customer_support_v1.2.yaml",
            "name: customer_support\nversion: \"1.2\"\nsystem_prompt: New.\n",
        );
        assert_eq!(
            registry.get_prompt("customer_support", None).unwrap().version,
            "1.2"
        );
    }
}
