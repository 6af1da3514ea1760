//! Versioned judge instructions.
//!
//! The instruction for version `V` lives in `<dir>/prompt-vV.txt`. A
//! human-readable description is looked up in the metadata file:
//!
//! ```yaml
//! versions:
//!   21:
//!     goal: "Stricter wording for terminology errors"
//! ```
//!
//! The metadata key is the version with underscores removed (`2_1` -> `21`).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::PromptsConfig;
use crate::error::ConfigError;

/// Used when the metadata file has no goal for a version.
pub const DEFAULT_DESCRIPTION: &str = "Default prompt description";

/// A loaded prompt version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub version: String,
    pub system_instruction: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct PromptMetadata {
    #[serde(default)]
    versions: BTreeMap<u64, VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    goal: String,
}

pub struct PromptStore {
    dir: PathBuf,
    metadata_file: String,
}

impl PromptStore {
    pub fn new(config: &PromptsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            metadata_file: config.metadata_file.clone(),
        }
    }

    pub fn prompt_path(&self, version: &str) -> PathBuf {
        self.dir.join(format!("prompt-v{}.txt", version))
    }

    /// Load the instruction and description for `version`.
    ///
    /// A missing instruction file is an error; a missing description is not.
    pub fn load(&self, version: &str) -> Result<Prompt, ConfigError> {
        let path = self.prompt_path(version);
        if !path.exists() {
            return Err(ConfigError::PromptNotFound { path });
        }
        let system_instruction =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::Invalid {
                message: format!("cannot read prompt {}: {}", path.display(), e),
            })?;

        let description = match self.describe(version) {
            Ok(goal) => goal,
            Err(reason) => {
                tracing::warn!(version, reason = %reason, "Using default prompt description");
                DEFAULT_DESCRIPTION.to_string()
            }
        };

        tracing::info!(version, description = %description, "Loaded prompt");
        Ok(Prompt {
            version: version.to_string(),
            system_instruction,
            description,
        })
    }

    fn describe(&self, version: &str) -> Result<String, String> {
        let key: u64 = version
            .replace('_', "")
            .parse()
            .map_err(|_| format!("version '{}' is not numeric", version))?;
        let metadata = read_metadata(&self.dir.join(&self.metadata_file))?;
        metadata
            .versions
            .get(&key)
            .map(|v| v.goal.clone())
            .ok_or_else(|| format!("no metadata for version {}", key))
    }
}

fn read_metadata(path: &Path) -> Result<PromptMetadata, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_yaml::from_str(&text).map_err(|e| format!("invalid {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &Path) -> PromptStore {
        PromptStore::new(&PromptsConfig {
            dir: dir.to_path_buf(),
            metadata_file: "metadata.yml".into(),
        })
    }

    #[test]
    fn test_load_with_metadata() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("prompt-v2_1.txt"), "Answer YES or NO.").unwrap();
        std::fs::write(
            dir.path().join("metadata.yml"),
            "versions:\n  21:\n    goal: Terminology focus\n  30:\n    goal: Other\n",
        )
        .unwrap();

        let prompt = store(dir.path()).load("2_1").unwrap();
        assert_eq!(prompt.system_instruction, "Answer YES or NO.");
        assert_eq!(prompt.description, "Terminology focus");
        assert_eq!(prompt.version, "2_1");
    }

    #[test]
    fn test_missing_prompt_is_error() {
        let dir = TempDir::new().unwrap();
        match store(dir.path()).load("9_9") {
            Err(ConfigError::PromptNotFound { path }) => {
                assert!(path.ends_with("prompt-v9_9.txt"));
            }
            other => panic!("Expected PromptNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_description_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("prompt-v3_0.txt"), "x").unwrap();
        // No metadata file at all.
        assert_eq!(
            store(dir.path()).load("3_0").unwrap().description,
            DEFAULT_DESCRIPTION
        );

        // Metadata without this version.
        std::fs::write(
            dir.path().join("metadata.yml"),
            "versions:\n  21:\n    goal: Other\n",
        )
        .unwrap();
        assert_eq!(
            store(dir.path()).load("3_0").unwrap().description,
            DEFAULT_DESCRIPTION
        );

        // Broken YAML.
        std::fs::write(dir.path().join("metadata.yml"), "versions: [unclosed").unwrap();
        assert_eq!(
            store(dir.path()).load("3_0").unwrap().description,
            DEFAULT_DESCRIPTION
        );
    }

    #[test]
    fn test_non_numeric_version_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("prompt-vbeta.txt"), "x").unwrap();
        assert_eq!(
            store(dir.path()).load("beta").unwrap().description,
            DEFAULT_DESCRIPTION
        );
    }
}
