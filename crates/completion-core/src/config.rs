use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CompletionError;
use crate::policy::AggregateCompletionPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub required: RequiredConfig,
}

/// Defaults for the registry-wide aggregate policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_percentage")]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub offers_completion_certificate: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            percentage: default_percentage(),
            count: None,
            offers_completion_certificate: false,
        }
    }
}

impl PolicyConfig {
    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] for out-of-range thresholds.
    pub fn to_policy(&self) -> Result<AggregateCompletionPolicy, CompletionError> {
        let mut policy = AggregateCompletionPolicy::unconstrained();
        policy.set_percentage(self.percentage)?;
        policy.set_count(self.count)?;
        policy.offers_completion_certificate = self.offers_completion_certificate;
        Ok(policy)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredConfig {
    /// Mime types required by default in every newly created context.
    #[serde(default)]
    pub default_mime_types: Vec<String>,
}

impl CompletionConfig {
    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] for out-of-range thresholds.
    pub fn validate(&self) -> Result<(), CompletionError> {
        self.policy.to_policy().map(|_| ())
    }
}

/// Load and validate a TOML config. A missing file yields the defaults.
///
/// # Errors
///
/// Fails when the file cannot be read, does not parse, or carries
/// out-of-range policy thresholds.
pub fn load_config(path: &Path) -> Result<CompletionConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no completion config, using defaults");
        return Ok(CompletionConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<CompletionConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid policy in {}", path.display()))?;
    Ok(config)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_percentage() -> Option<f64> {
    Some(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_config(&dir.path().join("completion.toml")).expect("load should succeed");
        assert_eq!(cfg, CompletionConfig::default());
        assert_eq!(cfg.policy.percentage, Some(1.0));
        assert!(cfg.policy.count.is_none());
        assert!(cfg.required.default_mime_types.is_empty());
    }

    #[test]
    fn parses_sections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("completion.toml");
        std::fs::write(
            &path,
            r#"
[policy]
percentage = 0.8
count = 2.0
offers_completion_certificate = true

[required]
default_mime_types = ["application/vnd.video", "application/vnd.assignment"]
"#,
        )
        .expect("write config");

        let cfg = load_config(&path).expect("parse");
        assert_eq!(cfg.policy.percentage, Some(0.8));
        assert_eq!(cfg.policy.count, Some(2.0));
        assert_eq!(cfg.required.default_mime_types.len(), 2);

        let policy = cfg.policy.to_policy().expect("valid");
        assert_eq!(policy.percentage(), Some(0.8));
        assert!(policy.offers_completion_certificate);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: CompletionConfig = toml::from_str("[policy]\ncount = 3.0\n").expect("parse");
        assert_eq!(cfg.policy.percentage, Some(1.0));
        assert_eq!(cfg.policy.count, Some(3.0));
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("completion.toml");
        std::fs::write(&path, "[policy]\npercentage = 1.5\n").expect("write config");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("percentage"));
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("completion.toml");
        std::fs::write(&path, "[policy\n").expect("write config");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("completion.toml"));
    }
}
