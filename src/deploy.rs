//! Serverless deployment descriptor.
//!
//! DESIGN
//! ======
//! Resource sizing for the managed platform lives in a plain YAML file that is
//! read at deployment time only. Nothing on the request path depends on it;
//! the `describe-deployment` command validates it and prints the JSON form
//! consumed by the platform tooling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DESCRIPTOR_PATH: &str = "deploy.yaml";

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("deployment descriptor is malformed: {0}")]
    Parse(String),

    #[error("invalid deployment descriptor: {0}")]
    Invalid(String),
}

/// Container build recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSpec {
    pub base: String,
    pub system_packages: Vec<String>,
    /// Manifest the image build installs dependencies from.
    pub dependency_manifest: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            base: "debian-slim".into(),
            system_packages: vec!["ffmpeg".into(), "git".into(), "unzip".into()],
            dependency_manifest: "Cargo.lock".into(),
        }
    }
}

/// Memory reservation range in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryRange {
    pub min_mib: u32,
    pub max_mib: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    pub app_name: String,
    pub image: ImageSpec,
    /// Named secret bundles injected as environment variables.
    pub secrets: Vec<String>,
    /// Instances kept warm regardless of traffic.
    pub keep_warm: u32,
    pub memory: MemoryRange,
    pub cpu: u32,
    /// Maximum in-flight requests per instance.
    pub concurrency: u32,
    /// Per-invocation timeout. Long-lived websocket sessions are cut at this
    /// limit as well.
    pub timeout_secs: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            app_name: "backend".into(),
            image: ImageSpec::default(),
            secrets: vec!["gcp-credentials".into(), "envs".into()],
            keep_warm: 2,
            memory: MemoryRange { min_mib: 1024, max_mib: 2048 },
            cpu: 4,
            concurrency: 5,
            timeout_secs: 10 * 60,
        }
    }
}

impl DeploymentConfig {
    /// Load and validate a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DeployError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a descriptor from YAML. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown keys, wrong types, or failed validation.
    pub fn from_yaml(text: &str) -> Result<Self, DeployError> {
        // An empty document deserializes as null; treat it as all defaults.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).map_err(|e| DeployError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), DeployError> {
        let invalid = |msg: &str| -> Result<(), DeployError> { Err(DeployError::Invalid(msg.to_string())) };

        if self.app_name.trim().is_empty() {
            return invalid("app_name must not be empty");
        }
        if self.image.base.trim().is_empty() {
            return invalid("image.base must not be empty");
        }
        if self.cpu == 0 {
            return invalid("cpu must be at least 1");
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be at least 1");
        }
        if self.memory.min_mib == 0 || self.memory.min_mib > self.memory.max_mib {
            return Err(DeployError::Invalid(format!(
                "memory range {}..{} MiB is empty",
                self.memory.min_mib, self.memory.max_mib
            )));
        }

        let mut seen = HashSet::new();
        for secret in &self.secrets {
            if secret.trim().is_empty() {
                return invalid("secret names must not be empty");
            }
            if !seen.insert(secret.as_str()) {
                return Err(DeployError::Invalid(format!("secret {secret:?} listed twice")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pretty JSON form for platform tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, DeployError> {
        serde_json::to_string_pretty(self).map_err(|e| DeployError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "deploy_test.rs"]
mod tests;
