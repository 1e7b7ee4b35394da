//! Engine configuration

use serde::{Deserialize, Serialize};
use stackguard_core::{Error, Result};
use stackguard_policy::LocalRegoRule;
use std::path::{Path, PathBuf};

use crate::OpaPolicyViolation;

/// Selects and configures one engine backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineConfig {
    /// In-process evaluation of lowered Rego rules
    Local(LocalEngineConfig),

    /// Scriptable test double
    Mock(MockEngineConfig),

    /// External policy service over HTTP
    Remote(RemoteOpaConfig),
}

impl EngineConfig {
    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_yaml(&content)
        }
    }
}

/// Local engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalEngineConfig {
    /// Rules given directly
    #[serde(default)]
    pub rules: Vec<LocalRegoRule>,

    /// Inline Rego policy text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_text: Option<String>,

    /// Rego files to compile
    #[serde(default)]
    pub policy_files: Vec<PathBuf>,
}

/// Mock engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockEngineConfig {
    /// Violations returned for every evaluation
    #[serde(default)]
    pub default_violations: Vec<OpaPolicyViolation>,
}

/// What a remote engine reports when the service cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Report no violations (non-blocking)
    Open,
    /// Report one critical deny violation (blocking)
    #[default]
    Closed,
}

impl FailMode {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Remote policy service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOpaConfig {
    /// Service base URL; trailing slashes are ignored
    pub base_url: String,

    /// Decision path appended to the base URL
    #[serde(default = "default_policy_path")]
    pub policy_path: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Behaviour on transport failure
    #[serde(default)]
    pub fail_mode: FailMode,

    /// Path probed by health checks
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl RemoteOpaConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            policy_path: default_policy_path(),
            timeout_ms: default_timeout_ms(),
            fail_mode: FailMode::default(),
            health_path: default_health_path(),
        }
    }

    /// Set the decision path
    pub fn with_policy_path(mut self, policy_path: impl Into<String>) -> Self {
        self.policy_path = policy_path.into();
        self
    }

    /// Set the timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the fail mode
    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }
}

fn default_policy_path() -> String {
    "v1/data/stackguard/violations".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_health_path() -> String {
    "health".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_remote_defaults() {
        let yaml = r#"
type: remote
base_url: "http://opa.internal:8181/"
"#;
        match EngineConfig::from_yaml(yaml).unwrap() {
            EngineConfig::Remote(remote) => {
                assert_eq!(remote.policy_path, "v1/data/stackguard/violations");
                assert_eq!(remote.timeout_ms, 5_000);
                assert_eq!(remote.fail_mode, FailMode::Closed);
                assert_eq!(remote.health_path, "health");
            }
            other => panic!("Wrong engine config: {:?}", other),
        }
    }

    #[test]
    fn test_local_with_inline_rules() {
        let yaml = r#"
type: local
policy_text: |
  package p
  deny[msg] { input.public == true; msg := "public" }
rules:
  - id: custom.warn_1
    package: custom
    condition:
      type: field_exists
      field: resource.publicIp
    severity: medium
    action: warn
    message: has a public IP
"#;
        match EngineConfig::from_yaml(yaml).unwrap() {
            EngineConfig::Local(local) => {
                assert_eq!(local.rules.len(), 1);
                assert!(local.policy_text.unwrap().contains("deny[msg]"));
                assert!(local.policy_files.is_empty());
            }
            other => panic!("Wrong engine config: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_engine_type_is_rejected() {
        assert!(EngineConfig::from_yaml("type: quantum").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"type": "remote", "base_url": "http://localhost:8181", "fail_mode": "open"}"#)
            .unwrap();

        match EngineConfig::from_file(file.path()).unwrap() {
            EngineConfig::Remote(remote) => assert_eq!(remote.fail_mode, FailMode::Open),
            other => panic!("Wrong engine config: {:?}", other),
        }
    }
}
