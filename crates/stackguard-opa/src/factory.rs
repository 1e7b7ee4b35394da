//! Engine construction from configuration

use stackguard_core::{Error, Result};
use tracing::info;

use crate::config::{LocalEngineConfig, MockEngineConfig};
use crate::{EngineConfig, LocalOpaEngine, MockOpaEngine, OpaEngine, OpaEvaluationResult, RemoteOpaEngine};

/// Build the engine selected by `config`
pub fn create_opa_engine(config: EngineConfig) -> Result<Box<dyn OpaEngine>> {
    let engine: Box<dyn OpaEngine> = match config {
        EngineConfig::Local(local) => Box::new(build_local(local)?),
        EngineConfig::Mock(mock) => Box::new(build_mock(mock)),
        EngineConfig::Remote(remote) => Box::new(RemoteOpaEngine::new(remote)?),
    };
    info!(engine = %engine.engine_type(), "Created policy engine");
    Ok(engine)
}

fn build_local(config: LocalEngineConfig) -> Result<LocalOpaEngine> {
    let mut engine = LocalOpaEngine::with_rules(config.rules);

    if let Some(text) = config.policy_text.as_deref() {
        engine.load_rego(text);
    }

    for path in &config.policy_files {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read policy file {}: {}", path.display(), e)))?;
        engine.load_rego(&text);
    }

    Ok(engine)
}

fn build_mock(config: MockEngineConfig) -> MockOpaEngine {
    MockOpaEngine::new().with_default(OpaEvaluationResult::with_violations(config.default_violations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineType, OpaInput, RemoteOpaConfig};
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn test_builds_each_backend() {
        let local = create_opa_engine(EngineConfig::Local(LocalEngineConfig::default())).unwrap();
        assert_eq!(local.engine_type(), EngineType::Local);

        let mock = create_opa_engine(EngineConfig::Mock(MockEngineConfig::default())).unwrap();
        assert_eq!(mock.engine_type(), EngineType::Mock);
        assert!(mock.evaluate(&OpaInput::new(json!({}))).await.violations.is_empty());

        let remote = create_opa_engine(EngineConfig::Remote(RemoteOpaConfig::new("http://127.0.0.1:1"))).unwrap();
        assert_eq!(remote.engine_type(), EngineType::Remote);
    }

    #[tokio::test]
    async fn test_local_loads_policy_files() {
        let mut file = tempfile::Builder::new().suffix(".rego").tempfile().unwrap();
        writeln!(
            file,
            "package guard\n\ndeny[msg] {{\n  input.action == \"delete\"\n  msg := \"deletes are blocked\"\n}}"
        )
        .unwrap();

        let config = EngineConfig::Local(LocalEngineConfig {
            policy_files: vec![file.path().to_path_buf()],
            ..Default::default()
        });
        let engine = create_opa_engine(config).unwrap();

        let result = engine.evaluate(&OpaInput::new(json!({"action": "delete"}))).await;
        assert!(result.is_denied());
        assert_eq!(result.violations[0].message, "deletes are blocked");
    }

    #[test]
    fn test_missing_policy_file_is_config_error() {
        let config = EngineConfig::Local(LocalEngineConfig {
            policy_files: vec!["/nonexistent/policy.rego".into()],
            ..Default::default()
        });
        assert!(matches!(create_opa_engine(config), Err(Error::Config(_))));
    }
}
