//! Backend selection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vassago_core::Result;

use crate::client::OpenAiClient;
use crate::echo::EchoLoader;
use crate::model::ModelLoader;
use crate::remote::RemoteLoader;

/// Which generation backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Deterministic offline model serving `echo-*` names.
    Echo,
    /// OpenAI-compatible server.
    #[default]
    Remote,
}

/// Backend connection settings.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Backend kind.
    pub kind: BackendKind,
    /// Server base URL (remote only).
    pub url: String,
    /// Bearer token (remote only).
    pub api_key: Option<String>,
}

/// Builds the model loader for `config`.
///
/// The echo backend accepts the `echo-*` names in `available_models`.
///
/// # Errors
///
/// Returns an error if the HTTP client for a remote backend cannot be built.
pub fn build_loader(
    config: &BackendConfig,
    available_models: &[String],
) -> Result<Arc<dyn ModelLoader>> {
    Ok(match config.kind {
        BackendKind::Echo => Arc::new(EchoLoader::new(available_models.iter().cloned())),
        BackendKind::Remote => Arc::new(RemoteLoader::new(OpenAiClient::new(
            config.url.clone(),
            config.api_key.clone(),
        )?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vassago_core::ModelId;

    #[test]
    fn test_remote_is_default() {
        assert_eq!(BackendKind::default(), BackendKind::Remote);
    }

    #[tokio::test]
    async fn test_echo_loader_from_config() {
        let config = BackendConfig {
            kind: BackendKind::Echo,
            ..BackendConfig::default()
        };
        let models = vec!["echo-tiny".to_string(), "phi-3-mini-4k-instruct".to_string()];
        let loader = build_loader(&config, &models).unwrap();
        assert_eq!(loader.backend_name(), "echo");
        assert!(loader.load(&ModelId::new("echo-tiny"), false).await.is_ok());
        assert!(loader
            .load(&ModelId::new("phi-3-mini-4k-instruct"), false)
            .await
            .is_err());
    }
}
