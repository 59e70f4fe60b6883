/*!
 * Translation model implementations.
 *
 * - `ollama`: model served by a local Ollama instance (GPU resident)
 * - `mock`: deterministic in-process model for tests and dry runs
 */

use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{ModelProvider, TranslationConfig};
use crate::errors::ProviderError;
use crate::translation::translator::TranslationModel;

pub mod mock;
pub mod ollama;

/// Build the configured model
pub fn build_model(config: &TranslationConfig) -> Result<Arc<dyn TranslationModel>, ProviderError> {
    match config.provider {
        ModelProvider::Ollama => {
            let client = ollama::Ollama::from_endpoint(&config.endpoint, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(ollama::OllamaModel::new(
                client,
                config.model.clone(),
                config.temperature,
                config.system_prompt.clone(),
            )))
        }
        ModelProvider::Mock => Ok(Arc::new(mock::MockModel::working())),
    }
}
