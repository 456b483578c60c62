//! Mock provider for testing.

use super::{InsightProvider, ProviderError};
use async_trait::async_trait;

#[derive(Debug, Clone)]
enum Behavior {
    Echo,
    Disabled,
    Fail(ProviderError),
}

/// Provider that answers locally without any network call.
#[derive(Debug, Clone)]
pub struct MockInsightProvider {
    behavior: Behavior,
}

impl MockInsightProvider {
    /// `enabled == false` behaves like a provider with no credential.
    pub fn new(enabled: bool) -> Self {
        let behavior = if enabled {
            Behavior::Echo
        } else {
            Behavior::Disabled
        };
        Self { behavior }
    }

    /// Always fail with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            behavior: Behavior::Fail(error),
        }
    }
}

#[async_trait]
impl InsightProvider for MockInsightProvider {
    async fn generate(
        &self,
        prompt: &str,
        _request_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        match &self.behavior {
            Behavior::Echo => Ok(format!("Mock insight for: {}", prompt)),
            Behavior::Disabled => Err(ProviderError::NotConfigured(
                "Mock insight provider not enabled".to_string(),
            )),
            Behavior::Fail(error) => Err(error.clone()),
        }
    }

    fn is_configured(&self) -> bool {
        !matches!(self.behavior, Behavior::Disabled)
    }
}
