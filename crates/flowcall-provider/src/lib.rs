pub mod openai;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::{OpenAiProvider, ProviderErrorKind};
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
            let text = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(LlmResponse {
                text,
                input_tokens: None,
                output_tokens: None,
                stop_reason: Some("end_turn".into()),
            })
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let provider: std::sync::Arc<dyn LlmProvider> = std::sync::Arc::new(EchoProvider);
        let resp = provider
            .chat(LlmRequest::simple("m".into(), None, "ping".into()))
            .await
            .unwrap();
        assert_eq!(resp.text, "ping");
    }
}
