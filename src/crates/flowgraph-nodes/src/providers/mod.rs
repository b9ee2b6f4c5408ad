//! Concrete LLM provider clients
//!
//! `reqwest`-backed implementations of [`LlmProvider`](crate::provider::LlmProvider)
//! for the three supported vendors. Each client owns its HTTP client with
//! a request timeout and translates the vendor response into the common
//! [`LlmResponse`](crate::provider::LlmResponse) shape.
//!
//! [`default_registry`] wires all three into a
//! [`ProviderRegistry`](crate::provider::ProviderRegistry) with the
//! standard model-prefix routing.

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::provider::ProviderRegistry;

/// Default completion timeout: 120 seconds.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Registry with all three vendor clients registered.
pub fn default_registry() -> ProviderRegistry {
    ProviderRegistry::new()
        .register(Arc::new(AnthropicProvider::new()))
        .register(Arc::new(OpenAiProvider::new()))
        .register(Arc::new(GeminiProvider::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderTag;

    #[test]
    fn test_default_registry_routes_all_vendors() {
        let registry = default_registry();
        for (model, tag) in [
            ("claude-sonnet-4", ProviderTag::Anthropic),
            ("gpt-4o-mini", ProviderTag::OpenAi),
            ("gemini-2.0-flash", ProviderTag::Gemini),
        ] {
            assert_eq!(registry.tag_for_model(model), Some(tag));
            assert!(registry.provider_for_model(model).is_ok());
        }
    }
}
