pub mod anthropic;
pub mod provider;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
pub use retry::RetryingProvider;
