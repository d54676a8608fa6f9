use std::sync::Arc;

use assure_prompt::PromptRunner;
use assure_retrieval::RetrievalClient;

/// Shared dependencies every sub-flow needs: the direct-task LLM runner and
/// the retrieval backend. Cheap to clone — everything inside is an `Arc`.
#[derive(Clone)]
pub struct FlowDeps {
    pub prompt_runner: Arc<PromptRunner>,
    pub retrieval: Arc<dyn RetrievalClient>,
    pub top_k: u32,
    pub fallback_k: u32,
}

/// What a sub-flow produces for one turn.
#[derive(Debug, Clone, Default)]
pub struct FlowOutcome {
    pub reply: String,
    pub sources: Vec<String>,
}

impl FlowOutcome {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            sources: Vec::new(),
        }
    }
}

/// Join `key: value` lines into the context-text format
/// [`assure_prompt::build_prompts`] expects.
pub fn context_lines(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shared fakes for the sub-flow unit tests below — a scripted LLM that
/// plays back one JSON reply per call, and a retrieval stub with canned
/// chunks per `(query, product)` pair.
#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use assure_llm::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use assure_retrieval::{RetrievalClient, RetrievedChunk};
    use async_trait::async_trait;

    use super::*;

    /// Returns one queued JSON reply per call, in order; panics if the
    /// queue runs dry so a test's expected call count stays honest.
    pub struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(str::to_string).collect()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .expect("ScriptedProvider ran out of queued replies");
            Ok(ChatResponse {
                content,
                model: "scripted".to_string(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "end_turn".to_string(),
            })
        }
    }

    #[derive(Default)]
    pub struct StubRetrieval {
        pub chunks: Vec<RetrievedChunk>,
    }

    #[async_trait]
    impl RetrievalClient for StubRetrieval {
        async fn hybrid_search(
            &self,
            _query: &str,
            _product: &str,
            _doc_type: Option<&str>,
            _top_k: u32,
        ) -> assure_core::error::Result<Vec<RetrievedChunk>> {
            Ok(self.chunks.clone())
        }

        async fn lexical_search(
            &self,
            _query: &str,
            _product: &str,
            _top_k: u32,
        ) -> assure_core::error::Result<Vec<RetrievedChunk>> {
            Ok(self.chunks.clone())
        }

        async fn fetch_benefits(&self, _product: &str) -> assure_core::error::Result<Vec<RetrievedChunk>> {
            Ok(self.chunks.clone())
        }
    }

    pub fn deps_with(provider: ScriptedProvider, retrieval: StubRetrieval) -> FlowDeps {
        let prompt_runner = Arc::new(PromptRunner::new(Arc::new(provider), "scripted-model", 1024));
        FlowDeps {
            prompt_runner,
            retrieval: Arc::new(retrieval),
            top_k: 5,
            fallback_k: 5,
        }
    }
}
