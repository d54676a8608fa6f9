//! End-to-end conversation scenarios driven straight through
//! `assure_flows::route`, with a scripted LLM and a canned retrieval
//! backend standing in for Anthropic and Weaviate. These exercise the same
//! router/sub-flow wiring `assure-gateway`'s HTTP handlers call into, one
//! full turn (sometimes several) at a time.

use std::sync::Mutex;
use std::sync::Arc;

use assure_core::catalog::Product;
use assure_core::types::{FlowStatus, Session};
use assure_flows::{route, FlowDeps};
use assure_llm::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use assure_prompt::PromptRunner;
use assure_retrieval::{RetrievalClient, RetrievedChunk};
use async_trait::async_trait;

/// Plays back one queued JSON reply per `send()`, in order. Panics if a
/// scenario calls the LLM more times than it queued replies for, so a
/// wrong call count fails loudly instead of silently reusing a reply.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<&str>) -> Self {
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
            .expect("scenario called the LLM more times than it scripted replies for");
        Ok(ChatResponse {
            content,
            model: "scripted".to_string(),
            tokens_in: 0,
            tokens_out: 0,
            stop_reason: "end_turn".to_string(),
        })
    }
}

/// Returns the same canned chunk set from every retrieval method — these
/// scenarios care about routing and slot/tier bookkeeping, not ranking.
struct StubRetrieval {
    chunks: Vec<RetrievedChunk>,
}

impl StubRetrieval {
    fn with_one(text: &str) -> Self {
        Self {
            chunks: vec![RetrievedChunk {
                content: text.to_string(),
                source_file: Some("policy_wording.pdf".to_string()),
            }],
        }
    }
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

fn deps_with(provider: ScriptedProvider, retrieval: StubRetrieval) -> FlowDeps {
    let prompt_runner = Arc::new(PromptRunner::new(Arc::new(provider), "scripted-model", 1024));
    FlowDeps {
        prompt_runner,
        retrieval: Arc::new(retrieval),
        top_k: 5,
        fallback_k: 5,
    }
}

#[tokio::test]
async fn greeting_resets_any_stale_information_clarification_state() {
    let deps = deps_with(
        ScriptedProvider::new(vec![r#"{"directive": "greet"}"#]),
        StubRetrieval::with_one("unused"),
    );
    let mut session = Session::new("greeting-scenario");
    session.last_info_prod_q = true;
    session.last_info_user_msg = Some("what does it cover".to_string());

    let outcome = route(&mut session, "hi there", &deps).await;

    assert!(outcome.reply.to_lowercase().contains("travel") || outcome.reply.to_lowercase().contains("help"));
    assert!(!session.last_info_prod_q);
    assert!(session.last_info_user_msg.is_none());
}

#[tokio::test]
async fn travel_recommendation_happy_path_collects_every_slot_then_synthesizes() {
    let deps = deps_with(
        ScriptedProvider::new(vec![
            r#"{"directive": "handle_recommendation"}"#,
            r#"{"product": "Travel"}"#,
            r#"{"slots": {"destination": "Japan", "travel_duration": "10 days", "pre_existing_medical_condition": "none", "plan_preference": "comprehensive"}}"#,
            r#"{"valid": true, "normalized_value": "Japan"}"#,
            r#"{"valid": true, "normalized_value": "10 days"}"#,
            r#"{"valid": true, "normalized_value": "none"}"#,
            r#"{"valid": true, "normalized_value": "comprehensive"}"#,
            r#"{"response": "Travel Gold looks like a great fit for your Japan trip."}"#,
        ]),
        StubRetrieval::with_one("Travel Gold covers emergency medical up to 1,000,000."),
    );
    let mut session = Session::new("travel-scenario");

    let outcome = route(
        &mut session,
        "I want a recommendation for a 10 day trip to Japan, no pre-existing conditions, comprehensive plan",
        &deps,
    )
    .await;

    assert_eq!(outcome.reply, "Travel Gold looks like a great fit for your Japan trip.");
    assert_eq!(outcome.sources, vec!["policy_wording.pdf".to_string()]);
    assert_eq!(session.product, Some(Product::Travel));
    assert_eq!(session.recommendation_status, Some(FlowStatus::Done));
}

#[tokio::test]
async fn switching_product_mid_recommendation_restarts_with_the_new_product() {
    let deps = deps_with(
        ScriptedProvider::new(vec![
            r#"{"product": "Car"}"#,
            r#"{"response": "Here's a quote for Car insurance."}"#,
        ]),
        StubRetrieval::with_one("Car cover includes third-party liability."),
    );
    let mut session = Session::new("switch-scenario");
    session.product = Some(Product::Maid);
    session.recommendation_status = Some(FlowStatus::InProgress);

    // A mid-flow status means the router bypasses the orchestrator and
    // calls the recommendation sub-flow directly, which does its own
    // product re-identification and detects the switch.
    let outcome = assure_flows::recommendation::handle(&mut session, "actually, let's do Car instead", &deps).await;

    assert_eq!(outcome.reply, "Here's a quote for Car insurance.");
    assert_eq!(session.product, Some(Product::Car));
    assert!(session.slots.is_empty());
    assert_eq!(session.recommendation_status, Some(FlowStatus::Done));
}

#[tokio::test]
async fn comparison_asks_a_clarifying_question_then_completes_on_the_next_turn() {
    let deps = deps_with(
        ScriptedProvider::new(vec![
            r#"{"directive": "plan_only_comparison"}"#,
            r#"{"product": "Travel"}"#,
            r#"{"product": "Travel", "tiers": ["Gold"]}"#,
            r#"{"response": "Which other tier would you like compared?"}"#,
            r#"{"product": "Travel", "tiers": ["Gold", "Silver"]}"#,
            r#"{"response": "Gold covers more than Silver across medical and baggage limits."}"#,
        ]),
        StubRetrieval::with_one("Gold: SGD 1,000,000 medical. Silver: SGD 500,000 medical."),
    );
    let mut session = Session::new("comparison-scenario");

    let first = route(&mut session, "Compare Gold for travel insurance", &deps).await;
    assert_eq!(first.reply, "Which other tier would you like compared?");
    assert_eq!(session.comparison_status, Some(FlowStatus::InProgress));

    let second = route(&mut session, "also Silver", &deps).await;
    assert_eq!(second.reply, "Gold covers more than Silver across medical and baggage limits.");
}

#[tokio::test]
async fn an_information_question_answers_then_a_bare_follow_up_reuses_the_resolved_product() {
    let deps = deps_with(
        ScriptedProvider::new(vec![
            r#"{"directive": "handle_information"}"#,
            r#"{"product": "Travel"}"#,
            r#"{"response": "Travel insurance covers emergency medical expenses up to the plan limit."}"#,
            r#"{"directive": "handle_follow_up"}"#,
            r#"{"query": "does travel insurance cover lost baggage"}"#,
            r#"{"response": "Yes, lost baggage is covered up to SGD 1,000 on the Silver tier and above."}"#,
        ]),
        StubRetrieval::with_one("Silver tier covers lost baggage up to SGD 1,000."),
    );
    let mut session = Session::new("info-scenario");

    let first = route(&mut session, "What does travel insurance cover for medical?", &deps).await;
    assert_eq!(first.reply, "Travel insurance covers emergency medical expenses up to the plan limit.");
    assert_eq!(session.product, Some(Product::Travel));

    let second = route(&mut session, "and lost baggage?", &deps).await;
    assert_eq!(second.reply, "Yes, lost baggage is covered up to SGD 1,000 on the Silver tier and above.");
}
