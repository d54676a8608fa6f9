use assure_core::types::{FlowStatus, Session};

use crate::context::{context_lines, FlowDeps, FlowOutcome};
use crate::{compare, info, recommendation, summary};

const CAPABILITIES_REPLY: &str = "I can help you look up product information, recommend a plan, or compare and summarize tiers for Travel, Maid, Car, and PersonalAccident insurance. What would you like to do?";
const GREETING_REPLY: &str = "Hi there! I can help with Travel, Maid, Car, or PersonalAccident insurance — ask me a question, or I can walk you through a recommendation.";

/// Top-level per-turn router (spec §4.4). A sub-flow already in progress
/// (status flag set) always takes the turn directly; otherwise the
/// orchestrator decides which flow starts.
pub async fn route(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
    if let Some((flow, FlowStatus::InProgress)) = session.mid_flow_status() {
        return match flow {
            "recommendation" => recommendation::handle(session, message, deps).await,
            "comparison" => compare::handle(session, message, deps).await,
            "summary" => summary::handle(session, message, deps).await,
            _ => unreachable!("mid_flow_status only names the three stateful flows"),
        };
    }

    let recent_history = session
        .history
        .iter()
        .rev()
        .take(3)
        .map(|h| format!("user: {} | assistant: {}", h.user, h.assistant))
        .collect::<Vec<_>>()
        .join("\n");
    let current_product = session.product.map(|p| p.as_str().to_string()).unwrap_or_default();

    let ctx = context_lines(&[
        ("Message", message),
        ("Session product", &current_product),
        ("Recent turns", &recent_history),
    ]);
    let decision = deps
        .prompt_runner
        .run("orchestrator", "route_decision", &ctx, "router.route_decision")
        .await;

    let directive = decision
        .get("directive")
        .and_then(|v| v.as_str())
        .unwrap_or("handle_other");

    // A fresh directive other than handle_follow_up means any outstanding
    // InfoFlow clarification is stale.
    if directive != "handle_follow_up" {
        session.last_info_prod_q = false;
        session.last_info_user_msg = None;
    }

    match directive {
        "greet" => FlowOutcome::text(GREETING_REPLY),
        "handle_capabilities" => FlowOutcome::text(CAPABILITIES_REPLY),
        "handle_information" => info::handle(session, message, deps, false).await,
        "handle_follow_up" => handle_follow_up(session, message, deps).await,
        "handle_summary" => summary::handle(session, message, deps).await,
        "plan_only_comparison" => compare::handle(session, message, deps).await,
        "handle_recommendation" => recommendation::handle(session, message, deps).await,
        "handle_other" => FlowOutcome::text(CAPABILITIES_REPLY),
        _ => FlowOutcome::text(CAPABILITIES_REPLY),
    }
}

async fn handle_follow_up(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
    let last_question = session.last_question.clone().unwrap_or_default();
    let last_answer = session
        .history
        .last()
        .map(|h| h.assistant.clone())
        .unwrap_or_default();

    let ctx = context_lines(&[
        ("Last question", &last_question),
        ("Last answer", &last_answer),
        ("Follow-up message", message),
    ]);
    let result = deps
        .prompt_runner
        .run("follow_up_agent", "construct_follow_up_query", &ctx, "router.construct_follow_up_query")
        .await;

    session.fu_query = result
        .get("query")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    info::handle(session, message, deps, session.fu_query.is_some()).await
}

#[cfg(test)]
mod tests {
    use assure_core::catalog::Product;

    use crate::context::fakes::{deps_with, ScriptedProvider, StubRetrieval};

    use super::*;

    #[tokio::test]
    async fn a_mid_flow_recommendation_bypasses_the_orchestrator() {
        let provider = ScriptedProvider::new(vec![r#"{"response": "Here's your Car quote."}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");
        session.product = Some(Product::Car);
        session.recommendation_status = Some(FlowStatus::InProgress);

        let outcome = route(&mut session, "go ahead", &deps).await;

        assert_eq!(outcome.reply, "Here's your Car quote.");
    }

    #[tokio::test]
    async fn greet_directive_returns_the_canned_greeting() {
        let provider = ScriptedProvider::new(vec![r#"{"directive": "greet"}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = route(&mut session, "hello", &deps).await;

        assert_eq!(outcome.reply, GREETING_REPLY);
    }

    #[tokio::test]
    async fn an_unrecognized_directive_falls_back_to_capabilities() {
        let provider = ScriptedProvider::new(vec![r#"{"directive": "something_unexpected"}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = route(&mut session, "???", &deps).await;

        assert_eq!(outcome.reply, CAPABILITIES_REPLY);
    }

    #[tokio::test]
    async fn a_fresh_directive_clears_stale_info_clarification_flags() {
        let provider = ScriptedProvider::new(vec![r#"{"directive": "handle_capabilities"}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");
        session.last_info_prod_q = true;
        session.last_info_user_msg = Some("what's covered".to_string());

        route(&mut session, "what else can you do", &deps).await;

        assert!(!session.last_info_prod_q);
        assert!(session.last_info_user_msg.is_none());
    }
}
