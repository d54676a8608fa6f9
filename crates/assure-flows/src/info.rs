use tracing::info;

use assure_core::types::Session;

use crate::context::{context_lines, FlowDeps, FlowOutcome};

/// Single-turn information lookup (spec §4.5). No cross-turn state beyond
/// the clarification-continuation flags on the session.
pub async fn handle(
    session: &mut Session,
    message: &str,
    deps: &FlowDeps,
    use_follow_up_query: bool,
) -> FlowOutcome {
    let mut question = message.to_string();
    let mut used_fast_path = false;

    if use_follow_up_query {
        if let Some(fu_query) = session.fu_query.clone() {
            // Product is expected to already be on the session by the time
            // the router dispatches here with a constructed query.
            if session.product.is_some() {
                info!(len = fu_query.len(), "InfoFlow fast path: using constructed follow-up query");
                question = fu_query;
                used_fast_path = true;
            }
        }
    }

    if !used_fast_path {
        if session.product.is_none() {
            let current = session.product.map(|p| p.as_str().to_string()).unwrap_or_default();
            let ctx = context_lines(&[("Message", message), ("Session product", &current)]);
            let result = deps
                .prompt_runner
                .run("product_identifier", "identify_product", &ctx, "product_identifier.identify_product")
                .await;

            let product = result.get("product").and_then(|v| v.as_str()).and_then(assure_core::catalog::Product::parse);

            match product {
                Some(product) => {
                    session.product = Some(product);
                    info!(%product, "InfoFlow resolved product");
                }
                None => {
                    session.last_info_prod_q = true;
                    session.last_info_user_msg = Some(message.to_string());
                    let q = result
                        .get("question")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Which product would you like to ask about: Travel, Maid, or Car?");
                    return FlowOutcome::text(q);
                }
            }
        }

        if session.last_info_prod_q {
            let ctx = context_lines(&[("Message", message)]);
            let probe = deps
                .prompt_runner
                .run(
                    "product_identifier",
                    "identify_product",
                    &ctx,
                    "product_identifier.identify_product.edge_case_check",
                )
                .await;
            let identified = probe.get("product").and_then(|v| v.as_str()).and_then(assure_core::catalog::Product::parse);

            if let Some(product) = identified {
                session.product = Some(product);
                if let Some(prior) = session.last_info_user_msg.clone() {
                    if !prior.trim().is_empty() {
                        question = prior;
                    }
                }
                session.last_info_prod_q = false;
                session.last_info_user_msg = None;
            }
        }
    }

    let product = match session.product {
        Some(p) => p,
        None => return FlowOutcome::text("Which product would you like to ask about: Travel, Maid, or Car?"),
    };

    let mut chunks = deps
        .retrieval
        .hybrid_search(&question, product.as_str(), None, deps.top_k)
        .await
        .unwrap_or_default();

    if chunks.is_empty() {
        chunks = deps
            .retrieval
            .lexical_search(&question, product.as_str(), deps.fallback_k)
            .await
            .unwrap_or_default();
    }

    if chunks.is_empty() {
        return FlowOutcome::text(format!(
            "I couldn't find that in our {product} documents. Could you specify a bit more so I can search precisely?"
        ));
    }

    let context_str = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");

    let ctx = context_lines(&[
        ("Product", product.as_str()),
        ("Question", &question),
        ("Context", &context_str),
    ]);
    let result = deps
        .prompt_runner
        .run("recommendation_responder", "synthesize_response", &ctx, "info.synthesize_response")
        .await;

    let answer = result
        .get("response")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("I couldn't find precise details. Could you clarify your question?")
        .to_string();

    let sources: Vec<String> = chunks.into_iter().filter_map(|c| c.source_file).collect();

    FlowOutcome {
        reply: answer,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use assure_retrieval::RetrievedChunk;

    use crate::context::fakes::{deps_with, ScriptedProvider, StubRetrieval};

    use super::*;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            content: text.to_string(),
            source_file: Some("policy.pdf".to_string()),
        }
    }

    #[tokio::test]
    async fn asks_which_product_when_none_can_be_identified() {
        let provider = ScriptedProvider::new(vec![r#"{"question": "Which product?"}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = handle(&mut session, "how much does it cost", &deps, false).await;

        assert_eq!(outcome.reply, "Which product?");
        assert!(session.last_info_prod_q);
        assert_eq!(session.last_info_user_msg.as_deref(), Some("how much does it cost"));
    }

    #[tokio::test]
    async fn answers_once_product_and_chunks_are_found() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Travel"}"#,
            r#"{"response": "Coverage includes trip cancellation."}"#,
        ]);
        let retrieval = StubRetrieval {
            chunks: vec![chunk("Trip cancellation coverage details.")],
        };
        let deps = deps_with(provider, retrieval);
        let mut session = Session::new("s1");

        let outcome = handle(&mut session, "what does travel insurance cover", &deps, false).await;

        assert_eq!(outcome.reply, "Coverage includes trip cancellation.");
        assert_eq!(outcome.sources, vec!["policy.pdf".to_string()]);
        assert_eq!(session.product, assure_core::catalog::Product::parse("Travel"));
    }

    #[tokio::test]
    async fn resolves_pending_clarification_using_stored_original_message() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Maid"}"#,
            r#"{"product": "Maid"}"#,
            r#"{"response": "Maid plans start from Basic tier."}"#,
        ]);
        let retrieval = StubRetrieval {
            chunks: vec![chunk("Maid tiers overview.")],
        };
        let deps = deps_with(provider, retrieval);
        let mut session = Session::new("s1");
        session.last_info_prod_q = true;
        session.last_info_user_msg = Some("what tiers are available".to_string());

        let outcome = handle(&mut session, "maid insurance", &deps, false).await;

        assert_eq!(outcome.reply, "Maid plans start from Basic tier.");
        assert!(!session.last_info_prod_q);
        assert!(session.last_info_user_msg.is_none());
    }

    #[tokio::test]
    async fn no_chunks_from_either_search_yields_a_clarifying_reply() {
        let provider = ScriptedProvider::new(vec![r#"{"product": "Car"}"#]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = handle(&mut session, "tell me about car insurance", &deps, false).await;

        assert!(outcome.reply.contains("couldn't find"));
    }
}
