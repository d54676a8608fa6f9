use assure_core::catalog::Product;
use assure_core::types::{CompletedEntry, FlowStatus, Session, WorkingSlot};

use crate::context::{context_lines, FlowDeps, FlowOutcome};

/// Which of the two near-identical multi-turn sub-flows is running — they
/// share bootstrap/product-fill/tier-fill/completion shape (spec §4.6,
/// §4.7) and differ only in minimum tier count and synthesis task key.
pub enum Kind {
    Comparison,
    Summary,
}

impl Kind {
    fn min_tiers(&self) -> usize {
        match self {
            Kind::Comparison => 2,
            Kind::Summary => 1,
        }
    }

    fn synthesize_task(&self) -> &'static str {
        "synthesize_response"
    }
}

/// Shared body for the comparison and summary sub-flows.
pub async fn handle(session: &mut Session, message: &str, deps: &FlowDeps, kind: Kind) -> FlowOutcome {
    let in_progress = match kind {
        Kind::Comparison => session.comparison_status == Some(FlowStatus::InProgress),
        Kind::Summary => session.summary_status == Some(FlowStatus::InProgress),
    };

    if !in_progress {
        match kind {
            Kind::Comparison => {
                session.comparison_slot = Some(WorkingSlot::default());
                session.comparison_status = Some(FlowStatus::InProgress);
            }
            Kind::Summary => {
                session.summary_slot = Some(WorkingSlot::default());
                session.summary_status = Some(FlowStatus::InProgress);
            }
        }
    }

    let working = match kind {
        Kind::Comparison => session.comparison_slot.get_or_insert_with(WorkingSlot::default),
        Kind::Summary => session.summary_slot.get_or_insert_with(WorkingSlot::default),
    };

    // Product fill.
    if working.product.is_none() {
        if let Some(p) = session.product {
            working.product = Some(p);
        } else {
            let ctx = context_lines(&[("Message", message)]);
            let result = deps
                .prompt_runner
                .run("tier_identifier", "identify_tiers", &ctx, "tier_identifier.identify_tiers.product_fill")
                .await;
            let identified = result
                .get("product")
                .and_then(|v| v.as_str())
                .and_then(Product::parse);
            working.product = identified;
        }
    }

    let Some(product) = working.product else {
        let q = clarify(deps, message, "the product you'd like").await;
        return FlowOutcome::text(q);
    };

    // Tier fill (skipped entirely for Car, which has no tiers).
    if !product.tiers().is_empty() {
        let ctx = context_lines(&[
            ("Message", message),
            ("Product", product.as_str()),
            ("Available tiers", &product.tiers().join(", ")),
        ]);
        let result = deps
            .prompt_runner
            .run("tier_identifier", "identify_tiers", &ctx, "tier_identifier.identify_tiers.tier_fill")
            .await;

        if let Some(identified_product) = result.get("product").and_then(|v| v.as_str()).and_then(Product::parse) {
            if identified_product != product {
                working.product = Some(identified_product);
                working.tiers.clear();
                return Box::pin(handle(session, message, deps, kind)).await;
            }
        }

        if let Some(tiers) = result.get("tiers").and_then(|v| v.as_array()) {
            for t in tiers {
                if let Some(t) = t.as_str() {
                    if !working.tiers.iter().any(|existing| existing.eq_ignore_ascii_case(t)) {
                        working.tiers.push(t.to_string());
                    }
                }
            }
        }

        if working.tiers.len() < kind.min_tiers() {
            let q = clarify(deps, message, "which tiers you'd like").await;
            return FlowOutcome::text(q);
        }
    }

    // Synthesis.
    let chunks = deps.retrieval.fetch_benefits(product.as_str()).await.unwrap_or_default();
    let context_str = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");

    let tiers_joined = working.tiers.join(", ");
    let ctx = context_lines(&[
        ("Product", product.as_str()),
        ("Tiers", &tiers_joined),
        ("Context", &context_str),
    ]);
    let result = deps
        .prompt_runner
        .run("recommendation_responder", kind.synthesize_task(), &ctx, "comparison.synthesize")
        .await;
    let reply = result
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or("I wasn't able to put together that comparison right now.")
        .to_string();

    let entry = CompletedEntry {
        product: product.as_str().to_string(),
        tiers: working.tiers.clone(),
        completed: true,
    };

    match kind {
        Kind::Comparison => {
            session.comparison_status = Some(FlowStatus::Done);
            session.comparison_slot = None;
            session.comparison_history.push(entry);
            if session.comparison_history.len() > assure_core::types::MAX_COMPLETED_LOG_ENTRIES {
                session.comparison_history.remove(0);
            }
        }
        Kind::Summary => {
            session.summary_status = Some(FlowStatus::Done);
            session.summary_slot = None;
            session.summary_history.push(entry);
            if session.summary_history.len() > assure_core::types::MAX_COMPLETED_LOG_ENTRIES {
                session.summary_history.remove(0);
            }
        }
    }

    FlowOutcome::text(reply)
}

async fn clarify(deps: &FlowDeps, message: &str, missing: &str) -> String {
    let ctx = context_lines(&[("Message", message), ("Missing", missing)]);
    let result = deps
        .prompt_runner
        .run(
            "followup_clarification_agent",
            "followup_clarification",
            &ctx,
            "comparison.followup_clarification",
        )
        .await;
    result
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or("Could you tell me a bit more about what you'd like to compare?")
        .to_string()
}

#[cfg(test)]
mod tests {
    use assure_retrieval::RetrievedChunk;

    use crate::context::fakes::{deps_with, ScriptedProvider, StubRetrieval};

    use super::*;

    #[tokio::test]
    async fn comparison_asks_for_a_second_tier_when_only_one_is_named() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Travel"}"#,
            r#"{"product": "Travel", "tiers": ["Gold"]}"#,
            r#"{"response": "Name another tier?"}"#,
        ]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = compare_handle(&mut session, "compare travel gold", &deps).await;

        assert_eq!(outcome.reply, "Name another tier?");
        assert_eq!(session.comparison_status, Some(FlowStatus::InProgress));
        assert_eq!(session.comparison_slot.as_ref().unwrap().tiers, vec!["Gold".to_string()]);
    }

    #[tokio::test]
    async fn comparison_completes_once_two_tiers_are_known() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Travel"}"#,
            r#"{"product": "Travel", "tiers": ["Gold", "Silver"]}"#,
            r#"{"response": "Gold covers more than Silver."}"#,
        ]);
        let retrieval = StubRetrieval {
            chunks: vec![RetrievedChunk {
                content: "benefit text".to_string(),
                source_file: None,
            }],
        };
        let deps = deps_with(provider, retrieval);
        let mut session = Session::new("s1");

        let outcome = compare_handle(&mut session, "compare gold and silver travel plans", &deps).await;

        assert_eq!(outcome.reply, "Gold covers more than Silver.");
        assert_eq!(session.comparison_status, Some(FlowStatus::Done));
        assert!(session.comparison_slot.is_none());
        assert_eq!(session.comparison_history.len(), 1);
        assert_eq!(session.comparison_history[0].tiers.len(), 2);
    }

    #[tokio::test]
    async fn summary_only_needs_a_single_tier_to_complete() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Maid"}"#,
            r#"{"product": "Maid", "tiers": ["Basic"]}"#,
            r#"{"response": "Basic maid cover summary."}"#,
        ]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");

        let outcome = handle(&mut session, "summarize maid basic", &deps, Kind::Summary).await;

        assert_eq!(outcome.reply, "Basic maid cover summary.");
        assert_eq!(session.summary_status, Some(FlowStatus::Done));
        assert_eq!(session.summary_history.len(), 1);
    }

    #[tokio::test]
    async fn switching_product_mid_tier_fill_restarts_with_cleared_tiers() {
        let provider = ScriptedProvider::new(vec![
            r#"{"product": "Maid"}"#,
            r#"{"product": "Maid", "tiers": ["Premier", "Basic"]}"#,
            r#"{"response": "Maid Premier and Basic compared."}"#,
        ]);
        let deps = deps_with(provider, StubRetrieval::default());
        let mut session = Session::new("s1");
        session.comparison_slot = Some(WorkingSlot {
            product: Some(Product::Travel),
            tiers: vec!["Gold".to_string()],
        });
        session.comparison_status = Some(FlowStatus::InProgress);

        let outcome = handle(&mut session, "actually maid premier and basic", &deps, Kind::Comparison).await;

        assert_eq!(outcome.reply, "Maid Premier and Basic compared.");
        assert_eq!(session.comparison_status, Some(FlowStatus::Done));
    }

    async fn compare_handle(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
        handle(session, message, deps, Kind::Comparison).await
    }
}
