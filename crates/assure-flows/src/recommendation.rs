use assure_core::catalog::{slot_spec, Product};
use assure_core::types::{FlowStatus, LastCompleted, Session, SlotValue};

use crate::context::{context_lines, FlowDeps, FlowOutcome};

const RESTART_KEYWORDS: &[&str] = &[
    "new recommendation",
    "fresh recommendation",
    "start over",
    "restart",
    "again",
    "different recommendation",
];

const ALREADY_HAVE_A_RECOMMENDATION: &str = "You already have a recommendation. How else can I help you?";

/// Multi-turn guided recommendation (spec §4.8): product lock, slot
/// extraction/validation one at a time, then a deterministic tier and a
/// synthesized response once every required slot is valid.
pub async fn handle(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
    // Step 1: product identification, with switch and restart detection.
    if session.recommendation_status == Some(FlowStatus::Done) {
        let message_lower = message.to_lowercase();
        let wants_new_rec =
            RESTART_KEYWORDS.iter().any(|kw| message_lower.contains(kw)) || message_lower.contains("recommendation");

        if wants_new_rec {
            session.recommendation_status = None;
            session.slots.clear();
            session.product = None;
        } else {
            return FlowOutcome::text(ALREADY_HAVE_A_RECOMMENDATION);
        }
    }

    if session.product.is_none() || session.recommendation_status.is_none() {
        let current = session.product.map(|p| p.as_str().to_string()).unwrap_or_default();
        let ctx = context_lines(&[("Message", message), ("Session product", &current)]);
        let result = deps
            .prompt_runner
            .run("product_identifier", "identify_product", &ctx, "recommendation.identify_product")
            .await;
        let identified = result.get("product").and_then(|v| v.as_str()).and_then(Product::parse);

        match identified {
            Some(p) if session.product != Some(p) => {
                session.product = Some(p);
                session.slots.clear();
                session.recommendation_status = Some(FlowStatus::InProgress);
            }
            Some(_) => {
                session.recommendation_status = Some(FlowStatus::InProgress);
            }
            None => {
                session.recommendation_status = Some(FlowStatus::InProgress);
                return FlowOutcome::text("Which insurance product would you like a recommendation for: Travel, Maid, Car, or PersonalAccident?");
            }
        }
    }

    let product = session.product.expect("resolved above");

    if product.required_slots().is_empty() {
        // Car: no slots to fill, go straight to synthesis.
        return synthesize(session, deps, product).await;
    }

    // Step 2/3: extract slot values from this turn's message.
    let outstanding: Vec<&str> = product
        .required_slots()
        .iter()
        .copied()
        .filter(|s| !session.slots.get(*s).map(|v| v.valid).unwrap_or(false))
        .collect();

    if !outstanding.is_empty() {
        // The last assistant question is what disambiguates a bare
        // "yes"/"no" reply, and the per-slot metadata blob tells the
        // extractor which outstanding slots are free text vs. yes/no vs.
        // a fixed choice.
        let last_question = session.last_question.clone().unwrap_or_default();
        let slot_metadata = serde_json::to_string(&outstanding_metadata(product, &outstanding)).unwrap_or_default();

        let ctx = context_lines(&[
            ("Message", message),
            ("Product", product.as_str()),
            ("Outstanding slots", &outstanding.join(", ")),
            ("Last assistant question", &last_question),
            ("Slot metadata", &slot_metadata),
        ]);
        let result = deps
            .prompt_runner
            .run("slot_extractor", "extract_slots", &ctx, "recommendation.extract_slots")
            .await;

        if let Some(explanation) = result.get("user_needs_explanation").and_then(|v| v.as_str()) {
            if !explanation.is_empty() {
                return FlowOutcome::text(explanation.to_string());
            }
        }

        if let Some(extracted) = result.get("slots").and_then(|v| v.as_object()) {
            for slot_name in &outstanding {
                if let Some(value) = extracted.get(*slot_name).and_then(|v| v.as_str()) {
                    if !value.trim().is_empty() {
                        session.slots.insert(slot_name.to_string(), SlotValue::pending(value));
                    }
                }
            }
        }
    }

    // Step 4/5: validate pending slots in required order, stopping at the first failure.
    for slot_name in product.required_slots() {
        let Some(current) = session.slots.get(*slot_name).cloned() else {
            continue;
        };
        if current.valid {
            continue;
        }

        let ctx = context_lines(&[
            ("Product", product.as_str()),
            ("Slot", slot_name),
            ("Value", &current.value),
        ]);
        let result = deps
            .prompt_runner
            .run("slot_validator", "validate_slot", &ctx, "recommendation.validate_slot")
            .await;

        let valid = result.get("valid").and_then(|v| v.as_bool()).unwrap_or(false);
        if valid {
            let normalized = result
                .get("normalized_value")
                .and_then(|v| v.as_str())
                .unwrap_or(&current.value);
            session
                .slots
                .insert(slot_name.to_string(), SlotValue::validated(normalized));
            continue;
        }

        let reason = result.get("reason").and_then(|v| v.as_str());
        let question = result.get("question").and_then(|v| v.as_str());
        let reply = match (reason, question) {
            (Some(reason), Some(question)) => format!("{reason} {question}"),
            (None, Some(question)) => question.to_string(),
            (Some(reason), None) => reason.to_string(),
            (None, None) => slot_spec(product, slot_name)
                .map(|s| s.fallback_question.to_string())
                .unwrap_or_else(|| format!("Could you clarify {slot_name}?")),
        };
        session.last_question = Some(reply.clone());
        return FlowOutcome::text(reply);
    }

    // All required slots valid — still need to check nothing is missing entirely.
    let missing_slot = product
        .required_slots()
        .iter()
        .find(|s| !session.slots.get(**s).map(|v| v.valid).unwrap_or(false));

    if let Some(missing) = missing_slot {
        let ctx = context_lines(&[
            ("Product", product.as_str()),
            ("Missing slot", missing),
        ]);
        let result = deps
            .prompt_runner
            .run("question_asker", "ask_question", &ctx, "recommendation.ask_question")
            .await;
        let question = result
            .get("response")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| slot_spec(product, missing).map(|s| s.fallback_question.to_string()))
            .unwrap_or_else(|| format!("Could you tell me about {missing}?"));
        session.last_question = Some(question.clone());
        return FlowOutcome::text(question);
    }

    synthesize(session, deps, product).await
}

/// `{slot_name: {type, options, format_hint}}` for every outstanding slot,
/// so the extractor prompt can tell a yes/no slot from a free-text one.
fn outstanding_metadata(product: Product, outstanding: &[&str]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for slot_name in outstanding {
        if let Some(spec) = slot_spec(product, slot_name) {
            map.insert(
                slot_name.to_string(),
                serde_json::json!({
                    "type": spec.kind,
                    "options": spec.options,
                    "format_hint": spec.format_hint,
                }),
            );
        }
    }
    serde_json::Value::Object(map)
}

fn tier_for(product: Product, slots: &std::collections::HashMap<String, SlotValue>) -> Option<&'static str> {
    match product {
        Product::Travel => slots.get("plan_preference").map(|v| match v.value.to_lowercase().as_str() {
            "comprehensive" => "Gold",
            _ => "Silver",
        }),
        Product::Maid => slots
            .get("coverage_above_mom_minimum")
            .map(|v| match v.value.to_lowercase().as_str() {
                "yes" => "Premier",
                _ => "Enhanced",
            }),
        Product::PersonalAccident => slots.get("desired_amount").and_then(|v| {
            v.value
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<i64>()
                .ok()
                .map(|amount| match amount {
                    500..=1000 => "Silver",
                    1001..=2500 => "Premier",
                    2501..=3500 => "Platinum",
                    _ => "Silver",
                })
        }),
        Product::Car => None,
    }
}

async fn synthesize(session: &mut Session, deps: &FlowDeps, product: Product) -> FlowOutcome {
    let tier = tier_for(product, &session.slots);

    let chunks = deps.retrieval.fetch_benefits(product.as_str()).await.unwrap_or_default();
    let context_str = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");

    let slots_joined = session
        .slots
        .iter()
        .map(|(k, v)| format!("{k}={}", v.value))
        .collect::<Vec<_>>()
        .join(", ");
    let tier_str = tier.unwrap_or("");

    let ctx = context_lines(&[
        ("Product", product.as_str()),
        ("Tier", tier_str),
        ("Slots", &slots_joined),
        ("Context", &context_str),
    ]);
    let result = deps
        .prompt_runner
        .run("recommendation_responder", "synthesize_response", &ctx, "recommendation.synthesize")
        .await;
    let reply = result
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or("I wasn't able to put together a recommendation right now.")
        .to_string();

    session.recommendation_status = Some(FlowStatus::Done);
    session.last_completed = Some(LastCompleted::Recommendation);
    session.comparison_status = None;
    session.summary_status = None;
    session.comparison_slot = None;
    session.summary_slot = None;

    let sources: Vec<String> = chunks.into_iter().filter_map(|c| c.source_file).collect();

    FlowOutcome { reply, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn travel_tier_follows_plan_preference() {
        let mut slots = HashMap::new();
        slots.insert("plan_preference".to_string(), SlotValue::validated("comprehensive"));
        assert_eq!(tier_for(Product::Travel, &slots), Some("Gold"));
    }

    #[test]
    fn personal_accident_tier_follows_amount_bands() {
        let mut slots = HashMap::new();
        slots.insert("desired_amount".to_string(), SlotValue::validated("SGD 2000"));
        assert_eq!(tier_for(Product::PersonalAccident, &slots), Some("Premier"));
    }

    #[test]
    fn car_has_no_tier() {
        let slots = HashMap::new();
        assert_eq!(tier_for(Product::Car, &slots), None);
    }
}
