//! Compiled-in agent/task registry, replacing the source's `agents.yaml` /
//! `tasks.yaml` pair with static Rust data — there's no deployment-time
//! reason to let these drift from the binary that interprets them.

#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    pub key: &'static str,
    pub role: &'static str,
    pub backstory: &'static str,
    pub goal: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    pub key: &'static str,
    pub description: &'static str,
    pub expected_output: &'static str,
}

pub fn agent_spec(key: &str) -> Option<&'static AgentSpec> {
    AGENTS.iter().find(|a| a.key == key)
}

pub fn task_spec(key: &str) -> Option<&'static TaskSpec> {
    TASKS.iter().find(|t| t.key == key)
}

/// Tasks allowed to fall back to a wrapped plain-text response when the LLM
/// doesn't return valid JSON.
pub const TEXT_FALLBACK_TASKS: &[&str] = &["synthesize_response", "followup_clarification"];

pub const AGENTS: &[AgentSpec] = &[
    AgentSpec {
        key: "product_identifier",
        role: "a product identification specialist",
        backstory: "You read a customer's message and the recent conversation history \
                    and determine which insurance product, if any, they are asking about.",
        goal: "Identify the single product the customer means, or none if it isn't clear.",
    },
    AgentSpec {
        key: "orchestrator",
        role: "a conversation router",
        backstory: "You decide which internal flow should handle the customer's message: \
                    information lookup, recommendation, comparison, or summary.",
        goal: "Route the turn to exactly one flow based on the message and session state.",
    },
    AgentSpec {
        key: "slot_validator",
        role: "a slot validation specialist",
        backstory: "You check whether a single piece of information the customer gave \
                    satisfies the format required for one recommendation slot.",
        goal: "Decide if the given slot value is valid, and normalize it if so.",
    },
    AgentSpec {
        key: "slot_extractor",
        role: "a slot extraction specialist",
        backstory: "You read the customer's message and pull out any values that answer \
                    the outstanding recommendation slots for the current product.",
        goal: "Extract as many outstanding slot values as the message actually contains.",
    },
    AgentSpec {
        key: "question_asker",
        role: "a conversational assistant",
        backstory: "You ask the customer for exactly the next missing piece of information, \
                    in a natural, friendly way, without repeating questions already answered.",
        goal: "Produce the single next question needed to keep the recommendation flow moving.",
    },
    AgentSpec {
        key: "recommendation_responder",
        role: "an insurance recommendation assistant",
        backstory: "You have all the slots you need for one product and must turn them into \
                    a short, friendly plan recommendation grounded in the retrieved benefits.",
        goal: "Synthesize a recommendation response from the filled slots and retrieved context.",
    },
    AgentSpec {
        key: "follow_up_agent",
        role: "a follow-up query specialist",
        backstory: "You read a clarifying follow-up message together with the last informational \
                    question and answer, and construct a single self-contained search query.",
        goal: "Produce one retrieval query that captures what the customer actually wants now.",
    },
    AgentSpec {
        key: "tier_identifier",
        role: "a tier identification specialist",
        backstory: "You read the customer's message and determine which plan tiers of a product \
                    they want compared or summarized.",
        goal: "Identify the product and the list of tiers the customer is referring to.",
    },
    AgentSpec {
        key: "followup_clarification_agent",
        role: "a conversational assistant",
        backstory: "You ask the customer a short clarifying question when a comparison or \
                    summary request is missing its product or tiers.",
        goal: "Produce a natural clarifying question for the missing comparison/summary detail.",
    },
];

pub const TASKS: &[TaskSpec] = &[
    TaskSpec {
        key: "identify_product",
        description: "Given the customer's message and recent history, identify which of \
                      Travel, Maid, Car, or PersonalAccident insurance the customer means.",
        expected_output: r#"{ "product": "Travel"|"Maid"|"Car"|"PersonalAccident"|null }"#,
    },
    TaskSpec {
        key: "route_decision",
        description: "Decide which flow handles this turn for product {product}: info, \
                      recommendation, compare, or summary.",
        expected_output: r#"{ "flow": "info"|"recommendation"|"compare"|"summary" }"#,
    },
    TaskSpec {
        key: "validate_slot",
        description: "Validate the customer's answer for slot: {slot} of product {product}.",
        expected_output: r#"{ "valid": true|false, "slot_name": string, "normalized_value"?: string, "question"?: string, "reason"?: string }"#,
    },
    TaskSpec {
        key: "extract_slots",
        description: "Extract any outstanding recommendation slot values for product {product} \
                      from the customer's message.",
        expected_output: r#"{ "slots": { "<slot_name>": "<value>", ... } }"#,
    },
    TaskSpec {
        key: "ask_question",
        description: "Ask the customer for the next missing slot of product {product}.",
        expected_output: r#"{ "response": string }"#,
    },
    TaskSpec {
        key: "synthesize_response",
        description: "Synthesize a recommendation response for product {product} from the \
                      filled slots and the retrieved benefits context.",
        expected_output: r#"{ "response": string }"#,
    },
    TaskSpec {
        key: "construct_follow_up_query",
        description: "Construct a single self-contained retrieval query from the last \
                      informational question, its answer, and the customer's follow-up.",
        expected_output: r#"{ "query": string }"#,
    },
    TaskSpec {
        key: "identify_tiers",
        description: "Identify the product and plan tiers of product {product} the customer \
                      wants to compare or summarize.",
        expected_output: r#"{ "product": string|null, "tiers": [string] }"#,
    },
    TaskSpec {
        key: "followup_clarification",
        description: "Ask a short clarifying question for the missing comparison/summary detail.",
        expected_output: r#"{ "response": string }"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_has_a_matching_agent_concept() {
        assert!(agent_spec("product_identifier").is_some());
        assert!(task_spec("identify_product").is_some());
        assert!(task_spec("nonexistent").is_none());
    }

    #[test]
    fn text_fallback_set_is_exactly_two_tasks() {
        assert_eq!(TEXT_FALLBACK_TASKS, &["synthesize_response", "followup_clarification"]);
    }

    #[test]
    fn registries_have_no_duplicate_keys() {
        let mut agent_keys: Vec<_> = AGENTS.iter().map(|a| a.key).collect();
        agent_keys.sort_unstable();
        agent_keys.dedup();
        assert_eq!(agent_keys.len(), AGENTS.len());

        let mut task_keys: Vec<_> = TASKS.iter().map(|t| t.key).collect();
        task_keys.sort_unstable();
        task_keys.dedup();
        assert_eq!(task_keys.len(), TASKS.len());
    }
}
