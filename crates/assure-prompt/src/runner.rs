use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use assure_llm::{ChatRequest, LlmProvider, Message};

use crate::registry::{agent_spec, task_spec, TEXT_FALLBACK_TASKS};

/// Assembles a system/user prompt pair from the static agent/task registry
/// plus free-form context text, the way the source's `build_prompts` pulls
/// role/backstory/goal/description/expected_output out of the YAML specs.
///
/// `context_text` carries one slot/fact per line; a `product: <name>` line
/// drives `{product}` interpolation, and everything from a
/// `validation rules:` line onward is split into its own trailing section
/// of the system prompt rather than the user prompt.
pub fn build_prompts(agent_key: &str, task_key: &str, context_text: &str) -> (String, String) {
    let agent = agent_spec(agent_key);
    let task = task_spec(task_key);

    let role = agent.map(|a| a.role).unwrap_or(agent_key);
    let backstory = agent.map(|a| a.backstory).unwrap_or_default();
    let goal = agent.map(|a| a.goal).unwrap_or_default();
    let mut description = task.map(|t| t.description).unwrap_or_default().to_string();
    let expected_output = task.map(|t| t.expected_output).unwrap_or_default();

    if description.contains("{product}") {
        let product = context_text
            .lines()
            .find_map(|line| line.to_lowercase().starts_with("product:").then(|| {
                line.splitn(2, ':').nth(1).unwrap_or_default().trim().to_string()
            }))
            .unwrap_or_else(|| "unknown".to_string());
        description = description.replace("{product}", &product);
    }

    let mut rules_section = String::new();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut in_rules = false;
    for line in context_text.lines() {
        if line.trim().to_lowercase().starts_with("validation rules:") {
            in_rules = true;
        }
        if in_rules {
            rules_section.push_str(line);
            rules_section.push('\n');
        } else {
            data_lines.push(line);
        }
    }
    let data_section = data_lines.join("\n").trim().to_string();
    let rules_section = rules_section.trim().to_string();

    let mut system_prompt = format!(
        "You are {role}. {backstory}\n\nYour goal is: {goal}\n\nTask Description: {description}\n\n{rules_section}\n\nOutput contract (JSON):\n{expected_output}"
    )
    .trim()
    .to_string();

    if task_key == "validate_slot" {
        let slot_name = data_lines.iter().find_map(|line| {
            line.to_lowercase().starts_with("slot:").then(|| {
                line.splitn(2, ':').nth(1).unwrap_or_default().trim().to_string()
            })
        });
        match slot_name {
            Some(name) => system_prompt.push_str(&format!("\n\nFocus only on validating {name}.")),
            None => system_prompt.push_str("\n\nFocus only on validating the provided slot."),
        }
    }

    let user_prompt = format!("[Context]\n{data_section}").trim().to_string();

    (system_prompt, user_prompt)
}

/// Parse a raw LLM reply as JSON, falling back first to extracting the
/// outermost balanced `{...}` block, then — only for tasks in
/// [`TEXT_FALLBACK_TASKS`] — wrapping the raw text as `{"response": text}`.
pub fn parse_direct_json(task_key: &str, label: &str, raw: &str) -> Map<String, Value> {
    let txt = raw.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(txt) {
        return map;
    }

    if let Some(block) = extract_balanced_braces(txt) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&block) {
            return map;
        }
    }

    warn!(label, task_key, "LLM response was not valid JSON");

    if TEXT_FALLBACK_TASKS.contains(&task_key) && !txt.is_empty() {
        info!(label, len = txt.len(), "using text fallback for direct task");
        let mut map = Map::new();
        map.insert("response".to_string(), Value::String(txt.to_string()));
        return map;
    }

    Map::new()
}

/// Find the first `{` and its matching closing `}`, accounting for nesting
/// and quoted strings — a stricter, allocation-light stand-in for the
/// source's greedy `re.search(r"{[\s\S]*}", txt)`.
fn extract_balanced_braces(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Runs a single agent/task pair against an [`LlmProvider`] and returns the
/// parsed JSON object — the Rust counterpart of `run_direct_task`.
pub struct PromptRunner {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl PromptRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    pub async fn run(
        &self,
        agent_key: &str,
        task_key: &str,
        context_text: &str,
        label: &str,
    ) -> Map<String, Value> {
        let (system_prompt, user_prompt) = build_prompts(agent_key, task_key, context_text);

        info!(label, agent_key, task_key, "running direct LLM task");

        let req = ChatRequest {
            model: self.model.clone(),
            system: system_prompt,
            messages: vec![Message::user(user_prompt)],
            max_tokens: self.max_tokens,
        };

        match self.provider.send(&req).await {
            Ok(resp) => parse_direct_json(task_key, label, &resp.content),
            Err(e) => {
                warn!(label, err = %e, "direct LLM task failed");
                Map::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_is_interpolated_from_context() {
        let (system, _) = build_prompts("recommendation_responder", "synthesize_response", "product: Travel\nslots: ...");
        assert!(system.contains("product Travel") || system.contains("Travel"));
    }

    #[test]
    fn rules_section_is_split_out_of_data() {
        let ctx = "product: Maid\nfoo: bar\nValidation Rules:\nmust be a number";
        let (system, user) = build_prompts("slot_validator", "validate_slot", ctx);
        assert!(system.contains("must be a number"));
        assert!(!user.contains("must be a number"));
    }

    #[test]
    fn validate_slot_appends_focus_directive() {
        let ctx = "slot: travel_duration\nproduct: Travel";
        let (system, _) = build_prompts("slot_validator", "validate_slot", ctx);
        assert!(system.contains("Focus only on validating travel_duration."));
    }

    #[test]
    fn parses_strict_json() {
        let map = parse_direct_json("identify_product", "t", r#"{"product": "Travel"}"#);
        assert_eq!(map.get("product").unwrap(), "Travel");
    }

    #[test]
    fn extracts_balanced_braces_from_noisy_text() {
        let raw = "here you go: {\"response\": \"hi {there}\"} thanks";
        let map = parse_direct_json("synthesize_response", "t", raw);
        assert_eq!(map.get("response").unwrap(), "hi {there}");
    }

    #[test]
    fn text_fallback_only_for_allowed_tasks() {
        let map = parse_direct_json("synthesize_response", "t", "just plain text");
        assert_eq!(map.get("response").unwrap(), "just plain text");

        let map2 = parse_direct_json("identify_product", "t", "just plain text");
        assert!(map2.is_empty());
    }
}
