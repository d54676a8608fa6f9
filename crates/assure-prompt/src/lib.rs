pub mod registry;
pub mod runner;

pub use registry::{agent_spec, task_spec, AgentSpec, TaskSpec, TEXT_FALLBACK_TASKS};
pub use runner::{build_prompts, parse_direct_json, PromptRunner};
