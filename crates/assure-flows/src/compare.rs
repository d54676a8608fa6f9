use assure_core::types::Session;

use crate::comparison::{self, Kind};
use crate::context::{FlowDeps, FlowOutcome};

/// Multi-turn plan comparison (spec §4.6): at least two tiers of the same
/// product, benefits fetched and synthesized side by side.
pub async fn handle(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
    comparison::handle(session, message, deps, Kind::Comparison).await
}
