use assure_core::types::Session;

use crate::comparison::{self, Kind};
use crate::context::{FlowDeps, FlowOutcome};

/// Multi-turn plan summary (spec §4.7): same shape as the comparison
/// sub-flow, but a single tier already suffices.
pub async fn handle(session: &mut Session, message: &str, deps: &FlowDeps) -> FlowOutcome {
    comparison::handle(session, message, deps, Kind::Summary).await
}
