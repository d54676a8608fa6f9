pub mod compare;
pub mod comparison;
pub mod context;
pub mod info;
pub mod recommendation;
pub mod router;
pub mod summary;

pub use context::{FlowDeps, FlowOutcome};
pub use router::route;
