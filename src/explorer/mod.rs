#[allow(clippy::module_inception)]
pub mod explorer;
pub mod nav_graph;
pub mod policy;
pub mod state;
pub mod test_generator;

pub use explorer::{ExplorationReport, Explorer, Termination};
pub use nav_graph::{DedupMode, ExplorerConfig, NavigationGraph, NavigationStep, Pacing, ScreenNode};
pub use state::{Incident, IncidentKind, Interaction, InteractionOutcome};
