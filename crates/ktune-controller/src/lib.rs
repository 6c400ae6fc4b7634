pub mod confidence;
pub mod controller;
pub mod decision;
pub mod notify;

pub use confidence::{ConfidenceSnapshot, ConfidenceTracker, CONFIDENCE_WINDOW};
pub use controller::{
    ActuationOutcome, ControllerConfig, ControllerPhase, ControllerState, CycleError, CycleReport,
    KController, MetricsSource, STABILITY_LOG_EVERY,
};
pub use decision::{
    Decision, DecisionError, DecisionProvider, FixedPolicy, HeuristicPolicy, RemotePolicy,
};
pub use notify::{NodeNotifier, NotifyOutcome};
