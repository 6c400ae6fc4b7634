pub mod block;
pub mod dag_sim;
pub mod env;

pub use block::{BlockColor, SimBlock};
pub use dag_sim::{DagSimulator, SimMetrics, LATENCY_WINDOW};
pub use env::{EnvConfig, EnvSummary, GhostDagEnv, StepOutcome};
