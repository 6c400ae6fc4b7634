pub mod action;
pub mod config;
pub mod observation;
pub mod parent_selector;
pub mod reward;

pub use action::{KAction, ACTION_COUNT};
pub use config::{ConfigError, KtuneConfig};
pub use observation::{KBounds, NetworkMetrics, Observation, LATENCY_SCALE_MS, OBS_DIM};
pub use parent_selector::{clamp_parent_count, select_bluest_tips, ScoredTip, SelectedParents};
pub use reward::{security_margin, RewardComponents, RewardWeights, SAFE_K_FRACTION};
