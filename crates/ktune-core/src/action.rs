// K ADJUSTMENT ACTIONS
// Discrete five-way action space shared by the controller and the simulation env.
//
// Encoding: index 0..=4 maps to a k delta of -2, -1, 0, +1, +2.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of discrete actions a decision provider may return.
pub const ACTION_COUNT: u8 = 5;

/// A bounded adjustment of the k parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KAction {
    DecreaseTwo,
    DecreaseOne,
    Hold,
    IncreaseOne,
    IncreaseTwo,
}

impl KAction {
    /// Decode a raw action index. Returns `None` outside `[0, 4]`.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(KAction::DecreaseTwo),
            1 => Some(KAction::DecreaseOne),
            2 => Some(KAction::Hold),
            3 => Some(KAction::IncreaseOne),
            4 => Some(KAction::IncreaseTwo),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            KAction::DecreaseTwo => 0,
            KAction::DecreaseOne => 1,
            KAction::Hold => 2,
            KAction::IncreaseOne => 3,
            KAction::IncreaseTwo => 4,
        }
    }

    /// Signed k delta encoded by this action.
    pub fn delta(self) -> i64 {
        self.index() as i64 - 2
    }

    /// Apply the delta to `k` and clamp the result into `[k_min, k_max]`.
    pub fn apply(self, k: u64, k_min: u64, k_max: u64) -> u64 {
        k.saturating_add_signed(self.delta()).clamp(k_min, k_max)
    }
}

impl fmt::Display for KAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:+})", self.index(), self.delta())
    }
}
