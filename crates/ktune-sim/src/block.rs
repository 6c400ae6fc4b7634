use serde::{Deserialize, Serialize};

use ktune_core::ScoredTip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockColor {
    Blue,
    Red,
}

/// A block in the simulated DAG. Color and blue score are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimBlock {
    /// Creation index; genesis is 0
    pub id: u64,

    /// Parents cited by this block, in sample order
    pub parents: Vec<u64>,

    /// `id × 100 + latency`
    pub timestamp: f64,

    pub color: BlockColor,

    /// Blue ancestors along the best parent chain
    pub blue_score: u64,
}

impl SimBlock {
    pub fn genesis() -> Self {
        SimBlock {
            id: 0,
            parents: Vec::new(),
            timestamp: 0.0,
            color: BlockColor::Blue,
            blue_score: 0,
        }
    }

    pub fn is_blue(&self) -> bool {
        self.color == BlockColor::Blue
    }
}

impl ScoredTip for SimBlock {
    type Id = u64;

    fn tip_id(&self) -> &u64 {
        &self.id
    }

    fn blue_score(&self) -> u64 {
        self.blue_score
    }
}
