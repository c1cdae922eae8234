//! Pair tally model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::agent::AgentId;

/// Unordered pair of agent ids, always stored as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    low: AgentId,
    high: AgentId,
}

impl PairKey {
    pub fn new(a: AgentId, b: AgentId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> AgentId {
        self.low
    }

    pub fn high(&self) -> AgentId {
        self.high
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.low == id || self.high == id
    }
}

/// Historical conversation count for one unordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTally {
    pub pair: PairKey,
    pub conversation_count: u64,
    pub last_conversation_at: DateTime<Utc>,
}

/// Snapshot of all stored tallies keyed by canonical pair.
pub type PairCounts = HashMap<PairKey, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(PairKey::new(AgentId(3), AgentId(7)), PairKey::new(AgentId(7), AgentId(3)));
        let key = PairKey::new(AgentId(7), AgentId(3));
        assert_eq!(key.low(), AgentId(3));
        assert_eq!(key.high(), AgentId(7));
        assert!(key.contains(AgentId(7)));
        assert!(!key.contains(AgentId(5)));
    }
}
