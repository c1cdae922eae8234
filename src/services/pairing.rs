//! Pair selection biased toward agents that have talked the least.
//!
//! Every unordered pair of distinct agents gets weight `1 / (1 + count)`,
//! where `count` is how many conversations the pair has had. One weighted
//! draw picks the pair, then a fair coin decides who opens.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, PairCounts, PairKey};
use crate::domain::ports::ConversationRepository;

/// Selection weight for a pair with `count` past conversations.
pub fn pair_weight(count: u64) -> f64 {
    1.0 / (1.0 + count as f64)
}

/// Distinct agents in input order, or `None` when fewer than two remain.
fn candidates(agents: &[Agent]) -> Option<Vec<&Agent>> {
    let mut seen = HashSet::with_capacity(agents.len());
    let distinct: Vec<&Agent> = agents.iter().filter(|a| seen.insert(a.id)).collect();
    (distinct.len() >= 2).then_some(distinct)
}

fn pick<'a, R: Rng + ?Sized>(
    distinct: &[&'a Agent],
    counts: &PairCounts,
    rng: &mut R,
) -> Option<(&'a Agent, &'a Agent)> {
    let mut pairs = Vec::with_capacity(distinct.len() * (distinct.len() - 1) / 2);
    let mut weights = Vec::with_capacity(pairs.capacity());
    for (i, a) in distinct.iter().enumerate() {
        for b in &distinct[i + 1..] {
            let count = counts.get(&PairKey::new(a.id, b.id)).copied().unwrap_or(0);
            pairs.push((*a, *b));
            weights.push(pair_weight(count));
        }
    }

    let index = WeightedIndex::new(&weights).ok()?;
    let (a, b) = pairs[index.sample(rng)];
    if rng.random_bool(0.5) {
        Some((a, b))
    } else {
        Some((b, a))
    }
}

/// Pick `(initiator, responder)` from `agents`.
///
/// Agents repeated in the input are considered once. Returns `None` when
/// fewer than two distinct agents remain. Never mutates `counts`.
pub fn select_pair<'a, R: Rng + ?Sized>(
    agents: &'a [Agent],
    counts: &PairCounts,
    rng: &mut R,
) -> Option<(&'a Agent, &'a Agent)> {
    pick(&candidates(agents)?, counts, rng)
}

/// Reads the current tallies from storage and selects a pair.
pub struct PairSelector {
    conversations: Arc<dyn ConversationRepository>,
}

impl PairSelector {
    pub fn new(conversations: Arc<dyn ConversationRepository>) -> Self {
        Self { conversations }
    }

    /// Like [`select_pair`] over the stored tallies. Storage is not read
    /// when fewer than two distinct agents are given.
    pub async fn select<R: Rng + ?Sized>(&self, agents: &[Agent], rng: &mut R) -> DomainResult<Option<(Agent, Agent)>> {
        let Some(distinct) = candidates(agents) else {
            return Ok(None);
        };
        let counts = self.conversations.get_pair_counts().await?;
        Ok(pick(&distinct, &counts, rng).map(|(a, b)| (a.clone(), b.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteConversationRepository};
    use crate::domain::models::AgentId;
    use crate::services::test_support::InterceptedConversations;
    use chrono::Utc;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent(id: i64) -> Agent {
        Agent {
            id: AgentId(id),
            owner_name: format!("owner-{id}"),
            name: format!("bot-{id}"),
            credential: String::new(),
            personality: String::new(),
            objective: String::new(),
            behavior_rules: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fewer_than_two_agents() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_pair(&[], &PairCounts::new(), &mut rng).is_none());
        assert!(select_pair(&[agent(1)], &PairCounts::new(), &mut rng).is_none());
        assert!(select_pair(&[agent(1), agent(1)], &PairCounts::new(), &mut rng).is_none());
    }

    #[test]
    fn test_two_agents_always_pair_both_orientations() {
        let agents = [agent(1), agent(2)];
        let mut rng = StdRng::seed_from_u64(7);
        let mut first_opens = 0;
        for _ in 0..2000 {
            let (init, resp) = select_pair(&agents, &PairCounts::new(), &mut rng).unwrap();
            assert_ne!(init.id, resp.id);
            if init.id == AgentId(1) {
                first_opens += 1;
            }
        }
        assert!((900..=1100).contains(&first_opens), "orientation skewed: {first_opens}");
    }

    #[test]
    fn test_under_paired_pair_is_favoured() {
        let agents = [agent(1), agent(2), agent(3)];
        let mut counts = PairCounts::new();
        counts.insert(PairKey::new(AgentId(1), AgentId(3)), 5);
        counts.insert(PairKey::new(AgentId(2), AgentId(3)), 5);

        // Weights 1, 1/6, 1/6: the fresh pair should win three times in four.
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 10_000;
        let fresh = (0..draws)
            .filter(|_| {
                let (a, b) = select_pair(&agents, &counts, &mut rng).unwrap();
                PairKey::new(a.id, b.id) == PairKey::new(AgentId(1), AgentId(2))
            })
            .count();
        let share = fresh as f64 / f64::from(draws);
        assert!((0.72..=0.78).contains(&share), "share was {share}");
        assert!(counts.len() == 2, "counts must not be touched");
    }

    #[tokio::test]
    async fn test_selector_skips_storage_without_two_distinct_agents() {
        let pool = create_migrated_test_pool().await.unwrap();
        let tallies = Arc::new(InterceptedConversations::new(Arc::new(SqliteConversationRepository::new(pool))));
        let selector = PairSelector::new(tallies.clone());
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(selector.select(&[agent(4), agent(4)], &mut rng).await.unwrap(), None);
        assert_eq!(selector.select(&[agent(4)], &mut rng).await.unwrap(), None);
        assert_eq!(tallies.pair_count_reads(), 0);

        let (init, resp) = selector.select(&[agent(4), agent(4), agent(9)], &mut rng).await.unwrap().unwrap();
        assert_ne!(init.id, resp.id);
        assert_eq!(tallies.pair_count_reads(), 1);
    }

    #[test]
    fn test_pair_weight() {
        assert!((pair_weight(0) - 1.0).abs() < f64::EPSILON);
        assert!((pair_weight(3) - 0.25).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_pair_is_two_distinct_members(
            ids in proptest::collection::vec(1i64..20, 0..12),
            tallies in proptest::collection::vec((1i64..20, 1i64..20, 0u64..50), 0..20),
            seed in any::<u64>(),
        ) {
            let agents: Vec<Agent> = ids.iter().copied().map(agent).collect();
            let counts: PairCounts = tallies
                .into_iter()
                .filter(|(a, b, _)| a != b)
                .map(|(a, b, n)| (PairKey::new(AgentId(a), AgentId(b)), n))
                .collect();
            let distinct: HashSet<i64> = ids.iter().copied().collect();

            let mut rng = StdRng::seed_from_u64(seed);
            match select_pair(&agents, &counts, &mut rng) {
                None => prop_assert!(distinct.len() < 2),
                Some((init, resp)) => {
                    prop_assert!(distinct.len() >= 2);
                    prop_assert_ne!(init.id, resp.id);
                    prop_assert!(distinct.contains(&init.id.0));
                    prop_assert!(distinct.contains(&resp.id.0));
                }
            }
        }
    }
}
