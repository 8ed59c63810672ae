//! Greedy least-used-first allocator.
//!
//! Sets are filled in order, tiers in [`Tier::ALL`] order. Every pick takes
//! the bucket question with the lowest usage so far (random among equals) and
//! bumps its usage immediately, so later sets see the updated counts. Within
//! one set a question is only repeated once the whole bucket has been used
//! ("wrapping"), which can only happen when the bucket is smaller than the
//! set's requirement.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::allocation_engine::{
    helpers::rank_least_used,
    models::{AllocatedSet, AllocationTable, Question, SetEntry, Shortfall, ShortfallPolicy, Tier},
    planner::CountPlan,
    pool::Pool,
};
use crate::error::EngineError;

/// Times each question has been selected during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    counts: BTreeMap<u32, usize>,
}

impl UsageCounter {
    /// Every pool question registered at zero.
    pub fn for_pool(pool: &Pool) -> Self {
        UsageCounter { counts: pool.iter().map(|q| (q.number, 0)).collect() }
    }

    pub fn get(&self, question_no: u32) -> usize {
        self.counts.get(&question_no).copied().unwrap_or(0)
    }

    fn increment(&mut self, question_no: u32) {
        *self.counts.entry(question_no).or_insert(0) += 1;
    }

    /// `(question_no, uses)` in ascending question number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.counts.iter().map(|(&no, &n)| (no, n))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Everything one allocation run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub table: AllocationTable,
    pub usage: UsageCounter,
    pub shortfalls: Vec<Shortfall>,
}

/// Check the plan against the pool before anything is drawn.
fn validate(pool: &Pool, plan: &CountPlan, policy: ShortfallPolicy) -> Result<(), EngineError> {
    for (set_no, counts) in plan.iter() {
        for (tier, &required) in counts.iter() {
            let available = pool.bucket(tier).len();
            if required > 0 && available == 0 {
                return Err(EngineError::InsufficientPool { tier, set_no, required });
            }
            if required > available && policy == ShortfallPolicy::Reject {
                return Err(EngineError::Shortfall { tier, set_no, required, available });
            }
        }
    }
    Ok(())
}

/// Allocate questions to every set in `plan`.
///
/// Fails without producing any table if a required tier is empty, or if a
/// set outgrows its bucket under [`ShortfallPolicy::Reject`].
pub fn allocate<R: Rng>(
    pool: &Pool,
    plan: &CountPlan,
    policy: ShortfallPolicy,
    rng: &mut R,
) -> Result<Allocation, EngineError> {
    validate(pool, plan, policy)?;

    let mut usage = UsageCounter::for_pool(pool);
    let mut sets = Vec::with_capacity(plan.num_sets());
    let mut shortfalls = Vec::new();

    for (set_no, counts) in plan.iter() {
        let mut entries = Vec::with_capacity(counts.total());

        for (tier, &required) in counts.iter() {
            if required == 0 {
                continue;
            }
            let bucket = pool.bucket(tier);
            let picked = draw_tier(bucket, required, policy, &mut usage, rng);

            if required > bucket.len() {
                let shortfall = Shortfall {
                    set_no,
                    tier,
                    required,
                    available: bucket.len(),
                    allocated: picked.len(),
                };
                warn!(%shortfall, %policy, "tier bucket smaller than requirement");
                shortfalls.push(shortfall);
            }

            entries.extend(picked.into_iter().map(|question_no| SetEntry { question_no, tier }));
        }

        debug!(set_no, questions = entries.len(), "set allocated");
        sets.push(AllocatedSet { set_no, entries });
    }

    Ok(Allocation { table: AllocationTable::new(sets), usage, shortfalls })
}

/// Pick `required` questions from one tier bucket for one set.
fn draw_tier<R: Rng>(
    bucket: &[Question],
    required: usize,
    policy: ShortfallPolicy,
    usage: &mut UsageCounter,
    rng: &mut R,
) -> Vec<u32> {
    let target = match policy {
        ShortfallPolicy::Truncate => required.min(bucket.len()),
        ShortfallPolicy::Duplicate | ShortfallPolicy::Reject => required,
    };
    if bucket.is_empty() {
        return Vec::new();
    }

    let mut picked = Vec::with_capacity(target);
    while picked.len() < target {
        // A round visits each bucket question at most once. Picks only touch
        // the usage of questions already taken this round, so one ranking
        // stays valid for the whole round.
        let mut round: Vec<u32> = bucket.iter().map(|q| q.number).collect();
        rank_least_used(&mut round, rng, |no| usage.get(*no));
        for no in round.into_iter().take(target - picked.len()) {
            usage.increment(no);
            picked.push(no);
        }
    }
    picked
}

/// Spread of usage inside one tier: `max - min` over the tier's questions.
pub fn tier_spread(pool: &Pool, usage: &UsageCounter, tier: Tier) -> usize {
    let counts = pool.bucket(tier).iter().map(|q| usage.get(q.number));
    let (min, max) = counts.fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
    max.saturating_sub(if min == usize::MAX { 0 } else { min })
}
