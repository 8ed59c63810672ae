//! Distribution planner: turns user targets into a per-set, per-tier count plan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::allocation_engine::models::{Tier, TierMap};
use crate::error::EngineError;

/// Allowed distance of a percentage sum from 100.
pub const PERCENT_TOLERANCE: f64 = 0.01;

/// How many questions of each tier a set should hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DistributionTarget {
    /// Exact counts per set. Signed so negative input can be reported.
    Absolute(TierMap<i64>),
    /// Share of `total_per_set` per tier, in percent.
    Percentage { percents: TierMap<f64>, total_per_set: usize },
}

impl DistributionTarget {
    pub fn absolute(hard: i64, medium: i64, easy: i64) -> Self {
        DistributionTarget::Absolute(TierMap::new(hard, medium, easy))
    }

    pub fn percentage(hard: f64, medium: f64, easy: f64, total_per_set: usize) -> Self {
        DistributionTarget::Percentage {
            percents: TierMap::new(hard, medium, easy),
            total_per_set,
        }
    }

    /// Resolve to concrete counts. `set_no` only decorates error messages.
    pub fn resolve(&self, set_no: Option<usize>) -> Result<TierMap<usize>, EngineError> {
        match self {
            DistributionTarget::Absolute(counts) => {
                let mut out = TierMap::default();
                for (tier, &value) in counts.iter() {
                    *out.get_mut(tier) = usize::try_from(value)
                        .map_err(|_| EngineError::InvalidCount { set_no, tier, value })?;
                }
                Ok(out)
            }
            DistributionTarget::Percentage { percents, total_per_set } => {
                largest_remainder(percents, *total_per_set, set_no)
            }
        }
    }
}

/// Required counts for every set. Index 0 is `Set_1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPlan {
    sets: Vec<TierMap<usize>>,
}

impl CountPlan {
    /// The same counts for every one of `num_sets` sets.
    pub fn uniform(num_sets: usize, counts: TierMap<usize>) -> Self {
        CountPlan { sets: vec![counts; num_sets] }
    }

    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    /// Counts for 1-based `set_no`; zero counts outside the plan.
    pub fn counts(&self, set_no: usize) -> TierMap<usize> {
        set_no
            .checked_sub(1)
            .and_then(|i| self.sets.get(i))
            .copied()
            .unwrap_or_default()
    }

    pub fn required(&self, set_no: usize, tier: Tier) -> usize {
        *self.counts(set_no).get(tier)
    }

    /// `(set_no, counts)` in set order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TierMap<usize>)> {
        self.sets.iter().enumerate().map(|(i, c)| (i + 1, c))
    }

    /// Sum of required counts for `tier` over all sets.
    pub fn tier_total(&self, tier: Tier) -> usize {
        self.sets.iter().map(|c| *c.get(tier)).sum()
    }

    /// Largest single-set requirement for `tier`.
    pub fn tier_peak(&self, tier: Tier) -> usize {
        self.sets.iter().map(|c| *c.get(tier)).max().unwrap_or(0)
    }

    pub fn is_uniform(&self) -> bool {
        self.sets.windows(2).all(|w| w[0] == w[1])
    }
}

/// Build a plan for `num_sets` sets from a base target plus per-set overrides
/// keyed by 1-based set number.
pub fn plan(
    num_sets: usize,
    target: &DistributionTarget,
    overrides: &BTreeMap<usize, DistributionTarget>,
) -> Result<CountPlan, EngineError> {
    if num_sets == 0 {
        return Err(EngineError::InvalidSetCount(num_sets));
    }
    if let Some((&set_no, _)) = overrides.iter().find(|(n, _)| **n == 0 || **n > num_sets) {
        return Err(EngineError::InvalidOverride { set_no, num_sets });
    }

    let base = target.resolve(None)?;
    let mut sets = vec![base; num_sets];
    for (&set_no, t) in overrides {
        sets[set_no - 1] = t.resolve(Some(set_no))?;
    }
    Ok(CountPlan { sets })
}

/// Largest-remainder (Hamilton) apportionment of `total` over three tiers.
///
/// Floors every exact quota, then gives the leftover units to the largest
/// fractional parts; equal fractions go to the earlier tier.
pub fn largest_remainder(
    percents: &TierMap<f64>,
    total: usize,
    set_no: Option<usize>,
) -> Result<TierMap<usize>, EngineError> {
    let sum: f64 = percents.iter().map(|(_, p)| *p).sum();
    let all_valid = percents.iter().all(|(_, p)| p.is_finite() && *p >= 0.0);
    if !all_valid || !sum.is_finite() || (sum - 100.0).abs() > PERCENT_TOLERANCE {
        return Err(EngineError::InvalidPercentage { set_no, sum });
    }

    // Normalising by the actual sum keeps the quotas summing to `total`
    // even when the input is off by less than the tolerance.
    let quotas = percents.map(|_, p| total as f64 * p / sum);
    let mut counts = quotas.map(|_, q| q.floor() as usize);
    let assigned = counts.total();
    let mut leftover = total.saturating_sub(assigned);

    let mut by_fraction: Vec<(Tier, f64)> = quotas
        .iter()
        .map(|(t, q)| (t, q - q.floor()))
        .collect();
    // Stable sort keeps tier order among equal fractions.
    by_fraction.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (tier, _) in by_fraction.iter().cycle() {
        if leftover == 0 {
            break;
        }
        *counts.get_mut(*tier) += 1;
        leftover -= 1;
    }
    Ok(counts)
}
