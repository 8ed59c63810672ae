use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::allocation_engine::{
    allocator::UsageCounter,
    helpers::fisher_yates,
    models::{AllocationTable, Tier},
    planner::CountPlan,
    pool::Pool,
};

/// Use count of one bank question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionUsage {
    pub question_no: u32,
    pub code: String,
    pub tier: Tier,
    pub uses: usize,
}

/// Fill and reuse statistics for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub tier: Tier,
    pub pool_size: usize,
    /// Slots requested across all sets.
    pub planned: usize,
    /// Slots actually filled across all sets.
    pub allocated: usize,
    /// `allocated / planned`; 1.0 when nothing was planned.
    pub fill_rate: f64,
    pub min_uses: usize,
    pub max_uses: usize,
    pub delta: usize,
    /// Population variance of the tier's use counts, 4 decimals.
    pub variance: f64,
    /// Sets holding fewer distinct questions of this tier than planned.
    pub shortfall_sets: Vec<usize>,
}

impl TierStats {
    pub fn has_shortfall(&self) -> bool {
        !self.shortfall_sets.is_empty()
    }
}

/// Outcome of one structural check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub details: Vec<String>,
}

impl Check {
    fn from_details(name: &str, details: Vec<String>) -> Self {
        Check { name: name.to_string(), passed: details.is_empty(), details }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Every pool question, tier order then bank order.
    pub questions: Vec<QuestionUsage>,
    /// One entry per tier, tier order.
    pub tiers: Vec<TierStats>,
    pub overall_min: usize,
    pub overall_max: usize,
    /// `max - min` over questions used at least once.
    pub reuse_spread: usize,
    pub checks: Vec<Check>,
    pub warnings: Vec<String>,
}

impl EvaluationReport {
    pub fn tier(&self, tier: Tier) -> Option<&TierStats> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn has_shortfall(&self) -> bool {
        self.tiers.iter().any(TierStats::has_shortfall)
    }

    pub fn overall_delta(&self) -> usize {
        self.overall_max - self.overall_min
    }
}

/// Build the usage / fill report for one run. Pure: the same inputs always
/// give the same report.
pub fn evaluate(
    usage: &UsageCounter,
    plan: &CountPlan,
    table: &AllocationTable,
    pool: &Pool,
) -> EvaluationReport {
    let questions: Vec<QuestionUsage> = pool
        .iter()
        .map(|q| QuestionUsage {
            question_no: q.number,
            code: q.code.clone(),
            tier: q.tier,
            uses: usage.get(q.number),
        })
        .collect();

    let mut warnings = Vec::new();
    let tiers: Vec<TierStats> = Tier::ALL
        .iter()
        .map(|&tier| {
            let counts: Vec<usize> = questions.iter().filter(|q| q.tier == tier).map(|q| q.uses).collect();
            let (min_uses, max_uses) = min_max(&counts);

            let mut shortfall_sets = Vec::new();
            for set in table.sets() {
                let required = plan.required(set.set_no, tier);
                let distinct = set.distinct(tier);
                if distinct < required {
                    warnings.push(format!(
                        "Set_{}: {} distinct {} question(s) for {} slot(s)",
                        set.set_no, distinct, tier, required
                    ));
                    shortfall_sets.push(set.set_no);
                }
            }

            let planned = plan.tier_total(tier);
            let allocated: usize = table.sets().iter().map(|s| s.count(tier)).sum();
            TierStats {
                tier,
                pool_size: counts.len(),
                planned,
                allocated,
                fill_rate: if planned == 0 { 1.0 } else { allocated as f64 / planned as f64 },
                min_uses,
                max_uses,
                delta: max_uses - min_uses,
                variance: round4(variance(&counts)),
                shortfall_sets,
            }
        })
        .collect();

    let all: Vec<usize> = questions.iter().map(|q| q.uses).collect();
    let (overall_min, overall_max) = min_max(&all);
    let used: Vec<usize> = all.iter().copied().filter(|&n| n > 0).collect();
    let (used_min, used_max) = min_max(&used);

    let checks = vec![
        Check::from_details("quiz_structure", structure_problems(plan, table, pool)),
        Check::from_details("no_duplicates", duplicate_problems(table)),
        Check::from_details("all_questions_used", unused_problems(&questions)),
    ];

    EvaluationReport {
        questions,
        tiers,
        overall_min,
        overall_max,
        reuse_spread: used_max - used_min,
        checks,
        warnings,
    }
}

/// Every set holds its planned count per tier and only known questions of
/// the tier it claims.
fn structure_problems(plan: &CountPlan, table: &AllocationTable, pool: &Pool) -> Vec<String> {
    let index = pool.index();
    let mut problems = Vec::new();
    if table.len() != plan.num_sets() {
        problems.push(format!("{} set(s) allocated for {} planned", table.len(), plan.num_sets()));
    }
    for set in table.sets() {
        for entry in &set.entries {
            match index.get(&entry.question_no) {
                None => problems.push(format!("Set_{}: unknown question {}", set.set_no, entry.question_no)),
                Some(q) if q.tier != entry.tier => problems.push(format!(
                    "Set_{}: question {} is {} but filed as {}",
                    set.set_no, entry.question_no, q.tier, entry.tier
                )),
                Some(_) => {}
            }
        }
        for tier in Tier::ALL {
            let (got, want) = (set.count(tier), plan.required(set.set_no, tier));
            if got != want {
                problems.push(format!("Set_{}: {got} {tier} question(s), planned {want}", set.set_no));
            }
        }
    }
    problems
}

fn duplicate_problems(table: &AllocationTable) -> Vec<String> {
    table
        .sets()
        .iter()
        .filter_map(|set| {
            let mut nos = set.question_numbers();
            nos.sort_unstable();
            let mut dups: Vec<u32> = nos.windows(2).filter(|w| w[0] == w[1]).map(|w| w[0]).collect();
            dups.dedup();
            (!dups.is_empty()).then(|| format!("Set_{}: duplicate question(s) {}", set.set_no, join(&dups)))
        })
        .collect()
}

fn unused_problems(questions: &[QuestionUsage]) -> Vec<String> {
    let unused: Vec<u32> = questions.iter().filter(|q| q.uses == 0).map(|q| q.question_no).collect();
    if unused.is_empty() {
        Vec::new()
    } else {
        vec![format!("unused question(s) {}", join(&unused))]
    }
}

fn join(nos: &[u32]) -> String {
    nos.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}

fn min_max(values: &[usize]) -> (usize, usize) {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    (min, max)
}

fn variance(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// Random baseline
// ---------------------------------------------------------------------------

/// Usage spread that plain uniform sampling would produce for the same plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSpread {
    pub trials: usize,
    pub avg_delta: f64,
    pub min_delta: usize,
    pub max_delta: usize,
}

/// Simulate `trials` runs that draw each set's questions uniformly at random
/// (no usage balancing) and report the resulting overall `max - min` usage.
pub fn random_baseline<R: Rng>(pool: &Pool, plan: &CountPlan, trials: usize, rng: &mut R) -> BaselineSpread {
    let mut deltas = Vec::with_capacity(trials);
    for _ in 0..trials {
        let mut counts: HashMap<u32, usize> = pool.iter().map(|q| (q.number, 0)).collect();
        for (_, set_counts) in plan.iter() {
            for (tier, &required) in set_counts.iter() {
                let mut bucket: Vec<u32> = pool.bucket(tier).iter().map(|q| q.number).collect();
                fisher_yates(&mut bucket, rng);
                for no in bucket.into_iter().take(required) {
                    *counts.entry(no).or_insert(0) += 1;
                }
            }
        }
        let values: Vec<usize> = counts.into_values().collect();
        let (min, max) = min_max(&values);
        deltas.push(max - min);
    }

    let avg = if deltas.is_empty() { 0.0 } else { deltas.iter().sum::<usize>() as f64 / deltas.len() as f64 };
    BaselineSpread {
        trials,
        avg_delta: (avg * 100.0).round() / 100.0,
        min_delta: deltas.iter().copied().min().unwrap_or(0),
        max_delta: deltas.iter().copied().max().unwrap_or(0),
    }
}
