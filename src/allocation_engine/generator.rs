use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::allocation_engine::{
    allocator::{allocate, Allocation},
    evaluator::{evaluate, EvaluationReport},
    helpers::{stream_rng, ALLOCATION_STREAM, SHUFFLE_STREAM},
    models::{RawTable, ShortfallPolicy, ShuffleMode, ShuffledTable},
    planner::{plan, CountPlan, DistributionTarget},
    pool::{normalize, Pool},
    shuffler::shuffle,
};
use crate::error::EngineError;

/// Everything one generation run needs besides the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub num_sets: usize,
    pub target: DistributionTarget,
    /// Per-set replacements for `target`, keyed by 1-based set number.
    #[serde(default)]
    pub overrides: BTreeMap<usize, DistributionTarget>,
    #[serde(default)]
    pub shuffle: ShuffleMode,
    #[serde(default)]
    pub shortfall_policy: ShortfallPolicy,
    /// `None` draws from OS entropy; the run is then not reproducible.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl GenerationRequest {
    /// Default shuffle and shortfall behaviour, entropy seeded.
    pub fn new(num_sets: usize, target: DistributionTarget) -> Self {
        GenerationRequest {
            num_sets,
            target,
            overrides: BTreeMap::new(),
            shuffle: ShuffleMode::default(),
            shortfall_policy: ShortfallPolicy::default(),
            rng_seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_shuffle(mut self, mode: ShuffleMode) -> Self {
        self.shuffle = mode;
        self
    }

    pub fn with_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.shortfall_policy = policy;
        self
    }

    pub fn with_override(mut self, set_no: usize, target: DistributionTarget) -> Self {
        self.overrides.insert(set_no, target);
        self
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub plan: CountPlan,
    pub allocation: Allocation,
    pub shuffled: ShuffledTable,
    pub report: EvaluationReport,
}

/// Plan → allocate → shuffle → evaluate over an already normalised pool.
///
/// Every validation error surfaces before the first question is drawn.
pub fn generate_sets(pool: &Pool, request: &GenerationRequest) -> Result<GenerationRun, EngineError> {
    let plan = plan(request.num_sets, &request.target, &request.overrides)?;
    info!(sets = plan.num_sets(), uniform = plan.is_uniform(), pool = pool.len(), "count plan ready");

    let mut alloc_rng = stream_rng(request.rng_seed, ALLOCATION_STREAM);
    let allocation = allocate(pool, &plan, request.shortfall_policy, &mut alloc_rng)?;
    info!(
        picks = allocation.usage.total(),
        shortfalls = allocation.shortfalls.len(),
        "allocation finished"
    );

    let mut shuffle_rng = stream_rng(request.rng_seed, SHUFFLE_STREAM);
    let shuffled = shuffle(&allocation.table, pool, request.shuffle, &mut shuffle_rng);
    info!(mode = %request.shuffle, "presentation shuffled");

    let report = evaluate(&allocation.usage, &plan, &allocation.table, pool);
    info!(passed = report.all_passed(), spread = report.reuse_spread, "evaluation done");

    Ok(GenerationRun { plan, allocation, shuffled, report })
}

/// Normalise `raw`, then run [`generate_sets`].
pub fn generate_from_table(
    raw: &RawTable,
    request: &GenerationRequest,
) -> Result<(Pool, GenerationRun), EngineError> {
    let pool = normalize(raw)?;
    let counts = pool.counts();
    info!(questions = pool.len(), %counts, "question bank loaded");
    let run = generate_sets(&pool, request)?;
    Ok((pool, run))
}
