//! Allocation engine: question pool, count planning, greedy allocation,
//! presentation shuffling and evaluation.
//!
//! ## Module overview
//!
//! | Module      | Purpose |
//! |-------------|---------|
//! | `models`    | Shared types: tiers, option tags, questions, allocation / shuffled tables |
//! | `pool`      | Validates a raw question table and buckets it by tier |
//! | `planner`   | Turns absolute or percentage targets into per-set tier counts |
//! | `allocator` | Least-used-first selection with usage tracking and shortfall policy |
//! | `shuffler`  | Per-set question and option reordering with answer remapping |
//! | `evaluator` | Usage statistics, fill rates, structural checks, random baseline |
//! | `helpers`   | Seeded RNG streams, Fisher-Yates, least-used ranking |
//! | `generator` | Single entry point `generate_sets()` running the whole pipeline |

pub mod allocator;
pub mod evaluator;
pub mod generator;
pub mod helpers;
pub mod models;
pub mod planner;
pub mod pool;
pub mod shuffler;

// Re-export the public API surface so callers can use
// `allocation_engine::generate_sets` without reaching into sub-modules.
pub use allocator::{allocate, Allocation, UsageCounter};
pub use evaluator::{evaluate, random_baseline, BaselineSpread, EvaluationReport, TierStats};
pub use generator::{generate_from_table, generate_sets, GenerationRequest, GenerationRun};
pub use models::{
    AllocatedSet, AllocationTable, OptionTag, PresentedQuestion, Question, RawTable,
    SetEntry, Shortfall, ShortfallPolicy, ShuffleMode, ShuffledSet, ShuffledTable, Tier, TierMap,
};
pub use planner::{plan, CountPlan, DistributionTarget};
pub use pool::{normalize, Pool};
pub use shuffler::shuffle;
