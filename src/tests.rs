//! Scenario tests for the `quiz_set_gen` crate.
//!
//! Included from `lib.rs` under `#[cfg(test)]`.
//!
//! | Group | What is tested |
//! |-------|----------------|
//! | Determinism | Same seed → byte-identical tables; shuffle mode never changes selection |
//! | Fairness | Least-used-first holds at every pick; per-tier spread ≤ 1 |
//! | Scenarios | Small pools, percentage mode, overrides, empty tiers, reject policy |
//! | Grading | Answer key survives the workbook; perfect responses score 100 % |

use std::collections::{BTreeMap, HashSet};

use rand::{rngs::StdRng, SeedableRng};

use crate::allocation_engine::{
    generate_from_table, generate_sets, normalize, DistributionTarget, GenerationRequest,
    GenerationRun, Pool, ShortfallPolicy, ShuffleMode, Tier, TierMap,
};
use crate::bank::sample_table;
use crate::error::EngineError;
use crate::export::build_workbook;
use crate::grading::{score_responses, simulate_responses, AnswerKey, ResponseRates, DEFAULT_PASS_THRESHOLD};

// ── helpers ──────────────────────────────────────────────────────────────────

fn pool(hard: usize, medium: usize, easy: usize) -> Pool {
    normalize(&sample_table(hard, medium, easy)).unwrap()
}

/// Absolute-count request with a fixed seed.
fn req(sets: usize, counts: (i64, i64, i64), seed: u64) -> GenerationRequest {
    GenerationRequest::new(sets, DistributionTarget::absolute(counts.0, counts.1, counts.2)).with_seed(seed)
}

fn run(pool: &Pool, request: &GenerationRequest) -> GenerationRun {
    generate_sets(pool, request).unwrap()
}

/// Five seeds that span different RNG states.
const SEEDS: [u64; 5] = [1, 42, 999, 0xDEAD_BEEF, 7];

// ── determinism ──────────────────────────────────────────────────────────────

#[test]
fn same_seed_produces_byte_identical_tables() {
    let pool = pool(10, 25, 15);
    for seed in SEEDS {
        let request = req(20, (4, 6, 5), seed).with_shuffle(ShuffleMode::Both);
        let a = run(&pool, &request);
        let b = run(&pool, &request);
        assert_eq!(
            serde_json::to_string(&a.allocation.table).unwrap(),
            serde_json::to_string(&b.allocation.table).unwrap(),
            "allocation mismatch for seed {seed}"
        );
        assert_eq!(
            serde_json::to_string(&a.shuffled).unwrap(),
            serde_json::to_string(&b.shuffled).unwrap(),
            "shuffle mismatch for seed {seed}"
        );
    }
}

#[test]
fn different_seeds_produce_different_sets() {
    let pool = pool(10, 25, 15);
    let tables: HashSet<String> = SEEDS
        .iter()
        .map(|&seed| serde_json::to_string(&run(&pool, &req(10, (4, 6, 5), seed)).allocation.table).unwrap())
        .collect();
    assert!(tables.len() > 1, "all seeds produced the same allocation");
}

#[test]
fn shuffle_mode_never_changes_selection() {
    let pool = pool(10, 25, 15);
    let plain = run(&pool, &req(15, (4, 6, 5), 42).with_shuffle(ShuffleMode::None));
    for mode in [ShuffleMode::OptionsOnly, ShuffleMode::QuestionsOnly, ShuffleMode::Both] {
        let shuffled = run(&pool, &req(15, (4, 6, 5), 42).with_shuffle(mode));
        assert_eq!(plain.allocation, shuffled.allocation, "selection moved under {mode}");
    }
}

#[test]
fn entropy_seeded_run_is_valid() {
    let pool = pool(10, 25, 15);
    let request = GenerationRequest::new(8, DistributionTarget::absolute(4, 6, 5));
    let run = run(&pool, &request);
    assert_eq!(run.allocation.table.len(), 8);
    assert!(run.report.checks.iter().find(|c| c.name == "quiz_structure").unwrap().passed);
}

// ── fairness ─────────────────────────────────────────────────────────────────

/// Replay every pick in order and check it took a least-used question among
/// those not yet drawn in the current round.
#[test]
fn every_pick_is_least_used_among_the_round() {
    let pool = pool(7, 9, 4);
    for seed in SEEDS {
        let run = run(&pool, &req(30, (3, 5, 6), seed));
        let mut usage: BTreeMap<u32, usize> = pool.iter().map(|q| (q.number, 0)).collect();

        for set in run.allocation.table.sets() {
            for tier in Tier::ALL {
                let bucket: Vec<u32> = pool.bucket(tier).iter().map(|q| q.number).collect();
                let mut round: HashSet<u32> = HashSet::new();
                for entry in set.entries.iter().filter(|e| e.tier == tier) {
                    if round.len() == bucket.len() {
                        round.clear();
                    }
                    let floor = bucket.iter().filter(|n| !round.contains(*n)).map(|n| usage[n]).min().unwrap();
                    assert_eq!(
                        usage[&entry.question_no], floor,
                        "seed {seed}: Set_{} took question {} above the least-used level",
                        set.set_no, entry.question_no
                    );
                    round.insert(entry.question_no);
                    *usage.get_mut(&entry.question_no).unwrap() += 1;
                }
            }
        }
        let replayed: Vec<(u32, usize)> = usage.into_iter().collect();
        let recorded: Vec<(u32, usize)> = run.allocation.usage.iter().collect();
        assert_eq!(replayed, recorded, "seed {seed}: usage counter disagrees with the table");
    }
}

#[test]
fn default_run_keeps_each_tier_within_one_use() {
    let pool = pool(10, 25, 15);
    for seed in SEEDS {
        let run = run(&pool, &req(50, (4, 6, 5), seed));
        for stats in &run.report.tiers {
            assert!(stats.delta <= 1, "seed {seed}: {} delta {}", stats.tier, stats.delta);
        }
        // 50 × 4 hard picks over 10 questions.
        let hard = run.report.tier(Tier::Hard).unwrap();
        assert_eq!((hard.min_uses, hard.max_uses), (20, 20));
    }
}

// ── scenarios ────────────────────────────────────────────────────────────────

#[test]
fn tiny_pool_uses_everything_evenly() {
    let pool = pool(2, 3, 2);
    for seed in SEEDS {
        let run = run(&pool, &req(3, (1, 1, 1), seed));
        assert!(run.report.questions.iter().all(|q| q.uses > 0), "seed {seed}: unused question");
        assert!(run.report.reuse_spread <= 1);
        for stats in &run.report.tiers {
            assert!((stats.fill_rate - 1.0).abs() < f64::EPSILON);
        }
        assert!(run.report.all_passed(), "seed {seed}: {:?}", run.report.checks);
    }
}

#[test]
fn empty_required_tier_produces_no_output() {
    let pool = pool(0, 5, 5);
    let err = generate_sets(&pool, &req(4, (1, 2, 2), 3)).unwrap_err();
    assert_eq!(err, EngineError::InsufficientPool { tier: Tier::Hard, set_no: 1, required: 1 });
}

#[test]
fn percentage_mode_hits_exact_totals() {
    let pool = pool(10, 25, 15);
    let request = GenerationRequest::new(6, DistributionTarget::percentage(25.0, 40.0, 35.0, 15)).with_seed(5);
    let run = run(&pool, &request);
    for set in run.allocation.table.sets() {
        assert_eq!(set.entries.len(), 15);
        assert_eq!(
            TierMap::new(set.count(Tier::Hard), set.count(Tier::Medium), set.count(Tier::Easy)),
            TierMap::new(4, 6, 5)
        );
    }
}

#[test]
fn bad_percentages_fail_before_allocation() {
    let pool = pool(10, 25, 15);
    let request = GenerationRequest::new(6, DistributionTarget::percentage(30.0, 30.0, 30.0, 15));
    let err = generate_sets(&pool, &request).unwrap_err();
    assert!(matches!(err, EngineError::InvalidPercentage { set_no: None, .. }));
}

#[test]
fn overrides_shape_single_sets() {
    let pool = pool(10, 25, 15);
    let request = req(4, (4, 6, 5), 9).with_override(3, DistributionTarget::absolute(0, 10, 0));
    let run = run(&pool, &request);
    let third = run.allocation.table.set(3).unwrap();
    assert_eq!(third.count(Tier::Hard), 0);
    assert_eq!(third.count(Tier::Medium), 10);
    assert_eq!(run.allocation.table.set(2).unwrap().count(Tier::Hard), 4);
    assert!(run.report.checks[0].passed);
}

#[test]
fn reject_policy_aborts_on_small_tier() {
    let pool = pool(3, 25, 15);
    let request = req(2, (4, 6, 5), 1).with_policy(ShortfallPolicy::Reject);
    let err = generate_sets(&pool, &request).unwrap_err();
    assert_eq!(err, EngineError::Shortfall { tier: Tier::Hard, set_no: 1, required: 4, available: 3 });
}

#[test]
fn duplicate_policy_reports_shortfall_warnings() {
    let pool = pool(3, 25, 15);
    let run = run(&pool, &req(2, (4, 6, 5), 1));
    assert_eq!(run.allocation.shortfalls.len(), 2);
    assert_eq!(run.report.warnings.len(), 2);
    assert_eq!(run.report.tier(Tier::Hard).unwrap().shortfall_sets, vec![1, 2]);
}

#[test]
fn bank_errors_surface_through_the_pipeline() {
    let mut raw = sample_table(2, 2, 2);
    raw.rows[3][0] = "1".to_string();
    let err = generate_from_table(&raw, &req(1, (1, 1, 1), 1)).unwrap_err();
    assert_eq!(err, EngineError::DuplicateId { row: 4, question_no: 1 });
}

// ── grading ──────────────────────────────────────────────────────────────────

#[test]
fn answer_key_survives_the_workbook() {
    let pool = pool(10, 25, 15);
    let run = run(&pool, &req(5, (4, 6, 5), 77).with_shuffle(ShuffleMode::Both));
    let workbook = build_workbook(&pool, &run);
    let from_book = AnswerKey::from_workbook(&workbook).unwrap();
    assert_eq!(from_book, AnswerKey::from_shuffled(&run.shuffled));
}

#[test]
fn perfect_students_score_full_marks_on_shuffled_papers() {
    let pool = pool(10, 25, 15);
    let run = run(&pool, &req(5, (4, 6, 5), 77).with_shuffle(ShuffleMode::Both));
    let key = AnswerKey::from_shuffled(&run.shuffled);
    let rates = ResponseRates { correct: 1.0, wrong: 0.0 };
    let mut rng = StdRng::seed_from_u64(4);
    let responses = simulate_responses(&key, pool.len(), 5, rates, &mut rng).unwrap();

    let report = score_responses(&responses, &key, DEFAULT_PASS_THRESHOLD).unwrap();
    assert_eq!(report.students.len(), 5);
    assert_eq!(report.average, 100.0);
    assert_eq!(report.pass_count, 5);
}

#[test]
fn perfect_students_score_full_marks_on_repeated_questions() {
    // Two hard questions cover four hard slots, so every paper repeats both.
    let pool = pool(2, 5, 5);
    let run = run(&pool, &req(3, (4, 1, 1), 5).with_shuffle(ShuffleMode::Both));
    assert!(!run.allocation.shortfalls.is_empty());
    let key = AnswerKey::from_workbook(&build_workbook(&pool, &run)).unwrap();

    let rates = ResponseRates { correct: 1.0, wrong: 0.0 };
    let responses = simulate_responses(&key, pool.len(), 3, rates, &mut StdRng::seed_from_u64(5)).unwrap();
    let report = score_responses(&responses, &key, DEFAULT_PASS_THRESHOLD).unwrap();
    for student in &report.students {
        assert_eq!(student.score_percent, 100.0, "Set_{}", student.set_no);
        assert_eq!(student.assigned, 4);
    }
    assert_eq!(report.validation_issues().count(), 0);
}
