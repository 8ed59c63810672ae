//! Presentation shuffler: reorders questions and/or options per set without
//! touching which questions were selected.

use rand::Rng;
use tracing::warn;

use crate::allocation_engine::{
    helpers::fisher_yates,
    models::{AllocationTable, OptionTag, PresentedQuestion, ShuffleMode, ShuffledSet, ShuffledTable},
    pool::Pool,
};

/// Derive a [`ShuffledTable`] from `table`.
///
/// `pool` supplies each question's correct tag so it can be remapped when
/// options move. Entries whose number is missing from the pool have no known
/// answer and are left out of the shuffled set.
pub fn shuffle<R: Rng>(
    table: &AllocationTable,
    pool: &Pool,
    mode: ShuffleMode,
    rng: &mut R,
) -> ShuffledTable {
    let index = pool.index();

    let sets = table
        .sets()
        .iter()
        .map(|set| {
            let mut questions: Vec<PresentedQuestion> = set
                .entries
                .iter()
                .filter_map(|entry| {
                    let Some(q) = index.get(&entry.question_no) else {
                        warn!(set_no = set.set_no, question_no = entry.question_no, "question not in pool, skipped");
                        return None;
                    };
                    let original = q.answer;
                    let mut order = OptionTag::ALL;
                    if mode.shuffles_options() {
                        fisher_yates(&mut order, rng);
                    }
                    Some(PresentedQuestion {
                        question_no: entry.question_no,
                        tier: entry.tier,
                        option_order: order,
                        answer: remap_answer(&order, original),
                    })
                })
                .collect();

            if mode.shuffles_questions() {
                fisher_yates(&mut questions, rng);
            }
            ShuffledSet { set_no: set.set_no, questions }
        })
        .collect();

    ShuffledTable::new(sets)
}

/// Printed position of `original` once options are laid out as `order`.
pub fn remap_answer(order: &[OptionTag; 4], original: OptionTag) -> OptionTag {
    order
        .iter()
        .position(|&t| t == original)
        .and_then(OptionTag::from_index)
        .unwrap_or(original)
}
