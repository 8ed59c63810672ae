//! Pool normalizer: validates a raw question table and buckets it by tier.

use std::collections::HashMap;

use crate::allocation_engine::models::{OptionTag, Question, RawTable, Tier, TierMap};
use crate::error::EngineError;

/// Columns every question table must provide (after name normalisation).
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "question_no", "question", "option_a", "option_b",
    "option_c", "option_d", "answer", "difficulty",
];

/// Validated questions bucketed by tier, each bucket in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pool {
    buckets: TierMap<Vec<Question>>,
}

impl Pool {
    /// Bucket already-validated questions. Callers own uniqueness.
    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut buckets: TierMap<Vec<Question>> = TierMap::default();
        for q in questions {
            buckets.get_mut(q.tier).push(q);
        }
        Pool { buckets }
    }

    pub fn bucket(&self, tier: Tier) -> &[Question] {
        self.buckets.get(tier)
    }

    pub fn counts(&self) -> TierMap<usize> {
        self.buckets.map(|_, b| b.len())
    }

    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All questions, tier by tier.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        Tier::ALL.into_iter().flat_map(move |t| self.bucket(t).iter())
    }

    pub fn get(&self, question_no: u32) -> Option<&Question> {
        self.iter().find(|q| q.number == question_no)
    }

    /// Number → question lookup for callers that resolve many entries.
    pub fn index(&self) -> HashMap<u32, &Question> {
        self.iter().map(|q| (q.number, q)).collect()
    }
}

/// Lowercase, trim and snake-case a header cell (`" Option A"` → `option_a`).
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Validate `table` and build a [`Pool`].
///
/// Rows are reported 1-based, counting data rows only.
pub fn normalize(table: &RawTable) -> Result<Pool, EngineError> {
    let columns: Vec<String> = table.columns.iter().map(|c| normalize_column(c)).collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|req| !columns.iter().any(|c| c == req))
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::Schema {
            row: None,
            reason: format!("missing required column(s): {}", missing.join(", ")),
        });
    }

    let position = |name: &str| columns.iter().position(|c| c == name).unwrap_or_default();
    let idx: [usize; 8] = REQUIRED_COLUMNS.map(position);

    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut ordinals: TierMap<usize> = TierMap::default();
    let mut questions = Vec::with_capacity(table.rows.len());

    for (i, cells) in table.rows.iter().enumerate() {
        let row = i + 1;
        let cell = |k: usize| {
            cells.get(idx[k]).map(String::as_str).ok_or_else(|| EngineError::Schema {
                row: Some(row),
                reason: format!("missing value for '{}'", REQUIRED_COLUMNS[k]),
            })
        };

        let raw_no = cell(0)?;
        let number = parse_question_no(raw_no).ok_or_else(|| EngineError::Schema {
            row: Some(row),
            reason: format!("question_no '{}' is not a non-negative integer", raw_no.trim()),
        })?;
        if seen.insert(number, row).is_some() {
            return Err(EngineError::DuplicateId { row, question_no: number });
        }

        let label = cell(7)?;
        let tier = Tier::parse(label).ok_or_else(|| EngineError::InvalidDifficulty {
            row,
            label: label.to_string(),
        })?;

        let answer_raw = cell(6)?;
        let answer = OptionTag::parse(answer_raw).ok_or_else(|| EngineError::Schema {
            row: Some(row),
            reason: format!("answer '{}' is not one of A, B, C, D", answer_raw.trim()),
        })?;

        let ordinal = ordinals.get_mut(tier);
        *ordinal += 1;

        questions.push(Question {
            number,
            code: format!("{}{}", tier.prefix(), ordinal),
            text: cell(1)?.trim().to_string(),
            options: [
                cell(2)?.to_string(),
                cell(3)?.to_string(),
                cell(4)?.to_string(),
                cell(5)?.to_string(),
            ],
            answer,
            tier,
        });
    }

    Ok(Pool::from_questions(questions))
}

/// Accepts `"12"`, `" 12 "` and spreadsheet-style `"12.0"`.
fn parse_question_no(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let f: f64 = raw.parse().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}
