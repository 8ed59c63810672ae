//! Response simulation and scoring against a generated answer key.
//!
//! A responses sheet has one row per student: `Set_No` (`Set_<n>`) followed
//! by `Q1..Q<bank size>` columns keyed by bank question number. Students only
//! fill the columns of the questions their set contains, using the letter
//! printed on their paper.
//!
//! A question printed twice in one set (possible under the duplicate shortfall
//! policy) still has a single column. It is graded once, and any letter it was
//! printed under is accepted.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use thiserror::Error;
use tracing::{debug, warn};

use crate::allocation_engine::{OptionTag, ShuffledTable};
use crate::export::{Sheet, Workbook, ANSWER_KEY_HEADER, ANSWER_KEY_SHEET};

pub const SET_COLUMN: &str = "Set_No";
pub const DEFAULT_PASS_THRESHOLD: f64 = 40.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradingError {
    #[error("requested {students} student(s) but only {sets} set(s) are available")]
    TooManyStudents { students: usize, sets: usize },

    #[error("response rates must lie in [0, 1] and sum to at most 1 (correct {correct}, wrong {wrong})")]
    InvalidRates { correct: f64, wrong: f64 },

    #[error("unknown or missing Set_No '{set}' at row {row}")]
    UnknownSet { row: usize, set: String },

    #[error("answer key is malformed: {0}")]
    MalformedKey(String),

    #[error("responses sheet has no '{0}' column")]
    MissingColumn(String),
}

/// `Set_<n>` → `n`.
pub fn parse_set_name(name: &str) -> Option<usize> {
    name.trim().strip_prefix("Set_")?.parse().ok()
}

/// `Q<n>` → `n`.
fn parse_question_column(name: &str) -> Option<u32> {
    name.trim().strip_prefix('Q')?.parse().ok()
}

// ---------------------------------------------------------------------------
// Answer key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedQuestion {
    pub question_no: u32,
    /// Correct letter as printed on the student's paper.
    pub answer: OptionTag,
}

/// Correct answers per set, in presented order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey {
    sets: BTreeMap<usize, Vec<KeyedQuestion>>,
}

impl AnswerKey {
    pub fn from_shuffled(shuffled: &ShuffledTable) -> Self {
        let sets = shuffled
            .sets()
            .iter()
            .map(|set| {
                let keyed = set
                    .questions
                    .iter()
                    .map(|pq| KeyedQuestion { question_no: pq.question_no, answer: pq.answer })
                    .collect();
                (set.set_no, keyed)
            })
            .collect();
        AnswerKey { sets }
    }

    /// Read an `Answer_Key` sheet (`Set`, `Q.No`, `Question No`, `Answer`).
    pub fn from_sheet(sheet: &Sheet) -> Result<Self, GradingError> {
        let mut idx = [0usize; 4];
        for (slot, column) in idx.iter_mut().zip(ANSWER_KEY_HEADER) {
            *slot = sheet
                .column(column)
                .ok_or_else(|| GradingError::MalformedKey(format!("missing column '{column}'")))?;
        }

        let mut positioned: BTreeMap<usize, Vec<(usize, KeyedQuestion)>> = BTreeMap::new();
        for (i, row) in sheet.rows.iter().enumerate() {
            let bad = |what: &str| GradingError::MalformedKey(format!("row {}: invalid {what}", i + 1));
            let cell = |k: usize| row.get(idx[k]).map(String::as_str).unwrap_or("");

            let set_no = parse_set_name(cell(0)).ok_or_else(|| bad("set"))?;
            let position: usize = cell(1).trim().parse().map_err(|_| bad("Q.No"))?;
            let question_no: u32 = cell(2).trim().parse().map_err(|_| bad("question number"))?;
            let answer = OptionTag::parse(cell(3)).ok_or_else(|| bad("answer"))?;
            positioned
                .entry(set_no)
                .or_default()
                .push((position, KeyedQuestion { question_no, answer }));
        }

        let sets = positioned
            .into_iter()
            .map(|(set_no, mut qs)| {
                qs.sort_by_key(|(pos, _)| *pos);
                (set_no, qs.into_iter().map(|(_, q)| q).collect())
            })
            .collect();
        Ok(AnswerKey { sets })
    }

    pub fn from_workbook(workbook: &Workbook) -> Result<Self, GradingError> {
        let sheet = workbook
            .sheet(ANSWER_KEY_SHEET)
            .ok_or_else(|| GradingError::MalformedKey(format!("no '{ANSWER_KEY_SHEET}' sheet")))?;
        Self::from_sheet(sheet)
    }

    pub fn set(&self, set_no: usize) -> Option<&[KeyedQuestion]> {
        self.sets.get(&set_no).map(Vec::as_slice)
    }

    pub fn set_numbers(&self) -> Vec<usize> {
        self.sets.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn max_question_no(&self) -> u32 {
        self.sets.values().flatten().map(|q| q.question_no).max().unwrap_or(0)
    }

    /// Distinct questions of a set in first-presented order, with every
    /// letter each one was printed under.
    pub fn graded(&self, set_no: usize) -> Option<Vec<GradedQuestion>> {
        let keyed = self.set(set_no)?;
        let mut graded: Vec<GradedQuestion> = Vec::with_capacity(keyed.len());
        for kq in keyed {
            match graded.iter_mut().find(|g| g.question_no == kq.question_no) {
                Some(g) if !g.accepted.contains(&kq.answer) => g.accepted.push(kq.answer),
                Some(_) => {}
                None => graded.push(GradedQuestion { question_no: kq.question_no, accepted: vec![kq.answer] }),
            }
        }
        if graded.len() < keyed.len() {
            debug!(set_no, printed = keyed.len(), graded = graded.len(), "repeated questions share a column");
        }
        Some(graded)
    }
}

/// One response column of a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedQuestion {
    pub question_no: u32,
    pub accepted: Vec<OptionTag>,
}

impl GradedQuestion {
    pub fn accepts(&self, tag: OptionTag) -> bool {
        self.accepted.contains(&tag)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Per-question answer probabilities; the remainder is left blank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseRates {
    pub correct: f64,
    pub wrong: f64,
}

impl Default for ResponseRates {
    fn default() -> Self {
        ResponseRates { correct: 0.70, wrong: 0.20 }
    }
}

impl ResponseRates {
    pub fn blank(&self) -> f64 {
        (1.0 - self.correct - self.wrong).max(0.0)
    }

    fn validate(&self) -> Result<(), GradingError> {
        let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if in_range(self.correct) && in_range(self.wrong) && self.correct + self.wrong <= 1.0 + 1e-9 {
            Ok(())
        } else {
            Err(GradingError::InvalidRates { correct: self.correct, wrong: self.wrong })
        }
    }
}

/// Simulate `students` response rows; student i sits the i-th set of `key`.
///
/// The sheet has `max(bank_size, highest keyed number)` question columns.
pub fn simulate_responses<R: Rng>(
    key: &AnswerKey,
    bank_size: usize,
    students: usize,
    rates: ResponseRates,
    rng: &mut R,
) -> Result<Sheet, GradingError> {
    rates.validate()?;
    let sets = key.set_numbers();
    if students > sets.len() {
        return Err(GradingError::TooManyStudents { students, sets: sets.len() });
    }

    let width = bank_size.max(key.max_question_no() as usize);
    let mut header = vec![SET_COLUMN.to_string()];
    header.extend((1..=width).map(|n| format!("Q{n}")));
    let mut sheet = Sheet::new("Responses", header);

    for &set_no in sets.iter().take(students) {
        let mut row = vec![String::new(); width + 1];
        row[0] = format!("Set_{set_no}");
        for gq in key.graded(set_no).unwrap_or_default() {
            let roll: f64 = rng.gen();
            let response = if roll < rates.correct {
                Some(gq.accepted[0])
            } else if roll < rates.correct + rates.wrong {
                let others: Vec<OptionTag> = OptionTag::ALL.into_iter().filter(|&t| !gq.accepts(t)).collect();
                (!others.is_empty()).then(|| others[rng.gen_range(0..others.len())])
            } else {
                None
            };
            // Column 0 holds the set; a bank number of 0 has no Q column.
            if let Some(tag) = response.filter(|_| gq.question_no > 0) {
                row[gq.question_no as usize] = tag.to_string();
            }
        }
        sheet.push(row);
    }
    debug!(students, columns = width, "responses simulated");
    Ok(sheet)
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    /// 1-based response row.
    pub student: usize,
    pub set_no: usize,
    /// Distinct questions on the paper.
    pub assigned: usize,
    pub correct: usize,
    /// Wrong plus blank: every assigned question is compulsory.
    pub wrong: usize,
    /// Answered questions that are not on the student's paper.
    pub extra_questions: Vec<u32>,
    pub score_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    pub students: Vec<StudentScore>,
    pub average: f64,
    pub median: f64,
    pub pass_count: usize,
    pub pass_rate: f64,
    pub pass_threshold: f64,
}

pub const GRADE_BUCKETS: [&str; 7] = ["90-100", "80-89", "70-79", "60-69", "50-59", "40-49", "Below 40"];

impl ScoringReport {
    /// Student counts per grade bucket, best first.
    pub fn grade_distribution(&self) -> Vec<(&'static str, usize)> {
        let mut counts = [0usize; 7];
        for s in &self.students {
            let bucket = match s.score_percent {
                p if p >= 90.0 => 0,
                p if p >= 80.0 => 1,
                p if p >= 70.0 => 2,
                p if p >= 60.0 => 3,
                p if p >= 50.0 => 4,
                p if p >= 40.0 => 5,
                _ => 6,
            };
            counts[bucket] += 1;
        }
        GRADE_BUCKETS.into_iter().zip(counts).collect()
    }

    /// Students who answered questions outside their set.
    pub fn validation_issues(&self) -> impl Iterator<Item = &StudentScore> {
        self.students.iter().filter(|s| !s.extra_questions.is_empty())
    }

    /// `Scores`, `Summary` and `Validation` sheets.
    pub fn to_workbook(&self) -> Workbook {
        let mut scores = Sheet::new("Scores", ["Student", "Set", "Assigned", "Correct", "Wrong", "Extra Answers", "Score %"]);
        for s in &self.students {
            scores.push([
                s.student.to_string(),
                format!("Set_{}", s.set_no),
                s.assigned.to_string(),
                s.correct.to_string(),
                s.wrong.to_string(),
                s.extra_questions.len().to_string(),
                format!("{:.2}", s.score_percent),
            ]);
        }

        let mut summary = Sheet::new("Summary", ["Metric", "Value"]);
        summary.push(["Total Students".to_string(), self.students.len().to_string()]);
        summary.push(["Average Score (%)".to_string(), format!("{:.2}", self.average)]);
        summary.push(["Median Score (%)".to_string(), format!("{:.2}", self.median)]);
        summary.push([format!("Pass Count (>= {}%)", self.pass_threshold), self.pass_count.to_string()]);
        summary.push(["Pass Rate (%)".to_string(), format!("{:.2}", self.pass_rate)]);
        for (bucket, count) in self.grade_distribution() {
            summary.push([format!("Grade {bucket}"), count.to_string()]);
        }

        let mut validation = Sheet::new("Validation", ["Student", "Set", "Extra Count", "Extra Questions"]);
        for s in self.validation_issues() {
            let extras: Vec<String> = s.extra_questions.iter().map(|q| format!("Q{q}")).collect();
            validation.push([
                s.student.to_string(),
                format!("Set_{}", s.set_no),
                s.extra_questions.len().to_string(),
                extras.join(", "),
            ]);
        }

        Workbook { sheets: vec![scores, summary, validation] }
    }
}

/// Table row for console output
#[derive(Tabled)]
struct GradeTableRow {
    #[tabled(rename = "Grade")]
    grade: &'static str,
    #[tabled(rename = "Students")]
    students: usize,
}

impl ScoringReport {
    /// Grade distribution rendered for the terminal.
    pub fn console_table(&self) -> String {
        let rows = self
            .grade_distribution()
            .into_iter()
            .map(|(grade, students)| GradeTableRow { grade, students });
        Table::new(rows).to_string()
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn median(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Score every row of `responses` against `key`.
pub fn score_responses(
    responses: &Sheet,
    key: &AnswerKey,
    pass_threshold: f64,
) -> Result<ScoringReport, GradingError> {
    let set_col = responses
        .column(SET_COLUMN)
        .ok_or_else(|| GradingError::MissingColumn(SET_COLUMN.to_string()))?;
    let question_cols: Vec<(usize, u32)> = responses
        .header
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_question_column(h).map(|no| (i, no)))
        .collect();

    let mut students = Vec::with_capacity(responses.rows.len());
    for (i, row) in responses.rows.iter().enumerate() {
        let student = i + 1;
        let set_cell = row.get(set_col).map(String::as_str).unwrap_or("");
        let (set_no, assigned) = parse_set_name(set_cell)
            .and_then(|n| key.graded(n).map(|qs| (n, qs)))
            .ok_or_else(|| GradingError::UnknownSet { row: student, set: set_cell.trim().to_string() })?;

        let answered: HashMap<u32, OptionTag> = question_cols
            .iter()
            .filter_map(|&(col, no)| row.get(col).and_then(|c| OptionTag::parse(c)).map(|t| (no, t)))
            .collect();

        let correct = assigned
            .iter()
            .filter(|gq| answered.get(&gq.question_no).is_some_and(|&t| gq.accepts(t)))
            .count();
        let mut extra_questions: Vec<u32> = answered
            .keys()
            .copied()
            .filter(|no| !assigned.iter().any(|gq| gq.question_no == *no))
            .collect();
        extra_questions.sort_unstable();
        if !extra_questions.is_empty() {
            warn!(student, set_no, extras = extra_questions.len(), "answers outside the assigned set");
        }

        let score_percent = if assigned.is_empty() {
            0.0
        } else {
            round2(correct as f64 / assigned.len() as f64 * 100.0)
        };
        students.push(StudentScore {
            student,
            set_no,
            assigned: assigned.len(),
            correct,
            wrong: assigned.len() - correct,
            extra_questions,
            score_percent,
        });
    }

    let scores: Vec<f64> = students.iter().map(|s| s.score_percent).collect();
    let average = if scores.is_empty() { 0.0 } else { round2(scores.iter().sum::<f64>() / scores.len() as f64) };
    let pass_count = scores.iter().filter(|&&s| s >= pass_threshold).count();
    let pass_rate = if scores.is_empty() { 0.0 } else { round2(pass_count as f64 / scores.len() as f64 * 100.0) };

    Ok(ScoringReport {
        students,
        average,
        median: round2(median(&scores)),
        pass_count,
        pass_rate,
        pass_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key() -> AnswerKey {
        let mut sheet = Sheet::new(ANSWER_KEY_SHEET, ANSWER_KEY_HEADER);
        for (set, pos, no, ans) in [
            ("Set_1", "1", "3", "B"),
            ("Set_1", "2", "1", "A"),
            ("Set_2", "2", "4", "D"),
            ("Set_2", "1", "2", "C"),
        ] {
            sheet.push([set, pos, no, ans]);
        }
        AnswerKey::from_sheet(&sheet).unwrap()
    }

    fn responses(rows: &[[&str; 5]]) -> Sheet {
        let mut sheet = Sheet::new("Responses", ["Set_No", "Q1", "Q2", "Q3", "Q4"]);
        for row in rows {
            sheet.push(*row);
        }
        sheet
    }

    #[test]
    fn key_sheet_is_read_in_presented_order() {
        let key = key();
        assert_eq!(key.len(), 2);
        let set2: Vec<u32> = key.set(2).unwrap().iter().map(|q| q.question_no).collect();
        assert_eq!(set2, vec![2, 4]);
        assert_eq!(key.max_question_no(), 4);
    }

    #[test]
    fn malformed_key_rows_are_rejected() {
        let mut sheet = Sheet::new(ANSWER_KEY_SHEET, ANSWER_KEY_HEADER);
        sheet.push(["Set_1", "1", "3", "Z"]);
        assert!(matches!(AnswerKey::from_sheet(&sheet), Err(GradingError::MalformedKey(_))));
        let missing = Sheet::new(ANSWER_KEY_SHEET, ["Set", "Answer"]);
        assert!(AnswerKey::from_sheet(&missing).is_err());
    }

    #[test]
    fn blanks_count_as_wrong_and_extras_are_flagged() {
        let sheet = responses(&[
            ["Set_1", "A", "", "B", ""],  // both right
            ["Set_2", "", "C", "", ""],   // one right, one blank
            ["Set_1", "A", "", "C", "D"], // one right, one wrong, one extra
        ]);
        let report = score_responses(&sheet, &key(), DEFAULT_PASS_THRESHOLD).unwrap();

        assert_eq!(report.students[0].score_percent, 100.0);
        assert_eq!(report.students[1].correct, 1);
        assert_eq!(report.students[1].wrong, 1);
        assert_eq!(report.students[1].score_percent, 50.0);
        assert_eq!(report.students[2].extra_questions, vec![4]);

        assert_eq!(report.average, 66.67);
        assert_eq!(report.median, 50.0);
        assert_eq!(report.pass_count, 3);
        assert_eq!(report.validation_issues().count(), 1);
    }

    #[test]
    fn unknown_set_names_the_row() {
        let sheet = responses(&[["Set_1", "A", "", "B", ""], ["Set_9", "", "", "", ""]]);
        let err = score_responses(&sheet, &key(), DEFAULT_PASS_THRESHOLD).unwrap_err();
        assert_eq!(err, GradingError::UnknownSet { row: 2, set: "Set_9".into() });
    }

    #[test]
    fn grade_buckets_cover_every_score() {
        let sheet = responses(&[
            ["Set_1", "A", "", "B", ""],
            ["Set_1", "A", "", "", ""],
            ["Set_1", "", "", "", ""],
        ]);
        let report = score_responses(&sheet, &key(), DEFAULT_PASS_THRESHOLD).unwrap();
        let dist = report.grade_distribution();
        assert_eq!(dist[0], ("90-100", 1));
        assert_eq!(dist[4], ("50-59", 1));
        assert_eq!(dist[6], ("Below 40", 1));
        assert_eq!(dist.iter().map(|(_, n)| n).sum::<usize>(), 3);
        assert_eq!(report.pass_rate, 66.67);
        assert!(report.console_table().contains("Below 40"));
    }

    #[test]
    fn perfect_simulation_scores_full_marks() {
        let key = key();
        let rates = ResponseRates { correct: 1.0, wrong: 0.0 };
        let sheet = simulate_responses(&key, 4, 2, rates, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(sheet.header.len(), 5);
        let report = score_responses(&sheet, &key, DEFAULT_PASS_THRESHOLD).unwrap();
        assert!(report.students.iter().all(|s| s.score_percent == 100.0));
        assert_eq!(report.validation_issues().count(), 0);
    }

    #[test]
    fn all_wrong_simulation_never_hits_the_key() {
        let key = key();
        let rates = ResponseRates { correct: 0.0, wrong: 1.0 };
        let sheet = simulate_responses(&key, 4, 2, rates, &mut StdRng::seed_from_u64(3)).unwrap();
        let report = score_responses(&sheet, &key, DEFAULT_PASS_THRESHOLD).unwrap();
        assert!(report.students.iter().all(|s| s.correct == 0 && s.wrong == s.assigned));
        // Only assigned columns are filled.
        assert_eq!(sheet.rows[0][2], "");
        assert_eq!(sheet.rows[0][4], "");
    }

    #[test]
    fn simulation_rejects_bad_inputs() {
        let key = key();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            simulate_responses(&key, 4, 3, ResponseRates::default(), &mut rng).unwrap_err(),
            GradingError::TooManyStudents { students: 3, sets: 2 }
        );
        let bad = ResponseRates { correct: 0.8, wrong: 0.3 };
        assert!(matches!(
            simulate_responses(&key, 4, 1, bad, &mut rng),
            Err(GradingError::InvalidRates { .. })
        ));
    }

    fn repeated_key() -> AnswerKey {
        let mut sheet = Sheet::new(ANSWER_KEY_SHEET, ANSWER_KEY_HEADER);
        for (pos, no, ans) in [("1", "2", "A"), ("2", "3", "C"), ("3", "2", "D")] {
            sheet.push(["Set_1", pos, no, ans]);
        }
        AnswerKey::from_sheet(&sheet).unwrap()
    }

    #[test]
    fn repeated_question_is_graded_once_under_either_letter() {
        let key = repeated_key();
        let graded = key.graded(1).unwrap();
        assert_eq!(graded.len(), 2);
        assert_eq!(graded[0].accepted, vec![OptionTag::A, OptionTag::D]);

        let sheet = responses(&[
            ["Set_1", "", "D", "C", ""],
            ["Set_1", "", "A", "B", ""],
            ["Set_1", "", "B", "C", ""],
        ]);
        let report = score_responses(&sheet, &key, DEFAULT_PASS_THRESHOLD).unwrap();
        assert_eq!(report.students[0].assigned, 2);
        assert_eq!(report.students[0].score_percent, 100.0);
        assert_eq!(report.students[1].score_percent, 50.0);
        assert_eq!(report.students[2].correct, 1);
    }

    #[test]
    fn wrong_answers_avoid_every_printed_letter() {
        let key = repeated_key();
        let rates = ResponseRates { correct: 0.0, wrong: 1.0 };
        let sheet = simulate_responses(&key, 4, 1, rates, &mut StdRng::seed_from_u64(6)).unwrap();
        assert!(sheet.rows[0][2] == "B" || sheet.rows[0][2] == "C");
        let report = score_responses(&sheet, &key, DEFAULT_PASS_THRESHOLD).unwrap();
        assert_eq!(report.students[0].correct, 0);
    }

    #[test]
    fn report_workbook_has_three_sheets() {
        let sheet = responses(&[["Set_1", "A", "", "C", "D"]]);
        let wb = score_responses(&sheet, &key(), DEFAULT_PASS_THRESHOLD).unwrap().to_workbook();
        assert_eq!(wb.sheet_names(), vec!["Scores", "Summary", "Validation"]);
        assert_eq!(wb.sheet("Validation").unwrap().rows[0][3], "Q4");
    }
}
