//! Workbook export: the run's papers, answer key, allocation tables and
//! evaluation as named sheets of text cells, saved as pretty JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

use crate::allocation_engine::{
    models::AllocationTable,
    EvaluationReport, GenerationRun, Pool, ShuffledTable,
};
use crate::error::Result;

pub const ANSWER_KEY_SHEET: &str = "Answer_Key";
pub const ANSWER_KEY_HEADER: [&str; 4] = ["Set", "Q.No", "Question No", "Answer"];

/// One table: a header row plus data rows of equal width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, header: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Sheet {
            name: name.into(),
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: impl IntoIterator<Item = impl Into<String>>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// Index of `column` in the header, exact match.
    pub fn column(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|h| h == column)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON, creating parent directories as needed.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Every sheet for one generation run, in output order.
pub fn build_workbook(pool: &Pool, run: &GenerationRun) -> Workbook {
    let mut sheets = set_sheets(pool, &run.shuffled);
    sheets.push(answer_key_sheet(&run.shuffled));
    sheets.push(allocation_sheet(&run.allocation.table));
    sheets.push(shuffled_sheet(&run.shuffled));
    sheets.push(evaluation_sheet(&run.report));
    sheets.push(checks_sheet(&run.report));
    sheets.push(usage_sheet(&run.report));
    Workbook { sheets }
}

/// One paper per set, options in presented order, no answers.
pub fn set_sheets(pool: &Pool, shuffled: &ShuffledTable) -> Vec<Sheet> {
    let index = pool.index();
    shuffled
        .sets()
        .iter()
        .map(|set| {
            let mut sheet = Sheet::new(
                format!("Set_{}", set.set_no),
                ["Q.No", "Question", "Option A", "Option B", "Option C", "Option D"],
            );
            for (i, pq) in set.questions.iter().enumerate() {
                let Some(q) = index.get(&pq.question_no) else { continue };
                let mut row = vec![(i + 1).to_string(), q.text.clone()];
                row.extend(pq.option_order.iter().map(|&tag| q.option(tag).to_string()));
                sheet.push(row);
            }
            sheet
        })
        .collect()
}

/// Long-format key: one row per presented question.
pub fn answer_key_sheet(shuffled: &ShuffledTable) -> Sheet {
    let mut sheet = Sheet::new(ANSWER_KEY_SHEET, ANSWER_KEY_HEADER);
    for set in shuffled.sets() {
        for (i, pq) in set.questions.iter().enumerate() {
            sheet.push([
                format!("Set_{}", set.set_no),
                (i + 1).to_string(),
                pq.question_no.to_string(),
                pq.answer.to_string(),
            ]);
        }
    }
    sheet
}

/// Question-slot × set grid of bank numbers; short sets leave blanks.
fn grid_sheet(name: &str, columns: Vec<Vec<u32>>) -> Sheet {
    let mut header = vec!["Q".to_string()];
    header.extend((1..=columns.len()).map(|s| format!("S{s}")));
    let mut sheet = Sheet::new(name, header);

    let depth = columns.iter().map(Vec::len).max().unwrap_or(0);
    for slot in 0..depth {
        let mut row = vec![format!("Q{}", slot + 1)];
        row.extend(columns.iter().map(|col| col.get(slot).map(u32::to_string).unwrap_or_default()));
        sheet.push(row);
    }
    sheet
}

pub fn allocation_sheet(table: &AllocationTable) -> Sheet {
    grid_sheet("Allocation_Table", table.sets().iter().map(|s| s.question_numbers()).collect())
}

pub fn shuffled_sheet(shuffled: &ShuffledTable) -> Sheet {
    grid_sheet("Shuffled_Table", shuffled.sets().iter().map(|s| s.question_numbers()).collect())
}

fn percent(rate: f64) -> String {
    format!("{:.1}", rate * 100.0)
}

pub fn evaluation_sheet(report: &EvaluationReport) -> Sheet {
    let mut sheet = Sheet::new(
        "Evaluation",
        ["Tier", "Pool", "Planned", "Allocated", "Fill %", "Min", "Max", "Delta", "Variance", "Shortfall Sets"],
    );
    for t in &report.tiers {
        let sets: Vec<String> = t.shortfall_sets.iter().map(|s| format!("Set_{s}")).collect();
        sheet.push([
            t.tier.to_string(),
            t.pool_size.to_string(),
            t.planned.to_string(),
            t.allocated.to_string(),
            percent(t.fill_rate),
            t.min_uses.to_string(),
            t.max_uses.to_string(),
            t.delta.to_string(),
            format!("{:.4}", t.variance),
            sets.join(" "),
        ]);
    }

    let pool: usize = report.tiers.iter().map(|t| t.pool_size).sum();
    let planned: usize = report.tiers.iter().map(|t| t.planned).sum();
    let allocated: usize = report.tiers.iter().map(|t| t.allocated).sum();
    let fill = if planned == 0 { 1.0 } else { allocated as f64 / planned as f64 };
    sheet.push([
        "OVERALL".to_string(),
        pool.to_string(),
        planned.to_string(),
        allocated.to_string(),
        percent(fill),
        report.overall_min.to_string(),
        report.overall_max.to_string(),
        report.overall_delta().to_string(),
        String::new(),
        format!("reuse spread {}", report.reuse_spread),
    ]);
    sheet
}

pub fn checks_sheet(report: &EvaluationReport) -> Sheet {
    let mut sheet = Sheet::new("Checks", ["Check", "Result", "Details"]);
    for check in &report.checks {
        let result = if check.passed { "PASS" } else { "FAIL" };
        sheet.push([check.name.clone(), result.to_string(), check.details.join("; ")]);
    }
    for warning in &report.warnings {
        sheet.push(["warning".to_string(), "WARN".to_string(), warning.clone()]);
    }
    sheet
}

pub fn usage_sheet(report: &EvaluationReport) -> Sheet {
    let mut sheet = Sheet::new("Usage", ["Question No", "Code", "Tier", "Uses"]);
    for q in &report.questions {
        sheet.push([q.question_no.to_string(), q.code.clone(), q.tier.to_string(), q.uses.to_string()]);
    }
    sheet
}

/// Table row for console output
#[derive(Tabled)]
struct TierTableRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Pool")]
    pool: usize,
    #[tabled(rename = "Planned")]
    planned: usize,
    #[tabled(rename = "Fill")]
    fill: String,
    #[tabled(rename = "Uses (min-max)")]
    uses: String,
    #[tabled(rename = "Variance")]
    variance: String,
    #[tabled(rename = "Short sets")]
    short: usize,
}

/// Per-tier evaluation summary rendered for the terminal.
pub fn evaluation_table(report: &EvaluationReport) -> String {
    let rows: Vec<TierTableRow> = report
        .tiers
        .iter()
        .map(|t| TierTableRow {
            tier: t.tier.to_string(),
            pool: t.pool_size,
            planned: t.planned,
            fill: format!("{}%", percent(t.fill_rate)),
            uses: format!("{}-{}", t.min_uses, t.max_uses),
            variance: format!("{:.4}", t.variance),
            short: t.shortfall_sets.len(),
        })
        .collect();
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation_engine::{generate_sets, DistributionTarget, GenerationRequest, ShuffleMode};
    use crate::bank::sample_table;
    use crate::allocation_engine::pool::normalize;

    fn run() -> (Pool, GenerationRun) {
        let pool = normalize(&sample_table(4, 6, 5)).unwrap();
        let request = GenerationRequest::new(3, DistributionTarget::absolute(2, 3, 2))
            .with_shuffle(ShuffleMode::Both)
            .with_seed(12);
        let run = generate_sets(&pool, &request).unwrap();
        (pool, run)
    }

    #[test]
    fn workbook_has_every_sheet_in_order() {
        let (pool, run) = run();
        let wb = build_workbook(&pool, &run);
        assert_eq!(
            wb.sheet_names(),
            vec![
                "Set_1", "Set_2", "Set_3", "Answer_Key", "Allocation_Table",
                "Shuffled_Table", "Evaluation", "Checks", "Usage",
            ]
        );
    }

    #[test]
    fn set_sheets_show_options_in_presented_order() {
        let (pool, run) = run();
        let sheets = set_sheets(&pool, &run.shuffled);
        let first = &run.shuffled.sets()[0];
        assert_eq!(sheets[0].rows.len(), 7);
        for (row, pq) in sheets[0].rows.iter().zip(&first.questions) {
            let q = pool.get(pq.question_no).unwrap();
            assert_eq!(row[1], q.text);
            // The answer column shown to students holds the correct text.
            let shown = &row[2 + pq.answer.index()];
            assert_eq!(shown, q.option(q.answer));
        }
        assert!(sheets[0].column("Answer").is_none());
    }

    #[test]
    fn grid_sheets_have_one_column_per_set() {
        let (_, run) = run();
        let alloc = allocation_sheet(&run.allocation.table);
        assert_eq!(alloc.header, vec!["Q", "S1", "S2", "S3"]);
        assert_eq!(alloc.rows.len(), 7);
        assert_eq!(alloc.rows[0][0], "Q1");
        let first_set: Vec<String> = alloc.rows.iter().map(|r| r[1].clone()).collect();
        let expected: Vec<String> =
            run.allocation.table.sets()[0].question_numbers().iter().map(u32::to_string).collect();
        assert_eq!(first_set, expected);
    }

    #[test]
    fn evaluation_sheet_ends_with_overall_row() {
        let (_, run) = run();
        let sheet = evaluation_sheet(&run.report);
        assert_eq!(sheet.rows.len(), 4);
        let overall = sheet.rows.last().unwrap();
        assert_eq!(overall[0], "OVERALL");
        assert_eq!(overall[2], "21");
        assert_eq!(overall[4], "100.0");
    }

    #[test]
    fn console_table_lists_every_tier() {
        let (_, run) = run();
        let table = evaluation_table(&run.report);
        for tier in ["Hard", "Medium", "Easy", "Uses (min-max)"] {
            assert!(table.contains(tier), "{table}");
        }
    }

    #[test]
    fn workbook_json_round_trips() {
        let (pool, run) = run();
        let wb = build_workbook(&pool, &run);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz_sets.json");
        wb.write_json(&path).unwrap();
        assert_eq!(Workbook::read_json(&path).unwrap(), wb);
    }
}
