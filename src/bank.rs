//! Question-bank files: a JSON array of row objects, one object per question.
//!
//! ```json
//! [
//!   { "question_no": 1, "question": "...", "option_a": "...", "option_b": "...",
//!     "option_c": "...", "option_d": "...", "answer": "B", "difficulty": "H" }
//! ]
//! ```
//!
//! Cells may be strings or numbers; everything is handed to the pool
//! normalizer as text.

use std::path::Path;

use serde_json::{Map, Value};

use crate::allocation_engine::{models::RawTable, pool::REQUIRED_COLUMNS, OptionTag, Tier};
use crate::error::{Error, Result};

/// Read a bank file into a [`RawTable`].
pub fn load_table(path: impl AsRef<Path>) -> Result<RawTable> {
    let content = std::fs::read_to_string(path)?;
    table_from_json(&content)
}

/// Parse bank JSON text. Columns are the union of row keys in first-seen
/// order; a key missing from a row reads as an empty cell.
pub fn table_from_json(content: &str) -> Result<RawTable> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        return Err(Error::Input("question bank must be a JSON array of row objects".into()));
    };

    let mut objects = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => objects.push(map),
            other => {
                return Err(Error::Input(format!("row {} is not an object: {other}", i + 1)));
            }
        }
    }

    let mut columns: Vec<String> = Vec::new();
    for map in &objects {
        for key in map.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .enumerate()
        .map(|(i, map)| {
            columns
                .iter()
                .map(|c| cell_text(map.get(c)).map_err(|e| Error::Input(format!("row {}, column '{c}': {e}", i + 1))))
                .collect::<Result<Vec<String>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTable { columns, rows })
}

fn cell_text(value: Option<&Value>) -> std::result::Result<String, String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(format!("unsupported cell value {other}")),
    }
}

/// Write `table` as a bank file. Integer-looking `question_no` cells are
/// stored as JSON numbers.
pub fn write_table(table: &RawTable, path: impl AsRef<Path>) -> Result<()> {
    let rows: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut map = Map::new();
            for (column, cell) in table.columns.iter().zip(row) {
                let value = match cell.parse::<u64>() {
                    Ok(n) if column == "question_no" => Value::from(n),
                    _ => Value::String(cell.clone()),
                };
                map.insert(column.clone(), value);
            }
            Value::Object(map)
        })
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&rows)?)?;
    Ok(())
}

/// Placeholder bank with the given number of questions per tier.
///
/// Numbers run 1.. across tiers; labels are `H` / `M` / `L`; the answer of
/// the i-th question in a tier cycles A, B, C, D starting at B.
pub fn sample_table(hard: usize, medium: usize, easy: usize) -> RawTable {
    let columns = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut rows = Vec::with_capacity(hard + medium + easy);
    let mut number = 1usize;

    for (tier, count) in [(Tier::Hard, hard), (Tier::Medium, medium), (Tier::Easy, easy)] {
        let (label, prompt) = match tier {
            Tier::Hard => ("H", "What is the solution to this complex problem?"),
            Tier::Medium => ("M", "Calculate the following expression."),
            Tier::Easy => ("L", "What is the basic definition of this term?"),
        };
        for i in 1..=count {
            let mut row = vec![number.to_string(), format!("{tier} Question {i}: {prompt}")];
            row.extend(OptionTag::ALL.iter().map(|tag| format!("{tier} option {tag}{i}")));
            row.push(OptionTag::ALL[i % 4].to_string());
            row.push(label.to_string());
            rows.push(row);
            number += 1;
        }
    }
    RawTable { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation_engine::pool::normalize;

    #[test]
    fn sample_bank_normalizes_cleanly() {
        let pool = normalize(&sample_table(10, 25, 15)).unwrap();
        assert_eq!(pool.len(), 50);
        assert_eq!(pool.bucket(Tier::Hard).len(), 10);
        assert_eq!(pool.bucket(Tier::Medium).len(), 25);
        assert_eq!(pool.bucket(Tier::Easy).len(), 15);
        let first_easy = &pool.bucket(Tier::Easy)[0];
        assert_eq!(first_easy.number, 36);
        assert_eq!(first_easy.code, "E1");
        assert_eq!(first_easy.answer, OptionTag::B);
    }

    #[test]
    fn numbers_and_strings_are_both_accepted() {
        let json = r#"[
            {"question_no": 1, "question": "q", "option_a": "a", "option_b": "b",
             "option_c": "c", "option_d": "d", "answer": "a", "difficulty": "Hard"},
            {"question_no": "2.0", "question": "q2", "option_a": 1, "option_b": 2,
             "option_c": 3, "option_d": null, "answer": "D", "difficulty": "easy"}
        ]"#;
        let table = table_from_json(json).unwrap();
        assert_eq!(table.rows.len(), 2);
        let pool = normalize(&table).unwrap();
        let second = pool.get(2).unwrap();
        assert_eq!(second.tier, Tier::Easy);
        assert_eq!(second.options[0], "1");
        assert_eq!(second.options[3], "");
    }

    #[test]
    fn non_array_input_is_rejected() {
        assert!(matches!(table_from_json("{}"), Err(Error::Input(_))));
        assert!(matches!(table_from_json("[1, 2]"), Err(Error::Input(_))));
        assert!(matches!(table_from_json("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn written_bank_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        let table = sample_table(2, 3, 1);
        write_table(&table, &path).unwrap();

        let back = load_table(&path).unwrap();
        let a = normalize(&table).unwrap();
        let b = normalize(&back).unwrap();
        assert_eq!(a, b);
    }
}
