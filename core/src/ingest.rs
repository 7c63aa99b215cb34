//! Turns the raw nutrition export into the cleaned dataset the record store loads.

use crate::error::{CoreError, Result};
use crate::record::MISSING;
use std::collections::HashSet;
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrepareStats {
    pub rows_read: usize,
    pub rows_written: usize,
    pub duplicates_dropped: usize,
}

/// Clean a raw export.
///
/// Rows repeating an earlier `food` are dropped, empty cells become `no`, and an `id` column
/// holding the row's position in the raw file is prepended. Ids of kept rows therefore keep
/// gaps where duplicates were removed.
pub fn prepare<R: Read, W: Write>(reader: R, writer: W, delimiter: u8) -> Result<PrepareStats> {
    let mut rdr = csv::ReaderBuilder::new().delimiter(delimiter).flexible(true).from_reader(reader);
    let mut wtr = csv::Writer::from_writer(writer);

    let headers = rdr.headers()?.clone();
    let food_col = headers
        .iter()
        .position(|h| h.trim() == "food")
        .ok_or_else(|| CoreError::Schema { record: 0, field: "food".to_string() })?;

    let mut out_headers = vec!["id".to_string()];
    out_headers.extend(headers.iter().map(|h| h.trim().to_string()));
    wtr.write_record(&out_headers)?;

    let mut stats = PrepareStats::default();
    let mut seen_foods: HashSet<String> = HashSet::new();
    for (row, result) in rdr.records().enumerate() {
        let rec = result?;
        stats.rows_read += 1;
        // compared as written, so " Tofu" and "Tofu" are different foods
        let food = rec.get(food_col).unwrap_or("").to_string();
        if !seen_foods.insert(food) {
            stats.duplicates_dropped += 1;
            continue;
        }
        let mut out = Vec::with_capacity(headers.len() + 1);
        out.push(row.to_string());
        for col in 0..headers.len() {
            let cell = rec.get(col).map(str::trim).unwrap_or("");
            out.push(if cell.is_empty() { MISSING.to_string() } else { cell.to_string() });
        }
        wtr.write_record(&out)?;
        stats.rows_written += 1;
    }
    wtr.flush()?;
    tracing::info!(
        rows_read = stats.rows_read,
        rows_written = stats.rows_written,
        duplicates_dropped = stats.duplicates_dropped,
        "prepared dataset"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_duplicates_and_fills_gaps() {
        let raw = "food;protein_g;allergens\nTofu;8.1;soy\nTofu;8.0;soy\nApple;;\n";
        let mut out = Vec::new();
        let stats = prepare(raw.as_bytes(), &mut out, b';').unwrap();
        assert_eq!(stats, PrepareStats { rows_read: 3, rows_written: 2, duplicates_dropped: 1 });
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["id,food,protein_g,allergens", "0,Tofu,8.1,soy", "2,Apple,no,no"]);
    }

    #[test]
    fn duplicate_check_uses_the_raw_cell() {
        let raw = "food;allergens\nTofu;soy\n Tofu;soy\nTofu;soy\n";
        let mut out = Vec::new();
        let stats = prepare(raw.as_bytes(), &mut out, b';').unwrap();
        assert_eq!(stats, PrepareStats { rows_read: 3, rows_written: 2, duplicates_dropped: 1 });
        let text = String::from_utf8(out).unwrap();
        let ids: Vec<&str> = text.lines().skip(1).map(|l| l.split(',').next().unwrap_or("")).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn requires_food_column() {
        let raw = "name;protein_g\nTofu;8.1\n";
        let err = prepare(raw.as_bytes(), Vec::new(), b';').unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }
}
