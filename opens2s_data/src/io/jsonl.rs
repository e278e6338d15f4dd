//! Newline-delimited JSON reading and writing.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::convert::{InputRecord, TrainingRecord};

/// Read input records from a JSONL file.
///
/// One object per non-blank line; parse errors report the 1-based line
/// number.
pub fn read_input_records(path: &Path) -> Result<Vec<InputRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: InputRecord = serde_json::from_str(line).with_context(|| {
            format!("Invalid JSON on line {} of {}", lineno + 1, path.display())
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Write training records as JSONL, one compact object per line.
///
/// The file is written in a single pass once conversion has finished.
pub fn write_training_records(path: &Path, records: &[TrainingRecord]) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush().context("Failed to flush output file")?;
    Ok(())
}

/// Read training records back from a JSONL file.
pub fn read_training_records(path: &Path) -> Result<Vec<TrainingRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(lineno, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("Invalid JSON on line {} of {}", lineno + 1, path.display())
            })
        })
        .collect()
}
