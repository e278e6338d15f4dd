//! Batch conversion driver.
//!
//! Runs the per-record converter over a whole input dataset, strictly
//! sequentially. Output records are accumulated in memory and written by
//! the caller in one pass at the end; a fail-fast abort therefore leaves
//! no partial output file behind.

use std::path::Path;

use anyhow::{Context, Result};

use crate::convert::{InputRecord, TrainingRecord, convert_record};
use crate::model::SpeechUnitExtractor;

/// Per-item error policy and reporting options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Log and skip failed items instead of aborting the run.
    pub skip_errors: bool,
    /// Log periodic progress.
    pub verbose: bool,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchSummary {
    /// Converted records, one per successful input record, in input order.
    pub records: Vec<TrainingRecord>,
    /// Number of items skipped under `skip_errors`.
    pub skipped: usize,
}

impl BatchSummary {
    pub fn converted(&self) -> usize {
        self.records.len()
    }
}

/// Convert all records sequentially.
///
/// With `skip_errors`, item failures are logged and counted; otherwise the
/// first failure aborts the whole run and nothing should be written.
pub fn run_batch(
    items: &[InputRecord],
    prefix_path: &Path,
    extractor: &dyn SpeechUnitExtractor,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    let total = items.len();
    let mut records = Vec::with_capacity(total);
    let mut skipped = 0usize;

    for (i, item) in items.iter().enumerate() {
        match convert_record(item, prefix_path, extractor) {
            Ok(record) => {
                records.push(record);
                if options.verbose && (i + 1) % 100 == 0 {
                    tracing::info!(
                        progress = format!("[{}/{}]", i + 1, total),
                        "Processing items"
                    );
                }
            }
            Err(e) => {
                if options.skip_errors {
                    skipped += 1;
                    tracing::warn!(item = i, error = %e, "Skipping failed item");
                } else {
                    return Err(e).with_context(|| format!("Failed to convert item {}", i));
                }
            }
        }
    }

    tracing::info!(converted = records.len(), skipped, "Batch conversion done");

    Ok(BatchSummary { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::{StubExtractor, scratch_dir};
    use std::collections::HashMap;

    fn item(instruction: &str, response: &str) -> InputRecord {
        InputRecord {
            instruction_wav_path: instruction.to_string(),
            response_wav_path: response.to_string(),
            response_text: "text".to_string(),
        }
    }

    #[test]
    fn test_all_valid_items_convert() {
        let dir = scratch_dir(&["a.wav", "b.wav"]);
        let items = vec![item("a.wav", "b.wav"); 3];
        let mut units = HashMap::new();
        units.insert("b.wav".to_string(), vec![7]);
        let extractor = StubExtractor::returning(units);

        let summary =
            run_batch(&items, &dir, &extractor, &BatchOptions::default()).unwrap();
        assert_eq!(summary.converted(), 3);
        assert_eq!(summary.skipped, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_skip_errors_drops_exactly_the_failures() {
        let dir = scratch_dir(&["a.wav", "b.wav"]);
        // Five items, two with missing response audio.
        let items = vec![
            item("a.wav", "b.wav"),
            item("a.wav", "missing.wav"),
            item("a.wav", "b.wav"),
            item("a.wav", "gone.wav"),
            item("a.wav", "b.wav"),
        ];
        let extractor = StubExtractor::returning(HashMap::new());

        let options = BatchOptions {
            skip_errors: true,
            verbose: false,
        };
        let summary = run_batch(&items, &dir, &extractor, &options).unwrap();
        assert_eq!(summary.converted(), 3);
        assert_eq!(summary.skipped, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_fail_fast_aborts_on_first_error() {
        let dir = scratch_dir(&["a.wav", "b.wav"]);
        let items = vec![
            item("a.wav", "b.wav"),
            item("a.wav", "missing.wav"),
            item("a.wav", "b.wav"),
        ];
        let extractor = StubExtractor::returning(HashMap::new());

        let err = run_batch(&items, &dir, &extractor, &BatchOptions::default()).unwrap_err();
        assert!(err.to_string().contains("item 1"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_extraction_failures_still_emit_records() {
        let dir = scratch_dir(&["a.wav", "b.wav"]);
        let items = vec![item("a.wav", "b.wav"); 2];
        // Extraction fails but files exist: records are emitted with empty
        // unit strings, not skipped.
        let extractor = StubExtractor::failing();

        let options = BatchOptions {
            skip_errors: true,
            verbose: false,
        };
        let summary = run_batch(&items, &dir, &extractor, &options).unwrap();
        assert_eq!(summary.converted(), 2);
        assert_eq!(summary.skipped, 0);
        for record in &summary.records {
            assert_eq!(record.messages[1].content[0].speech_units, "");
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
