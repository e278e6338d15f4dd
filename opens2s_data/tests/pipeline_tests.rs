//! End-to-end pipeline tests: JSONL in, converted JSONL out.
//!
//! The speech tokenizer is replaced by a stub extractor so the pipeline
//! runs without model weights.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use opens2s_data::convert::batch::{BatchOptions, run_batch};
use opens2s_data::io::jsonl::{read_input_records, read_training_records, write_training_records};
use opens2s_data::io::output_path::derive_output_path;
use opens2s_data::model::SpeechUnitExtractor;

struct StubExtractor {
    units: HashMap<String, Vec<u32>>,
}

impl SpeechUnitExtractor for StubExtractor {
    fn extract_units(&self, audio_path: &Path) -> anyhow::Result<Vec<u32>> {
        let name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(self.units.get(name).cloned().unwrap_or_default())
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("opens2s_e2e_{}_{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn input_line(instruction: &str, response: &str, text: &str) -> String {
    format!(
        r#"{{"instruction_wav_path":"{instruction}","response_wav_path":"{response}","response_text":"{text}"}}"#
    )
}

#[test]
fn test_full_pipeline_with_skip_errors() {
    let prefix = scratch_dir("prefix");
    for f in ["q1.wav", "a1.wav", "q2.wav", "a2.wav", "q3.wav"] {
        std::fs::write(prefix.join(f), b"riff").unwrap();
    }

    // Three lines plus a blank; the third item's response audio is missing.
    let input = scratch_dir("in").join("train.jsonl");
    let content = [
        input_line("q1.wav", "a1.wav", "first"),
        String::new(),
        input_line("q2.wav", "a2.wav", "second"),
        input_line("q3.wav", "missing.wav", "third"),
    ]
    .join("\n");
    std::fs::write(&input, content).unwrap();

    let items = read_input_records(&input).unwrap();
    assert_eq!(items.len(), 3);

    let mut units = HashMap::new();
    units.insert("a1.wav".to_string(), vec![10, 20]);
    units.insert("a2.wav".to_string(), vec![]);
    let extractor = StubExtractor { units };

    let options = BatchOptions {
        skip_errors: true,
        verbose: false,
    };
    let summary = run_batch(&items, &prefix, &extractor, &options).unwrap();
    assert_eq!(summary.converted(), 2);
    assert_eq!(summary.skipped, 1);

    let out_dir = scratch_dir("out");
    let output = derive_output_path(&input, &out_dir);
    assert_eq!(
        output.file_name().unwrap().to_str().unwrap(),
        "train_opens2s_train.jsonl"
    );
    write_training_records(&output, &summary.records).unwrap();

    let back = read_training_records(&output).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0].messages[1].content[0].text, "first");
    assert_eq!(
        back[0].messages[1].content[0].speech_units,
        "<|audio_10|><|audio_20|>"
    );
    // Empty extraction result still yields the field, empty.
    assert_eq!(back[1].messages[1].content[0].speech_units, "");
    assert_eq!(
        back[0].messages[0].content[0].audio,
        prefix.join("q1.wav").to_string_lossy()
    );

    for d in [&prefix, &input.parent().unwrap().to_path_buf(), &out_dir] {
        std::fs::remove_dir_all(d).ok();
    }
}

#[test]
fn test_fail_fast_produces_no_output() {
    let prefix = scratch_dir("ff_prefix");
    std::fs::write(prefix.join("q.wav"), b"riff").unwrap();

    let input = scratch_dir("ff_in").join("data.jsonl");
    std::fs::write(&input, input_line("q.wav", "missing.wav", "x")).unwrap();

    let items = read_input_records(&input).unwrap();
    let extractor = StubExtractor {
        units: HashMap::new(),
    };

    let result = run_batch(&items, &prefix, &extractor, &BatchOptions::default());
    assert!(result.is_err());

    // The driver writes output only after a successful run, so the
    // derived output file must not exist.
    let out_dir = scratch_dir("ff_out");
    let output = derive_output_path(&input, &out_dir);
    assert!(!output.exists());

    for d in [&prefix, &input.parent().unwrap().to_path_buf(), &out_dir] {
        std::fs::remove_dir_all(d).ok();
    }
}
