//! Output file naming for the batch converter.

use std::path::{Path, PathBuf};

/// Derive the output file path: `<input-basename>_opens2s_train.jsonl`
/// inside the output directory.
pub fn derive_output_path(input_jsonl: &Path, output_dir: &Path) -> PathBuf {
    let stem = input_jsonl
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{stem}_opens2s_train.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_output_path() {
        let out = derive_output_path(Path::new("/data/train.jsonl"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/train_opens2s_train.jsonl"));
    }

    #[test]
    fn test_derive_output_path_strips_one_extension() {
        let out = derive_output_path(Path::new("subset.v2.jsonl"), Path::new("."));
        assert_eq!(out, PathBuf::from("./subset.v2_opens2s_train.jsonl"));
    }
}
