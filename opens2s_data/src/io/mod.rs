//! File I/O: JSONL datasets, output naming, tokenizer path resolution.

pub mod jsonl;
pub mod output_path;
pub mod tokenizer_path;
