//! Record conversion to the Opens2S training format.
//!
//! One input record (instruction audio, response audio, response text)
//! becomes one two-turn conversation: a user turn carrying the resolved
//! instruction audio path, and an assistant turn carrying the response
//! text plus the speech units derived from the response audio.

use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::SpeechUnitExtractor;
use crate::units::format_speech_units;

pub mod batch;

/// One line of the raw input dataset.
///
/// All three keys are required; a line missing `response_text` fails to
/// parse rather than producing a record with a defaulted field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    /// Instruction audio path, relative to the prefix directory.
    pub instruction_wav_path: String,
    /// Response audio path, relative to the prefix directory.
    pub response_wav_path: String,
    /// Response transcript, carried verbatim into the assistant turn.
    pub response_text: String,
}

/// One content part of a conversation turn.
///
/// Every field is always present in the output, empty when unused;
/// `spk_emb` is a reserved placeholder and never populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentPart {
    pub text: String,
    pub audio: String,
    pub speech_units: String,
    pub spk_emb: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

/// One Opens2S training record: a two-turn conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingRecord {
    pub messages: Vec<Message>,
}

impl TrainingRecord {
    /// Build the two-turn conversation shape.
    pub fn two_turn(instruction_audio: String, response_text: String, speech_units: String) -> Self {
        Self {
            messages: vec![
                Message {
                    role: Role::User,
                    content: vec![ContentPart {
                        text: String::new(),
                        audio: instruction_audio,
                        speech_units: String::new(),
                        spk_emb: String::new(),
                    }],
                },
                Message {
                    role: Role::Assistant,
                    content: vec![ContentPart {
                        text: response_text,
                        audio: String::new(),
                        speech_units,
                        spk_emb: String::new(),
                    }],
                },
            ],
        }
    }
}

/// Convert one input record.
///
/// Both audio paths are resolved against the prefix and must exist.
/// Extraction failures degrade to an empty unit string with a warning so
/// the conversational structure is kept; the record is still emitted with
/// the field present. Missing audio files fail the item instead.
pub fn convert_record(
    item: &InputRecord,
    prefix_path: &Path,
    extractor: &dyn SpeechUnitExtractor,
) -> Result<TrainingRecord> {
    let instruction_wav = prefix_path.join(&item.instruction_wav_path);
    let response_wav = prefix_path.join(&item.response_wav_path);

    if !instruction_wav.exists() {
        bail!(
            "Instruction audio file not found: {}",
            instruction_wav.display()
        );
    }
    if !response_wav.exists() {
        bail!("Response audio file not found: {}", response_wav.display());
    }

    let speech_units = match extractor.extract_units(&response_wav) {
        Ok(units) => format_speech_units(&units),
        Err(e) => {
            tracing::warn!(
                path = %response_wav.display(),
                error = %e,
                "Speech unit extraction failed, emitting empty units"
            );
            String::new()
        }
    };

    Ok(TrainingRecord::two_turn(
        instruction_wav.to_string_lossy().into_owned(),
        item.response_text.clone(),
        speech_units,
    ))
}
