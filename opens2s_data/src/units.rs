//! Speech unit marker formatting.
//!
//! Speech units are non-negative integer ids produced by the VQ encoder.
//! For training data they are rendered as `<|audio_{id}|>` markers so that
//! unit sequences can be embedded in plain text next to natural language.

/// Output rendering for a unit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFormat {
    /// `<|audio_{id}|>` markers, concatenated with no separator.
    Special,
    /// Comma-joined decimal ids.
    Raw,
}

/// Render a unit sequence as concatenated `<|audio_{id}|>` markers.
///
/// An empty sequence renders as the empty string.
pub fn format_speech_units(units: &[u32]) -> String {
    units.iter().map(|x| format!("<|audio_{x}|>")).collect()
}

/// Render a unit sequence as comma-joined decimal ids.
pub fn format_raw(units: &[u32]) -> String {
    units
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a unit sequence in the requested format.
pub fn format_units(units: &[u32], format: UnitFormat) -> String {
    match format {
        UnitFormat::Special => format_speech_units(units),
        UnitFormat::Raw => format_raw(units),
    }
}

/// Parse a marker string produced by [`format_speech_units`] back into ids.
///
/// Returns `None` if the string is not a pure concatenation of markers.
pub fn parse_speech_units(s: &str) -> Option<Vec<u32>> {
    let mut rest = s;
    let mut units = Vec::new();
    while !rest.is_empty() {
        rest = rest.strip_prefix("<|audio_")?;
        let end = rest.find("|>")?;
        units.push(rest[..end].parse().ok()?);
        rest = &rest[end + 2..];
    }
    Some(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty() {
        assert_eq!(format_speech_units(&[]), "");
        assert_eq!(format_raw(&[]), "");
    }

    #[test]
    fn test_format_markers_in_order() {
        assert_eq!(format_speech_units(&[3, 7]), "<|audio_3|><|audio_7|>");
        assert_eq!(format_speech_units(&[0]), "<|audio_0|>");
    }

    #[test]
    fn test_format_raw() {
        assert_eq!(format_raw(&[10, 20, 30]), "10,20,30");
        assert_eq!(format_raw(&[5]), "5");
    }

    #[test]
    fn test_parse_inverts_format() {
        let units = vec![3, 7, 16383, 0];
        let parsed = parse_speech_units(&format_speech_units(&units));
        assert_eq!(parsed, Some(units));
        assert_eq!(parse_speech_units(""), Some(vec![]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_speech_units("<|audio_3|"), None);
        assert_eq!(parse_speech_units("audio_3"), None);
        assert_eq!(parse_speech_units("<|audio_x|>"), None);
        assert_eq!(parse_speech_units("<|audio_3|>junk"), None);
    }

    #[test]
    fn test_format_units_dispatch() {
        assert_eq!(format_units(&[1, 2], UnitFormat::Special), "<|audio_1|><|audio_2|>");
        assert_eq!(format_units(&[1, 2], UnitFormat::Raw), "1,2");
    }
}
