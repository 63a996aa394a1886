//! # Payload Format Detection
//!
//! Cheap format sniff that partitions a raw text payload into one of three
//! encodings before any JSON parser runs: an RFC 7464 record-separated
//! sequence, two-or-more whole-JSON-object lines, or a single standard
//! GeoJSON document. Misclassification surfaces as an explicit downstream
//! parse error, never as silent corruption.

/// RFC 7464 record separator control character (0x1E)
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// How a raw payload should be split before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    /// Each record prefixed with the 0x1E record-separator byte
    Rfc7464Sequence,
    /// Two or more lines, each a complete JSON object
    MultiLineJson,
    /// One standard JSON document
    SingleDocument,
}

impl PayloadFormat {
    /// Whether the payload is processed line by line
    pub fn is_line_delimited(&self) -> bool {
        !matches!(self, Self::SingleDocument)
    }
}

/// Classify a raw text payload.
///
/// An empty payload classifies as [`PayloadFormat::SingleDocument`] so the
/// downstream JSON parser fails explicitly instead of this sniff guessing.
pub fn classify(raw: &str) -> PayloadFormat {
    let mut lines = raw.lines();
    let Some(first) = lines.next() else {
        return PayloadFormat::SingleDocument;
    };

    if first.starts_with(RECORD_SEPARATOR) && first.len() > 1 {
        return PayloadFormat::Rfc7464Sequence;
    }

    if let Some(second) = lines.next() {
        if looks_like_json_object(first) && looks_like_json_object(second) {
            return PayloadFormat::MultiLineJson;
        }
    }

    PayloadFormat::SingleDocument
}

/// Strip leading record separators from a line. Safe to apply to lines of
/// any format; non-RFC7464 lines pass through unchanged.
pub fn strip_record_separators(line: &str) -> &str {
    line.trim_start_matches(RECORD_SEPARATOR)
}

fn looks_like_json_object(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rfc7464_sequence() {
        let payload = "\u{1e}{\"type\":\"Feature\"}\n\u{1e}{\"type\":\"Feature\"}";
        assert_eq!(classify(payload), PayloadFormat::Rfc7464Sequence);
    }

    #[test]
    fn test_rfc7464_wins_regardless_of_later_lines() {
        let payload = "\u{1e}{\"a\":1}\nnot json at all";
        assert_eq!(classify(payload), PayloadFormat::Rfc7464Sequence);
    }

    #[test]
    fn test_bare_record_separator_is_not_a_sequence() {
        // First line must have content beyond the separator itself
        let payload = "\u{1e}\n{\"a\":1}";
        assert_eq!(classify(payload), PayloadFormat::SingleDocument);
    }

    #[test]
    fn test_classify_multi_line_json() {
        let payload = "{\"type\":\"Feature\"}\n{\"type\":\"Feature\"}";
        assert_eq!(classify(payload), PayloadFormat::MultiLineJson);
        assert!(classify(payload).is_line_delimited());
    }

    #[test]
    fn test_single_json_line_is_a_single_document() {
        let payload = "{\"type\":\"FeatureCollection\",\"features\":[]}";
        assert_eq!(classify(payload), PayloadFormat::SingleDocument);
    }

    #[test]
    fn test_pretty_printed_document_is_single() {
        let payload = "{\n  \"type\": \"FeatureCollection\",\n  \"features\": []\n}";
        assert_eq!(classify(payload), PayloadFormat::SingleDocument);
        assert!(!classify(payload).is_line_delimited());
    }

    #[test]
    fn test_empty_payload_defaults_to_single_document() {
        assert_eq!(classify(""), PayloadFormat::SingleDocument);
    }

    #[test]
    fn test_strip_record_separators() {
        assert_eq!(strip_record_separators("\u{1e}{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_record_separators("\u{1e}\u{1e}x"), "x");
        assert_eq!(strip_record_separators("{\"a\":1}"), "{\"a\":1}");
    }
}
