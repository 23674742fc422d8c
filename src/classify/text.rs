//! Text output comparison.

use crate::models::FailureKind;

/// Compare captured text against the stored baseline.
///
/// Line endings are normalized and a single trailing newline is enforced on
/// both sides so a harness/editor disagreement about the final byte does
/// not count as a failure.
pub fn compare(actual: &str, expected: Option<&str>) -> Option<FailureKind> {
    match expected {
        None => Some(FailureKind::MissingResult),
        Some(expected) => {
            if normalize(actual) == normalize(expected) {
                None
            } else {
                Some(FailureKind::TextMismatch)
            }
        }
    }
}

fn normalize(text: &str) -> String {
    let mut normalized = text.replace("\r\n", "\n");
    if !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_text_passes() {
        assert_eq!(compare("hello\nworld\n", Some("hello\nworld\n")), None);
    }

    #[test]
    fn test_mismatch_reported() {
        assert_eq!(
            compare("hello\n", Some("goodbye\n")),
            Some(FailureKind::TextMismatch)
        );
    }

    #[test]
    fn test_missing_baseline_reported() {
        assert_eq!(compare("hello\n", None), Some(FailureKind::MissingResult));
    }

    #[test]
    fn test_crlf_normalized() {
        assert_eq!(compare("a\r\nb\r\n", Some("a\nb\n")), None);
    }

    #[test]
    fn test_trailing_newline_normalized() {
        assert_eq!(compare("a\nb", Some("a\nb\n")), None);
    }
}
