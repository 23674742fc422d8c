//! Image checksum comparison.

use crate::models::FailureKind;

/// Compare the harness-reported image checksum against the baseline one.
///
/// Both sides are optional: the harness only reports a hash for tests that
/// render, and a test only has an expected hash once it has been
/// rebaselined.
pub fn compare(actual_hash: Option<&str>, expected_hash: Option<&str>) -> Option<FailureKind> {
    match (actual_hash, expected_hash) {
        (None, None) => None,
        (None, Some(_)) => Some(FailureKind::MissingImageHash),
        (Some(_), None) => Some(FailureKind::MissingResult),
        (Some(actual), Some(expected)) => {
            if actual.eq_ignore_ascii_case(expected) {
                None
            } else {
                Some(FailureKind::ImageMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_hashes_pass() {
        assert_eq!(compare(Some("abc123"), Some("abc123")), None);
    }

    #[test]
    fn test_hash_case_folded() {
        assert_eq!(compare(Some("ABC123"), Some("abc123")), None);
    }

    #[test]
    fn test_mismatch_reported() {
        assert_eq!(
            compare(Some("abc"), Some("def")),
            Some(FailureKind::ImageMismatch)
        );
    }

    #[test]
    fn test_absent_actual_hash_reported() {
        assert_eq!(
            compare(None, Some("abc")),
            Some(FailureKind::MissingImageHash)
        );
    }

    #[test]
    fn test_absent_baseline_reported() {
        assert_eq!(compare(Some("abc"), None), Some(FailureKind::MissingResult));
    }

    #[test]
    fn test_image_free_test_passes() {
        assert_eq!(compare(None, None), None);
    }
}
