//! Classification of captured harness output into typed failures.
//!
//! Comparators are pure functions over (actual, baseline) so the same chain
//! serves both a normal run and baseline regeneration. The chain itself adds
//! one rule: once a test has crashed or timed out its output is not
//! trustworthy, so comparator findings are suppressed for that test.

pub mod image;
pub mod text;

use crate::fs::Baselines;
use crate::models::FailureKind;

/// Knobs for the comparator chain.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Compare image checksums. Off for text-only harness builds.
    pub compare_images: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            compare_images: true,
        }
    }
}

/// Everything captured for one test run.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    /// Text output, protocol lines already stripped.
    pub text: String,
    /// Actual image checksum reported by the harness, if any.
    pub image_hash: Option<String>,
    pub crashed: bool,
    pub timed_out: bool,
}

/// Run the comparator chain for one test.
pub fn classify(
    captured: &CapturedOutput,
    baselines: &Baselines,
    config: &ClassifyConfig,
) -> Vec<FailureKind> {
    let mut failures = Vec::new();
    if captured.timed_out {
        failures.push(FailureKind::Timeout);
    }
    if captured.crashed {
        failures.push(FailureKind::Crash);
    }

    let text_result = text::compare(&captured.text, baselines.text.as_deref());
    let image_result = if config.compare_images {
        image::compare(captured.image_hash.as_deref(), baselines.image_hash.as_deref())
    } else {
        None
    };

    let suppressed = failures.iter().any(|k| k.invalidates_output());
    if !suppressed {
        for kind in [text_result, image_result].into_iter().flatten() {
            if !failures.contains(&kind) {
                failures.push(kind);
            }
        }
    }

    failures
}
