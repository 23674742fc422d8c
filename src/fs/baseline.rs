//! Baseline files stored next to the tests.
//!
//! A test `fast/css/a.html` may carry sibling baselines
//! `fast/css/a-expected.txt` (text), `fast/css/a-expected.checksum` (image
//! hash) and `fast/css/a-expected.png` (image). Platform-specific overrides
//! live under `platform/<name>/` at the layout root and are probed first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::models::Platform;

/// Expected output loaded for one test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baselines {
    pub text: Option<String>,
    pub image_hash: Option<String>,
}

/// Relative baseline path for a test path and extension, e.g.
/// `fast/css/a.html` + `txt` -> `fast/css/a-expected.txt`.
fn relative_baseline(test_path: &str, ext: &str) -> PathBuf {
    let path = Path::new(test_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| test_path.to_string());
    let name = format!("{stem}-expected.{ext}");
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// Find the baseline file for a test, probing the platform override
/// directory before the test's own directory.
pub fn find_baseline(
    root: &Path,
    test_path: &str,
    platform: Platform,
    ext: &str,
) -> Option<PathBuf> {
    let relative = relative_baseline(test_path, ext);
    let candidates = [
        root.join("platform").join(platform.as_str()).join(&relative),
        root.join(&relative),
    ];
    candidates.into_iter().find(|p| p.is_file())
}

/// Load the text and image-hash baselines for a test.
///
/// The image hash comes from the `.checksum` file when present; otherwise
/// it is derived by hashing the stored `.png` bytes, which is the same
/// digest the harness reports for the image it renders.
pub fn read_baselines(root: &Path, test_path: &str, platform: Platform) -> Result<Baselines> {
    let text = match find_baseline(root, test_path, platform, "txt") {
        Some(path) => Some(std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read text baseline: {}", path.display())
        })?),
        None => None,
    };

    let image_hash = expected_image_hash(root, test_path, platform)?;

    Ok(Baselines { text, image_hash })
}

/// Expected image hash for a test, if it has an image baseline.
pub fn expected_image_hash(
    root: &Path,
    test_path: &str,
    platform: Platform,
) -> Result<Option<String>> {
    if let Some(path) = find_baseline(root, test_path, platform, "checksum") {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read checksum baseline: {}", path.display())
        })?;
        return Ok(Some(content.trim().to_string()));
    }

    if let Some(path) = find_baseline(root, test_path, platform, "png") {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read image baseline: {}", path.display()))?;
        return Ok(Some(hash_image(&bytes)));
    }

    Ok(None)
}

/// Digest an image file's bytes the way the harness does.
pub fn hash_image(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Overwrite the text baseline in the test's own directory.
pub fn write_text_baseline(root: &Path, test_path: &str, text: &str) -> Result<PathBuf> {
    let path = root.join(relative_baseline(test_path, "txt"));
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to write text baseline: {}", path.display()))?;
    Ok(path)
}

/// Overwrite the checksum baseline in the test's own directory.
pub fn write_checksum_baseline(root: &Path, test_path: &str, hash: &str) -> Result<PathBuf> {
    let path = root.join(relative_baseline(test_path, "checksum"));
    std::fs::write(&path, format!("{hash}\n"))
        .with_context(|| format!("Failed to write checksum baseline: {}", path.display()))?;
    Ok(path)
}
