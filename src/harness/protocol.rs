//! Wire protocol spoken with the rendering harness.
//!
//! One request line per test on stdin:
//!
//! ```text
//! <uri> <timeout_ms> <expected_hash_or_empty>\n
//! ```
//!
//! The harness answers on stdout with free-form output lines plus a few
//! recognized `#`-prefixed control lines, terminated by a literal `#EOF`.

use thiserror::Error;

use crate::models::TestCase;

pub const END_OF_TEST: &str = "#EOF";
pub const URL_PREFIX: &str = "#URL:";
pub const HASH_PREFIX: &str = "#MD5:";
pub const TIMED_OUT_MARKER: &str = "#TEST_TIMED_OUT";

/// Build the stdin request for one test. The third field is present but
/// empty for tests without an expected image hash.
pub fn request_line(test: &TestCase) -> String {
    format!(
        "{} {} {}\n",
        test.uri,
        test.timeout_ms,
        test.expected_hash.as_deref().unwrap_or("")
    )
}

/// One stdout line, already stripped of its line ending.
#[derive(Debug, PartialEq, Eq)]
pub enum ResponseLine<'a> {
    /// Echo of the URI the harness believes it is running.
    UrlEcho(&'a str),
    /// Checksum of the image the harness rendered.
    ImageHash(&'a str),
    /// The harness gave up on the test after its own timer expired.
    TimedOut,
    EndOfTest,
    /// Ordinary test output.
    Output(&'a str),
}

pub fn parse_response_line(line: &str) -> ResponseLine<'_> {
    if line == END_OF_TEST {
        ResponseLine::EndOfTest
    } else if line == TIMED_OUT_MARKER {
        ResponseLine::TimedOut
    } else if let Some(uri) = line.strip_prefix(URL_PREFIX) {
        ResponseLine::UrlEcho(uri)
    } else if let Some(hash) = line.strip_prefix(HASH_PREFIX) {
        ResponseLine::ImageHash(hash)
    } else {
        ResponseLine::Output(line)
    }
}

/// Failures of the exchange itself, as opposed to failures of the test.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The harness echoed a different test than the one submitted. Every
    /// later response on this stream would be attributed to the wrong
    /// test, so the whole run must stop.
    #[error("harness echoed '{actual}' while running '{expected}'; shared stream is desynchronized")]
    Desynchronized { expected: String, actual: String },

    /// The harness died from the user's interrupt; the runner re-raises
    /// it instead of recording a crash.
    #[error("harness exited on user interrupt")]
    Interrupted,

    #[error("harness I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
