//! Line parser for expectation files.
//!
//! Grammar, one entry per line:
//!
//! ```text
//! [MODIFIER MODIFIER ... :] <path> = OUTCOME [OUTCOME ...]
//! ```
//!
//! `//` starts a comment, blank lines are ignored. Modifiers and outcomes
//! are closed sets; any unknown word is a parse error. Errors are collected
//! across the whole file so one report names every bad line at once.

use crate::models::{normalize_path, BuildMode, Platform};

/// Outcome a test is allowed to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Pass,
    Fail,
    Timeout,
    Crash,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Timeout => "timeout",
            Outcome::Crash => "crash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Some(Outcome::Pass),
            "fail" => Some(Outcome::Fail),
            "timeout" => Some(Outcome::Timeout),
            "crash" => Some(Outcome::Crash),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modifier prefix on an expectation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Skip,
    Defer,
    Build(BuildMode),
    Platform(Platform),
}

impl Modifier {
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "skip" => Some(Modifier::Skip),
            "defer" => Some(Modifier::Defer),
            _ => {
                if let Some(mode) = BuildMode::parse(&lower) {
                    Some(Modifier::Build(mode))
                } else {
                    Platform::parse(&lower).map(Modifier::Platform)
                }
            }
        }
    }
}

/// One successfully parsed entry line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub line_number: usize,
    pub modifiers: Vec<Modifier>,
    pub path: String,
    pub outcomes: Vec<Outcome>,
}

impl ParsedLine {
    pub fn is_skip(&self) -> bool {
        self.modifiers.contains(&Modifier::Skip)
    }

    pub fn is_defer(&self) -> bool {
        self.modifiers.contains(&Modifier::Defer)
    }

    /// Whether the line applies under the given platform and build mode.
    /// Naming no platform means every platform; naming no build mode means
    /// both modes.
    pub fn applies_to(&self, platform: Platform, build_mode: BuildMode) -> bool {
        let platforms: Vec<Platform> = self
            .modifiers
            .iter()
            .filter_map(|m| match m {
                Modifier::Platform(p) => Some(*p),
                _ => None,
            })
            .collect();
        if !platforms.is_empty() && !platforms.contains(&platform) {
            return false;
        }

        let modes: Vec<BuildMode> = self
            .modifiers
            .iter()
            .filter_map(|m| match m {
                Modifier::Build(b) => Some(*b),
                _ => None,
            })
            .collect();
        modes.is_empty() || modes.contains(&build_mode)
    }
}

/// A malformed line, reported with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line_number: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a whole expectation file. Every line is attempted; a bad line
/// contributes errors instead of an entry and parsing continues.
pub fn parse_file(content: &str) -> (Vec<ParsedLine>, Vec<ParseError>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_number = idx + 1;
        let stripped = match raw.find("//") {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let stripped = stripped.trim();
        if stripped.is_empty() {
            continue;
        }

        match parse_entry(line_number, stripped) {
            Ok(parsed) => lines.push(parsed),
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    (lines, errors)
}

fn parse_entry(line_number: usize, text: &str) -> Result<ParsedLine, Vec<ParseError>> {
    let mut errors = Vec::new();

    let (lhs, rhs) = match text.split_once('=') {
        Some(parts) => parts,
        None => {
            return Err(vec![ParseError {
                line_number,
                message: format!("missing '=' in entry: {text}"),
            }]);
        }
    };

    // Everything before an optional ':' is the modifier list.
    let (modifier_text, path_text) = match lhs.split_once(':') {
        Some((mods, path)) => (Some(mods), path),
        None => (None, lhs),
    };

    let mut modifiers = Vec::new();
    if let Some(mods) = modifier_text {
        for word in mods.split_whitespace() {
            match Modifier::parse(word) {
                Some(m) => {
                    if !modifiers.contains(&m) {
                        modifiers.push(m);
                    }
                }
                None => errors.push(ParseError {
                    line_number,
                    message: format!("unknown modifier '{word}'"),
                }),
            }
        }
    }

    let path = normalize_path(path_text.trim());
    if path.is_empty() {
        errors.push(ParseError {
            line_number,
            message: "missing test path before '='".to_string(),
        });
    }

    let mut outcomes = Vec::new();
    for word in rhs.split_whitespace() {
        match Outcome::parse(word) {
            Some(o) => {
                if !outcomes.contains(&o) {
                    outcomes.push(o);
                }
            }
            None => errors.push(ParseError {
                line_number,
                message: format!("unknown outcome '{word}'"),
            }),
        }
    }
    if outcomes.is_empty() && errors.is_empty() {
        errors.push(ParseError {
            line_number,
            message: "missing outcome after '='".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(ParsedLine {
            line_number,
            modifiers,
            path,
            outcomes,
        })
    } else {
        Err(errors)
    }
}
