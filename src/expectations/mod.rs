pub mod parse;
pub mod store;

pub use parse::{Modifier, Outcome, ParseError, ParsedLine};
pub use store::{ExpectationStore, FileClass, LoadError, LoadIssue};
