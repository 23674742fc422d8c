pub mod outcome;
pub mod target;
pub mod test_case;

pub use outcome::{FailureKind, TestResult};
pub use target::{BuildMode, Platform};
pub use test_case::{directory_of, normalize_path, TestCase};
