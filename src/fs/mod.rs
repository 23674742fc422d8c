pub mod baseline;
pub mod discovery;

pub use baseline::Baselines;
pub use discovery::{discover_tests, universe};
