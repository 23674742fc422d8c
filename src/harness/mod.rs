pub mod process;
pub mod protocol;
pub mod registry;

pub use process::HarnessProcess;
pub use protocol::ProtocolError;
pub use registry::{ProcessRegistry, RecordingRegistry, SystemProcessRegistry};
