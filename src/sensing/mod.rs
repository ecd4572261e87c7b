mod identity;
pub mod loop_worker;
pub mod state;
pub mod supervisor;

pub use identity::{resolve_session_identity, UNKNOWN_USER};
pub use loop_worker::CaptureLoop;
pub use state::{LoopOutcome, LoopState, RunWindow};
pub use supervisor::Supervisor;
