// Frame module - per-frame orchestration
//
// Backend-agnostic: frame slots, the frame/resize protocol and the state
// passed to recording. The Vulkan implementation lives in `backend`.

pub mod backend;
pub mod bindings;
pub mod orchestrator;
pub mod slot;
pub mod stats;
pub mod viewport;

#[cfg(test)]
pub mod mock;

pub use backend::{AcquireOutcome, AttachmentKind, FenceWait, FrameBackend, FrameTarget, PresentOutcome};
pub use orchestrator::{FrameOrchestrator, FrameStatus, OrchestratorSettings};
pub use stats::FrameStats;
