use super::context::SessionContext;
use crate::plan::PlanTracker;
use crate::react::ReactTracker;
use crate::stream::StreamBuffer;
use crate::tool_call::ToolCallTracker;

/// Everything the client knows about one session.
///
/// Owned by a single task; the router mutates it synchronously per envelope.
#[derive(Debug, Default)]
pub struct SessionState {
    pub context: SessionContext,
    pub stream: StreamBuffer,
    pub runs: ReactTracker,
    pub tools: ToolCallTracker,
    pub plans: PlanTracker,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all client-side state (session clear).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
