/// The cross-cutting "which message/run is active" state of one session.
///
/// Threaded through every dispatch call instead of living in the router, so a
/// single router can serve several sessions without cross-talk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionContext {
    current_message: Option<String>,
    current_run: Option<String>,
    streaming: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_message(&self) -> Option<&str> {
        self.current_message.as_deref()
    }

    pub fn current_run(&self) -> Option<&str> {
        self.current_run.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Id a `stop` should carry: the active run if any, else the active
    /// message.
    pub fn active_id(&self) -> Option<&str> {
        self.current_run().or(self.current_message())
    }

    /// Uses the explicit id when the event carries one, else the current
    /// message.
    pub fn resolve_message(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.current_message.clone())
    }

    /// Uses the explicit id when the event carries one, else the current run.
    pub fn resolve_run(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.current_run.clone())
    }

    /// Returns true when the streaming flag changed.
    pub fn begin_message(&mut self, id: &str) -> bool {
        self.current_message = Some(id.to_string());
        self.set_streaming(true)
    }

    /// Clears the current message if `id` is it. Returns true when the
    /// streaming flag changed.
    pub fn end_message(&mut self, id: &str) -> bool {
        if self.current_message.as_deref() != Some(id) {
            return false;
        }
        self.current_message = None;
        if self.current_run.is_some() {
            return false;
        }
        self.set_streaming(false)
    }

    pub fn begin_run(&mut self, id: &str) -> bool {
        self.current_run = Some(id.to_string());
        self.set_streaming(true)
    }

    pub fn end_run(&mut self, id: &str) -> bool {
        if self.current_run.as_deref() != Some(id) {
            return false;
        }
        self.current_run = None;
        self.set_streaming(false)
    }

    /// Optimistic local cancellation: stop streaming now, keep the ids so
    /// the eventual terminal event still matches.
    pub fn cancel(&mut self) -> bool {
        self.set_streaming(false)
    }

    /// Drops everything (domain error outside a run, or session clear).
    pub fn abort(&mut self) -> bool {
        self.current_message = None;
        self.current_run = None;
        self.set_streaming(false)
    }

    fn set_streaming(&mut self, streaming: bool) -> bool {
        std::mem::replace(&mut self.streaming, streaming) != streaming
    }
}
