//! Tool-call lifecycle tracking.
//!
//! The protocol carries no call id, so a resolution event (`tool_call`,
//! `tool_call_end`, `tool_call_error`) is matched to the **oldest pending call
//! with the same tool name**. Calls are kept in one FIFO queue per name.
//!
//! Ordering assumption: concurrent calls to the same tool resolve correctly
//! only if the backend resolves them in the order it started them.
//!
//! Pending calls are kept until resolved. Only the newest
//! [`RESOLVED_RETENTION`] resolved calls are kept after that.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

/// Resolved calls kept for lookup before the oldest is dropped.
pub const RESOLVED_RETENTION: usize = 256;

/// Client-local bookkeeping id for a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolCallId(pub u64);

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Started,
    Succeeded,
    Failed,
}

/// Which flow triggered a call. Presentational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolScope {
    /// A plain reply or planning phase, identified by the active message id
    /// if there is one.
    Message(Option<String>),
    /// A step of a reasoning run.
    Step { run_id: String, step: u32 },
}

/// One progress report from `tool_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolProgress {
    pub status: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub input: Value,
    pub scope: ToolScope,
    pub status: ToolCallStatus,
    pub progress: Vec<ToolProgress>,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Created by a resolution that matched no pending call.
    pub synthetic: bool,
}

/// Outcome of a `succeed`/`fail` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: ToolCallId,
    pub synthetic: bool,
}

#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: HashMap<ToolCallId, ToolCall>,
    pending: HashMap<String, VecDeque<ToolCallId>>,
    resolved: VecDeque<ToolCallId>,
    next_id: u64,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new pending call.
    pub fn start(&mut self, name: &str, input: Value, scope: ToolScope) -> ToolCallId {
        let id = self.push(ToolCall {
            id: ToolCallId(0),
            name: name.to_string(),
            input,
            scope,
            status: ToolCallStatus::Started,
            progress: Vec::new(),
            result: None,
            error: None,
            synthetic: false,
        });
        self.pending
            .entry(name.to_string())
            .or_default()
            .push_back(id);
        id
    }

    /// Attaches a progress report to the oldest pending call named `name`.
    pub fn progress(&mut self, name: &str, status: &str, data: Value) -> Option<ToolCallId> {
        let id = *self.pending.get(name)?.front()?;
        let call = self.get_mut(id)?;
        call.progress.push(ToolProgress {
            status: status.to_string(),
            data,
        });
        Some(id)
    }

    /// Resolves the oldest pending call named `name` as succeeded.
    pub fn succeed(&mut self, name: &str, result: Value, fallback_scope: ToolScope) -> Resolution {
        self.resolve(name, fallback_scope, |call| {
            call.status = ToolCallStatus::Succeeded;
            call.result = Some(result);
        })
    }

    /// Resolves the oldest pending call named `name` as failed.
    pub fn fail(&mut self, name: &str, error: &str, fallback_scope: ToolScope) -> Resolution {
        self.resolve(name, fallback_scope, |call| {
            call.status = ToolCallStatus::Failed;
            call.error = Some(error.to_string());
        })
    }

    /// Looks up a pending call or one of the recently resolved ones.
    pub fn get(&self, id: ToolCallId) -> Option<&ToolCall> {
        self.calls.get(&id)
    }

    pub fn pending_count(&self, name: &str) -> usize {
        self.pending.get(name).map_or(0, VecDeque::len)
    }

    /// Calls currently held, pending and retained.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.pending.clear();
        self.resolved.clear();
    }

    fn resolve(
        &mut self,
        name: &str,
        fallback_scope: ToolScope,
        apply: impl FnOnce(&mut ToolCall),
    ) -> Resolution {
        let matched = self.pending.get_mut(name).and_then(VecDeque::pop_front);
        if self.pending.get(name).is_some_and(VecDeque::is_empty) {
            self.pending.remove(name);
        }

        let (id, synthetic) = match matched {
            Some(id) => (id, false),
            None => {
                warn!(tool = name, "resolution without a pending call; recording synthetic call");
                let id = self.push(ToolCall {
                    id: ToolCallId(0),
                    name: name.to_string(),
                    input: Value::Null,
                    scope: fallback_scope,
                    status: ToolCallStatus::Started,
                    progress: Vec::new(),
                    result: None,
                    error: None,
                    synthetic: true,
                });
                (id, true)
            }
        };

        if let Some(call) = self.get_mut(id) {
            apply(&mut *call);
            debug!(tool = name, call = %id, status = ?call.status, "tool call resolved");
        }
        self.retire(id);
        Resolution { id, synthetic }
    }

    fn retire(&mut self, id: ToolCallId) {
        self.resolved.push_back(id);
        while self.resolved.len() > RESOLVED_RETENTION {
            if let Some(oldest) = self.resolved.pop_front() {
                self.calls.remove(&oldest);
            }
        }
    }

    fn push(&mut self, mut call: ToolCall) -> ToolCallId {
        let id = ToolCallId(self.next_id);
        self.next_id += 1;
        call.id = id;
        self.calls.insert(id, call);
        id
    }

    fn get_mut(&mut self, id: ToolCallId) -> Option<&mut ToolCall> {
        self.calls.get_mut(&id)
    }
}
