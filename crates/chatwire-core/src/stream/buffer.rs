use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use super::debounce::Debounce;
use crate::render::{MarkupRenderer, Rendered, render_with_fallback};

/// Identifies one logical stream of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKey {
    /// A plain assistant message.
    Message(String),
    /// The incremental content of one reasoning step.
    Step { run_id: String, step: u32 },
}

impl StreamKey {
    pub fn message(id: impl Into<String>) -> Self {
        Self::Message(id.into())
    }

    pub fn step(run_id: impl Into<String>, step: u32) -> Self {
        Self::Step {
            run_id: run_id.into(),
            step,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(id) => write!(f, "{}", id),
            Self::Step { run_id, step } => write!(f, "{}#{}", run_id, step),
        }
    }
}

/// `Announced -> Materialized -> Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Start event seen, no content yet. Nothing is shown.
    Announced,
    /// First content arrived; the message is visible and growing.
    Materialized,
    /// Frozen. Never mutated again; the text has been released.
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// First content for this key; the presenter should create the message.
    Materialized,
    Appended,
    /// The key is finalized; the fragment was dropped.
    Rejected,
}

/// One materialization of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub key: StreamKey,
    pub rendered: Rendered,
    pub finalized: bool,
}

#[derive(Debug)]
struct StreamEntry {
    text: String,
    state: MessageState,
    flush: Debounce,
}

impl StreamEntry {
    fn announced() -> Self {
        Self {
            text: String::new(),
            state: MessageState::Announced,
            flush: Debounce::new(),
        }
    }
}

/// Accumulates streamed text per key and renders it at a bounded rate.
///
/// `append` only extends the buffer and marks a flush as due; the runtime
/// calls [`StreamBuffer::flush_due`] once per display frame. A flush always
/// reads the buffer at flush time, so rendering cost is bounded by frames
/// rather than chunks while the last flush still sees every fragment.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    entries: HashMap<StreamKey, StreamEntry>,
    due: Vec<StreamKey>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key without content. Returns false if it already exists.
    pub fn announce(&mut self, key: StreamKey) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, StreamEntry::announced());
        true
    }

    /// Appends a fragment. A key that was never announced is announced
    /// implicitly.
    pub fn append(&mut self, key: &StreamKey, fragment: &str) -> AppendOutcome {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(StreamEntry::announced);

        if entry.state == MessageState::Finalized {
            warn!(key = %key, "fragment for finalized stream dropped");
            return AppendOutcome::Rejected;
        }
        if fragment.is_empty() {
            return AppendOutcome::Appended;
        }

        entry.text.push_str(fragment);
        let outcome = if entry.state == MessageState::Announced {
            entry.state = MessageState::Materialized;
            AppendOutcome::Materialized
        } else {
            AppendOutcome::Appended
        };

        if entry.flush.schedule() {
            self.due.push(key.clone());
        }
        outcome
    }

    /// Renders every stream with a pending flush.
    pub fn flush_due(&mut self, renderer: &dyn MarkupRenderer) -> Vec<RenderedFrame> {
        let due = std::mem::take(&mut self.due);
        let mut frames = Vec::with_capacity(due.len());
        for key in due {
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };
            if !entry.flush.take() || entry.state == MessageState::Finalized {
                continue;
            }
            frames.push(RenderedFrame {
                rendered: render_with_fallback(renderer, &entry.text),
                key,
                finalized: false,
            });
        }
        frames
    }

    /// Performs the last full render and freezes the stream.
    ///
    /// Returns `None` when the key is unknown, already finalized, or never
    /// received content (it is still frozen in the last case). Only the key
    /// and its state outlive the final frame.
    pub fn finalize(&mut self, key: &StreamKey, renderer: &dyn MarkupRenderer) -> Option<RenderedFrame> {
        let entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => {
                debug!(key = %key, "finalize for unknown stream");
                return None;
            }
        };

        let previous = entry.state;
        entry.state = MessageState::Finalized;
        entry.flush.take();

        let text = std::mem::take(&mut entry.text);
        match previous {
            MessageState::Finalized => None,
            MessageState::Announced => None,
            MessageState::Materialized => Some(RenderedFrame {
                key: key.clone(),
                rendered: render_with_fallback(renderer, &text),
                finalized: true,
            }),
        }
    }

    /// Accumulated text of a stream that is still open.
    pub fn text(&self, key: &StreamKey) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|e| e.state != MessageState::Finalized)
            .map(|e| e.text.as_str())
    }

    pub fn state(&self, key: &StreamKey) -> Option<MessageState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn has_due(&self) -> bool {
        !self.due.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due.clear();
    }
}
