//! End-to-end envelope scenarios through the router.

use std::sync::Arc;

use chatwire_core::error::{ChatwireError, Result};
use chatwire_core::plan::{PlanProgress, TaskStatus};
use chatwire_core::render::{MarkupRenderer, RenderMode, Rendered};
use chatwire_core::stream::{MessageState, StreamKey};
use chatwire_core::tool_call::{ToolCallId, ToolCallStatus, ToolScope};
use chatwire_core::{EventRouter, SessionState, ViewUpdate};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Uppercases, and rejects text with an unbalanced `*`.
struct ShoutRenderer;

impl MarkupRenderer for ShoutRenderer {
    fn render(&self, text: &str) -> Result<String> {
        if text.matches('*').count() % 2 == 1 {
            return Err(ChatwireError::render("unbalanced emphasis"));
        }
        Ok(text.to_uppercase())
    }
}

struct Harness {
    router: EventRouter,
    state: SessionState,
    updates: Vec<ViewUpdate>,
}

impl Harness {
    fn new() -> Self {
        Self::with_renderer(Arc::new(chatwire_core::render::PlainTextRenderer))
    }

    fn with_renderer(renderer: Arc<dyn MarkupRenderer>) -> Self {
        Self {
            router: EventRouter::new(renderer, 200),
            state: SessionState::new(),
            updates: Vec::new(),
        }
    }

    fn send(&mut self, envelope: serde_json::Value) {
        let text = envelope.to_string();
        self.router.dispatch(&mut self.state, &text, &mut self.updates);
    }

    fn frame(&mut self) {
        self.router.on_frame(&mut self.state, &mut self.updates);
    }

    fn take(&mut self) -> Vec<ViewUpdate> {
        std::mem::take(&mut self.updates)
    }

    fn rendered(&self) -> Vec<(&StreamKey, &Rendered, bool)> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                ViewUpdate::MessageRendered {
                    key,
                    rendered,
                    finalized,
                } => Some((key, rendered, *finalized)),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn test_hello_scenario_renders_concatenation() {
    let mut h = Harness::new();
    h.send(json!({"type": "assistant_start", "messageId": "m1"}));
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "He"}));
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "llo"}));
    h.send(json!({"type": "assistant_end", "messageId": "m1"}));

    let key = StreamKey::message("m1");
    assert_eq!(
        h.updates,
        vec![
            ViewUpdate::StreamingChanged(true),
            ViewUpdate::MessageMaterialized { key: key.clone() },
            ViewUpdate::MessageRendered {
                key: key.clone(),
                rendered: Rendered {
                    markup: "Hello".to_string(),
                    mode: RenderMode::Markup,
                },
                finalized: true,
            },
            ViewUpdate::StreamingChanged(false),
        ]
    );
    assert_eq!(h.state.stream.state(&key), Some(MessageState::Finalized));

    // finalized buffers never change
    h.take();
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "!"}));
    h.frame();
    assert!(h.rendered().is_empty());
    assert_eq!(h.state.stream.text(&key), None);
}

#[test]
fn test_throttled_frames_converge_to_full_render() {
    let mut h = Harness::with_renderer(Arc::new(ShoutRenderer));
    h.send(json!({"type": "assistant_start", "messageId": "m1"}));
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "a *b"}));
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "old"}));
    h.frame();
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "* c"}));
    h.send(json!({"type": "assistant_chunk", "messageId": "m1", "content": "d"}));
    h.frame();
    h.frame();
    h.send(json!({"type": "assistant_end", "messageId": "m1"}));

    let rendered = h.rendered();
    // two throttled frames plus the final render, not one per chunk
    assert_eq!(rendered.len(), 3);
    assert_eq!(rendered[0].1.mode, RenderMode::RawFallback);
    assert_eq!(rendered[0].1.markup, "a *bold");
    assert_eq!(rendered[1].1.mode, RenderMode::Markup);
    assert_eq!(rendered[2].1.markup, "A *BOLD* CD");
    assert!(rendered[2].2);
}

#[test]
fn test_todo_double_update_counts_once() {
    let mut h = Harness::new();
    h.send(json!({"type": "planning_start", "messageId": "p1"}));
    h.send(json!({"type": "planning_status_update", "messageId": "p1", "status": "analyzing"}));
    h.send(json!({
        "type": "todo_list",
        "messageId": "p1",
        "tasks": [
            {"id": "t1", "title": "Collect data", "description": "", "status": "pending", "priority": "high"},
            {"id": "t2", "title": "Summarize", "description": "", "status": "pending", "priority": "medium", "dependencies": ["t1"]}
        ]
    }));
    h.send(json!({"type": "todo_update", "task_id": "t1", "status": "in_progress"}));
    h.send(json!({"type": "todo_update", "task_id": "t1", "status": "completed", "result": "x".repeat(250)}));
    h.send(json!({"type": "todo_update", "task_id": "t1", "status": "completed", "result": "again"}));

    let plan = h.state.plans.plan("p1").unwrap();
    assert_eq!(
        plan.progress(),
        PlanProgress {
            completed: 1,
            failed: 0,
            total: 2
        }
    );
    assert_eq!(plan.progress().to_string(), "1/2 completed");
    let t1 = plan.task("t1").unwrap();
    assert_eq!(t1.status, TaskStatus::Completed);
    assert_eq!(
        t1.result_preview.as_deref(),
        Some(format!("{}...", "x".repeat(200)).as_str())
    );
    assert_eq!(plan.task("t2").unwrap().dependencies, vec!["t1".to_string()]);

    let task_updates = h
        .updates
        .iter()
        .filter(|u| matches!(u, ViewUpdate::TaskUpdated { .. }))
        .count();
    assert_eq!(task_updates, 2);
    assert!(h.updates.contains(&ViewUpdate::PlanningStatus {
        run_id: "p1".to_string(),
        status: "analyzing".to_string()
    }));
}

#[test]
fn test_task_counter_never_exceeds_total() {
    let mut h = Harness::new();
    h.send(json!({
        "type": "todo_list",
        "messageId": "p1",
        "tasks": [
            {"id": "t1", "title": "One", "description": "", "status": "pending", "priority": "low"},
            {"id": "t2", "title": "Two", "description": "", "status": "pending", "priority": "low"}
        ]
    }));
    for _ in 0..3 {
        h.send(json!({"type": "todo_update", "task_id": "t1", "status": "completed"}));
        h.send(json!({"type": "todo_update", "task_id": "t2", "status": "failed", "error": "timeout"}));
        h.send(json!({"type": "todo_update", "task_id": "t2", "status": "in_progress"}));
        h.send(json!({"type": "todo_update", "task_id": "ghost", "status": "completed"}));
    }
    let progress = h.state.plans.plan("p1").unwrap().progress();
    assert_eq!(progress.completed + progress.failed, progress.total);
    assert!(progress.is_done());
    assert_eq!(
        h.state.plans.plan("p1").unwrap().task("t2").unwrap().error.as_deref(),
        Some("timeout")
    );
}

#[test]
fn test_react_run_with_tools_and_steps() {
    let mut h = Harness::new();
    h.send(json!({"type": "react_start", "messageId": "r1", "maxSteps": 3}));
    h.send(json!({"type": "react_step_start", "step": 1}));
    h.send(json!({"type": "react_chunk", "step": 1, "content": "Thinking"}));
    h.send(json!({"type": "react_thought", "step": 1, "thought": "need weather"}));
    h.send(json!({"type": "react_action", "step": 1, "action": {"tool": "weather"}}));
    h.send(json!({"type": "tool_call_start", "toolName": "weather", "toolInput": {"city": "Paris"}}));
    h.send(json!({"type": "tool_call_start", "toolName": "weather", "toolInput": {"city": "Rome"}}));
    h.send(json!({"type": "tool_call_end", "toolName": "weather", "toolResult": "sunny"}));
    h.send(json!({"type": "tool_call_error", "toolName": "weather", "error": "quota"}));
    h.send(json!({"type": "react_observation", "observation": "sunny in Paris"}));
    h.send(json!({"type": "react_step_end", "step": 1}));
    // stale and skipped events
    h.send(json!({"type": "react_step_start", "step": 1}));
    h.send(json!({"type": "react_chunk", "step": 2, "content": "ignored"}));
    h.send(json!({"type": "react_finish", "answer": "It is sunny", "totalSteps": 1}));

    let run = h.state.runs.run("r1").unwrap();
    assert_eq!(run.current_step(), 1);
    let step = run.step(1).unwrap();
    assert!(step.closed);
    assert_eq!(step.tool_calls, vec![ToolCallId(0), ToolCallId(1)]);
    assert_eq!(step.observation, Some(json!("sunny in Paris")));
    let step_key = StreamKey::step("r1", 1);
    assert!(
        h.rendered()
            .iter()
            .any(|(key, rendered, finalized)| **key == step_key && rendered.markup == "Thinking" && *finalized)
    );
    assert_eq!(h.state.stream.state(&step_key), Some(MessageState::Finalized));
    assert_eq!(h.state.stream.state(&StreamKey::step("r1", 2)), None);

    // FIFO: first start resolved by the first resolution
    let paris = h.state.tools.get(ToolCallId(0)).unwrap();
    assert_eq!(paris.input, json!({"city": "Paris"}));
    assert_eq!(paris.status, ToolCallStatus::Succeeded);
    assert_eq!(
        paris.scope,
        ToolScope::Step {
            run_id: "r1".to_string(),
            step: 1
        }
    );
    let rome = h.state.tools.get(ToolCallId(1)).unwrap();
    assert_eq!(rome.status, ToolCallStatus::Failed);
    assert_eq!(rome.error.as_deref(), Some("quota"));

    assert!(h.updates.iter().any(|u| matches!(
        u,
        ViewUpdate::RunFinished { run_id, total_steps: 1, answer } if run_id == "r1" && answer.markup == "It is sunny"
    )));
    assert_eq!(h.updates.last(), Some(&ViewUpdate::StreamingChanged(false)));
    assert!(!h.state.context.is_streaming());
}

#[test]
fn test_react_error_closes_open_step() {
    let mut h = Harness::new();
    h.send(json!({"type": "react_start", "messageId": "r1", "maxSteps": 3}));
    h.send(json!({"type": "react_step_start", "step": 1, "messageId": "r1"}));
    h.send(json!({"type": "react_chunk", "step": 1, "content": "partial", "messageId": "r1"}));
    h.take();
    h.send(json!({"type": "react_error", "message": "parse failure", "messageId": "r1"}));

    let updates = h.take();
    assert_eq!(
        updates,
        vec![
            ViewUpdate::MessageRendered {
                key: StreamKey::step("r1", 1),
                rendered: Rendered {
                    markup: "partial".to_string(),
                    mode: RenderMode::Markup,
                },
                finalized: true,
            },
            ViewUpdate::StepClosed {
                run_id: "r1".to_string(),
                step: 1
            },
            ViewUpdate::RunErrored {
                run_id: "r1".to_string(),
                message: "parse failure".to_string()
            },
            ViewUpdate::StreamingChanged(false),
        ]
    );

    // no more acceptance for this run
    h.send(json!({"type": "react_step_start", "step": 2, "messageId": "r1"}));
    assert!(h.take().is_empty());
}

#[test]
fn test_stopped_run_acknowledged_by_assistant_end() {
    let mut h = Harness::new();
    h.send(json!({"type": "react_start", "messageId": "r1", "maxSteps": 3}));
    h.send(json!({"type": "react_step_start", "step": 1, "messageId": "r1"}));
    assert!(h.router.stop(&mut h.state, &mut h.updates).is_some());
    h.take();

    h.send(json!({"type": "assistant_end", "messageId": "r1"}));
    assert_eq!(
        h.take(),
        vec![
            ViewUpdate::StepClosed {
                run_id: "r1".to_string(),
                step: 1
            },
            ViewUpdate::RunCancelled {
                run_id: "r1".to_string()
            },
        ]
    );
    assert_eq!(h.state.context.current_run(), None);

    // the next plain reply streams and ends normally
    h.send(json!({"type": "assistant_start", "messageId": "m2"}));
    assert!(h.state.context.is_streaming());
    h.send(json!({"type": "assistant_chunk", "messageId": "m2", "content": "ok"}));
    h.send(json!({"type": "assistant_end", "messageId": "m2"}));
    assert!(!h.state.context.is_streaming());
    assert_eq!(h.take().last(), Some(&ViewUpdate::StreamingChanged(false)));
}

#[test]
fn test_assistant_end_after_finish_is_harmless() {
    let mut h = Harness::new();
    h.send(json!({"type": "react_start", "messageId": "r1", "maxSteps": 3}));
    h.send(json!({"type": "react_finish", "answer": "done", "totalSteps": 0, "messageId": "r1"}));
    h.take();
    h.send(json!({"type": "assistant_end", "messageId": "r1"}));
    assert!(h.take().is_empty());
    assert!(!h.state.context.is_streaming());
}

#[test]
fn test_max_steps_reports_declared_budget() {
    let mut h = Harness::new();
    h.send(json!({"type": "react_start", "messageId": "r1", "maxSteps": 2}));
    h.send(json!({"type": "react_step_start", "step": 1}));
    h.send(json!({"type": "react_step_end", "step": 1}));
    h.send(json!({"type": "react_step_start", "step": 2}));
    h.send(json!({"type": "react_max_steps", "answer": "best effort"}));

    assert!(h.updates.iter().any(|u| matches!(
        u,
        ViewUpdate::RunMaxStepsReached { max_steps: 2, .. }
    )));
    assert!(h.updates.contains(&ViewUpdate::StepClosed {
        run_id: "r1".to_string(),
        step: 2
    }));
}

#[test]
fn test_unmatched_resolution_is_synthetic() {
    let mut h = Harness::new();
    h.send(json!({"type": "tool_call_end", "toolName": "calc", "toolResult": 4}));
    assert!(h.updates.iter().any(|u| matches!(
        u,
        ViewUpdate::ToolCallResolved { synthetic: true, status: ToolCallStatus::Succeeded, .. }
    )));
}

#[test]
fn test_one_router_serves_independent_sessions() {
    let router = EventRouter::default();
    let mut a = SessionState::new();
    let mut b = SessionState::new();
    let mut sink = Vec::new();

    router.dispatch(&mut a, r#"{"type":"assistant_start","messageId":"m1"}"#, &mut sink);
    router.dispatch(&mut b, r#"{"type":"assistant_chunk","content":"orphan"}"#, &mut sink);

    assert!(a.context.is_streaming());
    assert!(!b.context.is_streaming());
    assert_eq!(b.stream.text(&StreamKey::message("m1")), None);
}
