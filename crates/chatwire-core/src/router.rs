//! Inbound event routing.
//!
//! [`EventRouter`] decodes one text frame, picks exactly one handler by the
//! envelope's `type`, mutates the [`SessionState`] and reports what changed to
//! a [`Presenter`]. The router itself only holds immutable options, so one
//! instance can serve any number of sessions.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::presenter::{Presenter, ViewUpdate};
use crate::protocol::{InboundEvent, OutboundEnvelope};
use crate::render::{MarkupRenderer, PlainTextRenderer, render_with_fallback};
use crate::session::SessionState;
use crate::stream::{AppendOutcome, StreamKey};
use crate::tool_call::{Resolution, ToolCallStatus, ToolScope};

pub struct EventRouter {
    renderer: Arc<dyn MarkupRenderer>,
    result_preview_chars: usize,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(Arc::new(PlainTextRenderer), 200)
    }
}

impl EventRouter {
    pub fn new(renderer: Arc<dyn MarkupRenderer>, result_preview_chars: usize) -> Self {
        Self {
            renderer,
            result_preview_chars,
        }
    }

    pub fn renderer(&self) -> &dyn MarkupRenderer {
        self.renderer.as_ref()
    }

    /// Decodes and routes one envelope.
    ///
    /// Returns false when the envelope was malformed or of an unknown type;
    /// such envelopes are ignored.
    pub fn dispatch(
        &self,
        state: &mut SessionState,
        text: &str,
        presenter: &mut dyn Presenter,
    ) -> bool {
        let event = match InboundEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "ignoring malformed envelope");
                return false;
            }
        };
        if event == InboundEvent::Unknown {
            debug!("ignoring envelope of unknown type");
            return false;
        }
        self.dispatch_event(state, event, presenter);
        true
    }

    /// Routes an already decoded event.
    pub fn dispatch_event(
        &self,
        state: &mut SessionState,
        event: InboundEvent,
        presenter: &mut dyn Presenter,
    ) {
        debug!(kind = event.kind(), "dispatch");
        match event {
            InboundEvent::UserMessageReceived { content, .. } => {
                presenter.present(ViewUpdate::UserMessageAcknowledged { content });
            }

            InboundEvent::AssistantStart { message_id } => {
                state.stream.announce(StreamKey::message(&message_id));
                if state.context.begin_message(&message_id) {
                    presenter.present(ViewUpdate::StreamingChanged(true));
                }
            }
            InboundEvent::AssistantChunk {
                message_id,
                content,
            } => {
                let Some(id) = state.context.resolve_message(message_id.as_deref()) else {
                    debug!("assistant_chunk with no active message dropped");
                    return;
                };
                self.append(state, StreamKey::Message(id), &content, presenter);
            }
            InboundEvent::AssistantEnd { message_id } => {
                // a cancelled run is acknowledged with a plain assistant_end
                if let Some(run_id) = message_id.as_deref()
                    && state.context.current_run() == Some(run_id)
                    && state.context.current_message() != Some(run_id)
                {
                    self.cancel_run(state, run_id.to_string(), presenter);
                    return;
                }
                let Some(id) = state.context.resolve_message(message_id.as_deref()) else {
                    debug!("assistant_end with no active message dropped");
                    return;
                };
                self.finalize(state, &StreamKey::message(&id), presenter);
                if state.context.end_message(&id) {
                    presenter.present(ViewUpdate::StreamingChanged(false));
                }
            }

            InboundEvent::ToolCallsStart { tools } => {
                let scope = ToolScope::Message(state.context.current_message().map(str::to_string));
                for name in &tools {
                    let id = state.tools.start(name, Value::Null, scope.clone());
                    presenter.present(ViewUpdate::ToolCallStarted {
                        id,
                        name: name.clone(),
                        input: Value::Null,
                        scope: scope.clone(),
                    });
                }
                presenter.present(ViewUpdate::ToolCallsAnnounced { names: tools });
            }
            InboundEvent::ToolCall {
                tool_name,
                tool_result,
            } => {
                let scope = self.tool_scope(state, None);
                let resolution = state.tools.succeed(&tool_name, tool_result.clone(), scope);
                present_resolution(
                    presenter,
                    resolution,
                    tool_name,
                    ToolCallStatus::Succeeded,
                    tool_result,
                );
            }
            InboundEvent::ToolProgress {
                tool_name,
                status,
                data,
            } => match state.tools.progress(&tool_name, &status, data.clone()) {
                Some(id) => presenter.present(ViewUpdate::ToolCallProgress {
                    id,
                    name: tool_name,
                    status,
                    data,
                }),
                None => debug!(tool = %tool_name, "progress for tool with no pending call dropped"),
            },

            InboundEvent::PlanningStart { message_id } => {
                state.plans.start_planning(&message_id);
                presenter.present(ViewUpdate::PlanningStarted {
                    run_id: message_id.clone(),
                });
                if state.context.begin_message(&message_id) {
                    presenter.present(ViewUpdate::StreamingChanged(true));
                }
            }
            InboundEvent::PlanningStatusUpdate { message_id, status } => {
                let Some(run_id) = self.plan_id(state, message_id.as_deref()) else {
                    debug!("planning status with no active plan dropped");
                    return;
                };
                if state.plans.set_status(&run_id, &status) {
                    presenter.present(ViewUpdate::PlanningStatus { run_id, status });
                }
            }
            InboundEvent::TodoList { message_id, tasks } => {
                let Some(run_id) = self.plan_id(state, message_id.as_deref()) else {
                    debug!("todo_list with no active plan dropped");
                    return;
                };
                let plan = state
                    .plans
                    .set_plan(&run_id, tasks, self.result_preview_chars);
                presenter.present(ViewUpdate::PlanReady {
                    run_id,
                    tasks: plan.tasks.clone(),
                    progress: plan.progress(),
                });
            }
            InboundEvent::TodoUpdate {
                task_id,
                status,
                result,
                error,
            } => {
                if let Some(update) = state.plans.update_task(
                    &task_id,
                    status,
                    result.as_ref(),
                    error.as_deref(),
                    self.result_preview_chars,
                ) {
                    presenter.present(ViewUpdate::TaskUpdated {
                        run_id: update.run_id,
                        task: update.task,
                        progress: update.progress,
                    });
                }
            }

            InboundEvent::ReactStart {
                message_id,
                max_steps,
            } => {
                state.runs.start_run(&message_id, max_steps);
                presenter.present(ViewUpdate::RunStarted {
                    run_id: message_id.clone(),
                    max_steps,
                });
                if state.context.begin_run(&message_id) {
                    presenter.present(ViewUpdate::StreamingChanged(true));
                }
            }
            InboundEvent::ReactStepStart { step, message_id } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if state.runs.open_step(&run_id, step) {
                    state.stream.announce(StreamKey::step(&run_id, step));
                    presenter.present(ViewUpdate::StepOpened { run_id, step });
                }
            }
            InboundEvent::ReactChunk {
                step,
                content,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if state.runs.accepts_content(&run_id, step) {
                    self.append(state, StreamKey::step(run_id, step), &content, presenter);
                }
            }
            InboundEvent::ReactThought {
                step,
                thought,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if state.runs.record_thought(&run_id, step, &thought) {
                    presenter.present(ViewUpdate::StepThought {
                        run_id,
                        step,
                        thought,
                    });
                }
            }
            InboundEvent::ReactAction {
                step,
                action,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if state.runs.record_action(&run_id, step, action.clone()) {
                    presenter.present(ViewUpdate::StepAction {
                        run_id,
                        step,
                        action,
                    });
                }
            }
            InboundEvent::ToolCallStart {
                tool_name,
                tool_input,
                message_id,
            } => {
                let scope = self.tool_scope(state, message_id.as_deref());
                let id = state.tools.start(&tool_name, tool_input.clone(), scope.clone());
                if let ToolScope::Step { run_id, .. } = &scope {
                    state.runs.attach_tool_call(run_id, id);
                }
                presenter.present(ViewUpdate::ToolCallStarted {
                    id,
                    name: tool_name,
                    input: tool_input,
                    scope,
                });
            }
            InboundEvent::ToolCallEnd {
                tool_name,
                tool_result,
                message_id,
            } => {
                let scope = self.tool_scope(state, message_id.as_deref());
                let resolution = state.tools.succeed(&tool_name, tool_result.clone(), scope);
                present_resolution(
                    presenter,
                    resolution,
                    tool_name,
                    ToolCallStatus::Succeeded,
                    tool_result,
                );
            }
            InboundEvent::ToolCallError {
                tool_name,
                error,
                message_id,
            } => {
                let scope = self.tool_scope(state, message_id.as_deref());
                let resolution = state.tools.fail(&tool_name, &error, scope);
                present_resolution(
                    presenter,
                    resolution,
                    tool_name,
                    ToolCallStatus::Failed,
                    Value::String(error),
                );
            }
            InboundEvent::ReactObservation {
                observation,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if let Some(step) = state.runs.record_observation(&run_id, observation.clone()) {
                    presenter.present(ViewUpdate::StepObservation {
                        run_id,
                        step,
                        observation,
                    });
                }
            }
            InboundEvent::ReactStepEnd { step, message_id } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                if state.runs.close_step(&run_id, step) {
                    self.close_step(state, &run_id, step, presenter);
                }
            }
            InboundEvent::ReactFinish {
                answer,
                total_steps,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                let Some(open_steps) = state.runs.finish(&run_id, &answer, total_steps) else {
                    return;
                };
                self.close_steps(state, &run_id, open_steps, presenter);
                presenter.present(ViewUpdate::RunFinished {
                    run_id: run_id.clone(),
                    answer: render_with_fallback(self.renderer(), &answer),
                    total_steps,
                });
                self.end_run(state, &run_id, presenter);
            }
            InboundEvent::ReactMaxSteps { answer, message_id } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    return;
                };
                let Some(open_steps) = state.runs.max_steps_reached(&run_id, &answer) else {
                    return;
                };
                self.close_steps(state, &run_id, open_steps, presenter);
                let max_steps = state.runs.run(&run_id).map(|r| r.max_steps).unwrap_or(0);
                presenter.present(ViewUpdate::RunMaxStepsReached {
                    run_id: run_id.clone(),
                    answer: render_with_fallback(self.renderer(), &answer),
                    max_steps,
                });
                self.end_run(state, &run_id, presenter);
            }
            InboundEvent::ReactError {
                message,
                message_id,
            } => {
                let Some(run_id) = self.run_id(state, message_id.as_deref()) else {
                    warn!(error = %message, "react_error with no active run");
                    presenter.present(ViewUpdate::Error { message });
                    return;
                };
                self.fail_run(state, &run_id, message, presenter);
            }

            InboundEvent::Error { message } => {
                warn!(error = %message, "backend reported an error");
                if let Some(id) = state.context.current_message().map(str::to_string) {
                    self.finalize(state, &StreamKey::Message(id), presenter);
                }
                if let Some(run_id) = state.context.current_run().map(str::to_string) {
                    self.fail_run(state, &run_id, message, presenter);
                } else {
                    presenter.present(ViewUpdate::Error { message });
                }
                if state.context.abort() {
                    presenter.present(ViewUpdate::StreamingChanged(false));
                }
            }

            InboundEvent::Unknown => debug!("ignoring envelope of unknown type"),
        }
    }

    /// Renders every stream with a pending flush. Called once per display
    /// frame.
    pub fn on_frame(&self, state: &mut SessionState, presenter: &mut dyn Presenter) {
        for frame in state.stream.flush_due(self.renderer()) {
            presenter.present(ViewUpdate::MessageRendered {
                key: frame.key,
                rendered: frame.rendered,
                finalized: frame.finalized,
            });
        }
    }

    /// Optimistically cancels the active message or run.
    ///
    /// Clears the streaming flag locally and returns the envelope to send.
    /// Returns `None` when nothing is streaming.
    pub fn stop(
        &self,
        state: &mut SessionState,
        presenter: &mut dyn Presenter,
    ) -> Option<OutboundEnvelope> {
        if !state.context.is_streaming() {
            return None;
        }
        let envelope = OutboundEnvelope::stop(state.context.active_id().map(str::to_string));
        if state.context.cancel() {
            presenter.present(ViewUpdate::StreamingChanged(false));
        }
        Some(envelope)
    }

    fn append(
        &self,
        state: &mut SessionState,
        key: StreamKey,
        fragment: &str,
        presenter: &mut dyn Presenter,
    ) {
        if state.stream.append(&key, fragment) == AppendOutcome::Materialized {
            presenter.present(ViewUpdate::MessageMaterialized { key });
        }
    }

    fn finalize(&self, state: &mut SessionState, key: &StreamKey, presenter: &mut dyn Presenter) {
        if let Some(frame) = state.stream.finalize(key, self.renderer()) {
            presenter.present(ViewUpdate::MessageRendered {
                key: frame.key,
                rendered: frame.rendered,
                finalized: true,
            });
        }
    }

    fn close_step(
        &self,
        state: &mut SessionState,
        run_id: &str,
        step: u32,
        presenter: &mut dyn Presenter,
    ) {
        self.finalize(state, &StreamKey::step(run_id, step), presenter);
        presenter.present(ViewUpdate::StepClosed {
            run_id: run_id.to_string(),
            step,
        });
    }

    fn close_steps(
        &self,
        state: &mut SessionState,
        run_id: &str,
        steps: Vec<u32>,
        presenter: &mut dyn Presenter,
    ) {
        for step in steps {
            self.close_step(state, run_id, step, presenter);
        }
    }

    fn fail_run(
        &self,
        state: &mut SessionState,
        run_id: &str,
        message: String,
        presenter: &mut dyn Presenter,
    ) {
        let Some(open_steps) = state.runs.fail(run_id, &message) else {
            presenter.present(ViewUpdate::Error { message });
            return;
        };
        self.close_steps(state, run_id, open_steps, presenter);
        presenter.present(ViewUpdate::RunErrored {
            run_id: run_id.to_string(),
            message,
        });
        self.end_run(state, run_id, presenter);
    }

    fn cancel_run(&self, state: &mut SessionState, run_id: String, presenter: &mut dyn Presenter) {
        if let Some(open_steps) = state.runs.cancel(&run_id) {
            self.close_steps(state, &run_id, open_steps, presenter);
            presenter.present(ViewUpdate::RunCancelled {
                run_id: run_id.clone(),
            });
        }
        self.end_run(state, &run_id, presenter);
    }

    fn end_run(&self, state: &mut SessionState, run_id: &str, presenter: &mut dyn Presenter) {
        if state.context.end_run(run_id) {
            presenter.present(ViewUpdate::StreamingChanged(false));
        }
    }

    fn run_id(&self, state: &SessionState, explicit: Option<&str>) -> Option<String> {
        let run_id = state.context.resolve_run(explicit);
        if run_id.is_none() {
            debug!("react event with no active run dropped");
        }
        run_id
    }

    /// Plans are keyed by the message id of their `planning_start`.
    fn plan_id(&self, state: &SessionState, explicit: Option<&str>) -> Option<String> {
        state
            .context
            .resolve_message(explicit)
            .or_else(|| state.plans.latest().map(|p| p.run_id.clone()))
    }

    /// The current open step of the active run, else the active message.
    fn tool_scope(&self, state: &mut SessionState, explicit_run: Option<&str>) -> ToolScope {
        if let Some(run_id) = state.context.resolve_run(explicit_run)
            && let Some(step) = state.runs.current_open_step(&run_id)
        {
            return ToolScope::Step { run_id, step };
        }
        ToolScope::Message(state.context.current_message().map(str::to_string))
    }
}

fn present_resolution(
    presenter: &mut dyn Presenter,
    resolution: Resolution,
    name: String,
    status: ToolCallStatus,
    payload: Value,
) {
    if resolution.synthetic {
        debug!(tool = %name, "resolution matched no pending call");
    }
    presenter.present(ViewUpdate::ToolCallResolved {
        id: resolution.id,
        name,
        status,
        payload,
        synthetic: resolution.synthetic,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderMode;

    fn router() -> EventRouter {
        EventRouter::default()
    }

    fn feed(router: &EventRouter, state: &mut SessionState, frames: &[&str]) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        for frame in frames {
            router.dispatch(state, frame, &mut updates);
        }
        updates
    }

    #[test]
    fn test_malformed_and_unknown_are_ignored() {
        let router = router();
        let mut state = SessionState::new();
        let mut updates = Vec::new();
        assert!(!router.dispatch(&mut state, "{", &mut updates));
        assert!(!router.dispatch(&mut state, r#"{"type":"heartbeat"}"#, &mut updates));
        assert!(!router.dispatch(&mut state, r#"{"content":"x"}"#, &mut updates));
        assert!(updates.is_empty());
    }

    #[test]
    fn test_chunk_without_message_id_uses_context() {
        let router = router();
        let mut state = SessionState::new();
        let updates = feed(
            &router,
            &mut state,
            &[
                r#"{"type":"assistant_start","messageId":"m1"}"#,
                r#"{"type":"assistant_chunk","content":"Hi"}"#,
            ],
        );
        assert!(updates.contains(&ViewUpdate::MessageMaterialized {
            key: StreamKey::message("m1")
        }));
        assert_eq!(state.stream.text(&StreamKey::message("m1")), Some("Hi"));
    }

    #[test]
    fn test_stop_is_optimistic() {
        let router = router();
        let mut state = SessionState::new();
        feed(
            &router,
            &mut state,
            &[r#"{"type":"react_start","messageId":"r1","maxSteps":3}"#],
        );

        let mut updates = Vec::new();
        let envelope = router.stop(&mut state, &mut updates);
        assert_eq!(envelope, Some(OutboundEnvelope::stop(Some("r1".to_string()))));
        assert_eq!(updates, vec![ViewUpdate::StreamingChanged(false)]);
        assert!(router.stop(&mut state, &mut updates).is_none());

        // late terminal event is still accepted
        let updates = feed(
            &router,
            &mut state,
            &[r#"{"type":"react_finish","answer":"done","totalSteps":0,"messageId":"r1"}"#],
        );
        assert!(matches!(updates[0], ViewUpdate::RunFinished { .. }));
    }

    #[test]
    fn test_generic_error_ends_streaming() {
        let router = router();
        let mut state = SessionState::new();
        let updates = feed(
            &router,
            &mut state,
            &[
                r#"{"type":"assistant_start","messageId":"m1"}"#,
                r#"{"type":"assistant_chunk","messageId":"m1","content":"partial"}"#,
                r#"{"type":"error","message":"boom"}"#,
            ],
        );
        assert!(updates.contains(&ViewUpdate::Error {
            message: "boom".to_string()
        }));
        assert_eq!(updates.last(), Some(&ViewUpdate::StreamingChanged(false)));
        assert!(!state.context.is_streaming());
        // the partial message was frozen with its last content
        assert!(updates.iter().any(|u| matches!(
            u,
            ViewUpdate::MessageRendered { finalized: true, rendered, .. }
                if rendered.markup == "partial" && rendered.mode == RenderMode::Markup
        )));
    }

    #[test]
    fn test_function_call_flow_resolves_announced_tools() {
        let router = router();
        let mut state = SessionState::new();
        let updates = feed(
            &router,
            &mut state,
            &[
                r#"{"type":"tool_calls_start","tools":["weather"]}"#,
                r#"{"type":"tool_call","toolName":"weather","toolResult":"sunny"}"#,
            ],
        );
        let resolved = updates
            .iter()
            .find_map(|u| match u {
                ViewUpdate::ToolCallResolved { synthetic, .. } => Some(*synthetic),
                _ => None,
            })
            .unwrap();
        assert!(!resolved);
        assert_eq!(state.tools.pending_count("weather"), 0);
    }
}
