use super::*;

use crate::actions;
use crate::agent::AgentEvent;
use crate::merge::merge_partial;

impl App {
    /// Drains pending agent events. Returns true when anything was processed
    /// so the runtime knows to redraw.
    pub(super) fn poll_worker(&mut self) -> bool {
        let Some(rx) = self.rx.clone() else {
            return false;
        };
        let mut processed_any = false;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    processed_any = true;
                    self.apply_worker_event(event);
                }
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    if self.running {
                        self.clear_running_state();
                        self.status = "agent disconnected".to_string();
                        self.push_entry(EntryKind::Error, "agent worker disconnected");
                    }
                    break;
                }
            }
        }
        if processed_any {
            self.invalidate_render_cache();
        }
        processed_any
    }

    fn apply_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Agent(AgentEvent::TextChunk(chunk)) => self.apply_text_chunk(&chunk),
            WorkerEvent::Agent(AgentEvent::StateSnapshot(state)) => self.apply_state_snapshot(state),
            WorkerEvent::Agent(AgentEvent::ActionStart { id, name }) => {
                self.apply_action_start(id, name)
            }
            WorkerEvent::Agent(AgentEvent::ActionArgs { id, args }) => {
                self.apply_action_args(&id, args)
            }
            WorkerEvent::Agent(AgentEvent::ActionEnd { id }) => self.apply_action_end(&id),
            WorkerEvent::Done(summary) => {
                let summary = summary.trim().to_string();
                if !summary.is_empty() && self.assistant_idx.is_none() {
                    self.push_message(ChatMessage::text("assistant", summary));
                }
                // A proposal the agent never finished streaming can never be
                // decided; drop it and restore the baseline. A gate already at
                // the decision surface outlives the turn and waits on the user.
                if self
                    .gate
                    .as_ref()
                    .is_some_and(|g| g.status == GateStatus::Streaming)
                {
                    if let Some(gate) = self.gate.take() {
                        self.canvas.replace(gate.baseline);
                    }
                    self.mode = Mode::Normal;
                    self.push_entry(EntryKind::Error, "agent ended with an unfinished proposal");
                }
                // Same for a selector that never opened.
                if self.angle.as_ref().is_some_and(|a| !a.open) {
                    self.angle = None;
                }
                self.clear_running_state();
                self.status = "ready".to_string();
                self.sync_active();
            }
            WorkerEvent::Error(message) => {
                // A failed turn also invalidates any proposal it was streaming.
                if let Some(gate) = self.gate.take() {
                    if !gate.is_terminal() {
                        self.canvas.replace(gate.baseline);
                    }
                }
                self.angle = None;
                self.mode = Mode::Normal;
                self.clear_running_state();
                self.reply_tx = None;
                self.status = "agent error".to_string();
                self.push_entry(EntryKind::Error, message);
            }
        }
    }

    /// Incremental assistant prose accumulates into one transcript row per
    /// turn.
    fn apply_text_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        match self.assistant_idx {
            Some(idx) => {
                if let Some(ChatMessage::TextMessage { content, .. }) = self.messages.get_mut(idx)
                {
                    content.push_str(chunk);
                }
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .rev()
                    .find(|entry| entry.kind == EntryKind::Assistant)
                {
                    entry.text.push_str(chunk);
                }
            }
            None => {
                let idx = self.push_message(ChatMessage::text("assistant", chunk));
                self.assistant_idx = Some(idx);
            }
        }
        self.status = "streaming".to_string();
        self.follow_scroll();
    }

    /// Agent-pushed whole-state sync. While a proposal is at the gate the
    /// baseline must stay authoritative, so syncs are ignored until a
    /// decision lands.
    fn apply_state_snapshot(&mut self, state: AgentState) {
        if self.gate.as_ref().is_some_and(|g| !g.is_terminal()) {
            return;
        }
        self.canvas.replace(state.clone());
        self.push_message(ChatMessage::AgentStateMessage {
            agent_name: AGENT_NAME.to_string(),
            state,
        });
    }

    fn apply_action_start(&mut self, id: String, name: String) {
        match name.as_str() {
            PROPOSAL_ACTION => {
                self.gate = Some(ProposalGate {
                    action_id: id,
                    baseline: self.canvas.snapshot(),
                    story: String::new(),
                    title: String::new(),
                    description: String::new(),
                    status: GateStatus::Streaming,
                });
                self.status = "proposal streaming".to_string();
            }
            ANGLE_ACTION => {
                self.angle = Some(AngleGate {
                    action_id: id,
                    angles: Vec::new(),
                    selected: 0,
                    open: false,
                });
            }
            _ => {
                self.pending_actions.push(PendingAction {
                    id,
                    name,
                    args: Value::Null,
                });
            }
        }
    }

    fn apply_action_args(&mut self, id: &str, args: Value) {
        if let Some(gate) = self.gate.as_mut().filter(|g| g.action_id == id) {
            gate.story = arg_str(&args, "story");
            gate.title = arg_str(&args, "title");
            gate.description = arg_str(&args, "description");
            return;
        }
        if let Some(angle) = self.angle.as_mut().filter(|a| a.action_id == id) {
            angle.angles = args
                .get("angles")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return;
        }
        if let Some(pending) = self.pending_actions.iter_mut().find(|p| p.id == id) {
            pending.args = args;
        }
    }

    fn apply_action_end(&mut self, id: &str) {
        if let Some(gate) = self.gate.as_mut().filter(|g| g.action_id == id) {
            // The decision surface only appears once streaming is over.
            gate.status = GateStatus::Deciding;
            let diff = merge_partial(&gate.baseline.story, &gate.story, true);
            self.mode = Mode::Confirm;
            self.status = "confirm proposal (y/n)".to_string();
            self.push_entry(
                EntryKind::System,
                format!("proposed rewrite: {}", truncate(&diff, 160)),
            );
            return;
        }
        if self.angle.as_ref().is_some_and(|a| a.action_id == id) {
            let empty = self
                .angle
                .as_ref()
                .map(|a| a.angles.is_empty())
                .unwrap_or(true);
            if empty {
                // A selector with nothing to select resolves immediately.
                if let Some(gate) = self.angle.take() {
                    self.push_message(ChatMessage::ResultMessage {
                        action_execution_id: gate.action_id.clone(),
                        action_name: ANGLE_ACTION.to_string(),
                        result: "cancelled".to_string(),
                    });
                    self.send_action_reply(&gate.action_id, "cancelled");
                }
                return;
            }
            if let Some(angle) = self.angle.as_mut() {
                angle.open = true;
            }
            self.mode = Mode::SelectAngle;
            self.status = "select an angle".to_string();
            return;
        }
        let Some(pos) = self.pending_actions.iter().position(|p| p.id == id) else {
            return;
        };
        let pending = self.pending_actions.remove(pos);
        let result = match actions::apply(&mut self.canvas, &pending.name, &pending.args) {
            Ok(result) => result,
            Err(err) => format!("error: {err}"),
        };
        self.push_message(ChatMessage::ActionExecutionMessage {
            id: pending.id.clone(),
            name: pending.name.clone(),
            arguments: pending.args,
        });
        self.push_message(ChatMessage::ResultMessage {
            action_execution_id: pending.id.clone(),
            action_name: pending.name,
            result: result.clone(),
        });
        self.send_action_reply(&pending.id, &result);
        self.sync_active();
    }

    #[cfg(test)]
    pub(super) fn push_test_run(
        &mut self,
        rx: Receiver<WorkerEvent>,
        reply_tx: Sender<crate::agent::AgentReply>,
    ) {
        self.rx = Some(rx);
        self.reply_tx = Some(reply_tx);
        self.running = true;
    }
}

fn arg_str(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
