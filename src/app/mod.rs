use std::io::Stdout;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyEventKind, MouseEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::text::{Line, Text};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::canvas::{AgentState, CanvasStore};
use crate::conversation::{ChatMessage, ConversationStore};
use crate::{input_cursor_position, kill_pid, truncate};

mod commands;
mod input;
mod render;
mod runtime;
mod session;
#[cfg(test)]
mod tests;
mod types;
mod worker;

pub(crate) use runtime::run_app;
pub(crate) use types::{
    default_theme, entries_from_messages, EntryKind, LogEntry, ThemePalette, ThemePreset,
    WorkerEvent,
};

const AGENT_NAME: &str = "story_agent";
const PROPOSAL_ACTION: &str = "proposeDocument";
const ANGLE_ACTION: &str = "selectAngle";
const ACCEPT_REPLY: &str = "Changes accepted";
const REJECT_REPLY: &str = "Changes rejected";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Normal,
    Confirm,
    SelectAngle,
    Rename,
    ClearAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateStatus {
    /// Proposal arguments are still arriving; no decision surface yet.
    Streaming,
    /// Arguments complete, waiting on the human.
    Deciding,
    Accepted,
    Rejected,
}

/// A document-replacement proposal held at the human gate. `baseline` is the
/// state captured before the first argument byte arrived; reject restores it.
#[derive(Clone, Debug)]
struct ProposalGate {
    action_id: String,
    baseline: AgentState,
    story: String,
    title: String,
    description: String,
    status: GateStatus,
}

impl ProposalGate {
    fn is_terminal(&self) -> bool {
        matches!(self.status, GateStatus::Accepted | GateStatus::Rejected)
    }
}

#[derive(Clone, Debug)]
struct AngleGate {
    action_id: String,
    angles: Vec<String>,
    selected: usize,
    open: bool,
}

/// A non-interactive action whose arguments are still streaming; applied
/// whole once the argument stream ends.
#[derive(Clone, Debug)]
struct PendingAction {
    id: String,
    name: String,
    args: Value,
}

/// Cached transcript lines and scroll bounds, keyed by a generation counter
/// so they are rebuilt only when entries or the viewport change.
struct RenderCache {
    generation: u64,
    width: u16,
    height: u16,
    lines: Vec<Line<'static>>,
    scroll_max: u16,
}

impl RenderCache {
    fn new() -> Self {
        Self {
            generation: u64::MAX, // force first rebuild
            width: 0,
            height: 0,
            lines: Vec::new(),
            scroll_max: 0,
        }
    }
}

struct App {
    canvas: CanvasStore,
    conversations: ConversationStore,
    /// Persisted transcript of the active conversation.
    messages: Vec<ChatMessage>,
    /// Display transcript; includes transient system/error rows that are
    /// never persisted.
    entries: Vec<LogEntry>,

    mode: Mode,
    gate: Option<ProposalGate>,
    angle: Option<AngleGate>,
    pending_actions: Vec<PendingAction>,

    input: String,
    cursor: usize,
    modal_input: String,
    history: Vec<String>,
    history_pos: Option<usize>,

    running: bool,
    should_quit: bool,
    spinner_idx: usize,
    rx: Option<Receiver<WorkerEvent>>,
    reply_tx: Option<Sender<crate::agent::AgentReply>>,
    /// Index into `messages`/`entries` of the assistant row receiving chunks.
    assistant_idx: Option<usize>,
    child_pids: Arc<Mutex<Vec<u32>>>,

    theme: ThemePreset,
    status: String,
    scroll: u16,
    autoscroll: bool,
    viewport_width: u16,
    viewport_height: u16,
    render_generation: u64,
    render_cache: RenderCache,
}

impl App {
    fn new(conversations: ConversationStore) -> Self {
        let mut app = Self {
            canvas: CanvasStore::new(),
            conversations,
            messages: Vec::new(),
            entries: Vec::new(),
            mode: Mode::Normal,
            gate: None,
            angle: None,
            pending_actions: Vec::new(),
            input: String::new(),
            cursor: 0,
            modal_input: String::new(),
            history: Vec::new(),
            history_pos: None,
            running: false,
            should_quit: false,
            spinner_idx: 0,
            rx: None,
            reply_tx: None,
            assistant_idx: None,
            child_pids: Arc::new(Mutex::new(Vec::new())),
            theme: default_theme(),
            status: "ready".to_string(),
            scroll: 0,
            autoscroll: true,
            viewport_width: 120,
            viewport_height: 36,
            render_generation: 0,
            render_cache: RenderCache::new(),
        };
        app.load_selected();
        app
    }

    fn theme_palette(&self) -> ThemePalette {
        self.theme.palette()
    }

    fn invalidate_render_cache(&mut self) {
        self.render_generation = self.render_generation.wrapping_add(1);
    }

    fn push_entry(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.entries.push(LogEntry {
            kind,
            text: text.into(),
        });
        self.follow_scroll();
    }

    /// Appends to both the persisted transcript and the display transcript,
    /// then writes the active conversation back into the store. Returns the
    /// index of the message in the persisted transcript.
    fn push_message(&mut self, message: ChatMessage) -> usize {
        let idx = self.messages.len();
        self.messages.push(message.clone());
        let mut projected = entries_from_messages(std::slice::from_ref(&message));
        self.entries.append(&mut projected);
        self.sync_active();
        self.follow_scroll();
        idx
    }

    fn clear_running_state(&mut self) {
        self.running = false;
        self.rx = None;
        self.assistant_idx = None;
        self.pending_actions.clear();
        // The reply channel outlives the turn only while a gate is undecided.
        if self.gate.as_ref().map(|g| g.is_terminal()).unwrap_or(true) && self.angle.is_none() {
            self.reply_tx = None;
        }
        if let Ok(mut pids) = self.child_pids.lock() {
            pids.clear();
        }
    }

    fn interrupt_running_task(&mut self, reason: &str) {
        if !self.running {
            return;
        }
        if let Ok(mut pids) = self.child_pids.lock() {
            for &pid in pids.iter() {
                kill_pid(pid);
            }
            pids.clear();
        }
        // An in-flight proposal dies with its turn; restore the baseline.
        if let Some(gate) = self.gate.take() {
            if !gate.is_terminal() {
                self.canvas.replace(gate.baseline);
            }
        }
        self.angle = None;
        self.mode = Mode::Normal;
        self.clear_running_state();
        self.reply_tx = None;
        self.status = "interrupted".to_string();
        self.push_entry(EntryKind::System, reason.to_string());
    }

    fn follow_scroll(&mut self) {
        self.invalidate_render_cache();
        if self.autoscroll {
            self.scroll = self.scroll_max();
        } else {
            self.scroll = self.scroll.min(self.scroll_max());
        }
    }

    fn ensure_render_cache(&mut self) -> bool {
        let need_rebuild = self.render_cache.generation != self.render_generation
            || self.render_cache.width != self.viewport_width
            || self.render_cache.height != self.viewport_height;
        if !need_rebuild {
            return false;
        }

        let width = self.transcript_width().max(1);
        let lines = self.transcript_lines();
        let available = self.transcript_height();
        let paragraph = Paragraph::new(Text::from(lines.clone())).wrap(Wrap { trim: false });
        let rendered = paragraph.line_count(width) as u16;
        let scroll_max = rendered.saturating_sub(available);

        self.render_cache = RenderCache {
            generation: self.render_generation,
            width: self.viewport_width,
            height: self.viewport_height,
            lines,
            scroll_max,
        };
        true
    }

    fn scroll_max(&mut self) -> u16 {
        self.ensure_render_cache();
        self.render_cache.scroll_max
    }

    fn cached_log_lines(&self) -> &[Line<'static>] {
        &self.render_cache.lines
    }

    fn update_viewport(&mut self, width: u16, height: u16) {
        self.viewport_width = width.max(1);
        self.viewport_height = height.max(1);
        let max_scroll = self.scroll_max();
        if self.autoscroll {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn scroll_up(&mut self, n: u16) {
        let from = if self.autoscroll {
            self.scroll_max()
        } else {
            self.scroll
        };
        self.autoscroll = false;
        self.scroll = from.saturating_sub(n);
    }

    fn scroll_down(&mut self, n: u16) {
        let max_scroll = self.scroll_max();
        self.scroll = self.scroll.saturating_add(n).min(max_scroll);
        if self.scroll >= max_scroll {
            self.autoscroll = true;
        }
    }

    fn input_height(&self, width: u16, prompt_width: u16) -> u16 {
        if self.input.is_empty() {
            return 1;
        }
        let (_, end_y) = input_cursor_position(&self.input, self.input.len(), width, prompt_width);
        end_y.saturating_add(1).max(1)
    }

    fn send_action_reply(&mut self, action_id: &str, result: &str) {
        debug_assert!(
            self.reply_tx.is_some(),
            "action reply with no live channel"
        );
        if let Some(tx) = &self.reply_tx {
            let _ = tx.send(crate::agent::AgentReply::ActionResult {
                id: action_id.to_string(),
                result: result.to_string(),
            });
            let _ = tx.send(crate::agent::AgentReply::StateSync(self.canvas.snapshot()));
        }
    }

    /// Terminal transition for the confirmation gate. Repeated calls after a
    /// decision are no-ops.
    fn decide_gate(&mut self, accept: bool) {
        let Some(mut gate) = self.gate.take() else {
            return;
        };
        if gate.status != GateStatus::Deciding {
            self.gate = Some(gate);
            return;
        }
        let (reply, note) = if accept {
            self.canvas
                .replace_document(&gate.story, &gate.title, &gate.description);
            gate.status = GateStatus::Accepted;
            (ACCEPT_REPLY, "proposal accepted")
        } else {
            self.canvas.replace(gate.baseline.clone());
            gate.status = GateStatus::Rejected;
            (REJECT_REPLY, "proposal rejected")
        };
        let action_id = gate.action_id.clone();
        let name = PROPOSAL_ACTION;
        self.push_message(ChatMessage::ResultMessage {
            action_execution_id: action_id.clone(),
            action_name: name.to_string(),
            result: reply.to_string(),
        });
        self.send_action_reply(&action_id, reply);
        self.gate = None;
        self.mode = Mode::Normal;
        self.status = note.to_string();
        if !self.running {
            self.reply_tx = None;
        }
        self.sync_active();
        self.invalidate_render_cache();
    }

    fn decide_angle(&mut self, choice: Option<usize>) {
        let Some(gate) = self.angle.take() else {
            return;
        };
        if !gate.open {
            return;
        }
        let reply = match choice.and_then(|i| gate.angles.get(i)) {
            Some(angle) => angle.clone(),
            None => "cancelled".to_string(),
        };
        self.push_message(ChatMessage::ResultMessage {
            action_execution_id: gate.action_id.clone(),
            action_name: ANGLE_ACTION.to_string(),
            result: reply.clone(),
        });
        self.send_action_reply(&gate.action_id, &reply);
        self.mode = Mode::Normal;
        self.status = format!("angle: {}", truncate(&reply, 40));
        if !self.running {
            self.reply_tx = None;
        }
        self.invalidate_render_cache();
    }
}
