use super::*;

use std::thread;

use crossbeam_channel::unbounded;

use crate::actions;
use crate::agent::bridge;
use crate::canvas::CardKind;

const HELP_TEXT: &str = "\
/new [title]          start a conversation
/rename <title>       rename the active conversation
/delete               delete the active conversation
/conversations        list conversations
/select <n|id>        switch conversation
/clear-all            reset to a single fresh conversation
/item add <type> [name]   add a card (project|entity|note|chart)
/item del <id>        remove a card
/title <text>         set the canvas title
/desc <text>          set the canvas description
/story set <text>     replace the story text
/story append <text>  append to the story text
/tag <id> <tag>       toggle a tag on an entity card
/do <action> <json>   run a named action directly
/actions              list named actions
/state                show the canvas preview as JSON
/theme <ink|paper>    switch color theme
/help  /exit";

impl App {
    pub(super) fn submit_current_line(&mut self) {
        let line = self.input.trim().to_string();
        if line.is_empty() {
            return;
        }
        self.history.push(line.clone());
        self.history_pos = None;
        self.input.clear();
        self.cursor = 0;

        if line.starts_with('/') {
            self.run_command(&line);
            return;
        }

        if self.running {
            let msg = "agent is running, wait or press Esc";
            if !self
                .entries
                .last()
                .is_some_and(|e| e.kind == EntryKind::System && e.text == msg)
            {
                self.push_entry(EntryKind::System, msg);
            }
            return;
        }
        self.start_agent_turn(&line);
    }

    fn run_command(&mut self, line: &str) {
        let (command, rest) = match line.split_once(' ') {
            Some((head, tail)) => (head, tail.trim()),
            None => (line, ""),
        };
        match command {
            "/exit" | "/quit" => self.should_quit = true,
            "/help" => self.push_entry(EntryKind::System, HELP_TEXT),
            "/new" => {
                if self.running {
                    self.interrupt_running_task("agent turn interrupted by /new");
                }
                self.sync_active();
                let title = if rest.is_empty() { None } else { Some(rest) };
                self.conversations.create(title);
                self.load_selected();
                self.status = "new conversation".to_string();
            }
            "/rename" => {
                if rest.is_empty() {
                    self.modal_input.clear();
                    self.mode = Mode::Rename;
                    self.status = "rename: type a title, Enter to confirm".to_string();
                } else {
                    self.apply_rename(rest);
                }
            }
            "/delete" => {
                if self.running {
                    self.interrupt_running_task("agent turn interrupted by /delete");
                }
                let id = self.conversations.selected_id().to_string();
                self.conversations.delete(&id);
                self.load_selected();
                self.status = "conversation deleted".to_string();
            }
            "/conversations" => self.list_conversations(),
            "/select" => {
                if rest.is_empty() {
                    self.push_entry(EntryKind::System, "usage: /select <n|id>");
                    return;
                }
                match self.conversations.resolve(rest) {
                    Some(id) => {
                        self.switch_conversation(&id);
                        self.status = format!("switched to {}", self.conversations.selected().title);
                    }
                    None => self.push_entry(
                        EntryKind::Error,
                        format!("no conversation matches {rest:?}"),
                    ),
                }
            }
            "/clear-all" => {
                self.mode = Mode::ClearAll;
                self.status = "delete ALL conversations? y/n".to_string();
            }
            "/item" => self.run_item_command(rest),
            "/title" => {
                self.canvas.set_global_title(rest);
                self.sync_active();
                self.status = "title updated".to_string();
                self.invalidate_render_cache();
            }
            "/desc" => {
                self.canvas.set_global_description(rest);
                self.sync_active();
                self.status = "description updated".to_string();
                self.invalidate_render_cache();
            }
            "/story" => self.run_story_command(rest),
            "/tag" => {
                let mut parts = rest.splitn(2, ' ');
                let (Some(id), Some(tag)) = (parts.next(), parts.next()) else {
                    self.push_entry(EntryKind::System, "usage: /tag <id> <tag>");
                    return;
                };
                self.canvas.toggle_tag(id, tag.trim());
                self.sync_active();
                self.status = self.canvas.state().last_action.clone();
                self.invalidate_render_cache();
            }
            "/do" => self.run_do_command(rest),
            "/actions" => {
                let listing = actions::CATALOG
                    .iter()
                    .map(|spec| {
                        let params = spec
                            .params
                            .iter()
                            .map(|p| {
                                if p.required {
                                    format!("{}: {}", p.name, p.kind)
                                } else {
                                    format!("{}?: {}", p.name, p.kind)
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("{}({params})  {}", spec.name, spec.description)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                self.push_entry(EntryKind::System, listing);
            }
            "/state" => {
                let preview = self.canvas.state().preview();
                let text = serde_json::to_string_pretty(&preview)
                    .unwrap_or_else(|_| "<unserializable>".to_string());
                self.push_entry(EntryKind::System, text);
            }
            "/theme" => match ThemePreset::parse(rest) {
                Some(theme) => {
                    self.theme = theme;
                    self.status = format!("theme: {}", theme.as_str());
                    self.invalidate_render_cache();
                }
                None => self.push_entry(EntryKind::System, "themes: ink, paper"),
            },
            _ => self.push_entry(EntryKind::Error, format!("unknown command: {command}")),
        }
    }

    fn run_item_command(&mut self, rest: &str) {
        let (sub, tail) = match rest.split_once(' ') {
            Some((head, tail)) => (head, tail.trim()),
            None => (rest, ""),
        };
        match sub {
            "add" => {
                let (kind_raw, name) = match tail.split_once(' ') {
                    Some((kind, name)) => (kind, Some(name.trim())),
                    None => (tail, None),
                };
                let Some(kind) = CardKind::parse(kind_raw) else {
                    let kinds = CardKind::all().map(|k| k.as_str()).join("|");
                    self.push_entry(EntryKind::System, format!("usage: /item add <{kinds}> [name]"));
                    return;
                };
                let id = self.canvas.add_item(kind, name.filter(|n| !n.is_empty()));
                self.sync_active();
                self.status = format!("created {id}");
                self.invalidate_render_cache();
            }
            "del" => {
                if tail.is_empty() {
                    self.push_entry(EntryKind::System, "usage: /item del <id>");
                    return;
                }
                self.canvas.delete_item(tail);
                self.sync_active();
                self.status = self.canvas.state().last_action.clone();
                self.invalidate_render_cache();
            }
            _ => self.push_entry(EntryKind::System, "usage: /item add|del ..."),
        }
    }

    fn run_story_command(&mut self, rest: &str) {
        let (sub, text) = match rest.split_once(' ') {
            Some((head, tail)) => (head, tail),
            None => (rest, ""),
        };
        match sub {
            "set" => {
                self.canvas.set_story(text);
                self.status = "story replaced".to_string();
            }
            "append" => {
                self.canvas.append_story(text);
                self.status = "story extended".to_string();
            }
            _ => {
                self.push_entry(EntryKind::System, "usage: /story set|append <text>");
                return;
            }
        }
        self.sync_active();
        self.invalidate_render_cache();
    }

    /// `/do` drives the same registry the agent uses; the invocation and its
    /// result land in the transcript exactly like an agent-run action.
    fn run_do_command(&mut self, rest: &str) {
        let (name, raw_args) = match rest.split_once(' ') {
            Some((head, tail)) => (head, tail.trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            self.push_entry(EntryKind::System, "usage: /do <action> <json>");
            return;
        }
        let args: serde_json::Value = if raw_args.is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(raw_args) {
                Ok(value) => value,
                Err(err) => {
                    self.push_entry(EntryKind::Error, format!("bad arguments: {err}"));
                    return;
                }
            }
        };
        match actions::apply(&mut self.canvas, name, &args) {
            Ok(result) => {
                let id = format!("local-{}", self.messages.len());
                self.push_message(ChatMessage::ActionExecutionMessage {
                    id: id.clone(),
                    name: name.to_string(),
                    arguments: args,
                });
                self.push_message(ChatMessage::ResultMessage {
                    action_execution_id: id,
                    action_name: name.to_string(),
                    result: result.clone(),
                });
                self.status = result;
            }
            Err(err) => self.push_entry(EntryKind::Error, err.to_string()),
        }
        self.invalidate_render_cache();
    }

    pub(super) fn apply_rename(&mut self, title: &str) {
        let id = self.conversations.selected_id().to_string();
        if self.conversations.rename(&id, title) {
            self.status = "renamed".to_string();
        } else {
            // Blank input keeps the old title.
            self.status = "title unchanged".to_string();
        }
        self.invalidate_render_cache();
    }

    fn list_conversations(&mut self) {
        let selected = self.conversations.selected_id().to_string();
        let listing = self
            .conversations
            .conversations()
            .iter()
            .enumerate()
            .map(|(i, conv)| {
                let marker = if conv.id == selected { "*" } else { " " };
                format!(
                    "{marker} {}. {}  ({} messages)  [{}]",
                    i + 1,
                    conv.title,
                    conv.messages.len(),
                    conv.id
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.push_entry(EntryKind::System, listing);
    }

    pub(super) fn start_agent_turn(&mut self, prompt: &str) {
        self.push_message(ChatMessage::text("user", prompt));

        let (tx, rx) = unbounded::<WorkerEvent>();
        let (reply_tx, reply_rx) = unbounded::<crate::agent::AgentReply>();
        self.rx = Some(rx);
        self.reply_tx = Some(reply_tx);
        self.assistant_idx = None;
        self.running = true;
        self.status = "agent working".to_string();

        let prompt = prompt.to_string();
        let snapshot = self.canvas.snapshot();
        let child_pids = Arc::clone(&self.child_pids);
        thread::spawn(move || {
            let result = bridge::run_stream(&prompt, &snapshot, &tx, reply_rx, &child_pids);
            match result {
                Ok(summary) => {
                    let _ = tx.send(WorkerEvent::Done(summary));
                }
                Err(err) => {
                    let _ = tx.send(WorkerEvent::Error(err));
                }
            }
        });
    }
}
