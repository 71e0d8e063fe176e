use super::*;

use crossbeam_channel::unbounded;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use tempfile::TempDir;

use crate::agent::{AgentEvent, AgentReply};

fn test_app() -> (App, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let store = ConversationStore::open(dir.path().to_path_buf());
    (App::new(store), dir)
}

fn attach_agent(
    app: &mut App,
) -> (
    crossbeam_channel::Sender<WorkerEvent>,
    crossbeam_channel::Receiver<AgentReply>,
) {
    let (tx, rx) = unbounded::<WorkerEvent>();
    let (reply_tx, reply_rx) = unbounded::<AgentReply>();
    app.push_test_run(rx, reply_tx);
    (tx, reply_rx)
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[test]
fn text_chunks_accumulate_into_one_assistant_message() {
    let (mut app, _dir) = test_app();
    let (tx, _replies) = attach_agent(&mut app);

    for chunk in ["Once ", "upon ", "a time"] {
        tx.send(WorkerEvent::Agent(AgentEvent::TextChunk(chunk.to_string())))
            .expect("send chunk");
    }
    assert!(app.poll_worker());

    let assistants: Vec<_> = app
        .messages
        .iter()
        .filter_map(|m| match m {
            ChatMessage::TextMessage { role, content } if role == "assistant" => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(assistants, vec!["Once upon a time"]);
}

#[test]
fn action_sequence_applies_and_replies_with_result() {
    let (mut app, _dir) = test_app();
    let (tx, replies) = attach_agent(&mut app);

    let id = "run-1".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: id.clone(),
        name: "createItem".to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionArgs {
        id: id.clone(),
        args: json!({"type": "project", "name": "Launch"}),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionEnd { id: id.clone() }))
        .unwrap();
    assert!(app.poll_worker());

    assert_eq!(app.canvas.state().items.len(), 1);
    assert_eq!(app.canvas.state().items[0].name, "Launch");
    match replies.try_recv().expect("action result reply") {
        AgentReply::ActionResult { id: reply_id, result } => {
            assert_eq!(reply_id, id);
            assert_eq!(result, "created:0001");
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    match replies.try_recv().expect("state sync reply") {
        AgentReply::StateSync(state) => assert_eq!(state.items.len(), 1),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(app
        .messages
        .iter()
        .any(|m| matches!(m, ChatMessage::ActionExecutionMessage { name, .. } if name == "createItem")));
    assert!(app
        .messages
        .iter()
        .any(|m| matches!(m, ChatMessage::ResultMessage { result, .. } if result == "created:0001")));
}

fn stream_proposal(app: &mut App, tx: &crossbeam_channel::Sender<WorkerEvent>, story: &str) {
    let id = "prop-1".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: id.clone(),
        name: PROPOSAL_ACTION.to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionArgs {
        id: id.clone(),
        args: json!({"story": story, "title": "New title", "description": "New desc"}),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionEnd { id }))
        .unwrap();
    assert!(app.poll_worker());
}

#[test]
fn accepting_a_proposal_commits_the_document() {
    let (mut app, _dir) = test_app();
    app.canvas.set_story("old story");
    let (tx, replies) = attach_agent(&mut app);

    stream_proposal(&mut app, &tx, "new story");
    assert_eq!(app.mode, Mode::Confirm);

    app.handle_key(key(KeyCode::Char('y')));

    let state = app.canvas.state();
    assert_eq!(state.story, "new story");
    assert_eq!(state.global_title, "New title");
    assert_eq!(state.last_action, "document:replaced");
    assert_eq!(app.mode, Mode::Normal);
    match replies.try_recv().expect("decision reply") {
        AgentReply::ActionResult { result, .. } => assert_eq!(result, ACCEPT_REPLY),
        other => panic!("unexpected reply: {other:?}"),
    }
    match replies.try_recv().expect("state sync") {
        AgentReply::StateSync(state) => assert_eq!(state.story, "new story"),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn rejecting_a_proposal_restores_the_baseline() {
    let (mut app, _dir) = test_app();
    app.canvas.set_story("old story");
    app.canvas.set_global_title("Old title");
    let (tx, replies) = attach_agent(&mut app);

    stream_proposal(&mut app, &tx, "new story");
    app.handle_key(key(KeyCode::Char('n')));

    let state = app.canvas.state();
    assert_eq!(state.story, "old story");
    assert_eq!(state.global_title, "Old title");
    match replies.try_recv().expect("decision reply") {
        AgentReply::ActionResult { result, .. } => assert_eq!(result, REJECT_REPLY),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn gate_decision_is_terminal() {
    let (mut app, _dir) = test_app();
    let (tx, replies) = attach_agent(&mut app);

    stream_proposal(&mut app, &tx, "the story");
    app.handle_key(key(KeyCode::Char('y')));
    let _ = replies.try_recv();
    let _ = replies.try_recv();

    // A second keypress lands in Normal mode; no gate left to decide.
    app.handle_key(key(KeyCode::Char('n')));
    assert_eq!(app.canvas.state().story, "the story");
    assert!(replies.try_recv().is_err());
}

#[test]
fn state_snapshots_are_ignored_while_a_proposal_is_pending() {
    let (mut app, _dir) = test_app();
    app.canvas.set_story("baseline");
    let (tx, _replies) = attach_agent(&mut app);

    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: "prop-1".to_string(),
        name: PROPOSAL_ACTION.to_string(),
    }))
    .unwrap();
    let mut pushed = AgentState::default();
    pushed.story = "pushed over the gate".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::StateSnapshot(pushed)))
        .unwrap();
    assert!(app.poll_worker());

    assert_eq!(app.canvas.state().story, "baseline");
}

#[test]
fn angle_selection_replies_with_the_chosen_angle() {
    let (mut app, _dir) = test_app();
    let (tx, replies) = attach_agent(&mut app);

    let id = "sel-1".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: id.clone(),
        name: ANGLE_ACTION.to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionArgs {
        id: id.clone(),
        args: json!({"angles": ["Hopeful", "Grim", "Satirical"]}),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionEnd { id }))
        .unwrap();
    assert!(app.poll_worker());
    assert_eq!(app.mode, Mode::SelectAngle);

    app.handle_key(key(KeyCode::Down));
    app.handle_key(key(KeyCode::Enter));

    match replies.try_recv().expect("selection reply") {
        AgentReply::ActionResult { result, .. } => assert_eq!(result, "Grim"),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(app.mode, Mode::Normal);
}

#[test]
fn dismissing_the_angle_selector_replies_cancelled() {
    let (mut app, _dir) = test_app();
    let (tx, replies) = attach_agent(&mut app);

    let id = "sel-2".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: id.clone(),
        name: ANGLE_ACTION.to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionArgs {
        id: id.clone(),
        args: json!({"angles": ["Only one"]}),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionEnd { id }))
        .unwrap();
    assert!(app.poll_worker());

    app.handle_key(key(KeyCode::Esc));

    match replies.try_recv().expect("cancel reply") {
        AgentReply::ActionResult { result, .. } => assert_eq!(result, "cancelled"),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn done_event_without_chunks_pushes_the_summary() {
    let (mut app, _dir) = test_app();
    let (tx, _replies) = attach_agent(&mut app);

    tx.send(WorkerEvent::Done("All set.\n".to_string())).unwrap();
    assert!(app.poll_worker());

    assert!(!app.running);
    assert!(app.messages.iter().any(
        |m| matches!(m, ChatMessage::TextMessage { role, content } if role == "assistant" && content == "All set.")
    ));
}

#[test]
fn error_during_a_proposal_restores_the_baseline() {
    let (mut app, _dir) = test_app();
    app.canvas.set_story("safe");
    let (tx, _replies) = attach_agent(&mut app);

    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: "prop-x".to_string(),
        name: PROPOSAL_ACTION.to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Error("bridge broke".to_string()))
        .unwrap();
    assert!(app.poll_worker());

    assert_eq!(app.canvas.state().story, "safe");
    assert!(app.gate.is_none());
    assert!(!app.running);
    assert!(app
        .entries
        .iter()
        .any(|e| e.kind == EntryKind::Error && e.text.contains("bridge broke")));
}

#[test]
fn done_with_an_unfinished_proposal_restores_the_baseline() {
    let (mut app, _dir) = test_app();
    app.canvas.set_story("kept");
    let (tx, _replies) = attach_agent(&mut app);

    tx.send(WorkerEvent::Agent(AgentEvent::ActionStart {
        id: "prop-cut".to_string(),
        name: PROPOSAL_ACTION.to_string(),
    }))
    .unwrap();
    tx.send(WorkerEvent::Agent(AgentEvent::ActionArgs {
        id: "prop-cut".to_string(),
        args: json!({"story": "half streamed", "title": "", "description": ""}),
    }))
    .unwrap();
    tx.send(WorkerEvent::Done(String::new())).unwrap();
    assert!(app.poll_worker());

    assert!(app.gate.is_none());
    assert_eq!(app.canvas.state().story, "kept");
    assert_eq!(app.mode, Mode::Normal);

    // The next turn's snapshots land again.
    let (tx, _replies) = attach_agent(&mut app);
    let mut pushed = AgentState::default();
    pushed.story = "resynced".to_string();
    tx.send(WorkerEvent::Agent(AgentEvent::StateSnapshot(pushed)))
        .unwrap();
    assert!(app.poll_worker());
    assert_eq!(app.canvas.state().story, "resynced");
}

#[test]
fn switching_conversations_swaps_the_transcript_and_canvas() {
    let (mut app, _dir) = test_app();
    let first = app.conversations.selected_id().to_string();
    app.push_message(ChatMessage::text("user", "hello first"));
    app.canvas.set_global_title("First canvas");
    app.sync_active();

    let second = app.conversations.create(Some("second"));
    app.load_selected();
    assert!(app.messages.is_empty());
    assert_eq!(app.canvas.state().global_title, "");

    app.push_message(ChatMessage::text("user", "hello second"));
    assert!(app.switch_conversation(&first));

    assert_eq!(app.messages.len(), 1);
    assert!(
        matches!(&app.messages[0], ChatMessage::TextMessage { content, .. } if content == "hello first")
    );
    assert_eq!(app.canvas.state().global_title, "First canvas");

    assert!(app.switch_conversation(&second));
    assert!(
        matches!(&app.messages[0], ChatMessage::TextMessage { content, .. } if content == "hello second")
    );
}

#[test]
fn local_do_command_runs_an_action() {
    let (mut app, _dir) = test_app();
    app.input = "/do createItem {\"type\": \"note\", \"name\": \"Scratch\"}".to_string();
    app.cursor = app.input.len();
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.canvas.state().items.len(), 1);
    assert_eq!(app.canvas.state().items[0].name, "Scratch");
}

#[test]
fn pageup_disables_autoscroll() {
    let (mut app, _dir) = test_app();
    for i in 0..40 {
        app.push_entry(EntryKind::System, format!("entry {i}"));
    }
    let before = app.scroll;
    app.handle_key(key(KeyCode::PageUp));

    assert!(!app.autoscroll);
    assert_eq!(app.scroll, before.saturating_sub(5));
}

#[test]
fn clear_all_returns_to_a_single_fresh_conversation() {
    let (mut app, _dir) = test_app();
    app.push_message(ChatMessage::text("user", "keep me not"));
    app.conversations.create(Some("extra"));
    app.load_selected();
    app.mode = Mode::ClearAll;

    app.handle_key(key(KeyCode::Char('y')));

    assert_eq!(app.conversations.conversations().len(), 1);
    assert!(app.messages.is_empty());
    assert_eq!(app.mode, Mode::Normal);
}

#[test]
fn deleting_the_conversation_interrupts_a_running_turn() {
    let (mut app, _dir) = test_app();
    let (tx, _replies) = attach_agent(&mut app);

    app.input = "/delete".to_string();
    app.cursor = app.input.len();
    app.handle_key(key(KeyCode::Enter));

    assert!(!app.running);
    // The worker channel is gone; nothing can leak into the fresh transcript.
    assert!(tx
        .send(WorkerEvent::Agent(AgentEvent::TextChunk("stray".to_string())))
        .is_err());
    assert!(!app.messages.iter().any(
        |m| matches!(m, ChatMessage::TextMessage { content, .. } if content.contains("stray"))
    ));
}

#[test]
fn clear_all_interrupts_a_running_turn() {
    let (mut app, _dir) = test_app();
    let (tx, _replies) = attach_agent(&mut app);
    app.mode = Mode::ClearAll;

    app.handle_key(key(KeyCode::Char('y')));

    assert!(!app.running);
    assert!(tx.send(WorkerEvent::Done(String::new())).is_err());
}
