use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use serde_json::{json, Value};

use crate::agent::{AgentEvent, AgentReply};
use crate::app::WorkerEvent;
use crate::canvas::AgentState;

const AGENT_CMD_ENV: &str = "COSCRIBE_AGENT_CMD";

fn agent_command() -> Option<String> {
    std::env::var(AGENT_CMD_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Runs one agent turn over a line-oriented JSON stdio protocol: the prompt
/// plus a state snapshot go in as one request line, events stream back on
/// stdout, and action results/state syncs are forwarded to stdin as they
/// arrive from the UI. Returns the agent's closing summary, if any.
pub(crate) fn run_stream(
    prompt: &str,
    state: &AgentState,
    tx: &Sender<WorkerEvent>,
    reply_rx: Receiver<AgentReply>,
    child_pids: &Arc<Mutex<Vec<u32>>>,
) -> std::result::Result<String, String> {
    let Some(command) = agent_command() else {
        return Err(format!("no agent configured (set {AGENT_CMD_ENV})"));
    };

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&command);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("agent spawn failed: {e}"))?;
    if let Ok(mut pids) = child_pids.lock() {
        pids.push(child.id());
    }

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| "agent stdin missing".to_string())?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "agent stdout missing".to_string())?;

    let request = json!({
        "type": "prompt",
        "content": prompt,
        "state": state,
    });
    writeln!(stdin, "{request}").map_err(|e| format!("agent request write failed: {e}"))?;

    // Replies are serialized on their own thread so a slow agent reader never
    // blocks the stdout loop. The thread ends when the UI drops its sender or
    // the child closes stdin.
    let reply_writer = thread::spawn(move || {
        for reply in reply_rx.iter() {
            let line = match reply {
                AgentReply::ActionResult { id, result } => {
                    json!({"type": "action_result", "id": id, "result": result})
                }
                AgentReply::StateSync(state) => json!({"type": "state", "state": state}),
            };
            if writeln!(stdin, "{line}").is_err() {
                break;
            }
        }
    });

    let reader = BufReader::new(stdout);
    let mut summary = String::new();
    for line in reader.lines() {
        let line = line.map_err(|e| format!("agent stream read failed: {e}"))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_event_line(&line) {
            Some(Parsed::Event(event)) => {
                let _ = tx.send(WorkerEvent::Agent(event));
            }
            Some(Parsed::Done(text)) => summary = text,
            Some(Parsed::Error(message)) => return Err(message),
            // Anything unrecognized on the wire is skipped, not fatal.
            None => {}
        }
    }

    let status = child
        .wait()
        .map_err(|e| format!("agent wait failed: {e}"))?;
    drop(reply_writer);
    if !status.success() {
        return Err(format!("agent exited with {status}"));
    }
    Ok(summary)
}

pub(crate) enum Parsed {
    Event(AgentEvent),
    Done(String),
    Error(String),
}

/// One stdout line to at most one event. Malformed JSON and unknown tags
/// yield `None` so a noisy agent cannot poison the turn.
pub(crate) fn parse_event_line(line: &str) -> Option<Parsed> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("type")?.as_str()? {
        "text" => {
            let content = value.get("content")?.as_str()?.to_string();
            Some(Parsed::Event(AgentEvent::TextChunk(content)))
        }
        "state" => {
            let state: AgentState = serde_json::from_value(value.get("state")?.clone()).ok()?;
            Some(Parsed::Event(AgentEvent::StateSnapshot(state)))
        }
        "action_start" => Some(Parsed::Event(AgentEvent::ActionStart {
            id: value.get("id")?.as_str()?.to_string(),
            name: value.get("name")?.as_str()?.to_string(),
        })),
        "action_args" => Some(Parsed::Event(AgentEvent::ActionArgs {
            id: value.get("id")?.as_str()?.to_string(),
            args: value.get("args")?.clone(),
        })),
        "action_end" => Some(Parsed::Event(AgentEvent::ActionEnd {
            id: value.get("id")?.as_str()?.to_string(),
        })),
        "done" => {
            let summary = value
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Parsed::Done(summary))
        }
        "error" => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("agent error")
                .to_string();
            Some(Parsed::Error(message))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_action_lines() {
        let Some(Parsed::Event(AgentEvent::TextChunk(text))) =
            parse_event_line(r#"{"type":"text","content":"Hello"}"#)
        else {
            panic!("expected text chunk");
        };
        assert_eq!(text, "Hello");

        let Some(Parsed::Event(AgentEvent::ActionStart { id, name })) =
            parse_event_line(r#"{"type":"action_start","id":"a1","name":"createItem"}"#)
        else {
            panic!("expected action start");
        };
        assert_eq!(id, "a1");
        assert_eq!(name, "createItem");
    }

    #[test]
    fn parses_state_snapshot_lines() {
        let line = r#"{"type":"state","state":{"globalTitle":"Draft","items":[]}}"#;
        let Some(Parsed::Event(AgentEvent::StateSnapshot(state))) = parse_event_line(line) else {
            panic!("expected state snapshot");
        };
        assert_eq!(state.global_title, "Draft");
        assert!(state.items.is_empty());
    }

    #[test]
    fn malformed_and_unknown_lines_are_skipped() {
        assert!(parse_event_line("not json").is_none());
        assert!(parse_event_line(r#"{"type":"telemetry","x":1}"#).is_none());
        assert!(parse_event_line(r#"{"content":"no tag"}"#).is_none());
        // Known tag with a malformed payload is also dropped, not an error.
        assert!(parse_event_line(r#"{"type":"state","state":"oops"}"#).is_none());
    }

    #[test]
    fn done_and_error_lines_terminate_the_turn() {
        let Some(Parsed::Done(summary)) =
            parse_event_line(r#"{"type":"done","summary":"ok"}"#)
        else {
            panic!("expected done");
        };
        assert_eq!(summary, "ok");
        let Some(Parsed::Error(message)) =
            parse_event_line(r#"{"type":"error","message":"boom"}"#)
        else {
            panic!("expected error");
        };
        assert_eq!(message, "boom");
    }
}
