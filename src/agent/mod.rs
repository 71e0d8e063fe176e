use serde_json::Value;

use crate::canvas::AgentState;

pub(crate) mod bridge;

/// Events flowing from the agent worker to the UI thread.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AgentEvent {
    /// Incremental assistant text.
    TextChunk(String),
    /// Whole-state sync pushed by the agent.
    StateSnapshot(AgentState),
    /// A named action began; arguments may still be streaming.
    ActionStart { id: String, name: String },
    /// Arguments accumulated so far for an in-flight action.
    ActionArgs { id: String, args: Value },
    /// The action's argument stream is complete.
    ActionEnd { id: String },
}

/// Replies flowing from the UI thread back to the agent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AgentReply {
    ActionResult { id: String, result: String },
    StateSync(AgentState),
}
