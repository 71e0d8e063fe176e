use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

use crate::canvas::AgentState;

const CONVERSATIONS_FILE: &str = "conversations.json";
const SELECTED_FILE: &str = "selected";
const DEFAULT_TITLE: &str = "New conversation";

/// One persisted transcript entry. Tagged on the wire; entries with tags this
/// build does not recognize are dropped on load without failing siblings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ChatMessage {
    TextMessage {
        role: String,
        content: String,
    },
    ActionExecutionMessage {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ResultMessage {
        #[serde(rename = "actionExecutionId")]
        action_execution_id: String,
        #[serde(rename = "actionName")]
        action_name: String,
        result: String,
    },
    AgentStateMessage {
        #[serde(rename = "agentName")]
        agent_name: String,
        state: AgentState,
    },
}

impl ChatMessage {
    pub(crate) fn text(role: &str, content: impl Into<String>) -> Self {
        ChatMessage::TextMessage {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

fn deserialize_known_messages<'de, D>(deserializer: D) -> Result<Vec<ChatMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// An independent pairing of chat history and canvas snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Conversation {
    pub(crate) id: String,
    pub(crate) title: String,
    #[serde(rename = "createdAt")]
    pub(crate) created_at: u64,
    #[serde(default, deserialize_with = "deserialize_known_messages")]
    pub(crate) messages: Vec<ChatMessage>,
    #[serde(default)]
    pub(crate) state: AgentState,
}

impl Conversation {
    pub(crate) fn fresh(title: Option<&str>) -> Self {
        Self {
            id: generate_conversation_id(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            created_at: unix_now(),
            messages: Vec::new(),
            state: AgentState::default(),
        }
    }
}

/// Time-based id with a random suffix, unique enough across reloads.
pub(crate) fn generate_conversation_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut buf = [0u8; 4];
    let _ = getrandom::getrandom(&mut buf);
    format!("{}-{:08x}", base36(millis), u32::from_be_bytes(buf))
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Process-wide conversation collection. Loaded once at startup, flushed back
/// on every structural change and on exit. The collection is never empty and
/// the selection pointer always resolves to an existing entry.
#[derive(Debug)]
pub(crate) struct ConversationStore {
    dir: PathBuf,
    conversations: Vec<Conversation>,
    selected_id: String,
}

impl ConversationStore {
    pub(crate) fn default_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".coscribe")
        } else {
            PathBuf::from(".coscribe")
        }
    }

    /// Loads persisted conversations, falling back to a single fresh
    /// conversation on missing or corrupt data.
    pub(crate) fn open(dir: PathBuf) -> Self {
        let conversations = fs::read_to_string(dir.join(CONVERSATIONS_FILE))
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<Conversation>>(&raw).ok())
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec![Conversation::fresh(None)]);
        let selected_id = fs::read_to_string(dir.join(SELECTED_FILE))
            .map(|raw| raw.trim().to_string())
            .unwrap_or_default();
        let mut store = Self {
            dir,
            conversations,
            selected_id,
        };
        store.heal_selection();
        store
    }

    pub(crate) fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub(crate) fn selected_id(&self) -> &str {
        &self.selected_id
    }

    pub(crate) fn selected(&self) -> &Conversation {
        self.conversations
            .iter()
            .find(|c| c.id == self.selected_id)
            .unwrap_or(&self.conversations[0])
    }

    /// Prepends a new conversation and selects it.
    pub(crate) fn create(&mut self, title: Option<&str>) -> String {
        let conversation = Conversation::fresh(title);
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.selected_id = id.clone();
        self.persist();
        id
    }

    /// Applies a validated title; blank input leaves the title unchanged.
    pub(crate) fn rename(&mut self, id: &str, raw_title: &str) -> bool {
        let title = raw_title.trim();
        if title.is_empty() {
            return false;
        }
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        conversation.title = title.to_string();
        self.persist();
        true
    }

    /// Removes a conversation. An emptied collection self-heals to a single
    /// fresh conversation; a dangling selection moves to the first entry.
    pub(crate) fn delete(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return false;
        }
        if self.conversations.is_empty() {
            self.conversations.push(Conversation::fresh(None));
        }
        self.heal_selection();
        self.persist();
        true
    }

    /// Destructive reset to a single fresh conversation. The confirmation
    /// step is the caller's responsibility.
    pub(crate) fn clear_all(&mut self) {
        self.conversations = vec![Conversation::fresh(None)];
        self.selected_id = self.conversations[0].id.clone();
        self.persist();
    }

    /// Moves the selection pointer. Snapshot/restore ordering around the
    /// switch is the caller's responsibility.
    pub(crate) fn select(&mut self, id: &str) -> bool {
        if !self.conversations.iter().any(|c| c.id == id) {
            return false;
        }
        self.selected_id = id.to_string();
        self.persist();
        true
    }

    /// Resolves "2" (1-based position) or a conversation id.
    pub(crate) fn resolve(&self, key: &str) -> Option<String> {
        if let Some(c) = self.conversations.iter().find(|c| c.id == key) {
            return Some(c.id.clone());
        }
        let index: usize = key.trim().parse().ok()?;
        if index >= 1 && index <= self.conversations.len() {
            Some(self.conversations[index - 1].id.clone())
        } else {
            None
        }
    }

    /// Writes the active conversation's message history and canvas snapshot
    /// back into its record. In-memory only; `persist` flushes to disk.
    pub(crate) fn record_active(&mut self, messages: &[ChatMessage], state: &AgentState) {
        let selected_id = self.selected_id.clone();
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == selected_id) {
            conversation.messages = messages.to_vec();
            conversation.state = state.clone();
        }
    }

    /// Best-effort flush of the collection and the selection pointer.
    pub(crate) fn persist(&self) {
        if fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        if let Ok(serialized) = serde_json::to_string_pretty(&self.conversations) {
            let _ = fs::write(self.dir.join(CONVERSATIONS_FILE), serialized);
        }
        let _ = fs::write(self.dir.join(SELECTED_FILE), &self.selected_id);
    }

    fn heal_selection(&mut self) {
        if !self.conversations.iter().any(|c| c.id == self.selected_id) {
            self.selected_id = self.conversations[0].id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasStore, CardKind};
    use tempfile::TempDir;

    fn store() -> (ConversationStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let store = ConversationStore::open(dir.path().to_path_buf());
        (store, dir)
    }

    #[test]
    fn opens_with_one_fresh_conversation_when_nothing_persisted() {
        let (store, _dir) = store();
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.selected().id, store.selected_id());
    }

    #[test]
    fn collection_is_never_empty_and_selection_always_resolves() {
        let (mut store, _dir) = store();
        let first = store.selected_id().to_string();
        let second = store.create(Some("Draft two"));
        assert_eq!(store.selected_id(), second);
        assert!(store.delete(&second));
        assert_eq!(store.selected_id(), first);
        assert!(store.delete(&first));
        assert_eq!(store.conversations().len(), 1);
        assert_ne!(store.selected_id(), first);
        store.clear_all();
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.selected().id, store.selected_id());
    }

    #[test]
    fn rename_rejects_blank_titles() {
        let (mut store, _dir) = store();
        let id = store.selected_id().to_string();
        assert!(store.rename(&id, "  Chapter one  "));
        assert_eq!(store.selected().title, "Chapter one");
        assert!(!store.rename(&id, "   "));
        assert_eq!(store.selected().title, "Chapter one");
    }

    #[test]
    fn persisted_set_round_trips() {
        let dir = TempDir::new().expect("temp dir");
        let mut canvas = CanvasStore::new();
        canvas.add_item(CardKind::Chart, Some("Metrics"));
        {
            let mut store = ConversationStore::open(dir.path().to_path_buf());
            store.rename(&store.selected_id().to_string(), "Quarterly report");
            let messages = vec![
                ChatMessage::text("user", "add a chart"),
                ChatMessage::text("assistant", "done"),
            ];
            store.record_active(&messages, canvas.state());
            store.persist();
        }
        let reloaded = ConversationStore::open(dir.path().to_path_buf());
        assert_eq!(reloaded.conversations().len(), 1);
        let conversation = reloaded.selected();
        assert_eq!(conversation.title, "Quarterly report");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.state.items.len(), 1);
        assert_eq!(conversation.state.items[0].name, "Metrics");
    }

    #[test]
    fn unknown_message_tags_are_dropped_without_harming_siblings() {
        let raw = serde_json::json!([{
            "id": "abc-123",
            "title": "T",
            "createdAt": 1,
            "messages": [
                {"type": "TextMessage", "role": "user", "content": "hi"},
                {"type": "FancyNewMessage", "payload": 42},
                {"type": "ResultMessage", "actionExecutionId": "a1",
                 "actionName": "createItem", "result": "created:0001"},
            ],
            "state": {}
        }]);
        let parsed: Vec<Conversation> =
            serde_json::from_value(raw).expect("parse conversation set");
        assert_eq!(parsed[0].messages.len(), 2);
        assert!(matches!(
            parsed[0].messages[1],
            ChatMessage::ResultMessage { .. }
        ));
    }

    #[test]
    fn corrupt_persisted_data_falls_back_to_fresh() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir_all(dir.path()).expect("mkdir");
        fs::write(dir.path().join(CONVERSATIONS_FILE), "{not json").expect("write");
        fs::write(dir.path().join(SELECTED_FILE), "dangling-id").expect("write");
        let store = ConversationStore::open(dir.path().to_path_buf());
        assert_eq!(store.conversations().len(), 1);
        // Selection self-heals away from the dangling id.
        assert_eq!(store.selected().id, store.selected_id());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = generate_conversation_id();
        let b = generate_conversation_id();
        assert_ne!(a, b);
    }
}
