use serde::{Deserialize, Serialize};
use serde_json::json;

mod item;

pub(crate) use item::{
    next_slot_id, resolve_slot, CardKind, ChecklistItem, Item, ItemData, Metric, MetricValue,
    SelectChoice,
};

/// The shared canvas document, jointly owned by the human UI and the agent.
/// Both sides mutate it through [`CanvasStore`]; there is no separate agent
/// view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct AgentState {
    pub(crate) global_title: String,
    pub(crate) global_description: String,
    pub(crate) story: String,
    pub(crate) items: Vec<Item>,
    pub(crate) items_created: u32,
    pub(crate) last_action: String,
}

impl AgentState {
    /// Read-only projection used for diagnostic/JSON display.
    pub(crate) fn preview(&self) -> serde_json::Value {
        json!({
            "globalTitle": self.global_title,
            "globalDescription": self.global_description,
            "items": self.items,
        })
    }

    pub(crate) fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Owning store over the canvas. Every mutator builds a full replacement
/// state and swaps it in, so a snapshot taken between calls never observes a
/// torn intermediate value.
#[derive(Clone, Debug, Default)]
pub(crate) struct CanvasStore {
    state: AgentState,
}

impl CanvasStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: AgentState) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &AgentState {
        &self.state
    }

    pub(crate) fn snapshot(&self) -> AgentState {
        self.state.clone()
    }

    /// Whole-document replacement, used for agent state snapshots and gate
    /// restore.
    pub(crate) fn replace(&mut self, state: AgentState) {
        self.state = state;
    }

    fn commit(&mut self, next: AgentState) {
        self.state = next;
    }

    /// Appends a new item with default data for its kind and returns the
    /// assigned id so callers can chain field mutations.
    pub(crate) fn add_item(&mut self, kind: CardKind, name: Option<&str>) -> String {
        let mut next = self.state.clone();
        let number = next_item_number(&next);
        let id = format!("{number:04}");
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("New {}", kind.as_str()));
        next.items.push(Item {
            id: id.clone(),
            name,
            subtitle: String::new(),
            data: ItemData::default_for(kind),
        });
        next.items_created = number;
        next.last_action = format!("created:{id}");
        self.commit(next);
        id
    }

    /// Replaces top-level fields on the matching item; no-op when the id is
    /// absent, recorded in `lastAction` either way.
    pub(crate) fn update_item(
        &mut self,
        id: &str,
        name: Option<&str>,
        subtitle: Option<&str>,
    ) -> bool {
        let mut next = self.state.clone();
        let Some(item) = next.items.iter_mut().find(|item| item.id == id) else {
            self.mark_not_found(id);
            return false;
        };
        if let Some(name) = name {
            item.name = name.to_string();
        }
        if let Some(subtitle) = subtitle {
            item.subtitle = subtitle.to_string();
        }
        next.last_action = format!("updated:{id}");
        self.commit(next);
        true
    }

    /// Applies a transform to the matching item's data only. Returns whether
    /// the item existed.
    pub(crate) fn update_item_data(&mut self, id: &str, f: impl FnOnce(&mut ItemData)) -> bool {
        let mut next = self.state.clone();
        let Some(item) = next.items.iter_mut().find(|item| item.id == id) else {
            self.mark_not_found(id);
            return false;
        };
        f(&mut item.data);
        next.last_action = format!("updated:{id}");
        self.commit(next);
        true
    }

    /// Removes the item if present. `lastAction` always reflects whether the
    /// target existed so the agent can verify effect.
    pub(crate) fn delete_item(&mut self, id: &str) -> bool {
        let mut next = self.state.clone();
        let before = next.items.len();
        next.items.retain(|item| item.id != id);
        let found = next.items.len() != before;
        next.last_action = if found {
            format!("deleted:{id}")
        } else {
            format!("not_found:{id}")
        };
        self.commit(next);
        found
    }

    /// Flips membership of `tag` in an entity's selected tag set. Idempotent
    /// per call; a missing or non-entity target is a no-op audited as
    /// `not_found`.
    pub(crate) fn toggle_tag(&mut self, id: &str, tag: &str) -> bool {
        let mut next = self.state.clone();
        let toggled = match next.items.iter_mut().find(|item| item.id == id) {
            Some(item) => match &mut item.data {
                ItemData::Entity(entity) => {
                    if let Some(pos) = entity.field3.iter().position(|t| t == tag) {
                        entity.field3.remove(pos);
                    } else {
                        entity.field3.push(tag.to_string());
                    }
                    true
                }
                _ => false,
            },
            None => false,
        };
        if toggled {
            next.last_action = format!("updated:{id}");
            self.commit(next);
        } else {
            self.mark_not_found(id);
        }
        toggled
    }

    pub(crate) fn set_global_title(&mut self, title: &str) {
        let mut next = self.state.clone();
        next.global_title = title.to_string();
        next.last_action = "updated:globalTitle".to_string();
        self.commit(next);
    }

    pub(crate) fn set_global_description(&mut self, description: &str) {
        let mut next = self.state.clone();
        next.global_description = description.to_string();
        next.last_action = "updated:globalDescription".to_string();
        self.commit(next);
    }

    pub(crate) fn set_story(&mut self, story: &str) {
        let mut next = self.state.clone();
        next.story = story.to_string();
        next.last_action = "updated:story".to_string();
        self.commit(next);
    }

    pub(crate) fn append_story(&mut self, text: &str) {
        let mut next = self.state.clone();
        if !next.story.is_empty() && !next.story.ends_with('\n') {
            next.story.push('\n');
        }
        next.story.push_str(text);
        next.last_action = "updated:story".to_string();
        self.commit(next);
    }

    /// Commits an accepted document proposal wholesale: story text plus the
    /// global title/description that rode along with it.
    pub(crate) fn replace_document(&mut self, story: &str, title: &str, description: &str) {
        let mut next = self.state.clone();
        next.story = story.to_string();
        next.global_title = title.to_string();
        next.global_description = description.to_string();
        next.last_action = "document:replaced".to_string();
        self.commit(next);
    }

    /// Audit-only transition: records a missed target without touching items.
    pub(crate) fn mark_not_found(&mut self, id: &str) {
        let mut next = self.state.clone();
        next.last_action = format!("not_found:{id}");
        self.commit(next);
    }
}

/// Next item number: robust to out-of-band deletions. Ids are monotonically
/// increasing, never gap-filling.
fn next_item_number(state: &AgentState) -> u32 {
    let highest = state
        .items
        .iter()
        .filter_map(|item| item.id.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    highest.max(state.items_created) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_item_assigns_sequential_padded_ids() {
        let mut store = CanvasStore::new();
        for expected in ["0001", "0002", "0003"] {
            let id = store.add_item(CardKind::Note, None);
            assert_eq!(id, expected);
        }
        assert_eq!(store.state().items_created, 3);
        assert_eq!(store.state().last_action, "created:0003");
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let mut store = CanvasStore::new();
        store.add_item(CardKind::Project, None);
        store.add_item(CardKind::Project, None);
        assert!(store.delete_item("0002"));
        let id = store.add_item(CardKind::Project, None);
        assert_eq!(id, "0003");
    }

    #[test]
    fn delete_audits_presence_in_last_action() {
        let mut store = CanvasStore::new();
        store.add_item(CardKind::Entity, Some("Acme"));
        assert!(store.delete_item("0001"));
        assert_eq!(store.state().last_action, "deleted:0001");
        let len_before = store.state().items.len();
        assert!(!store.delete_item("0042"));
        assert_eq!(store.state().last_action, "not_found:0042");
        assert_eq!(store.state().items.len(), len_before);
    }

    #[test]
    fn update_against_unknown_id_is_a_recorded_noop() {
        let mut store = CanvasStore::new();
        assert!(!store.update_item("9999", Some("x"), None));
        assert_eq!(store.state().last_action, "not_found:9999");
        assert!(!store.update_item_data("9999", |_| panic!("must not run")));
    }

    #[test]
    fn toggle_tag_flips_membership_exactly_once() {
        let mut store = CanvasStore::new();
        let id = store.add_item(CardKind::Entity, None);
        assert!(store.toggle_tag(&id, "urgent"));
        assert!(store.toggle_tag(&id, "review"));
        assert!(store.toggle_tag(&id, "urgent"));
        let ItemData::Entity(entity) = &store.state().item(&id).expect("entity").data else {
            panic!("expected entity data");
        };
        assert_eq!(entity.field3, vec!["review".to_string()]);
    }

    #[test]
    fn toggle_tag_on_wrong_kind_is_a_noop() {
        let mut store = CanvasStore::new();
        let id = store.add_item(CardKind::Note, None);
        assert!(!store.toggle_tag(&id, "urgent"));
        assert_eq!(store.state().last_action, format!("not_found:{id}"));
    }

    #[test]
    fn replace_document_sets_story_and_globals() {
        let mut store = CanvasStore::new();
        store.add_item(CardKind::Chart, None);
        store.replace_document("Hello world", "Greeting", "A short hello");
        assert_eq!(store.state().story, "Hello world");
        assert_eq!(store.state().global_title, "Greeting");
        assert_eq!(store.state().global_description, "A short hello");
        // Items are untouched by a document replacement.
        assert_eq!(store.state().items.len(), 1);
    }

    #[test]
    fn snapshots_are_isolated_from_later_mutations() {
        let mut store = CanvasStore::new();
        store.add_item(CardKind::Note, None);
        let snapshot = store.snapshot();
        store.delete_item("0001");
        assert_eq!(snapshot.items.len(), 1);
        assert!(store.state().items.is_empty());
    }

    #[test]
    fn preview_projects_only_public_fields() {
        let mut store = CanvasStore::new();
        store.set_global_title("Canvas");
        let preview = store.state().preview();
        assert_eq!(preview["globalTitle"], "Canvas");
        assert!(preview.get("itemsCreated").is_none());
        assert!(preview.get("lastAction").is_none());
        assert!(preview.get("story").is_none());
    }
}
