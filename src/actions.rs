use anyhow::{bail, Result};
use serde_json::Value;

use crate::canvas::{
    next_slot_id, resolve_slot, CanvasStore, CardKind, ChecklistItem, ItemData, Metric,
    MetricValue, SelectChoice,
};

/// One declared parameter of a named operation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamSpec {
    pub(crate) name: &'static str,
    pub(crate) kind: &'static str,
    pub(crate) required: bool,
}

/// A named operation the agent and the human both invoke. The agent sees the
/// catalog as its tool schema; the human reaches the same handlers through
/// `/do`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ActionSpec {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) params: &'static [ParamSpec],
    /// Interactive actions are gated through a modal and never reach
    /// [`apply`] directly.
    pub(crate) interactive: bool,
}

const fn p(name: &'static str, kind: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
    }
}

pub(crate) static CATALOG: &[ActionSpec] = &[
    ActionSpec {
        name: "createItem",
        description: "Create a new canvas item and return its id.",
        params: &[p("type", "string"), opt("name", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "deleteItem",
        description: "Delete an item by id.",
        params: &[p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setItemName",
        description: "Set an item's name.",
        params: &[p("name", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setItemSubtitleOrDescription",
        description: "Set an item's subtitle, not its data fields.",
        params: &[p("subtitle", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setGlobalTitle",
        description: "Set the canvas title.",
        params: &[p("title", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setGlobalDescription",
        description: "Set the canvas description.",
        params: &[p("description", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setNoteField1",
        description: "Replace a note's content.",
        params: &[p("value", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "appendNoteField1",
        description: "Append text to a note's content.",
        params: &[
            p("value", "string"),
            p("itemId", "string"),
            opt("withNewline", "boolean"),
        ],
        interactive: false,
    },
    ActionSpec {
        name: "clearNoteField1",
        description: "Clear a note's content.",
        params: &[p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setProjectField1",
        description: "Set project field1 text.",
        params: &[p("value", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setProjectField2",
        description: "Set project field2 (Option A/B/C or empty).",
        params: &[p("value", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setProjectField3",
        description: "Set project field3 date (YYYY-MM-DD).",
        params: &[p("date", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "clearProjectField3",
        description: "Clear project field3 date.",
        params: &[p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "addProjectChecklistItem",
        description: "Add a checklist row to a project.",
        params: &[p("itemId", "string"), opt("text", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setProjectChecklistItem",
        description: "Update a checklist row's text and/or done flag.",
        params: &[
            p("itemId", "string"),
            p("checklistItemId", "string"),
            opt("text", "string"),
            opt("done", "boolean"),
        ],
        interactive: false,
    },
    ActionSpec {
        name: "removeProjectChecklistItem",
        description: "Remove a checklist row from a project.",
        params: &[p("itemId", "string"), p("checklistItemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setEntityField1",
        description: "Set entity field1 text.",
        params: &[p("value", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setEntityField2",
        description: "Set entity field2 (Option A/B/C or empty).",
        params: &[p("value", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "addEntityField3",
        description: "Add a tag to an entity.",
        params: &[p("tag", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "removeEntityField3",
        description: "Remove a tag from an entity.",
        params: &[p("tag", "string"), p("itemId", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "addChartField1",
        description: "Add a metric row to a chart.",
        params: &[
            p("itemId", "string"),
            opt("label", "string"),
            opt("value", "number"),
        ],
        interactive: false,
    },
    ActionSpec {
        name: "setChartField1Label",
        description: "Set a chart metric's label.",
        params: &[p("itemId", "string"), p("index", "string"), p("label", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "setChartField1Value",
        description: "Set a chart metric's value (clamped to 0..100).",
        params: &[p("itemId", "string"), p("index", "string"), p("value", "number")],
        interactive: false,
    },
    ActionSpec {
        name: "clearChartField1Value",
        description: "Clear a chart metric's value, keeping its label.",
        params: &[p("itemId", "string"), p("index", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "removeChartField1",
        description: "Remove a metric row from a chart.",
        params: &[p("itemId", "string"), p("index", "string")],
        interactive: false,
    },
    ActionSpec {
        name: "selectAngle",
        description: "Offer a list of angles and wait for the human's pick.",
        params: &[p("angles", "string[]")],
        interactive: true,
    },
    ActionSpec {
        name: "proposeDocument",
        description: "Propose a full story rewrite and wait for confirmation.",
        params: &[
            p("story", "string"),
            p("title", "string"),
            p("description", "string"),
        ],
        interactive: true,
    },
];

pub(crate) fn find(name: &str) -> Option<&'static ActionSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Applies a non-interactive action against the store. The result string is
/// the store's audit stamp after the mutation, so the agent can verify effect
/// (`created:`, `updated:`, `deleted:`, `not_found:`).
pub(crate) fn apply(store: &mut CanvasStore, name: &str, args: &Value) -> Result<String> {
    let Some(spec) = find(name) else {
        bail!("unknown action: {name}");
    };
    if spec.interactive {
        // Reaching here means the confirm/select surface was bypassed.
        bail!("{name} requires interactive confirmation");
    }

    match name {
        "createItem" => {
            let raw = str_arg(args, "type")?;
            let Some(kind) = CardKind::parse(&raw) else {
                bail!("unknown item type: {raw:?}");
            };
            store.add_item(kind, opt_str_arg(args, "name").as_deref());
        }
        "deleteItem" => {
            store.delete_item(&str_arg(args, "itemId")?);
        }
        "setItemName" => {
            let id = str_arg(args, "itemId")?;
            store.update_item(&id, Some(&str_arg(args, "name")?), None);
        }
        "setItemSubtitleOrDescription" => {
            let id = str_arg(args, "itemId")?;
            store.update_item(&id, None, Some(&str_arg(args, "subtitle")?));
        }
        "setGlobalTitle" => store.set_global_title(&str_arg(args, "title")?),
        "setGlobalDescription" => store.set_global_description(&str_arg(args, "description")?),
        "setNoteField1" => {
            let value = str_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Note, |data| {
                if let ItemData::Note(note) = data {
                    note.field1 = value;
                }
            });
        }
        "appendNoteField1" => {
            let value = str_arg(args, "value")?;
            let with_newline = opt_bool_arg(args, "withNewline")?.unwrap_or(false);
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Note, |data| {
                if let ItemData::Note(note) = data {
                    if with_newline && !note.field1.is_empty() {
                        note.field1.push('\n');
                    }
                    note.field1.push_str(&value);
                }
            });
        }
        "clearNoteField1" => {
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Note, |data| {
                if let ItemData::Note(note) = data {
                    note.field1.clear();
                }
            });
        }
        "setProjectField1" => {
            let value = str_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    project.field1 = value;
                }
            });
        }
        "setProjectField2" => {
            let choice = select_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    project.field2 = choice;
                }
            });
        }
        "setProjectField3" => {
            let date = str_arg(args, "date")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    project.field3 = date;
                }
            });
        }
        "clearProjectField3" => {
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    project.field3.clear();
                }
            });
        }
        "addProjectChecklistItem" => {
            let item_id = str_arg(args, "itemId")?;
            let text = opt_str_arg(args, "text").unwrap_or_default();
            edit_kind(store, &item_id.clone(), CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    let existing: Vec<&str> =
                        project.field4.iter().map(|row| row.id.as_str()).collect();
                    let id = next_slot_id(&item_id, 'c', &existing);
                    project.field4.push(ChecklistItem {
                        id,
                        text,
                        done: false,
                        proposed: false,
                    });
                }
            });
        }
        "setProjectChecklistItem" => {
            let key = slot_arg(args, "checklistItemId")?;
            let text = opt_str_arg(args, "text");
            let done = opt_bool_arg(args, "done")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    if let Some(pos) = resolve_slot(&project.field4, &key, |row| row.id.as_str()) {
                        if let Some(text) = text {
                            project.field4[pos].text = text;
                        }
                        if let Some(done) = done {
                            project.field4[pos].done = done;
                        }
                    }
                }
            });
        }
        "removeProjectChecklistItem" => {
            let key = slot_arg(args, "checklistItemId")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Project, |data| {
                if let ItemData::Project(project) = data {
                    if let Some(pos) = resolve_slot(&project.field4, &key, |row| row.id.as_str()) {
                        project.field4.remove(pos);
                    }
                }
            });
        }
        "setEntityField1" => {
            let value = str_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Entity, |data| {
                if let ItemData::Entity(entity) = data {
                    entity.field1 = value;
                }
            });
        }
        "setEntityField2" => {
            let choice = select_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Entity, |data| {
                if let ItemData::Entity(entity) = data {
                    entity.field2 = choice;
                }
            });
        }
        "addEntityField3" => {
            let tag = str_arg(args, "tag")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Entity, |data| {
                if let ItemData::Entity(entity) = data {
                    if !entity.field3.contains(&tag) {
                        entity.field3.push(tag);
                    }
                }
            });
        }
        "removeEntityField3" => {
            let tag = str_arg(args, "tag")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Entity, |data| {
                if let ItemData::Entity(entity) = data {
                    entity.field3.retain(|t| t != &tag);
                }
            });
        }
        "addChartField1" => {
            let label = opt_str_arg(args, "label").unwrap_or_default();
            let value = match opt_f64_arg(args, "value")? {
                Some(number) => MetricValue::clamped(number),
                None => MetricValue::default(),
            };
            let item_id = str_arg(args, "itemId")?;
            edit_kind(store, &item_id.clone(), CardKind::Chart, |data| {
                if let ItemData::Chart(chart) = data {
                    let existing: Vec<&str> =
                        chart.field1.iter().map(|row| row.id.as_str()).collect();
                    let id = next_slot_id(&item_id, 'm', &existing);
                    chart.field1.push(Metric { id, label, value });
                }
            });
        }
        "setChartField1Label" => {
            let key = slot_arg(args, "index")?;
            let label = str_arg(args, "label")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Chart, |data| {
                if let ItemData::Chart(chart) = data {
                    if let Some(pos) = resolve_slot(&chart.field1, &key, |row| row.id.as_str()) {
                        chart.field1[pos].label = label;
                    }
                }
            });
        }
        "setChartField1Value" => {
            let key = slot_arg(args, "index")?;
            let value = f64_arg(args, "value")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Chart, |data| {
                if let ItemData::Chart(chart) = data {
                    if let Some(pos) = resolve_slot(&chart.field1, &key, |row| row.id.as_str()) {
                        chart.field1[pos].value = MetricValue::clamped(value);
                    }
                }
            });
        }
        "clearChartField1Value" => {
            let key = slot_arg(args, "index")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Chart, |data| {
                if let ItemData::Chart(chart) = data {
                    if let Some(pos) = resolve_slot(&chart.field1, &key, |row| row.id.as_str()) {
                        chart.field1[pos].value = MetricValue::default();
                    }
                }
            });
        }
        "removeChartField1" => {
            let key = slot_arg(args, "index")?;
            edit_kind(store, &str_arg(args, "itemId")?, CardKind::Chart, |data| {
                if let ItemData::Chart(chart) = data {
                    if let Some(pos) = resolve_slot(&chart.field1, &key, |row| row.id.as_str()) {
                        chart.field1.remove(pos);
                    }
                }
            });
        }
        other => bail!("unknown action: {other}"),
    }

    Ok(store.state().last_action.clone())
}

/// Runs a data edit only when the target exists and has the expected kind;
/// anything else is audited as `not_found` and left untouched.
fn edit_kind(
    store: &mut CanvasStore,
    id: &str,
    kind: CardKind,
    f: impl FnOnce(&mut ItemData),
) -> bool {
    let matches = store
        .state()
        .item(id)
        .map(|item| item.data.kind() == kind)
        .unwrap_or(false);
    if !matches {
        store.mark_not_found(id);
        return false;
    }
    store.update_item_data(id, f)
}

fn str_arg(args: &Value, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => bail!("argument {key} must be a string, got {other}"),
        None => bail!("missing argument: {key}"),
    }
}

fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
}

fn opt_bool_arg(args: &Value, key: &str) -> Result<Option<bool>> {
    match args.get(key) {
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::Null) | None => Ok(None),
        Some(other) => bail!("argument {key} must be a boolean, got {other}"),
    }
}

fn f64_arg(args: &Value, key: &str) -> Result<f64> {
    match opt_f64_arg(args, key)? {
        Some(number) => Ok(number),
        None => bail!("missing argument: {key}"),
    }
}

fn opt_f64_arg(args: &Value, key: &str) -> Result<Option<f64>> {
    match args.get(key) {
        Some(Value::Number(number)) => Ok(number.as_f64()),
        Some(Value::Null) | None => Ok(None),
        Some(other) => bail!("argument {key} must be a number, got {other}"),
    }
}

/// Sub-item references arrive as generated ids, index strings, or bare
/// numbers depending on the caller; all are normalized to a lookup key.
fn slot_arg(args: &Value, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(other) => bail!("argument {key} must be a string or number, got {other}"),
        None => bail!("missing argument: {key}"),
    }
}

fn select_arg(args: &Value, key: &str) -> Result<SelectChoice> {
    let raw = str_arg(args, key)?;
    match SelectChoice::parse(&raw) {
        Some(choice) => Ok(choice),
        None => bail!("argument {key} must be \"Option A\"/\"Option B\"/\"Option C\" or \"\""),
    }
}
