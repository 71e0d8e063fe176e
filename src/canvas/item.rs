use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The four card kinds a canvas item can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CardKind {
    Project,
    Entity,
    Note,
    Chart,
}

impl CardKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CardKind::Project => "project",
            CardKind::Entity => "entity",
            CardKind::Note => "note",
            CardKind::Chart => "chart",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "project" => Some(CardKind::Project),
            "entity" => Some(CardKind::Entity),
            "note" => Some(CardKind::Note),
            "chart" => Some(CardKind::Chart),
            _ => None,
        }
    }

    pub(crate) fn all() -> [CardKind; 4] {
        [
            CardKind::Project,
            CardKind::Entity,
            CardKind::Note,
            CardKind::Chart,
        ]
    }
}

/// Closed select used by `project.field2` and `entity.field2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum SelectChoice {
    #[serde(rename = "Option A")]
    OptionA,
    #[serde(rename = "Option B")]
    OptionB,
    #[serde(rename = "Option C")]
    OptionC,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl SelectChoice {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Option A" => Some(SelectChoice::OptionA),
            "Option B" => Some(SelectChoice::OptionB),
            "Option C" => Some(SelectChoice::OptionC),
            "" => Some(SelectChoice::Unset),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SelectChoice::OptionA => "Option A",
            SelectChoice::OptionB => "Option B",
            SelectChoice::OptionC => "Option C",
            SelectChoice::Unset => "",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChecklistItem {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) done: bool,
    #[serde(default)]
    pub(crate) proposed: bool,
}

/// A chart metric value: a number in `[0, 100]` on the wire, or the empty
/// string when cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct MetricValue(pub(crate) Option<f64>);

impl MetricValue {
    pub(crate) fn clamped(value: f64) -> Self {
        MetricValue(Some(value.clamp(0.0, 100.0)))
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(value)) => Ok(MetricValue(Some(value))),
            Some(Raw::Text(text)) if text.is_empty() => Ok(MetricValue(None)),
            Some(Raw::Text(text)) => Err(D::Error::custom(format!(
                "metric value must be a number or \"\", got {text:?}"
            ))),
            None => Ok(MetricValue(None)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Metric {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) label: String,
    #[serde(default)]
    pub(crate) value: MetricValue,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectData {
    pub(crate) field1: String,
    pub(crate) field2: SelectChoice,
    /// Date string "YYYY-MM-DD", or "" when unset.
    pub(crate) field3: String,
    pub(crate) field4: Vec<ChecklistItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EntityData {
    pub(crate) field1: String,
    pub(crate) field2: SelectChoice,
    /// Selected tags; set semantics, serialized as an array.
    pub(crate) field3: Vec<String>,
    pub(crate) field3_options: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct NoteData {
    pub(crate) field1: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ChartData {
    pub(crate) field1: Vec<Metric>,
}

/// Per-kind payload, adjacently tagged so an [`Item`] flattens to
/// `{id, type, name, subtitle, data}` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub(crate) enum ItemData {
    Project(ProjectData),
    Entity(EntityData),
    Note(NoteData),
    Chart(ChartData),
}

impl ItemData {
    /// Total over [`CardKind`]: always yields the empty-but-valid shape.
    pub(crate) fn default_for(kind: CardKind) -> Self {
        match kind {
            CardKind::Project => ItemData::Project(ProjectData::default()),
            CardKind::Entity => ItemData::Entity(EntityData::default()),
            CardKind::Note => ItemData::Note(NoteData::default()),
            CardKind::Chart => ItemData::Chart(ChartData::default()),
        }
    }

    pub(crate) fn kind(&self) -> CardKind {
        match self {
            ItemData::Project(_) => CardKind::Project,
            ItemData::Entity(_) => CardKind::Entity,
            ItemData::Note(_) => CardKind::Note,
            ItemData::Chart(_) => CardKind::Chart,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Item {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) subtitle: String,
    #[serde(flatten)]
    pub(crate) data: ItemData,
}

/// Best-effort sub-item lookup: id match first, then a 1-based positional
/// index string. `None` means the caller should no-op, not fail.
pub(crate) fn resolve_slot<T>(slots: &[T], key: &str, id_of: impl Fn(&T) -> &str) -> Option<usize> {
    if let Some(found) = slots.iter().position(|slot| id_of(slot) == key) {
        return Some(found);
    }
    let index: usize = key.trim().parse().ok()?;
    if index >= 1 && index <= slots.len() {
        Some(index - 1)
    } else {
        None
    }
}

/// Next generated id for a checklist/metric row, scoped to its parent item.
/// Same monotonicity rule as item ids: deletions never recycle a suffix.
pub(crate) fn next_slot_id(item_id: &str, marker: char, existing: &[&str]) -> String {
    let prefix = format!("{item_id}-{marker}");
    let highest = existing
        .iter()
        .filter_map(|id| id.strip_prefix(&prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}{}", highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_data_is_total_and_idempotent() {
        for kind in CardKind::all() {
            let first = ItemData::default_for(kind);
            let second = ItemData::default_for(kind);
            assert_eq!(first, second);
            assert_eq!(first.kind(), kind);
        }
    }

    #[test]
    fn item_serializes_with_sibling_type_and_data() {
        let item = Item {
            id: "0001".to_string(),
            name: "Revenue".to_string(),
            subtitle: String::new(),
            data: ItemData::default_for(CardKind::Chart),
        };
        let value = serde_json::to_value(&item).expect("serialize item");
        assert_eq!(value["id"], "0001");
        assert_eq!(value["type"], "chart");
        assert!(value["data"]["field1"].is_array());
    }

    #[test]
    fn metric_value_round_trips_number_and_empty() {
        let full: Metric = serde_json::from_str(r#"{"id":"m1","label":"x","value":42.0}"#)
            .expect("parse metric");
        assert_eq!(full.value, MetricValue(Some(42.0)));
        let cleared: Metric =
            serde_json::from_str(r#"{"id":"m1","label":"x","value":""}"#).expect("parse metric");
        assert_eq!(cleared.value, MetricValue(None));
        assert_eq!(
            serde_json::to_string(&cleared.value).expect("serialize"),
            "\"\""
        );
    }

    #[test]
    fn select_choice_uses_wire_labels() {
        assert_eq!(
            serde_json::to_string(&SelectChoice::OptionB).expect("serialize"),
            "\"Option B\""
        );
        let parsed: SelectChoice = serde_json::from_str("\"\"").expect("parse empty");
        assert_eq!(parsed, SelectChoice::Unset);
        assert_eq!(SelectChoice::parse("bogus"), None);
    }

    #[test]
    fn resolve_slot_prefers_id_over_index() {
        let slots = vec![
            Metric {
                id: "2".to_string(),
                label: "a".to_string(),
                value: MetricValue::default(),
            },
            Metric {
                id: "m2".to_string(),
                label: "b".to_string(),
                value: MetricValue::default(),
            },
        ];
        // "2" is a real id, so the id match wins over positional index 2.
        assert_eq!(resolve_slot(&slots, "2", |m| m.id.as_str()), Some(0));
        assert_eq!(resolve_slot(&slots, "m2", |m| m.id.as_str()), Some(1));
        assert_eq!(resolve_slot(&slots, "1", |m| m.id.as_str()), Some(0));
        assert_eq!(resolve_slot(&slots, "3", |m| m.id.as_str()), None);
        assert_eq!(resolve_slot(&slots, "0", |m| m.id.as_str()), None);
    }

    #[test]
    fn slot_ids_do_not_recycle_after_deletion() {
        let id = next_slot_id("0001", 'c', &["0001-c1", "0001-c3"]);
        assert_eq!(id, "0001-c4");
        let fresh = next_slot_id("0001", 'm', &[]);
        assert_eq!(fresh, "0001-m1");
    }
}
