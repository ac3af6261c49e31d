//! Declarative agent definitions, as loaded from JSON.
//!
//! A definition is pure data. `RuleSet::compile` turns it into the regexes and
//! lookup tables the resolver runs on.

use serde::{Deserialize, Serialize};

use crate::request::Fields;

/// Parallel Japanese/English text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub ja: String,
    #[serde(default)]
    pub en: String,
}

impl Label {
    pub fn new(ja: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            ja: ja.into(),
            en: en.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub display: Label,
    /// Field shown as the headline of each record in listings
    #[serde(default)]
    pub title_field: Option<String>,
    #[serde(default)]
    pub enums: Vec<EnumSpec>,
    pub fields: Vec<FieldSpec>,
    pub intents: Vec<IntentSpec>,
}

impl AgentDefinition {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// A closed vocabulary (type/category/status) with bilingual synonyms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumSpec {
    pub name: String,
    /// Tag used when free text matches no synonym
    #[serde(default = "default_enum_tag")]
    pub default: String,
    pub values: Vec<EnumValueSpec>,
}

fn default_enum_tag() -> String {
    "other".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValueSpec {
    pub tag: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub label: Label,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindSpec {
    Text,
    Number,
    Date,
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub synonyms: Vec<String>,
    pub kind: FieldKindSpec,
    /// Enum name, required when `kind` is `enum`
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    /// Overrides the kind's default value pattern
    #[serde(default)]
    pub value_pattern: Option<String>,
    #[serde(default)]
    pub label: Label,
    /// Free-text field cut to the formatter's character budget
    #[serde(default)]
    pub truncate: bool,
    /// Applied by create handlers when the field is not provided
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Show,
    List,
    Search,
    Stats,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Show => "show",
            ActionKind::List => "list",
            ActionKind::Search => "search",
            ActionKind::Stats => "stats",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSpec {
    pub tag: String,
    /// Trigger regexes, matched case-insensitively at the start of the message
    pub patterns: Vec<String>,
    pub action: ActionKind,
    /// Fields extracted from the `content` capture
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field filled by positional fallback when unlabelled
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
    /// Constant field values pinned by this intent
    #[serde(default)]
    pub fixed: Fields,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub label: Label,
    /// Trigger words counted by the automatic locale heuristic
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Example messages that must resolve to this intent
    #[serde(default)]
    pub samples: Vec<String>,
    /// Grouping field for stats
    #[serde(default)]
    pub group_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_definition_parses_with_defaults() {
        let def = AgentDefinition::from_json(
            r#"{
                "name": "notes",
                "fields": [{"key": "title", "synonyms": ["title"], "kind": "text"}],
                "intents": [{"tag": "list", "patterns": ["list"], "action": "list"}]
            }"#,
        )
        .expect("definition parses");

        assert_eq!(def.name, "notes");
        assert!(def.enums.is_empty());
        assert_eq!(def.intents[0].action, ActionKind::List);
        assert!(def.intents[0].fixed.is_empty());
        assert!(!def.fields[0].truncate);
    }

    #[test]
    fn enum_default_tag_is_other() {
        let spec: EnumSpec =
            serde_json::from_str(r#"{"name": "kind", "values": []}"#).expect("enum parses");
        assert_eq!(spec.default, "other");
    }
}
