//! Compiled pattern and field tables for one agent.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::definition::{
    ActionKind, AgentDefinition, EnumSpec, FieldKindSpec, FieldSpec, IntentSpec, Label,
};
use crate::error::DefinitionError;
use crate::request::{Fields, IntentTag};

/// Separators that end an unquoted field value.
pub(crate) const VALUE_TERMINATORS: &str = r",、，;\n";

const NUMBER_VALUE_PATTERN: &str = r"\d+(?:[.．]\d+)?";

/// One (trigger pattern, intent) pair. Earlier priority wins.
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub pattern: Regex,
    pub intent: IntentTag,
    pub priority: usize,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub tag: String,
    pub synonyms: Vec<String>,
    pub label: Label,
    pub icon: Option<String>,
}

/// Bilingual free text to canonical tag.
#[derive(Debug, Clone)]
pub struct EnumTable {
    pub name: String,
    pub default: String,
    pub values: Vec<EnumValue>,
}

impl EnumTable {
    fn compile(spec: &EnumSpec) -> Result<Self, DefinitionError> {
        if !spec.values.iter().any(|value| value.tag == spec.default) {
            return Err(DefinitionError::UnknownEnumDefault {
                name: spec.name.clone(),
                default: spec.default.clone(),
            });
        }
        let values = spec
            .values
            .iter()
            .map(|value| EnumValue {
                tag: value.tag.clone(),
                synonyms: value
                    .synonyms
                    .iter()
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                label: value.label.clone(),
                icon: value.icon.clone(),
            })
            .collect();
        Ok(Self {
            name: spec.name.clone(),
            default: spec.default.clone(),
            values,
        })
    }

    /// Canonical tag for recognized text. Exact tag or synonym first, then containment.
    pub fn recognize(&self, raw: &str) -> Option<&str> {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        for value in &self.values {
            if value.tag == text || value.synonyms.iter().any(|s| *s == text) {
                return Some(value.tag.as_str());
            }
        }
        self.values
            .iter()
            .find(|value| value.synonyms.iter().any(|s| contains_synonym(&text, s)))
            .map(|value| value.tag.as_str())
    }

    /// Like `recognize`, but unrecognized text collapses to the default tag.
    pub fn normalize(&self, raw: &str) -> &str {
        self.recognize(raw).unwrap_or(self.default.as_str())
    }

    pub fn value(&self, tag: &str) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.tag == tag)
    }
}

/// Latin synonyms only match whole words, so "card" does not fire inside "discard".
fn contains_synonym(text: &str, synonym: &str) -> bool {
    if synonym.is_ascii() {
        count_words(text, synonym) > 0
    } else {
        text.contains(synonym)
    }
}

/// Occurrences of an ASCII term that are not glued to other ASCII letters or digits.
pub(crate) fn count_words(haystack: &str, term: &str) -> usize {
    haystack
        .match_indices(term)
        .filter(|(start, _)| {
            let before = haystack[..*start].chars().next_back();
            let after = haystack[start + term.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && !after.is_some_and(|c| c.is_ascii_alphanumeric())
        })
        .count()
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Enum(Arc<EnumTable>),
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Number)
    }
}

/// How to find one canonical field in free text.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub canonical_key: String,
    pub key_synonyms: Vec<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub primary: bool,
    pub truncate: bool,
    pub default: Option<Value>,
    pub label: Label,
    /// `<synonym>[：:]\s*<value_pattern>`, one per synonym in declared order
    pub(crate) value_patterns: Vec<Regex>,
    /// `<synonym>[：:]` followed by the raw value up to the next separator
    pub(crate) label_patterns: Vec<Regex>,
}

impl FieldRule {
    fn compile(
        spec: &FieldSpec,
        enums: &BTreeMap<String, Arc<EnumTable>>,
    ) -> Result<Self, DefinitionError> {
        let synonyms: Vec<String> = spec
            .synonyms
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if synonyms.is_empty() {
            return Err(DefinitionError::NoSynonyms(spec.key.clone()));
        }

        let kind = match spec.kind {
            FieldKindSpec::Text => FieldKind::Text,
            FieldKindSpec::Number => FieldKind::Number,
            FieldKindSpec::Date => FieldKind::Date,
            FieldKindSpec::Enum => {
                let name = spec.enum_name.clone().unwrap_or_else(|| spec.key.clone());
                let table = enums.get(&name).ok_or_else(|| DefinitionError::UnknownEnum {
                    field: spec.key.clone(),
                    name: name.clone(),
                })?;
                FieldKind::Enum(Arc::clone(table))
            }
        };

        let free_text = format!("[^{VALUE_TERMINATORS}]+");
        let value_pattern = match (&spec.value_pattern, spec.kind) {
            (Some(custom), _) => custom.as_str(),
            (None, FieldKindSpec::Number) => NUMBER_VALUE_PATTERN,
            (None, _) => free_text.as_str(),
        };
        // Reject a broken custom pattern once, with the field name attached.
        Regex::new(value_pattern).map_err(|source| DefinitionError::InvalidValuePattern {
            field: spec.key.clone(),
            source,
        })?;

        let mut value_patterns = Vec::with_capacity(synonyms.len());
        let mut label_patterns = Vec::with_capacity(synonyms.len());
        for synonym in &synonyms {
            let label = label_prefix(synonym);
            value_patterns.push(compile_field_regex(
                &spec.key,
                &format!("{label}(?P<value>{value_pattern})"),
            )?);
            label_patterns.push(compile_field_regex(
                &spec.key,
                &format!("{label}(?P<value>[^{VALUE_TERMINATORS}]*)"),
            )?);
        }

        Ok(Self {
            canonical_key: spec.key.clone(),
            key_synonyms: synonyms,
            kind,
            required: false,
            primary: false,
            truncate: spec.truncate,
            default: spec.default.clone(),
            label: spec.label.clone(),
            value_patterns,
            label_patterns,
        })
    }

    /// Start offset of the earliest label of this field in `text`.
    pub fn label_offset(&self, text: &str) -> Option<usize> {
        self.label_patterns
            .iter()
            .filter_map(|re| re.find(text))
            .map(|m| m.start())
            .min()
    }
}

/// Case-insensitive `<synonym> [：:] <ws>`. Latin synonyms also need a word boundary
/// in front so "date" does not fire inside "update".
fn label_prefix(synonym: &str) -> String {
    let escaped = regex::escape(synonym);
    let boundary = if synonym.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    format!(r"(?i){boundary}{escaped}\s*[：:]\s*")
}

fn compile_field_regex(field: &str, pattern: &str) -> Result<Regex, DefinitionError> {
    Regex::new(pattern).map_err(|source| DefinitionError::InvalidValuePattern {
        field: field.to_string(),
        source,
    })
}

/// A compiled intent: what to extract and which built-in action handles it.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub tag: IntentTag,
    pub action: ActionKind,
    pub field_rules: Vec<FieldRule>,
    pub fixed: Fields,
    pub icon: Option<String>,
    pub label: Label,
    pub keywords: Vec<String>,
    pub samples: Vec<String>,
    pub group_by: Option<String>,
}

impl IntentRule {
    pub fn primary(&self) -> Option<&FieldRule> {
        self.field_rules.iter().find(|rule| rule.primary)
    }
}

/// Everything the resolver, dispatcher and formatter need for one agent.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub display: Label,
    pub title_field: Option<String>,
    pub triggers: Vec<TriggerRule>,
    pub intents: BTreeMap<IntentTag, IntentRule>,
    /// All fields in declaration order, independent of any intent
    pub catalog: Vec<FieldRule>,
    pub enums: BTreeMap<String, Arc<EnumTable>>,
}

impl RuleSet {
    pub fn from_json(raw: &str) -> Result<Self, DefinitionError> {
        let definition = AgentDefinition::from_json(raw)?;
        Self::compile(&definition)
    }

    pub fn compile(definition: &AgentDefinition) -> Result<Self, DefinitionError> {
        let mut enums = BTreeMap::new();
        for spec in &definition.enums {
            enums.insert(spec.name.clone(), Arc::new(EnumTable::compile(spec)?));
        }

        let mut catalog = Vec::with_capacity(definition.fields.len());
        for spec in &definition.fields {
            catalog.push(FieldRule::compile(spec, &enums)?);
        }

        let mut seen = HashSet::new();
        let mut triggers = Vec::new();
        let mut intents = BTreeMap::new();
        for spec in &definition.intents {
            if !seen.insert(spec.tag.clone()) {
                return Err(DefinitionError::DuplicateIntent(spec.tag.clone()));
            }
            let intent = compile_intent(spec, &catalog)?;
            for pattern in &spec.patterns {
                let compiled = Regex::new(&format!("(?i)^(?:{pattern})")).map_err(|source| {
                    DefinitionError::InvalidPattern {
                        intent: spec.tag.clone(),
                        pattern: pattern.clone(),
                        source,
                    }
                })?;
                triggers.push(TriggerRule {
                    pattern: compiled,
                    intent: intent.tag.clone(),
                    priority: triggers.len(),
                });
            }
            intents.insert(intent.tag.clone(), intent);
        }

        Ok(Self {
            name: definition.name.clone(),
            display: definition.display.clone(),
            title_field: definition.title_field.clone(),
            triggers,
            intents,
            catalog,
            enums,
        })
    }

    pub fn intent(&self, tag: &IntentTag) -> Option<&IntentRule> {
        self.intents.get(tag)
    }

    pub fn field(&self, key: &str) -> Option<&FieldRule> {
        self.catalog.iter().find(|rule| rule.canonical_key == key)
    }

    /// Trigger keywords and field synonyms, for the locale heuristic.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.intents
            .values()
            .flat_map(|intent| intent.keywords.iter())
            .chain(self.catalog.iter().flat_map(|rule| rule.key_synonyms.iter()))
            .map(String::as_str)
    }
}

fn compile_intent(spec: &IntentSpec, catalog: &[FieldRule]) -> Result<IntentRule, DefinitionError> {
    if spec.patterns.is_empty() {
        return Err(DefinitionError::NoPatterns(spec.tag.clone()));
    }

    let lookup = |key: &str| {
        catalog
            .iter()
            .find(|rule| rule.canonical_key == key)
            .ok_or_else(|| DefinitionError::UnknownField {
                intent: spec.tag.clone(),
                field: key.to_string(),
            })
    };

    let mut field_rules = Vec::with_capacity(spec.fields.len());
    for key in &spec.fields {
        let mut rule = lookup(key)?.clone();
        rule.required = spec.required.iter().any(|r| r == key);
        rule.primary = spec.primary.as_deref() == Some(key.as_str());
        field_rules.push(rule);
    }
    // Required or primary fields that only arrive through a named trigger group (e.g. `id`).
    for key in spec.required.iter().chain(spec.primary.iter()) {
        if !field_rules.iter().any(|rule| &rule.canonical_key == key) {
            let mut rule = lookup(key)?.clone();
            rule.required = spec.required.iter().any(|r| r == key);
            rule.primary = spec.primary.as_deref() == Some(key.as_str());
            field_rules.push(rule);
        }
    }
    for key in spec.fixed.keys().chain(spec.group_by.iter()) {
        lookup(key)?;
    }

    if spec.action == ActionKind::Search && spec.primary.is_none() {
        return Err(DefinitionError::MissingPrimary {
            intent: spec.tag.clone(),
            action: spec.action.as_str().to_string(),
        });
    }

    Ok(IntentRule {
        tag: IntentTag::new(spec.tag.clone()),
        action: spec.action,
        field_rules,
        fixed: spec.fixed.clone(),
        icon: spec.icon.clone(),
        label: spec.label.clone(),
        keywords: spec.keywords.clone(),
        samples: spec.samples.clone(),
        group_by: spec.group_by.clone(),
    })
}
