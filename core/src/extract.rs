//! Labelled-field extraction with positional fallback for the primary field.
//!
//! Lenient mode never fails: a field that is absent or does not parse stays
//! `null`. Strict mode reports the first labelled value it could not interpret.

use std::borrow::Cow;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates;
use crate::error::FieldParseError;
use crate::request::Fields;
use crate::rules::{FieldKind, FieldRule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    #[default]
    Lenient,
    Strict,
}

/// Lenient extraction. Every rule's key is present in the result, `null` when not provided.
pub fn extract(content: &str, rules: &[FieldRule], now: NaiveDateTime) -> Fields {
    // Lenient mode has no error path.
    try_extract(content, rules, now, ExtractMode::Lenient).unwrap_or_default()
}

pub fn try_extract(
    content: &str,
    rules: &[FieldRule],
    now: NaiveDateTime,
    mode: ExtractMode,
) -> Result<Fields, FieldParseError> {
    let mut fields: Fields = rules
        .iter()
        .map(|rule| (rule.canonical_key.clone(), Value::Null))
        .collect();

    for rule in rules {
        let raw = labelled_value(rule, content, rules);
        let value = raw.and_then(|raw| interpret(rule, raw, now, mode));
        match (value, raw) {
            (Some(value), _) => {
                fields.insert(rule.canonical_key.clone(), value);
            }
            (None, raw) if mode == ExtractMode::Strict => {
                // A label is present but nothing usable follows it.
                let raw = raw.or_else(|| raw_after_label(rule, content)).unwrap_or_default();
                if !raw.is_empty() {
                    return Err(FieldParseError {
                        field: rule.canonical_key.clone(),
                        raw: raw.to_string(),
                    });
                }
            }
            (None, _) => {}
        }
    }

    if let Some(primary) = rules.iter().find(|rule| rule.primary) {
        let missing = fields
            .get(&primary.canonical_key)
            .is_none_or(Value::is_null);
        if missing {
            let raw = positional_value(primary, content, rules);
            if !raw.is_empty() {
                // Positional text is noisy by nature; it never fails the request.
                if let Some(value) = interpret(primary, raw, now, ExtractMode::Lenient) {
                    fields.insert(primary.canonical_key.clone(), value);
                }
            }
        }
    }

    Ok(fields)
}

/// Value after the first synonym (in declared order) whose full pattern matches.
fn labelled_value<'c>(rule: &FieldRule, content: &'c str, rules: &[FieldRule]) -> Option<&'c str> {
    let value = rule
        .value_patterns
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str())?;

    // Free-text values run to the next separator; stop early at another field's label.
    let value = if rule.kind.is_numeric() {
        value
    } else {
        let cut = earliest_label(value, rules, &rule.canonical_key).unwrap_or(value.len());
        &value[..cut]
    };
    let value = trim_value(value);
    (!value.is_empty()).then_some(value)
}

fn raw_after_label<'c>(rule: &FieldRule, content: &'c str) -> Option<&'c str> {
    rule.label_patterns
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.name("value"))
        .map(|m| trim_value(m.as_str()))
}

/// Everything before the earliest label of any other field, or the whole content.
fn positional_value<'c>(primary: &FieldRule, content: &'c str, rules: &[FieldRule]) -> &'c str {
    let cut = earliest_label(content, rules, &primary.canonical_key).unwrap_or(content.len());
    trim_value(&content[..cut])
}

fn earliest_label(text: &str, rules: &[FieldRule], except: &str) -> Option<usize> {
    rules
        .iter()
        .filter(|rule| rule.canonical_key != except)
        .filter_map(|rule| rule.label_offset(text))
        .min()
}

pub(crate) fn interpret(
    rule: &FieldRule,
    raw: &str,
    now: NaiveDateTime,
    mode: ExtractMode,
) -> Option<Value> {
    let raw = trim_value(raw);
    if raw.is_empty() {
        return None;
    }
    match &rule.kind {
        FieldKind::Text => Some(Value::String(raw.to_string())),
        FieldKind::Number => parse_number(raw),
        FieldKind::Date => dates::normalize(raw, now).map(Value::String),
        FieldKind::Enum(table) => match mode {
            ExtractMode::Lenient => Some(Value::String(table.normalize(raw).to_string())),
            ExtractMode::Strict => table.recognize(raw).map(|tag| Value::String(tag.to_string())),
        },
    }
}

/// Integer when there is no fractional part, float otherwise. Full-width digits are accepted.
pub fn parse_number(raw: &str) -> Option<Value> {
    let folded = fold_full_width(raw);
    let raw = folded.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Full-width digits and number punctuation (`０-９` `．` `／` `－`) to ASCII.
pub(crate) fn fold_full_width(raw: &str) -> Cow<'_, str> {
    if !raw.chars().any(is_full_width_numeric) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(
        raw.chars()
            .map(|c| match c {
                '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
                '．' => '.',
                '／' => '/',
                '－' => '-',
                other => other,
            })
            .collect(),
    )
}

fn is_full_width_numeric(c: char) -> bool {
    matches!(c, '０'..='９' | '．' | '／' | '－')
}

/// Surrounding whitespace, plus list separators at the end only.
pub(crate) fn trim_value(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '、' | '，' | ';'))
}
