//! Trigger-rule matching: raw chat text to a `ParsedRequest`.

use std::sync::Arc;

use regex::Captures;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::Clock;
use crate::error::FieldParseError;
use crate::extract::{self, ExtractMode};
use crate::request::{IntentTag, ParsedRequest};
use crate::rules::{RuleSet, TriggerRule};

/// Capture group handed to the field extractor.
pub const CONTENT_GROUP: &str = "content";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    /// Declaration order, first matching rule wins
    #[default]
    FirstMatch,
    /// Longest matched trigger prefix, then most populated fields, then declaration order
    MostSpecific,
}

impl ResolveStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "first_match" | "first-match" | "first" => Some(Self::FirstMatch),
            "most_specific" | "most-specific" | "specific" => Some(Self::MostSpecific),
            _ => None,
        }
    }
}

/// A declared sample that does not resolve to the intent it was written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shadowing {
    pub sample: String,
    pub expected: IntentTag,
    /// Intent that won instead, `None` when nothing matched
    pub actual: Option<IntentTag>,
}

#[derive(Clone)]
pub struct Resolver {
    rules: Arc<RuleSet>,
    clock: Arc<dyn Clock>,
    strategy: ResolveStrategy,
    mode: ExtractMode,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("agent", &self.rules.name)
            .field("strategy", &self.strategy)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Resolver {
    pub fn new(rules: Arc<RuleSet>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            clock,
            strategy: ResolveStrategy::default(),
            mode: ExtractMode::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ResolveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn mode(&self) -> ExtractMode {
        self.mode
    }

    /// Lenient resolution. `None` means the message is not a command.
    pub fn resolve(&self, text: &str) -> Option<ParsedRequest> {
        self.resolve_with(text, self.strategy, ExtractMode::Lenient)
            .ok()
            .flatten()
    }

    /// Resolution in the configured extraction mode.
    pub fn try_resolve(&self, text: &str) -> Result<Option<ParsedRequest>, FieldParseError> {
        self.resolve_with(text, self.strategy, self.mode)
    }

    fn resolve_with(
        &self,
        text: &str,
        strategy: ResolveStrategy,
        mode: ExtractMode,
    ) -> Result<Option<ParsedRequest>, FieldParseError> {
        let input = text.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let winner = match strategy {
            ResolveStrategy::FirstMatch => self
                .rules
                .triggers
                .iter()
                .find_map(|trigger| trigger.pattern.captures(input).map(|caps| (trigger, caps))),
            ResolveStrategy::MostSpecific => self.most_specific(input),
        };

        let Some((trigger, caps)) = winner else {
            tracing::debug!(agent = %self.rules.name, "no trigger rule matched");
            return Ok(None);
        };
        tracing::debug!(
            agent = %self.rules.name,
            intent = %trigger.intent,
            priority = trigger.priority,
            "matched trigger rule"
        );
        self.build(trigger, &caps, mode).map(Some)
    }

    fn most_specific<'t>(&self, input: &'t str) -> Option<(&TriggerRule, Captures<'t>)> {
        let mut best: Option<((usize, usize), &TriggerRule, Captures<'t>)> = None;
        for trigger in &self.rules.triggers {
            let Some(caps) = trigger.pattern.captures(input) else {
                continue;
            };
            let prefix_len = caps
                .name(CONTENT_GROUP)
                .map(|m| m.start())
                .or_else(|| caps.get(0).map(|m| m.end()))
                .unwrap_or(0);
            let populated = self
                .build(trigger, &caps, ExtractMode::Lenient)
                .map(|request| request.provided().count())
                .unwrap_or(0);
            let score = (prefix_len, populated);
            // Strictly greater only: ties keep the earlier declaration.
            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, trigger, caps));
            }
        }
        best.map(|(_, trigger, caps)| (trigger, caps))
    }

    fn build(
        &self,
        trigger: &TriggerRule,
        caps: &Captures<'_>,
        mode: ExtractMode,
    ) -> Result<ParsedRequest, FieldParseError> {
        let intent = self
            .rules
            .intent(&trigger.intent)
            .expect("trigger rules only reference compiled intents");
        let now = self.clock.now();

        let content = caps.name(CONTENT_GROUP).map_or("", |m| m.as_str());
        let mut fields = extract::try_extract(content, &intent.field_rules, now, mode)?;

        // Other named groups fill the field of the same key directly.
        for name in trigger.pattern.capture_names().flatten() {
            if name == CONTENT_GROUP {
                continue;
            }
            let Some(raw) = caps.name(name).map(|m| m.as_str().trim()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let rule = intent
                .field_rules
                .iter()
                .find(|rule| rule.canonical_key == name)
                .or_else(|| self.rules.field(name));
            let value = match rule {
                Some(rule) => match extract::interpret(rule, raw, now, mode) {
                    Some(value) => value,
                    None if mode == ExtractMode::Strict => {
                        return Err(FieldParseError {
                            field: name.to_string(),
                            raw: raw.to_string(),
                        });
                    }
                    None => Value::Null,
                },
                None => Value::String(raw.to_string()),
            };
            if !value.is_null() || !fields.contains_key(name) {
                fields.insert(name.to_string(), value);
            }
        }

        Ok(ParsedRequest {
            intent: intent.tag.clone(),
            fields,
        })
    }

    /// Resolve every declared sample with first-match semantics and report the ones
    /// that land on a different intent.
    pub fn lint(&self) -> Vec<Shadowing> {
        let mut findings = Vec::new();
        for intent in self.rules.intents.values() {
            for sample in &intent.samples {
                let actual = self
                    .resolve_with(sample, ResolveStrategy::FirstMatch, ExtractMode::Lenient)
                    .ok()
                    .flatten()
                    .map(|request| request.intent);
                if actual.as_ref() != Some(&intent.tag) {
                    findings.push(Shadowing {
                        sample: sample.clone(),
                        expected: intent.tag.clone(),
                        actual,
                    });
                }
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::FixedClock;
    use chrono::NaiveDate;
    use serde_json::json;

    const DEFINITION: &str = r#"{
        "name": "ledger",
        "fields": [
            {"key": "title", "synonyms": ["内容", "title"], "kind": "text"},
            {"key": "amount", "synonyms": ["金額", "amount"], "kind": "number"},
            {"key": "id", "synonyms": ["id", "番号"], "kind": "number"},
            {"key": "kind", "synonyms": ["種別", "kind"], "kind": "text"}
        ],
        "intents": [
            {"tag": "add_expense", "patterns": ["(?:支出|expense)\\s*[：:]\\s*(?P<content>.+)"],
             "action": "create", "fields": ["title", "amount"], "primary": "title",
             "required": ["title", "amount"], "samples": ["支出: コーヒー, 金額: 500"]},
            {"tag": "delete", "patterns": ["(?:削除|delete)\\s*[：:]?\\s*#?(?P<id>\\d+)"],
             "action": "delete", "required": ["id"], "samples": ["削除: 42", "delete 7"]},
            {"tag": "list", "patterns": ["(?:一覧|list)"], "action": "list",
             "samples": ["一覧", "list"]},
            {"tag": "list_expense", "patterns": ["(?:一覧|list)\\s*[：:]?\\s*(?:支出|expenses?)"],
             "action": "list", "fixed": {"kind": "expense"}, "samples": ["一覧 支出"]}
        ]
    }"#;

    fn resolver() -> Resolver {
        let rules = RuleSet::from_json(DEFINITION).expect("compiles");
        let now = NaiveDate::from_ymd_opt(2026, 1, 10)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid date");
        Resolver::new(Arc::new(rules), Arc::new(FixedClock(now)))
    }

    #[test]
    fn add_expense_resolves_with_fields() {
        let request = resolver()
            .resolve("支出: コーヒー, 金額: 500")
            .expect("recognized");
        assert_eq!(request.intent.as_str(), "add_expense");
        assert_eq!(request.fields["title"], json!("コーヒー"));
        assert_eq!(request.fields["amount"], json!(500));
    }

    #[test]
    fn delete_takes_id_from_named_group() {
        let request = resolver().resolve("削除: 42").expect("recognized");
        assert_eq!(request.intent.as_str(), "delete");
        assert_eq!(request.fields.len(), 1);
        assert_eq!(request.fields["id"], json!(42));

        let request = resolver().resolve("  DELETE #7 ").expect("recognized");
        assert_eq!(request.fields["id"], json!(7));
    }

    #[test]
    fn bare_list_has_no_fields() {
        let request = resolver().resolve("一覧").expect("recognized");
        assert_eq!(request.intent.as_str(), "list");
        assert!(request.fields.is_empty());
    }

    #[test]
    fn unknown_text_is_not_a_command() {
        assert_eq!(resolver().resolve("hello there"), None);
        assert_eq!(resolver().resolve("   "), None);
        // Trigger words must lead the message.
        assert_eq!(resolver().resolve("please 削除: 4"), None);
    }

    #[test]
    fn first_match_lets_generic_list_shadow_specific_listing() {
        let request = resolver().resolve("一覧 支出").expect("recognized");
        assert_eq!(request.intent.as_str(), "list");

        let findings = resolver().lint();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].expected.as_str(), "list_expense");
        assert_eq!(findings[0].actual.as_ref().map(IntentTag::as_str), Some("list"));
    }

    #[test]
    fn most_specific_prefers_the_longer_trigger() {
        let resolver = resolver().with_strategy(ResolveStrategy::MostSpecific);
        let request = resolver.resolve("一覧 支出").expect("recognized");
        assert_eq!(request.intent.as_str(), "list_expense");

        let request = resolver.resolve("一覧").expect("recognized");
        assert_eq!(request.intent.as_str(), "list");
    }

    const OVERLAPPING: &str = r#"{
        "name": "notes",
        "enums": [{
            "name": "event_type",
            "values": [
                {"tag": "wedding", "synonyms": ["結婚", "wedding"]},
                {"tag": "other", "synonyms": ["その他"]}
            ]
        }],
        "fields": [
            {"key": "title", "synonyms": ["内容", "title"], "kind": "text"},
            {"key": "amount", "synonyms": ["金額", "amount"], "kind": "number"},
            {"key": "type", "synonyms": ["種類", "type"], "kind": "enum", "enum": "event_type"}
        ],
        "intents": [
            {"tag": "note", "patterns": ["メモ[：:]\\s*(?P<content>.+)"], "action": "create",
             "fields": ["title"], "primary": "title"},
            {"tag": "priced_note", "patterns": ["メモ[：:]\\s*(?P<content>.+金額.+)"],
             "action": "create", "fields": ["title", "amount"], "primary": "title"},
            {"tag": "list_type", "patterns": ["種類[：:]\\s*(?P<type>.+)"], "action": "list",
             "required": ["type"]}
        ]
    }"#;

    fn overlapping() -> Resolver {
        let rules = RuleSet::from_json(OVERLAPPING).expect("compiles");
        let now = NaiveDate::from_ymd_opt(2026, 1, 10)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid date");
        Resolver::new(Arc::new(rules), Arc::new(FixedClock(now)))
    }

    #[test]
    fn most_specific_breaks_prefix_ties_on_populated_fields() {
        let text = "メモ: 本, 金額: 500";
        let first = overlapping().resolve(text).expect("recognized");
        assert_eq!(first.intent.as_str(), "note");

        let resolver = overlapping().with_strategy(ResolveStrategy::MostSpecific);
        let request = resolver.resolve(text).expect("recognized");
        assert_eq!(request.intent.as_str(), "priced_note");
        assert_eq!(request.fields["title"], json!("本"));
        assert_eq!(request.fields["amount"], json!(500));

        // Equal prefix and field count keep declaration order.
        let request = resolver.resolve("メモ: 本 金額なし").expect("recognized");
        assert_eq!(request.intent.as_str(), "note");
    }

    #[test]
    fn strict_mode_rejects_bad_named_group_values() {
        let strict = overlapping().with_mode(ExtractMode::Strict);
        let err = strict.try_resolve("種類: 宇宙").expect_err("type not recognized");
        assert_eq!(err, FieldParseError {
            field: "type".to_string(),
            raw: "宇宙".to_string(),
        });

        let request = strict.try_resolve("種類: 結婚").expect("parses").expect("recognized");
        assert_eq!(request.fields["type"], json!("wedding"));
        let request = strict.resolve("種類: 宇宙").expect("recognized");
        assert_eq!(request.fields["type"], json!("other"));
    }

    #[test]
    fn full_width_id_in_named_group() {
        let request = resolver().resolve("削除: ４２").expect("recognized");
        assert_eq!(request.fields["id"], json!(42));
    }

    #[test]
    fn strict_mode_surfaces_bad_values() {
        let resolver = resolver().with_mode(ExtractMode::Strict);
        let err = resolver
            .try_resolve("支出: 本, 金額: たくさん")
            .expect_err("amount does not parse");
        assert_eq!(err.field, "amount");

        // `resolve` stays lenient whatever the configured mode.
        let request = resolver.resolve("支出: 本, 金額: たくさん").expect("recognized");
        assert_eq!(request.fields["amount"], Value::Null);
    }

    #[test]
    fn strategy_parses_from_config_strings() {
        assert_eq!(ResolveStrategy::parse("most_specific"), Some(ResolveStrategy::MostSpecific));
        assert_eq!(ResolveStrategy::parse("First-Match"), Some(ResolveStrategy::FirstMatch));
        assert_eq!(ResolveStrategy::parse("random"), None);
    }
}
