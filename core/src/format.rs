//! Bilingual reply rendering.
//!
//! Replies are plain multi-line text: an icon and a title line, then indented
//! detail lines for each populated field. Labels come from the agent definition
//! and are rendered `日本語 / English` when both languages are requested.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::{Failure, Outcome, Response, StatsGroup};
use crate::request::{Fields, IntentTag};
use crate::rules::{FieldKind, FieldRule, RuleSet, count_words};
use crate::store::Record;

pub const DEFAULT_TRUNCATE_CHARS: usize = 50;
pub const DEFAULT_LIST_CAP: usize = 10;
pub const ELLIPSIS: &str = "...";

const BULLET: &str = "  •";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Ja,
    En,
    Both,
}

impl Locale {
    /// Pick the text for this locale. `Both` joins them unless they are identical.
    pub fn text(self, ja: impl AsRef<str>, en: impl AsRef<str>) -> String {
        let (ja, en) = (ja.as_ref(), en.as_ref());
        match self {
            Locale::Ja => ja.to_string(),
            Locale::En => en.to_string(),
            Locale::Both if ja == en || en.is_empty() => ja.to_string(),
            Locale::Both if ja.is_empty() => en.to_string(),
            Locale::Both => format!("{ja} / {en}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleHint {
    Ja,
    En,
    #[default]
    Both,
    /// Decide per message from the trigger vocabulary it uses
    Auto,
}

impl LocaleHint {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Some(Self::Ja),
            "en" | "english" => Some(Self::En),
            "both" | "bilingual" => Some(Self::Both),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn resolve(self, rules: &RuleSet, input: &str) -> Locale {
        match self {
            LocaleHint::Ja => Locale::Ja,
            LocaleHint::En => Locale::En,
            LocaleHint::Both => Locale::Both,
            LocaleHint::Auto => detect_locale(rules, input),
        }
    }
}

/// Count Japanese versus English vocabulary hits. Ties go to Japanese.
fn detect_locale(rules: &RuleSet, input: &str) -> Locale {
    let haystack = input.to_lowercase();
    let (mut ja, mut en) = (0usize, 0usize);
    for term in rules.vocabulary() {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            continue;
        }
        if term.is_ascii() {
            en += count_words(&haystack, &term);
        } else {
            ja += haystack.matches(term.as_str()).count();
        }
    }
    tracing::debug!(ja, en, "locale vote");
    if en > ja { Locale::En } else { Locale::Ja }
}

/// Cut `text` to `budget` characters plus an ellipsis. Shorter text is returned unchanged.
pub fn truncate(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    rules: Arc<RuleSet>,
    truncate_chars: usize,
    list_cap: usize,
}

impl Formatter {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            truncate_chars: DEFAULT_TRUNCATE_CHARS,
            list_cap: DEFAULT_LIST_CAP,
        }
    }

    pub fn with_truncate_chars(mut self, chars: usize) -> Self {
        self.truncate_chars = chars;
        self
    }

    pub fn with_list_cap(mut self, cap: usize) -> Self {
        self.list_cap = cap.max(1);
        self
    }

    /// Render a response, resolving `hint` against the message that produced it.
    pub fn format(&self, response: &Response, hint: LocaleHint, input: &str) -> String {
        self.render(response, hint.resolve(&self.rules, input))
    }

    pub fn render(&self, response: &Response, locale: Locale) -> String {
        let mut lines = Vec::new();
        match &response.outcome {
            Outcome::Created { id, fields } => {
                lines.push(format!(
                    "{} {} #{id}",
                    self.icon(&response.intent, fields, "✅"),
                    self.action_title(&response.intent, locale, "登録しました", "Saved"),
                ));
                self.field_lines(fields, locale, &mut lines);
            }
            Outcome::Updated { id, fields } => {
                lines.push(format!(
                    "✏️ {}",
                    locale.text(format!("#{id} を更新しました"), format!("Updated #{id}"))
                ));
                self.field_lines(fields, locale, &mut lines);
            }
            Outcome::Deleted { id } => lines.push(format!(
                "🗑️ {}",
                locale.text(format!("#{id} を削除しました"), format!("Deleted #{id}"))
            )),
            Outcome::Detail { record } => {
                lines.push(self.record_title(&response.intent, record));
                self.field_lines(&record.fields, locale, &mut lines);
                lines.push(format!(
                    "{BULLET} {}: {}",
                    locale.text("登録日時", "Created"),
                    record.created_at.format("%Y-%m-%d %H:%M")
                ));
            }
            Outcome::Listing {
                records, keyword, ..
            } => self.listing(&response.intent, records, keyword.as_deref(), locale, &mut lines),
            Outcome::Stats {
                count,
                totals,
                groups,
            } => self.stats(&response.intent, *count, totals, groups, locale, &mut lines),
            Outcome::Failed { failure } => lines.push(self.failure(failure, locale)),
        }
        lines.join("\n")
    }

    /// One-line bilingual message for a handler or extraction failure.
    pub fn failure(&self, failure: &Failure, locale: Locale) -> String {
        match failure {
            Failure::MissingRequiredField { field } => {
                let (ja, en) = self.field_names(field);
                format!(
                    "⚠️ {}",
                    locale.text(
                        format!("必須項目がありません: {ja}"),
                        format!("Missing required field: {en}")
                    )
                )
            }
            Failure::NotFound { id } => format!(
                "❌ {}",
                locale.text(
                    format!("#{id} が見つかりません"),
                    format!("Record #{id} not found")
                )
            ),
            Failure::InvalidField(err) => {
                let (ja, en) = self.field_names(&err.field);
                format!(
                    "⚠️ {}",
                    locale.text(
                        format!("「{}」を{ja}として読み取れません", err.raw),
                        format!("Could not read \"{}\" as {en}", err.raw)
                    )
                )
            }
            Failure::UnknownIntent { intent } => format!(
                "⚠️ {}",
                locale.text(
                    format!("対応していないコマンドです: {intent}"),
                    format!("Unsupported command: {intent}")
                )
            ),
        }
    }

    fn listing(
        &self,
        intent: &IntentTag,
        records: &[Record],
        keyword: Option<&str>,
        locale: Locale,
        lines: &mut Vec<String>,
    ) {
        let header = match keyword {
            Some(keyword) => format!(
                "🔍 {}",
                locale.text(
                    format!("「{keyword}」の検索結果 ({}件)", records.len()),
                    format!("Results for \"{keyword}\" ({})", records.len())
                )
            ),
            None => format!(
                "📋 {} ({})",
                self.action_title(intent, locale, "一覧", "List"),
                records.len()
            ),
        };
        lines.push(header);

        if records.is_empty() {
            lines.push(format!(
                "{BULLET} {}",
                locale.text("該当する記録はありません", "No records found")
            ));
            return;
        }
        for record in records.iter().take(self.list_cap) {
            lines.push(self.record_title(intent, record));
            self.summary_lines(record, locale, lines);
        }
        let rest = records.len().saturating_sub(self.list_cap);
        if rest > 0 {
            lines.push(locale.text(format!("…他 {rest} 件"), format!("+{rest} more")));
        }
    }

    fn stats(
        &self,
        intent: &IntentTag,
        count: usize,
        totals: &BTreeMap<String, f64>,
        groups: &[StatsGroup],
        locale: Locale,
        lines: &mut Vec<String>,
    ) {
        lines.push(format!(
            "📊 {}",
            self.action_title(intent, locale, "集計", "Stats")
        ));
        lines.push(format!(
            "{BULLET} {}: {count}",
            locale.text("件数", "Count")
        ));
        for (key, total) in totals {
            lines.push(format!(
                "{BULLET} {}: {}",
                self.field_label(key, locale),
                format_number(*total)
            ));
        }

        let Some(group_by) = self.rules.intent(intent).and_then(|i| i.group_by.as_deref()) else {
            return;
        };
        for group in groups {
            let name = if group.key.is_empty() {
                locale.text("未設定", "(none)")
            } else {
                self.display_value(group_by, &Value::String(group.key.clone()), locale)
            };
            let mut line = format!(
                "    {name}: {}",
                locale.text(format!("{}件", group.count), format!("{} items", group.count))
            );
            for (key, total) in &group.totals {
                line.push_str(&format!(
                    ", {} {}",
                    self.field_label(key, locale),
                    format_number(*total)
                ));
            }
            lines.push(line);
        }
    }

    /// Icon and headline of one record.
    fn record_title(&self, intent: &IntentTag, record: &Record) -> String {
        let icon = self.icon(intent, &record.fields, "•");
        match self.title_of(record) {
            Some(title) => format!("{icon} #{} {title}", record.id),
            None => format!("{icon} #{}", record.id),
        }
    }

    fn title_of(&self, record: &Record) -> Option<String> {
        let key = self.rules.title_field.as_deref()?;
        let value = record.get(key)?;
        Some(self.plain_value(key, value))
    }

    /// Populated fields in catalog order.
    fn field_lines(&self, fields: &Fields, locale: Locale, lines: &mut Vec<String>) {
        for rule in &self.rules.catalog {
            let Some(value) = fields.get(&rule.canonical_key).filter(|v| !v.is_null()) else {
                continue;
            };
            lines.push(format!(
                "{BULLET} {}: {}",
                rule_label(rule, locale),
                self.display_value(&rule.canonical_key, value, locale)
            ));
        }
    }

    /// Listing detail: everything except the headline field.
    fn summary_lines(&self, record: &Record, locale: Locale, lines: &mut Vec<String>) {
        let title = self.rules.title_field.as_deref();
        for rule in &self.rules.catalog {
            if Some(rule.canonical_key.as_str()) == title {
                continue;
            }
            let Some(value) = record.get(&rule.canonical_key) else {
                continue;
            };
            lines.push(format!(
                "    {}: {}",
                rule_label(rule, locale),
                self.display_value(&rule.canonical_key, value, locale)
            ));
        }
    }

    fn display_value(&self, key: &str, value: &Value, locale: Locale) -> String {
        match (self.rules.field(key).map(|rule| &rule.kind), value) {
            (Some(FieldKind::Enum(table)), Value::String(tag)) => match table.value(tag) {
                Some(entry) if !entry.label.ja.is_empty() || !entry.label.en.is_empty() => {
                    locale.text(&entry.label.ja, &entry.label.en)
                }
                _ => tag.clone(),
            },
            _ => self.plain_value(key, value),
        }
    }

    fn plain_value(&self, key: &str, value: &Value) -> String {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        match self.rules.field(key) {
            Some(rule) if rule.truncate => truncate(&text, self.truncate_chars),
            _ => text,
        }
    }

    /// Enum value icon first, then the intent's icon, then `fallback`.
    fn icon(&self, intent: &IntentTag, fields: &Fields, fallback: &str) -> String {
        let from_enum = self.rules.catalog.iter().find_map(|rule| {
            let FieldKind::Enum(table) = &rule.kind else {
                return None;
            };
            let tag = fields.get(&rule.canonical_key)?.as_str()?;
            table.value(tag)?.icon.clone()
        });
        from_enum
            .or_else(|| self.rules.intent(intent).and_then(|i| i.icon.clone()))
            .unwrap_or_else(|| fallback.to_string())
    }

    fn action_title(&self, intent: &IntentTag, locale: Locale, ja: &str, en: &str) -> String {
        match self.rules.intent(intent).map(|i| &i.label) {
            Some(label) if !label.ja.is_empty() || !label.en.is_empty() => {
                let verb = locale.text(ja, en);
                format!("{} {verb}", locale.text(&label.ja, &label.en))
            }
            _ => locale.text(ja, en),
        }
    }

    fn field_label(&self, key: &str, locale: Locale) -> String {
        match self.rules.field(key) {
            Some(rule) => rule_label(rule, locale),
            None => key.to_string(),
        }
    }

    fn field_names(&self, key: &str) -> (String, String) {
        match self.rules.field(key) {
            Some(rule) => (
                non_empty(&rule.label.ja, key),
                non_empty(&rule.label.en, key),
            ),
            None => (key.to_string(), key.to_string()),
        }
    }
}

fn rule_label(rule: &FieldRule, locale: Locale) -> String {
    locale.text(
        non_empty(&rule.label.ja, &rule.canonical_key),
        non_empty(&rule.label.en, &rule.canonical_key),
    )
}

fn non_empty(text: &str, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldParseError;
    use chrono::Utc;
    use serde_json::json;

    const DEFINITION: &str = r#"{
        "name": "ledger",
        "title_field": "title",
        "enums": [{
            "name": "payment",
            "values": [
                {"tag": "cash", "synonyms": ["現金"], "label": {"ja": "現金", "en": "Cash"}, "icon": "💴"},
                {"tag": "other", "label": {"ja": "その他", "en": "Other"}}
            ]
        }],
        "fields": [
            {"key": "title", "synonyms": ["内容", "title"], "kind": "text",
             "label": {"ja": "内容", "en": "Title"}},
            {"key": "amount", "synonyms": ["金額", "amount"], "kind": "number",
             "label": {"ja": "金額", "en": "Amount"}},
            {"key": "payment", "synonyms": ["支払い", "payment"], "kind": "enum",
             "label": {"ja": "支払い", "en": "Payment"}},
            {"key": "memo", "synonyms": ["メモ", "memo"], "kind": "text", "truncate": true,
             "label": {"ja": "メモ", "en": "Memo"}}
        ],
        "intents": [
            {"tag": "add_expense", "patterns": ["支出[：:]\\s*(?P<content>.+)", "expense[：:]\\s*(?P<content>.+)"],
             "action": "create", "fields": ["title", "amount", "payment", "memo"], "primary": "title",
             "icon": "💸", "label": {"ja": "支出", "en": "Expense"}, "keywords": ["支出", "expense"]},
            {"tag": "list", "patterns": ["一覧", "list"], "action": "list", "keywords": ["一覧", "list"]}
        ]
    }"#;

    fn formatter() -> Formatter {
        Formatter::new(Arc::new(RuleSet::from_json(DEFINITION).expect("compiles")))
    }

    fn record(id: i64, title: &str) -> Record {
        let now = Utc::now();
        Record {
            id,
            fields: [("title".to_string(), json!(title)), ("amount".to_string(), json!(100))]
                .into_iter()
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    fn listing(records: Vec<Record>) -> Response {
        Response {
            intent: IntentTag::new("list"),
            outcome: Outcome::Listing {
                records,
                filters: Fields::new(),
                keyword: None,
            },
        }
    }

    #[test]
    fn truncation_boundary() {
        let exact = "あ".repeat(50);
        assert_eq!(truncate(&exact, 50), exact);
        let long = "あ".repeat(51);
        assert_eq!(truncate(&long, 50), format!("{}...", "あ".repeat(50)));
        assert_eq!(truncate("short", 50), "short");
    }

    #[test]
    fn created_reply_uses_enum_icon_and_bilingual_labels() {
        let fields: Fields = [
            ("title".to_string(), json!("コーヒー")),
            ("amount".to_string(), json!(500)),
            ("payment".to_string(), json!("cash")),
            ("memo".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();
        let response = Response {
            intent: IntentTag::new("add_expense"),
            outcome: Outcome::Created { id: 1, fields },
        };
        let reply = formatter().render(&response, Locale::Both);
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines[0], "💴 支出 / Expense 登録しました / Saved #1");
        assert!(lines.contains(&"  • 金額 / Amount: 500"));
        assert!(lines.contains(&"  • 支払い / Payment: 現金 / Cash"));
        assert!(!reply.contains("メモ"));
    }

    #[test]
    fn long_memo_is_truncated_in_replies() {
        let mut fields = Fields::new();
        fields.insert("memo".to_string(), json!("x".repeat(60)));
        let response = Response {
            intent: IntentTag::new("add_expense"),
            outcome: Outcome::Created { id: 2, fields },
        };
        let reply = formatter().with_truncate_chars(10).render(&response, Locale::En);
        assert!(reply.contains("  • Memo: xxxxxxxxxx..."));
    }

    #[test]
    fn listing_caps_items_and_reports_the_rest() {
        let records: Vec<Record> = (1..=12).rev().map(|id| record(id, "item")).collect();
        let reply = formatter().render(&listing(records), Locale::En);
        assert!(reply.starts_with("📋 List (12)"));
        assert!(reply.contains("• #12 item"));
        assert!(!reply.contains("#2 item"));
        assert_eq!(reply.lines().last(), Some("+2 more"));

        let reply = formatter().render(&listing(Vec::new()), Locale::Ja);
        assert!(reply.contains("該当する記録はありません"));
    }

    #[test]
    fn failures_render_short_messages() {
        let fmt = formatter();
        assert_eq!(
            fmt.failure(&Failure::MissingRequiredField { field: "amount".into() }, Locale::Both),
            "⚠️ 必須項目がありません: 金額 / Missing required field: Amount"
        );
        assert_eq!(
            fmt.failure(&Failure::NotFound { id: 42 }, Locale::Ja),
            "❌ #42 が見つかりません"
        );
        let err = FieldParseError {
            field: "amount".into(),
            raw: "abc".into(),
        };
        assert_eq!(
            fmt.failure(&Failure::InvalidField(err), Locale::En),
            "⚠️ Could not read \"abc\" as Amount"
        );
    }

    #[test]
    fn auto_locale_counts_trigger_vocabulary() {
        let rules = RuleSet::from_json(DEFINITION).expect("compiles");
        assert_eq!(LocaleHint::Auto.resolve(&rules, "expense: lunch, amount: 12"), Locale::En);
        assert_eq!(LocaleHint::Auto.resolve(&rules, "支出: ランチ, 金額: 900"), Locale::Ja);
        // One hit each way.
        assert_eq!(LocaleHint::Auto.resolve(&rules, "支出: lunch, amount: 9"), Locale::Ja);
        assert_eq!(LocaleHint::Auto.resolve(&rules, "hello"), Locale::Ja);
        // "listing" is not the word "list".
        assert_eq!(count_words("listing list", "list"), 1);
    }

    #[test]
    fn locale_hint_parses_config_values() {
        assert_eq!(LocaleHint::parse("AUTO"), Some(LocaleHint::Auto));
        assert_eq!(LocaleHint::parse("ja"), Some(LocaleHint::Ja));
        assert_eq!(LocaleHint::parse("fr"), None);
    }
}
