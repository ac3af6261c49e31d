//! Agent definitions shipped with the library.

use crate::definition::AgentDefinition;
use crate::error::DefinitionError;
use crate::rules::RuleSet;

const LEDGER: &str = include_str!("../agents/ledger.json");
const FITNESS: &str = include_str!("../agents/fitness.json");
const EVENTS: &str = include_str!("../agents/events.json");

const AGENTS: [(&str, &str); 3] = [("ledger", LEDGER), ("fitness", FITNESS), ("events", EVENTS)];

pub fn names() -> impl Iterator<Item = &'static str> {
    AGENTS.iter().map(|(name, _)| *name)
}

/// Raw JSON of a built-in agent.
pub fn source(name: &str) -> Result<&'static str, DefinitionError> {
    AGENTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, raw)| *raw)
        .ok_or_else(|| DefinitionError::UnknownAgent(name.to_string()))
}

pub fn definition(name: &str) -> Result<AgentDefinition, DefinitionError> {
    Ok(AgentDefinition::from_json(source(name)?)?)
}

pub fn rule_set(name: &str) -> Result<RuleSet, DefinitionError> {
    RuleSet::compile(&definition(name)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::FixedClock;
    use crate::resolver::Resolver;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn resolver(name: &str) -> Resolver {
        let rules = rule_set(name).expect("built-in agent compiles");
        let now = NaiveDate::from_ymd_opt(2026, 1, 10)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid date");
        Resolver::new(Arc::new(rules), Arc::new(FixedClock(now)))
    }

    #[test]
    fn every_builtin_compiles_without_shadowed_samples() {
        for name in names() {
            let findings = resolver(name).lint();
            assert!(findings.is_empty(), "{name}: {findings:?}");
        }
    }

    #[test]
    fn every_intent_declares_samples() {
        for name in names() {
            let rules = rule_set(name).expect("compiles");
            for intent in rules.intents.values() {
                assert!(!intent.samples.is_empty(), "{name}/{} has no samples", intent.tag);
            }
        }
    }

    #[test]
    fn unknown_agent_is_an_error() {
        assert!(matches!(rule_set("crypto"), Err(DefinitionError::UnknownAgent(_))));
    }

    #[test]
    fn ledger_requests() {
        let ledger = resolver("ledger");

        let request = ledger
            .resolve("支出: コーヒー, 金額: 500, カテゴリ: 食費")
            .expect("recognized");
        assert_eq!(request.intent.as_str(), "add_expense");
        assert_eq!(request.text("title"), Some("コーヒー"));
        assert_eq!(request.integer("amount"), Some(500));
        assert_eq!(request.text("category"), Some("食費"));
        assert_eq!(request.provided().count(), 3);

        let request = ledger.resolve("削除: 42").expect("recognized");
        assert_eq!(request.intent.as_str(), "delete");
        assert_eq!(request.fields.len(), 1);
        assert_eq!(request.integer("id"), Some(42));

        let request = ledger.resolve("一覧").expect("recognized");
        assert_eq!(request.intent.as_str(), "list");
        assert!(request.fields.is_empty());

        assert_eq!(ledger.resolve("hello there"), None);
    }

    #[test]
    fn category_listing_takes_the_category_from_the_trigger() {
        let request = resolver("ledger").resolve("カテゴリ: 食費").expect("recognized");
        assert_eq!(request.intent.as_str(), "list_category");
        assert_eq!(request.text("category"), Some("食費"));
    }

    #[test]
    fn events_normalize_event_types() {
        let request = resolver("events")
            .resolve("予定: 友人の結婚式, 日付: 来週, タイプ: 結婚")
            .expect("recognized");
        assert_eq!(request.intent.as_str(), "add_event");
        assert_eq!(request.text("type"), Some("wedding"));
        assert_eq!(request.text("date"), Some("2026-01-17"));
        assert_eq!(request.text("title"), Some("友人の結婚式"));
    }

    #[test]
    fn fitness_reads_numbers_and_type() {
        let request = resolver("fitness")
            .resolve("workout: running, distance: 5.2, duration: 30, type: jog")
            .expect("recognized");
        assert_eq!(request.intent.as_str(), "add_workout");
        assert_eq!(request.text("exercise"), Some("running"));
        assert_eq!(request.fields["distance"], serde_json::json!(5.2));
        assert_eq!(request.integer("duration"), Some(30));
        assert_eq!(request.text("type"), Some("cardio"));
    }
}
