use kotoba_core::builtin;
use kotoba_core::error::codes;
use serde_json::json;

use crate::util::{exit_error, print_json};

/// Built-in agents with their intents (in trigger order) and sample messages.
pub fn run() -> i32 {
    let mut agents = Vec::new();
    for name in builtin::names() {
        let rules = builtin::rule_set(name)
            .unwrap_or_else(|e| exit_error(codes::INVALID_DEFINITION, &e.to_string(), None));

        let mut seen = Vec::new();
        let mut intents = Vec::new();
        for trigger in &rules.triggers {
            if seen.contains(&&trigger.intent) {
                continue;
            }
            seen.push(&trigger.intent);
            if let Some(intent) = rules.intent(&trigger.intent) {
                intents.push(json!({
                    "intent": intent.tag,
                    "action": intent.action,
                    "samples": intent.samples,
                }));
            }
        }
        agents.push(json!({
            "name": rules.name,
            "display": rules.display,
            "intents": intents,
        }));
    }
    print_json(&agents);
    0
}
