use serde_json::json;

use super::AgentArgs;
use crate::util::print_json;

/// Report declared samples shadowed by earlier trigger rules. Exit code 1 when any are found.
pub fn run(args: &AgentArgs) -> i32 {
    let agent = args.build();
    let findings = agent.resolver().lint();
    print_json(&json!({
        "agent": agent.name(),
        "rules": agent.rules().triggers.len(),
        "shadowed": findings,
    }));
    if findings.is_empty() { 0 } else { 1 }
}
