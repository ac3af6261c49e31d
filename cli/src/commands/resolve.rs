use kotoba_core::error::codes;

use super::AgentArgs;
use crate::util::{exit_error, print_json};

/// Print the parsed request without dispatching it. `null` when nothing matched.
pub fn run(args: &AgentArgs, text: &str) -> i32 {
    let agent = args.build();
    match agent.resolver().try_resolve(text) {
        Ok(request) => {
            print_json(&request);
            if request.is_some() { 0 } else { 2 }
        }
        Err(e) => exit_error(
            codes::FIELD_PARSE_ERROR,
            &e.to_string(),
            Some("Drop --strict to treat unparseable values as missing"),
        ),
    }
}
