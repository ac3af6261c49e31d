use kotoba_core::dates::{self, Clock, SystemClock};
use serde_json::json;

use super::AgentArgs;
use crate::util::print_json;

pub fn run(args: &AgentArgs, token: &str) -> i32 {
    let config = args.config();
    let now = SystemClock::new(config.timezone).now();
    let date = dates::normalize(token, now);
    print_json(&json!({
        "token": token,
        "date": date,
        "timezone": config.timezone.name(),
    }));
    if date.is_some() { 0 } else { 2 }
}
