use std::path::PathBuf;

use super::{AgentArgs, open_store};
use crate::util::exit_error;

/// One message in, one reply out. Exit code 2 when the message is not a command.
pub fn run(args: &AgentArgs, text: &str, store: Option<PathBuf>) -> i32 {
    let agent = args.build();
    let mut store = open_store(&agent, store);
    match agent.handle(&mut store, text) {
        Ok(Some(reply)) => {
            println!("{reply}");
            0
        }
        Ok(None) => 2,
        Err(e) => exit_error(e.code(), &e.to_string(), None),
    }
}
