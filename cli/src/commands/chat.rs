use std::io::{BufRead, Write};
use std::path::PathBuf;

use kotoba_core::RecordStore;

use super::{AgentArgs, open_store};
use crate::util::exit_error;

const QUIT: [&str; 3] = ["/quit", "/exit", "/q"];

/// Interactive transport: one message per stdin line, replies on stdout.
pub fn run(args: &AgentArgs, store: Option<PathBuf>) -> i32 {
    let agent = args.build();
    let mut store = open_store(&agent, store);
    tracing::info!(path = %store.path().display(), "chat session started");

    let stdin = std::io::stdin();
    let mut out = std::io::stdout();
    prompt(&mut out);
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => exit_error("cli_error", &format!("Failed to read stdin: {e}"), None),
        };
        let message = line.trim();
        if QUIT.contains(&message) {
            break;
        }
        if !message.is_empty() {
            reply(&agent, &mut store, message, &mut out);
        }
        prompt(&mut out);
    }
    0
}

fn reply(
    agent: &kotoba_core::Agent,
    store: &mut dyn RecordStore,
    message: &str,
    out: &mut impl Write,
) {
    match agent.handle(store, message) {
        Ok(Some(text)) => {
            let _ = writeln!(out, "{text}");
        }
        Ok(None) => {}
        Err(e) => exit_error(e.code(), &e.to_string(), None),
    }
}

fn prompt(out: &mut impl Write) {
    let _ = write!(out, "> ");
    let _ = out.flush();
}
