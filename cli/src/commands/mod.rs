pub mod agents;
pub mod chat;
pub mod date;
pub mod lint;
pub mod resolve;
pub mod say;

use std::path::PathBuf;

use clap::Args;
use kotoba_core::error::codes;
use kotoba_core::extract::ExtractMode;
use kotoba_core::{Agent, EngineConfig, LocaleHint, ResolveStrategy, RuleSet, builtin};

use crate::store::JsonFileStore;
use crate::util::{exit_error, read_text, store_path};

/// Flags shared by every command that runs an agent.
#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    /// Built-in agent (ledger, fitness, events)
    #[arg(long, env = "KOTOBA_AGENT", default_value = "ledger", global = true)]
    pub agent: String,
    /// Custom agent definition file (JSON, '-' for stdin). Overrides --agent.
    #[arg(long, env = "KOTOBA_RULES", global = true)]
    pub rules: Option<String>,
    /// Reply language: ja, en, both or auto
    #[arg(long, global = true)]
    pub locale: Option<String>,
    /// Reject labelled values that do not parse instead of dropping them
    #[arg(long, global = true)]
    pub strict: bool,
    /// Trigger rule strategy: first_match or most_specific
    #[arg(long, global = true)]
    pub strategy: Option<String>,
    /// IANA time zone for relative dates (e.g. Asia/Tokyo)
    #[arg(long, global = true)]
    pub timezone: Option<String>,
}

impl AgentArgs {
    /// Environment settings with command-line overrides applied.
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(raw) = &self.locale {
            config.locale = LocaleHint::parse(raw).unwrap_or_else(|| {
                exit_error(
                    "cli_error",
                    &format!("Unknown locale '{raw}'"),
                    Some("Use one of: ja, en, both, auto"),
                )
            });
        }
        if self.strict {
            config.mode = ExtractMode::Strict;
        }
        if let Some(raw) = &self.strategy {
            config.strategy = ResolveStrategy::parse(raw).unwrap_or_else(|| {
                exit_error(
                    "cli_error",
                    &format!("Unknown strategy '{raw}'"),
                    Some("Use one of: first_match, most_specific"),
                )
            });
        }
        if let Some(raw) = &self.timezone {
            config.timezone = raw.parse().unwrap_or_else(|_| {
                exit_error(
                    "cli_error",
                    &format!("Unknown time zone '{raw}'"),
                    Some("Use an IANA zone name such as Asia/Tokyo"),
                )
            });
        }
        config
    }

    pub fn rule_set(&self) -> RuleSet {
        let result = match &self.rules {
            Some(path) => {
                let raw = read_text(path).unwrap_or_else(|e| exit_error("cli_error", &e, None));
                RuleSet::from_json(&raw)
            }
            None => builtin::rule_set(&self.agent),
        };
        result.unwrap_or_else(|e| {
            exit_error(
                codes::INVALID_DEFINITION,
                &e.to_string(),
                Some("Run `kotoba agents` to see the built-in agents"),
            )
        })
    }

    pub fn build(&self) -> Agent {
        let agent = Agent::new(self.rule_set(), &self.config());
        tracing::info!(agent = agent.name(), intents = agent.rules().intents.len(), "agent ready");
        agent
    }
}

/// Persistent record file for `agent`, or the explicit `path`.
pub fn open_store(agent: &Agent, path: Option<PathBuf>) -> JsonFileStore {
    let path = path.unwrap_or_else(|| store_path(agent.name()));
    JsonFileStore::open(&path).unwrap_or_else(|e| {
        exit_error(
            codes::STORE_ERROR,
            &e.to_string(),
            Some("Pass --store with a writable JSON file path"),
        )
    })
}
