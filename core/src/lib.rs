//! Bilingual (Japanese/English) chat-command intent resolution.
//!
//! A chat message flows through the [`Resolver`] (trigger rules and field
//! extraction), the [`Dispatcher`] (built-in or custom handlers over a
//! [`RecordStore`]) and the [`Formatter`] (bilingual reply text). [`Agent`]
//! wires the three together for one agent definition.

pub mod agent;
pub mod builtin;
pub mod config;
pub mod dates;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod format;
pub mod request;
pub mod resolver;
pub mod rules;
pub mod store;

pub use agent::Agent;
pub use config::EngineConfig;
pub use dispatch::{Dispatcher, Handler, HandlerContext, Outcome, Response};
pub use error::{AgentError, DefinitionError, FieldParseError, StoreError};
pub use format::{Formatter, Locale, LocaleHint};
pub use request::{Fields, IntentTag, ParsedRequest};
pub use resolver::{ResolveStrategy, Resolver};
pub use rules::RuleSet;
pub use store::{MemoryStore, Record, RecordId, RecordStore};
