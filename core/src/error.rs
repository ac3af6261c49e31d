use serde::Serialize;
use thiserror::Error;

/// Machine-readable codes shared by replies, logs and the CLI's JSON output.
pub mod codes {
    pub const NO_INTENT_MATCHED: &str = "no_intent_matched";
    pub const MISSING_REQUIRED_FIELD: &str = "missing_required_field";
    pub const NOT_FOUND: &str = "not_found";
    pub const FIELD_PARSE_ERROR: &str = "field_parse_error";
    pub const INVALID_DEFINITION: &str = "invalid_definition";
    pub const STORE_ERROR: &str = "store_error";
}

/// A rule set could not be compiled from its agent definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid JSON agent definition: {0}")]
    Json(#[from] serde_json::Error),
    #[error("intent `{intent}` has an invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        intent: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("field `{field}` has an invalid value pattern: {source}")]
    InvalidValuePattern {
        field: String,
        #[source]
        source: regex::Error,
    },
    #[error("intent `{intent}` references unknown field `{field}`")]
    UnknownField { intent: String, field: String },
    #[error("field `{field}` references unknown enum `{name}`")]
    UnknownEnum { field: String, name: String },
    #[error("enum `{name}` default `{default}` is not one of its values")]
    UnknownEnumDefault { name: String, default: String },
    #[error("intent `{0}` is declared more than once")]
    DuplicateIntent(String),
    #[error("intent `{0}` declares no trigger patterns")]
    NoPatterns(String),
    #[error("field `{0}` declares no synonyms")]
    NoSynonyms(String),
    #[error("intent `{intent}` needs a primary field for the `{action}` action")]
    MissingPrimary { intent: String, action: String },
    #[error("unknown built-in agent `{0}`")]
    UnknownAgent(String),
}

/// A labelled field was present but its value could not be interpreted.
/// Only produced in strict extraction mode.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("could not parse field `{field}` from `{raw}`")]
pub struct FieldParseError {
    /// Canonical key of the offending field
    pub field: String,
    /// The raw substring found after the label
    pub raw: String,
}

/// Failure reported by the CRUD collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("store rejected the operation: {0}")]
    Rejected(String),
}

/// Errors that escape `Agent::handle`. Everything user-facing is rendered as a reply instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Store(_) => codes::STORE_ERROR,
        }
    }
}
