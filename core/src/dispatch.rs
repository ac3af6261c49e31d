//! Routes a `ParsedRequest` to the handler registered for its intent.
//!
//! Every intent of a rule set gets a built-in handler for its declared action.
//! Library users can replace any of them with `Dispatcher::register`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use crate::dates::{self, Clock};
use crate::definition::ActionKind;
use crate::error::{FieldParseError, StoreError, codes};
use crate::request::{Fields, IntentTag, ParsedRequest};
use crate::rules::{FieldKind, IntentRule, RuleSet};
use crate::store::{Record, RecordId, RecordStore};

/// Handler-level failures. Rendered as replies, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum Failure {
    MissingRequiredField { field: String },
    NotFound { id: RecordId },
    InvalidField(FieldParseError),
    UnknownIntent { intent: IntentTag },
}

impl Failure {
    pub fn code(&self) -> &'static str {
        match self {
            Failure::MissingRequiredField { .. } => codes::MISSING_REQUIRED_FIELD,
            Failure::NotFound { .. } => codes::NOT_FOUND,
            Failure::InvalidField(_) => codes::FIELD_PARSE_ERROR,
            Failure::UnknownIntent { .. } => codes::NO_INTENT_MATCHED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsGroup {
    pub key: String,
    pub count: usize,
    pub totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Created {
        id: RecordId,
        fields: Fields,
    },
    Updated {
        id: RecordId,
        fields: Fields,
    },
    Deleted {
        id: RecordId,
    },
    Detail {
        record: Record,
    },
    Listing {
        records: Vec<Record>,
        filters: Fields,
        keyword: Option<String>,
    },
    Stats {
        count: usize,
        totals: BTreeMap<String, f64>,
        groups: Vec<StatsGroup>,
    },
    Failed {
        failure: Failure,
    },
}

impl Outcome {
    pub fn failed(failure: Failure) -> Self {
        Outcome::Failed { failure }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::failed(Failure::MissingRequiredField {
            field: field.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub intent: IntentTag,
    pub outcome: Outcome,
}

/// What a handler gets besides the request itself.
pub struct HandlerContext<'a> {
    pub store: &'a mut dyn RecordStore,
    pub intent: &'a IntentRule,
    pub rules: &'a RuleSet,
    pub now: NaiveDateTime,
}

pub trait Handler: Send + Sync {
    fn handle(
        &self,
        ctx: &mut HandlerContext<'_>,
        request: &ParsedRequest,
    ) -> Result<Outcome, StoreError>;
}

/// Built-in handler for one declarative action.
#[derive(Debug, Clone, Copy)]
pub struct ActionHandler(pub ActionKind);

impl Handler for ActionHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext<'_>,
        request: &ParsedRequest,
    ) -> Result<Outcome, StoreError> {
        match self.0 {
            ActionKind::Create => create(ctx, request),
            ActionKind::Update => update(ctx, request),
            ActionKind::Delete => delete(ctx, request),
            ActionKind::Show => show(ctx, request),
            ActionKind::List => list(ctx, request),
            ActionKind::Search => search(ctx, request),
            ActionKind::Stats => stats(ctx, request),
        }
    }
}

pub struct Dispatcher {
    rules: Arc<RuleSet>,
    clock: Arc<dyn Clock>,
    handlers: HashMap<IntentTag, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(rules: Arc<RuleSet>, clock: Arc<dyn Clock>) -> Self {
        let handlers = rules
            .intents
            .values()
            .map(|intent| {
                let handler: Arc<dyn Handler> = Arc::new(ActionHandler(intent.action));
                (intent.tag.clone(), handler)
            })
            .collect();
        Self {
            rules,
            clock,
            handlers,
        }
    }

    /// Replace the handler for `intent`.
    pub fn register(&mut self, intent: IntentTag, handler: Arc<dyn Handler>) {
        self.handlers.insert(intent, handler);
    }

    pub fn dispatch(
        &self,
        store: &mut dyn RecordStore,
        request: &ParsedRequest,
    ) -> Result<Response, StoreError> {
        let (Some(intent), Some(handler)) = (
            self.rules.intent(&request.intent),
            self.handlers.get(&request.intent),
        ) else {
            return Ok(Response {
                intent: request.intent.clone(),
                outcome: Outcome::failed(Failure::UnknownIntent {
                    intent: request.intent.clone(),
                }),
            });
        };

        let mut ctx = HandlerContext {
            store,
            intent,
            rules: &self.rules,
            now: self.clock.now(),
        };
        let outcome = handler.handle(&mut ctx, request)?;
        match &outcome {
            Outcome::Failed { failure } => tracing::debug!(
                intent = %request.intent,
                code = failure.code(),
                "handler rejected request"
            ),
            _ => tracing::debug!(intent = %request.intent, "handler succeeded"),
        }
        Ok(Response {
            intent: request.intent.clone(),
            outcome,
        })
    }
}

/// First required field that is still null.
fn missing_required(intent: &IntentRule, fields: &Fields) -> Option<String> {
    intent
        .field_rules
        .iter()
        .filter(|rule| rule.required)
        .find(|rule| fields.get(&rule.canonical_key).is_none_or(Value::is_null))
        .map(|rule| rule.canonical_key.clone())
}

fn provided(request: &ParsedRequest) -> Fields {
    request
        .provided()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn with_fixed(intent: &IntentRule, mut fields: Fields) -> Fields {
    for (key, value) in &intent.fixed {
        fields.insert(key.clone(), value.clone());
    }
    fields
}

fn create(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let mut fields = with_fixed(ctx.intent, request.fields.clone());
    for rule in &ctx.intent.field_rules {
        let unset = fields.get(&rule.canonical_key).is_none_or(Value::is_null);
        let Some(default) = rule.default.as_ref().filter(|_| unset) else {
            continue;
        };
        let value = match (&rule.kind, default) {
            (FieldKind::Date, Value::String(token)) => dates::normalize(token, ctx.now)
                .map(Value::String)
                .unwrap_or(Value::Null),
            _ => default.clone(),
        };
        fields.insert(rule.canonical_key.clone(), value);
    }
    if let Some(field) = missing_required(ctx.intent, &fields) {
        return Ok(Outcome::missing(field));
    }
    let id = ctx.store.create(&fields)?;
    Ok(Outcome::Created { id, fields })
}

fn record_id(ctx: &HandlerContext<'_>, request: &ParsedRequest) -> Result<RecordId, Outcome> {
    if let Some(field) = missing_required(ctx.intent, &request.fields) {
        return Err(Outcome::missing(field));
    }
    request.integer("id").ok_or_else(|| match request.field("id") {
        Some(raw) => Outcome::failed(Failure::InvalidField(FieldParseError {
            field: "id".to_string(),
            raw: raw.to_string(),
        })),
        None => Outcome::missing("id"),
    })
}

fn update(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let id = match record_id(ctx, request) {
        Ok(id) => id,
        Err(outcome) => return Ok(outcome),
    };
    let mut changes = with_fixed(ctx.intent, provided(request));
    changes.remove("id");
    if !ctx.store.update(id, &changes)? {
        return Ok(Outcome::failed(Failure::NotFound { id }));
    }
    Ok(Outcome::Updated {
        id,
        fields: changes,
    })
}

fn delete(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let id = match record_id(ctx, request) {
        Ok(id) => id,
        Err(outcome) => return Ok(outcome),
    };
    if !ctx.store.delete(id)? {
        return Ok(Outcome::failed(Failure::NotFound { id }));
    }
    Ok(Outcome::Deleted { id })
}

fn show(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let id = match record_id(ctx, request) {
        Ok(id) => id,
        Err(outcome) => return Ok(outcome),
    };
    match ctx.store.get(id)? {
        Some(record) => Ok(Outcome::Detail { record }),
        None => Ok(Outcome::failed(Failure::NotFound { id })),
    }
}

fn list(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    if let Some(field) = missing_required(ctx.intent, &request.fields) {
        return Ok(Outcome::missing(field));
    }
    let filters = with_fixed(ctx.intent, provided(request));
    let records = ctx.store.list(&filters)?;
    Ok(Outcome::Listing {
        records,
        filters,
        keyword: None,
    })
}

fn search(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let Some(primary) = ctx.intent.primary() else {
        return Ok(Outcome::missing("keyword"));
    };
    let Some(keyword) = request.text(&primary.canonical_key).map(str::to_string) else {
        return Ok(Outcome::missing(primary.canonical_key.clone()));
    };
    let filters = with_fixed(ctx.intent, Fields::new());
    let records = ctx
        .store
        .search(&keyword)?
        .into_iter()
        .filter(|record| record.matches(&filters))
        .collect();
    Ok(Outcome::Listing {
        records,
        filters,
        keyword: Some(keyword),
    })
}

fn stats(ctx: &mut HandlerContext<'_>, request: &ParsedRequest) -> Result<Outcome, StoreError> {
    let filters = with_fixed(ctx.intent, provided(request));
    let records = ctx.store.list(&filters)?;
    let numeric: Vec<&str> = ctx
        .rules
        .catalog
        .iter()
        .filter(|rule| rule.kind.is_numeric() && rule.canonical_key != "id")
        .map(|rule| rule.canonical_key.as_str())
        .collect();

    let totals = sum_fields(&records, &numeric);
    let mut groups = Vec::new();
    if let Some(group_by) = ctx.intent.group_by.as_deref() {
        let mut buckets: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
        for record in &records {
            let key = match record.get(group_by) {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            buckets.entry(key).or_default().push(record);
        }
        for (key, members) in buckets {
            groups.push(StatsGroup {
                count: members.len(),
                totals: sum_fields(members.iter().copied(), &numeric),
                key,
            });
        }
    }

    Ok(Outcome::Stats {
        count: records.len(),
        totals,
        groups,
    })
}

fn sum_fields<'r>(
    records: impl IntoIterator<Item = &'r Record>,
    keys: &[&str],
) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in records {
        for key in keys {
            if let Some(value) = record.number(key) {
                *totals.entry((*key).to_string()).or_insert(0.0) += value;
            }
        }
    }
    totals
}
