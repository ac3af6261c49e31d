//! One chat agent: resolver, dispatcher and formatter over a single rule set.

use std::sync::Arc;

use uuid::Uuid;

use crate::builtin;
use crate::config::EngineConfig;
use crate::dates::{Clock, SystemClock};
use crate::dispatch::{Dispatcher, Failure, Handler, Response};
use crate::error::{AgentError, DefinitionError};
use crate::format::{Formatter, LocaleHint};
use crate::request::{IntentTag, ParsedRequest};
use crate::resolver::Resolver;
use crate::rules::RuleSet;
use crate::store::RecordStore;

pub struct Agent {
    rules: Arc<RuleSet>,
    resolver: Resolver,
    dispatcher: Dispatcher,
    formatter: Formatter,
    locale: LocaleHint,
}

impl Agent {
    pub fn new(rules: RuleSet, config: &EngineConfig) -> Self {
        Self::with_clock(rules, config, Arc::new(SystemClock::new(config.timezone)))
    }

    pub fn with_clock(rules: RuleSet, config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let rules = Arc::new(rules);
        let resolver = Resolver::new(Arc::clone(&rules), Arc::clone(&clock))
            .with_strategy(config.strategy)
            .with_mode(config.mode);
        for finding in resolver.lint() {
            tracing::warn!(
                agent = %rules.name,
                sample = %finding.sample,
                expected = %finding.expected,
                actual = finding.actual.as_ref().map(IntentTag::as_str).unwrap_or("none"),
                "sample is shadowed by an earlier trigger rule"
            );
        }
        let formatter = Formatter::new(Arc::clone(&rules))
            .with_truncate_chars(config.truncate_chars)
            .with_list_cap(config.list_cap);
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&rules), clock),
            rules,
            resolver,
            formatter,
            locale: config.locale,
        }
    }

    pub fn builtin(name: &str, config: &EngineConfig) -> Result<Self, DefinitionError> {
        Ok(Self::new(builtin::rule_set(name)?, config))
    }

    pub fn from_json(raw: &str, config: &EngineConfig) -> Result<Self, DefinitionError> {
        Ok(Self::new(RuleSet::from_json(raw)?, config))
    }

    pub fn name(&self) -> &str {
        &self.rules.name
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Replace the built-in handler of one intent.
    pub fn register_handler(&mut self, intent: impl Into<IntentTag>, handler: Arc<dyn Handler>) {
        self.dispatcher.register(intent.into(), handler);
    }

    /// Dispatch an already parsed request without rendering a reply.
    pub fn respond(
        &self,
        store: &mut dyn RecordStore,
        request: &ParsedRequest,
    ) -> Result<Response, AgentError> {
        Ok(self.dispatcher.dispatch(store, request)?)
    }

    /// Handle one chat message. `Ok(None)` means the message is not a command.
    pub fn handle(
        &self,
        store: &mut dyn RecordStore,
        text: &str,
    ) -> Result<Option<String>, AgentError> {
        let request_id = Uuid::now_v7();
        let span = tracing::info_span!("handle_message", agent = %self.rules.name, %request_id);
        let _guard = span.enter();

        let request = match self.resolver.try_resolve(text) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!("message ignored");
                return Ok(None);
            }
            Err(err) => {
                tracing::info!(field = %err.field, raw = %err.raw, "rejected unparseable field");
                let locale = self.locale.resolve(&self.rules, text);
                return Ok(Some(self.formatter.failure(&Failure::InvalidField(err), locale)));
            }
        };

        let response = self.respond(store, &request)?;
        tracing::info!(intent = %response.intent, "handled message");
        Ok(Some(self.formatter.format(&response, self.locale, text)))
    }
}
