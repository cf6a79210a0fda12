//! Request pipeline: prompt in, answer out.
//!
//! ```text
//! RECEIVED -> MODEL_CALLED -> EXTRACTED -> VALIDATED -> EXECUTED -> [RENDERED] -> RESPONDED
//!                  |              |            |
//!                  +--------------+------------+--> ERROR
//! ```
//!
//! The session lock is held only while the user turn is appended and the
//! history copied. The model call works on that copy.

use super::guard::call_with_timeout;
use super::pipeline::{PipelineStage, PipelineTrace};
use super::renderer::{summarize, NaturalLanguageRenderer};
use super::retry::{retry_with_backoff, RetryConfig};
use crate::action::{ActionName, ActionRegistry, ActionResult, Arguments};
use crate::context::SessionStore;
use crate::interpreter::{CallValidator, Extraction, ResponseExtractor};
use crate::logging::timed;
use crate::prompt::{clarification_message, system_prompt};
use crate::{Collaborator, DispatchError, ProviderError, Result};
use llm::{ChatModel, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Knobs for the intent model call
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub temperature: Option<f32>,
    pub json_mode: bool,
    pub model_timeout: Duration,
    /// Retries apply to transient model failures only
    pub model_retry: RetryConfig,
    /// Calendar used when neither the model nor the request names one
    pub default_calendar_id: Option<String>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            temperature: None,
            json_mode: false,
            model_timeout: Duration::from_secs(30),
            model_retry: RetryConfig::none(),
            default_calendar_id: None,
        }
    }
}

/// One inbound prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub session_id: Option<String>,
    pub text: String,
    pub calendar_id: Option<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            session_id: None,
            text: text.into(),
            calendar_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }
}

/// Outcome of a request that reached `RESPONDED`
#[derive(Debug, Clone)]
pub struct QueryReply {
    pub session_id: String,
    pub request_id: String,
    /// Text for the user: a rendered summary or a clarification request
    pub message: String,
    /// Handler output, absent when no action ran
    pub data: Option<ActionResult>,
    pub action: Option<ActionName>,
    pub trace: PipelineTrace,
}

/// Turns natural-language prompts into executed actions
pub struct Dispatcher {
    model: Arc<dyn ChatModel>,
    renderer: Option<NaturalLanguageRenderer>,
    registry: ActionRegistry,
    sessions: Arc<SessionStore>,
    extractor: ResponseExtractor,
    settings: DispatcherSettings,
    system_prompt: String,
    clarification: String,
}

impl Dispatcher {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: ActionRegistry,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let system_prompt = system_prompt(&registry);
        let clarification = clarification_message(&registry);
        Self {
            model,
            renderer: None,
            registry,
            sessions,
            extractor: ResponseExtractor::new(),
            settings: DispatcherSettings::default(),
            system_prompt,
            clarification,
        }
    }

    pub fn with_settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Summarise results with a second model pass
    pub fn with_renderer(mut self, renderer: NaturalLanguageRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_extractor(mut self, extractor: ResponseExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Whether the model provider answers its health probe
    pub async fn model_available(&self) -> bool {
        match self.model.is_available().await {
            Ok(available) => available,
            Err(err) => {
                tracing::warn!(
                    model = self.model.name(),
                    error = %err,
                    "Model health probe failed"
                );
                false
            }
        }
    }

    /// Run one prompt through the pipeline.
    ///
    /// A handler that reports failure still produces `Ok`, with
    /// `data.success == false`. `Err` is reserved for requests that never
    /// reached a handler.
    pub async fn handle(&self, request: QueryRequest) -> Result<QueryReply> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }

        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request_id = Uuid::new_v4().to_string();

        let span = tracing::info_span!("query", session_id = %session_id, request_id = %request_id);
        self.run(session_id, request_id, text, request.calendar_id.as_deref())
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        session_id: String,
        request_id: String,
        text: &str,
        calendar_id: Option<&str>,
    ) -> Result<QueryReply> {
        let mut trace = PipelineTrace::new();
        tracing::info!(chars = text.chars().count(), "Received prompt");

        // The user turn stays in history even if a later stage fails.
        let history = {
            let state = self.sessions.checkout(&session_id);
            let mut state = state.lock().await;
            state.ensure_system(&self.system_prompt);
            state.push_user(text);
            state.turns().to_vec()
        };

        trace.advance(PipelineStage::ModelCalled)?;
        let raw = match timed("model_call", self.call_model(history)).await {
            Ok(raw) => raw,
            Err(err) => return Err(fail(&mut trace, err.into())),
        };

        trace.advance(PipelineStage::Extracted)?;
        let call = match self.extractor.extract(&raw) {
            Ok(Extraction::Call(call)) => call,
            Ok(Extraction::NoActionableIntent) => {
                tracing::info!("No actionable intent, asking for clarification");
                trace.advance(PipelineStage::Responded)?;
                return Ok(QueryReply {
                    session_id,
                    request_id,
                    message: self.clarification.clone(),
                    data: None,
                    action: None,
                    trace,
                });
            }
            Err(err) => return Err(fail(&mut trace, err.into())),
        };

        let validated = match CallValidator::new(&self.registry)
            .with_defaults(self.defaults(calendar_id))
            .validate(call)
        {
            Ok(validated) => validated,
            Err(err) => return Err(fail(&mut trace, err)),
        };
        trace.advance(PipelineStage::Validated)?;

        let action = validated.action();
        tracing::info!(%action, "Dispatching action");
        let result = timed(action.as_str(), self.registry.dispatch(&validated)).await;
        trace.advance(PipelineStage::Executed)?;
        tracing::info!(%action, success = result.is_success(), "Action finished");

        let message = match self.render(text, &result).await {
            Some(rendered) => {
                trace.advance(PipelineStage::Rendered)?;
                rendered
            }
            None => summarize(&result),
        };
        trace.advance(PipelineStage::Responded)?;

        Ok(QueryReply {
            session_id,
            request_id,
            message,
            data: Some(result),
            action: Some(action),
            trace,
        })
    }

    async fn call_model(
        &self,
        history: Vec<Message>,
    ) -> std::result::Result<String, ProviderError> {
        let model = self.model.as_ref();
        let settings = &self.settings;

        retry_with_backoff(&settings.model_retry, model.name(), || {
            let history = history.clone();
            call_with_timeout(Collaborator::Model, settings.model_timeout, async move {
                llm::complete(model, history, settings.json_mode, settings.temperature)
                    .await
                    .map_err(|e| ProviderError::from_llm(Collaborator::Model, e))
            })
        })
        .await
    }

    async fn render(&self, original_prompt: &str, result: &ActionResult) -> Option<String> {
        let renderer = self.renderer.as_ref()?;
        match renderer.render(original_prompt, result).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "Renderer failed, using plain summary");
                None
            }
        }
    }

    /// Request-level argument defaults; the request's calendar wins over config.
    fn defaults(&self, calendar_id: Option<&str>) -> Arguments {
        let calendar = calendar_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(self.settings.default_calendar_id.as_deref());

        calendar
            .map(|id| Arguments::from([("calendar_id".to_string(), id.to_string())]))
            .unwrap_or_default()
    }
}

/// Record `err` on the trace and hand it back.
fn fail(trace: &mut PipelineTrace, err: DispatchError) -> DispatchError {
    tracing::warn!(stage = %trace.current(), kind = err.kind(), error = %err, "Request failed");
    if let Err(transition) = trace.advance(PipelineStage::Error) {
        tracing::error!(error = %transition, "Could not record failure on trace");
    }
    err
}
