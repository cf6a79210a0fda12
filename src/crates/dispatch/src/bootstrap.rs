//! Building a [`Dispatcher`] from configuration

use crate::action::{ActionRegistry, Domain, ExecutionPolicy};
use crate::config::{DispatchConfig, ModelProvider};
use crate::context::SessionStore;
use crate::domain::{CalendarService, InMemoryOrderStore, McpCalendarProvider, OrderService};
use crate::executor::{Dispatcher, DispatcherSettings, NaturalLanguageRenderer, RetryConfig};
use crate::{DispatchError, Result};
use llm::local::OllamaClient;
use llm::remote::DeepseekClient;
use llm::{ChatModel, LocalLlmConfig, RemoteLlmConfig};
use std::sync::Arc;

/// Build the configured model client, dispatcher and handlers.
pub fn build_dispatcher(config: &DispatchConfig) -> Result<Dispatcher> {
    let model = build_model(config)?;
    build_dispatcher_with_model(config, model)
}

/// Like [`build_dispatcher`] with a caller-supplied model.
pub fn build_dispatcher_with_model(
    config: &DispatchConfig,
    model: Arc<dyn ChatModel>,
) -> Result<Dispatcher> {
    let registry = build_registry(config)?;
    let sessions = Arc::new(SessionStore::new(
        config.idle_timeout(),
        config.sessions.max_turns,
    ));

    let settings = DispatcherSettings {
        temperature: config.model.temperature,
        json_mode: config.model.json_mode,
        model_timeout: config.model_timeout(),
        model_retry: RetryConfig::new(config.pipeline.model_attempts.saturating_sub(1))
            .with_initial_backoff(config.pipeline.retry_backoff_ms),
        default_calendar_id: config.calendar.default_calendar_id.clone(),
    };

    let mut dispatcher =
        Dispatcher::new(Arc::clone(&model), registry, sessions).with_settings(settings);

    if config.pipeline.render {
        let mut renderer = NaturalLanguageRenderer::new(model, config.render_timeout());
        if let Some(temperature) = config.model.temperature {
            renderer = renderer.with_temperature(temperature);
        }
        dispatcher = dispatcher.with_renderer(renderer);
    }

    tracing::info!(
        provider = %config.model.provider,
        model = %config.model.model,
        domains = ?dispatcher.registry().enabled_domains(),
        render = config.pipeline.render,
        "Dispatcher ready"
    );
    Ok(dispatcher)
}

/// Chat-model client for `config.model`
pub fn build_model(config: &DispatchConfig) -> Result<Arc<dyn ChatModel>> {
    let model_config = &config.model;
    let timeout = config.model_timeout();

    let model: Arc<dyn ChatModel> = match model_config.provider {
        ModelProvider::Deepseek => {
            let remote = RemoteLlmConfig::from_env(
                &model_config.api_key_env,
                &model_config.base_url,
                &model_config.model,
            )
            .map_err(|e| DispatchError::Config(e.to_string()))?
            .with_timeout(timeout);
            Arc::new(DeepseekClient::new(remote).map_err(|e| DispatchError::Config(e.to_string()))?)
        }
        ModelProvider::Ollama => {
            let local = LocalLlmConfig::new(&model_config.base_url, &model_config.model)
                .with_timeout(timeout);
            Arc::new(OllamaClient::new(local).map_err(|e| DispatchError::Config(e.to_string()))?)
        }
    };
    Ok(model)
}

/// Registry with a handler for every enabled domain
pub fn build_registry(config: &DispatchConfig) -> Result<ActionRegistry> {
    let mut registry = ActionRegistry::new().with_policy(ExecutionPolicy {
        action_timeout: config.action_timeout(),
        read_retries: config.pipeline.read_retries,
        retry_backoff_ms: config.pipeline.retry_backoff_ms,
    });

    if config.domains.orders {
        let store = Arc::new(InMemoryOrderStore::seeded());
        registry.register(Domain::Orders, Arc::new(OrderService::new(store)));
    }

    if config.domains.calendar {
        let provider =
            McpCalendarProvider::new(&config.calendar.provider_url, config.calendar_timeout())?;
        tracing::info!(endpoint = %provider.endpoint(), "Calendar provider configured");
        registry.register(Domain::Calendar, Arc::new(CalendarService::new(Arc::new(provider))));
    }

    Ok(registry)
}
