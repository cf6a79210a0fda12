//! Shared test doubles for the dispatch integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dispatch::action::{ActionRegistry, Domain};
use dispatch::context::SessionStore;
use dispatch::domain::{
    CalendarProvider, CalendarService, CalendarTool, InMemoryOrderStore, OrderService,
};
use dispatch::{Collaborator, Dispatcher, ProviderError};
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock LLM answering from a FIFO script.
///
/// Once the script runs out every call fails with `ServiceUnavailable`.
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedChatModel {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// A model that sleeps for `delay` before every reply
    pub fn slow(delay: Duration, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([reply.to_string()])),
            requests: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.map(ChatResponse::from_text)
            .ok_or_else(|| LlmError::ServiceUnavailable("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Calendar provider recording every tool call
pub struct MockCalendar {
    calls: Mutex<Vec<(CalendarTool, Value)>>,
    response: Result<Value, ProviderError>,
}

impl MockCalendar {
    pub fn returning(data: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Ok(data),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Err(ProviderError::Failed {
                collaborator: Collaborator::Calendar,
                message: message.to_string(),
            }),
        })
    }

    pub fn calls(&self) -> Vec<(CalendarTool, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn invoke_tool(
        &self,
        tool: CalendarTool,
        arguments: Value,
    ) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push((tool, arguments));
        self.response.clone()
    }
}

/// Both domains registered: seeded orders and the given calendar
pub fn registry(store: Arc<InMemoryOrderStore>, calendar: Arc<MockCalendar>) -> ActionRegistry {
    ActionRegistry::new()
        .with_domain(Domain::Orders, Arc::new(OrderService::new(store)))
        .with_domain(Domain::Calendar, Arc::new(CalendarService::new(calendar)))
}

pub fn dispatcher(
    model: Arc<ScriptedChatModel>,
    store: Arc<InMemoryOrderStore>,
    calendar: Arc<MockCalendar>,
) -> Dispatcher {
    Dispatcher::new(
        model,
        registry(store, calendar),
        Arc::new(SessionStore::new(Duration::from_secs(600), 20)),
    )
}

/// Model reply carrying one function call
pub fn call_reply(name: &str, arguments: Value) -> String {
    serde_json::json!({"function_call": {"name": name, "arguments": arguments}}).to_string()
}
