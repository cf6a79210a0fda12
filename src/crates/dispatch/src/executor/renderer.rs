//! Natural-language summaries of action results.
//!
//! The renderer runs a disposable two-turn conversation (system instruction
//! plus one user turn holding the original prompt and the serialised result).
//! Nothing from it is written back to the session history.

use super::guard::call_with_timeout;
use crate::action::{ActionPayload, ActionResult};
use crate::interpreter::ResponseExtractor;
use crate::prompt::{render_user_prompt, RENDER_SYSTEM_PROMPT};
use crate::{Collaborator, ProviderError};
use llm::{ChatModel, Message};
use std::sync::Arc;
use std::time::Duration;

/// Second model pass turning an [`ActionResult`] into conversational text
pub struct NaturalLanguageRenderer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    temperature: Option<f32>,
    extractor: ResponseExtractor,
}

impl NaturalLanguageRenderer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            temperature: None,
            extractor: ResponseExtractor::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Summarise `result` as an answer to `original_prompt`.
    pub async fn render(
        &self,
        original_prompt: &str,
        result: &ActionResult,
    ) -> Result<String, ProviderError> {
        let result_json = serde_json::to_string(result).map_err(|e| ProviderError::Failed {
            collaborator: Collaborator::Renderer,
            message: e.to_string(),
        })?;

        let conversation = vec![
            Message::system(RENDER_SYSTEM_PROMPT),
            Message::user(render_user_prompt(original_prompt, &result_json)),
        ];

        let text = call_with_timeout(Collaborator::Renderer, self.timeout, async {
            llm::complete(self.model.as_ref(), conversation, false, self.temperature)
                .await
                .map_err(|e| ProviderError::from_llm(Collaborator::Renderer, e))
        })
        .await?;

        let text = self.extractor.strip_reasoning(&text).trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse {
                collaborator: Collaborator::Renderer,
                message: "empty summary".to_string(),
            });
        }
        Ok(text)
    }
}

/// Deterministic summary used when no renderer is configured or it fails.
pub fn summarize(result: &ActionResult) -> String {
    match result {
        ActionResult::Failure { error } => {
            format!("The request could not be completed: {}", error)
        }
        ActionResult::Success(payload) => match payload {
            ActionPayload::Shipping { status, address } => {
                format!("Order status: {}. Shipping address: {}.", status, address)
            }
            ActionPayload::AddressChanged { new_address } => {
                format!("The shipping address is now {}.", new_address)
            }
            ActionPayload::Events { events } => {
                let titles: Vec<&str> = events
                    .iter()
                    .filter_map(|event| event.get("summary").and_then(|s| s.as_str()))
                    .collect();
                match (events.len(), titles.is_empty()) {
                    (0, _) => "There are no upcoming events.".to_string(),
                    (n, true) => format!("Found {} upcoming event(s).", n),
                    (n, false) => format!("Found {} upcoming event(s): {}.", n, titles.join(", ")),
                }
            }
            ActionPayload::EventCreated { event_id } => match event_id.as_str() {
                Some(id) => format!("Event created with id {}.", id),
                None => format!("Event created with id {}.", event_id),
            },
            ActionPayload::EventUpdated { updated_event } => {
                match updated_event.get("summary").and_then(|s| s.as_str()) {
                    Some(summary) => format!("Event \"{}\" updated.", summary),
                    None => "Event updated.".to_string(),
                }
            }
            ActionPayload::EventDeleted { deleted_event_id } => {
                format!("Event {} deleted.", deleted_event_id)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::{ChatRequest, ChatResponse, LlmError, MessageRole};
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: std::result::Result<String, ()>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(ChatResponse::from_text(text.clone())),
                Err(()) => Err(LlmError::ServiceUnavailable("down".into())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn model(reply: std::result::Result<&str, ()>) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel {
            reply: reply.map(str::to_string),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn shipped() -> ActionResult {
        ActionResult::success(ActionPayload::Shipping {
            status: "Shipped".into(),
            address: "123 Main St".into(),
        })
    }

    #[tokio::test]
    async fn test_render_uses_fresh_two_turn_conversation() {
        let model = model(Ok("<think>draft</think> Your order has shipped to 123 Main St."));
        let renderer = NaturalLanguageRenderer::new(model.clone(), Duration::from_secs(5));

        let text = renderer.render("查订单 123 状态", &shipped()).await.unwrap();
        assert_eq!(text, "Your order has shipped to 123 Main St.");

        let seen = model.seen.lock().unwrap();
        let messages = &seen[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[1].content.starts_with("User question: 查订单 123 状态\nSystem result: {"));
        assert!(messages[1].content.contains("\"address\":\"123 Main St\""));
    }

    #[tokio::test]
    async fn test_render_failure_is_provider_error() {
        let renderer = NaturalLanguageRenderer::new(model(Err(())), Duration::from_secs(5));
        let err = renderer.render("hi", &shipped()).await.unwrap_err();
        assert_eq!(err.collaborator(), Collaborator::Renderer);
    }

    #[tokio::test]
    async fn test_empty_summary_is_rejected() {
        let renderer = NaturalLanguageRenderer::new(
            model(Ok("<think>only thoughts</think>")),
            Duration::from_secs(5),
        );
        assert!(matches!(
            renderer.render("hi", &shipped()).await,
            Err(ProviderError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_summaries() {
        assert_eq!(
            summarize(&shipped()),
            "Order status: Shipped. Shipping address: 123 Main St."
        );
        assert_eq!(
            summarize(&ActionResult::failure("Order not found")),
            "The request could not be completed: Order not found"
        );
        assert_eq!(
            summarize(&ActionResult::success(ActionPayload::Events {
                events: vec![json!({"summary": "Standup"}), json!({"id": "x"})]
            })),
            "Found 2 upcoming event(s): Standup."
        );
        assert_eq!(
            summarize(&ActionResult::success(ActionPayload::EventCreated {
                event_id: json!("evt-1")
            })),
            "Event created with id evt-1."
        );
    }
}
