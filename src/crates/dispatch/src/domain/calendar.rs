//! Calendar domain: thin adapters over an external calendar provider.
//!
//! Events are owned by the provider. These handlers only shape arguments
//! into the provider's tool vocabulary and turn provider failures into
//! `{success:false}` results; nothing is cached locally.

use crate::action::{ActionHandler, ActionName, ActionPayload, ActionResult, ValidatedCall};
use crate::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Tools exposed by the calendar provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarTool {
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

impl CalendarTool {
    /// Tool name on the provider side
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarTool::ListEvents => "list_events",
            CalendarTool::CreateEvent => "create-event",
            CalendarTool::UpdateEvent => "update-event",
            CalendarTool::DeleteEvent => "delete-event",
        }
    }
}

impl fmt::Display for CalendarTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The calendar backend, consumed as `invoke_tool(name, arguments) -> data`
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Invoke `tool` and return the `data` part of its result.
    async fn invoke_tool(
        &self,
        tool: CalendarTool,
        arguments: Value,
    ) -> Result<Value, ProviderError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsArgs<'a> {
    calendar_id: &'a str,
    time_min: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventArgs<'a> {
    calendar_id: &'a str,
    summary: &'a str,
    description: &'a str,
    start: &'a str,
    end: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEventArgs<'a> {
    calendar_id: &'a str,
    event_id: &'a str,
    summary: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEventArgs<'a> {
    calendar_id: &'a str,
    event_id: &'a str,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Handlers for the calendar actions
pub struct CalendarService {
    provider: Arc<dyn CalendarProvider>,
    clock: Clock,
}

impl CalendarService {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self {
            provider,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the source of "now" used as the lower bound when listing
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Upcoming events of a calendar
    pub async fn list_events(&self, calendar_id: &str) -> ActionResult {
        let args = ListEventsArgs {
            calendar_id,
            time_min: (self.clock)().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        match self.invoke(CalendarTool::ListEvents, &args).await {
            Ok(data) => match data.get("items").and_then(Value::as_array) {
                Some(items) => ActionResult::success(ActionPayload::Events {
                    events: items.clone(),
                }),
                None => {
                    tracing::warn!(calendar_id, "Calendar provider reply has no items array");
                    ActionResult::failure("Calendar provider returned no event list")
                }
            },
            Err(result) => result,
        }
    }

    /// Create an event. A missing description is sent as empty text.
    pub async fn create_event(&self, call: &ValidatedCall) -> ActionResult {
        let args = CreateEventArgs {
            calendar_id: call.value("calendar_id"),
            summary: call.value("summary"),
            description: call.optional("description").unwrap_or(""),
            start: call.value("start_time"),
            end: call.value("end_time"),
            location: call.optional("location"),
        };

        match self.invoke(CalendarTool::CreateEvent, &args).await {
            Ok(data) => match data.get("id") {
                Some(id) if !id.is_null() => ActionResult::success(ActionPayload::EventCreated {
                    event_id: id.clone(),
                }),
                _ => ActionResult::failure("Calendar provider returned no event id"),
            },
            Err(result) => result,
        }
    }

    /// Update an event. Absent times and location are left out of the
    /// provider call; an absent description is sent as empty text.
    pub async fn update_event(&self, call: &ValidatedCall) -> ActionResult {
        let args = UpdateEventArgs {
            calendar_id: call.value("calendar_id"),
            event_id: call.value("event_id"),
            summary: call.value("summary"),
            description: call.optional("description").unwrap_or(""),
            start: call.optional("start_time"),
            end: call.optional("end_time"),
            location: call.optional("location"),
        };

        match self.invoke(CalendarTool::UpdateEvent, &args).await {
            Ok(data) => ActionResult::success(ActionPayload::EventUpdated {
                updated_event: data,
            }),
            Err(result) => result,
        }
    }

    /// Delete an event
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ActionResult {
        let args = DeleteEventArgs {
            calendar_id,
            event_id,
        };

        match self.invoke(CalendarTool::DeleteEvent, &args).await {
            Ok(_) => ActionResult::success(ActionPayload::EventDeleted {
                deleted_event_id: event_id.to_string(),
            }),
            Err(result) => result,
        }
    }

    async fn invoke(
        &self,
        tool: CalendarTool,
        args: &impl Serialize,
    ) -> Result<Value, ActionResult> {
        let arguments = serde_json::to_value(args)
            .map_err(|e| ActionResult::failure(format!("Invalid {} arguments: {}", tool, e)))?;

        self.provider
            .invoke_tool(tool, arguments)
            .await
            .map_err(|err| {
                tracing::warn!(tool = %tool, error = %err, "Calendar provider call failed");
                ActionResult::failure(err.to_string())
            })
    }
}

#[async_trait]
impl ActionHandler for CalendarService {
    async fn handle(&self, call: &ValidatedCall) -> ActionResult {
        match call.action() {
            ActionName::ListEvents => self.list_events(call.value("calendar_id")).await,
            ActionName::CreateEvent => self.create_event(call).await,
            ActionName::UpdateEvent => self.update_event(call).await,
            ActionName::DeleteEvent => {
                self.delete_event(call.value("calendar_id"), call.value("event_id"))
                    .await
            }
            other => ActionResult::failure(format!("{} is not a calendar action", other)),
        }
    }
}
