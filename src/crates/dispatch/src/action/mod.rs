//! Actions, their argument contracts, and their results
//!
//! Every action the dispatcher can execute is an [`ActionName`] variant. The
//! contract table below is an exhaustive `match`, so adding a variant without a
//! contract does not compile.

pub mod registry;

pub use registry::{ActionHandler, ActionRegistry, ExecutionPolicy};

use crate::Collaborator;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Argument mapping carried by a call. Values are always text.
pub type Arguments = BTreeMap<String, String>;

/// Domain an action belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Order lookup and address changes, backed by the order store
    Orders,
    /// Calendar CRUD, delegated to the calendar provider
    Calendar,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Orders, Domain::Calendar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Orders => "orders",
            Domain::Calendar => "calendar",
        }
    }

    /// Collaborator whose latency bounds this domain's handlers
    pub fn collaborator(&self) -> Collaborator {
        match self {
            Domain::Orders => Collaborator::OrderStore,
            Domain::Calendar => Collaborator::Calendar,
        }
    }

    /// Actions belonging to this domain, in contract order
    pub fn actions(&self) -> impl Iterator<Item = ActionName> + '_ {
        ActionName::ALL
            .into_iter()
            .filter(move |action| action.domain() == *self)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action the dispatcher knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    CheckShipping,
    ChangeShippingAddress,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

impl ActionName {
    pub const ALL: [ActionName; 6] = [
        ActionName::CheckShipping,
        ActionName::ChangeShippingAddress,
        ActionName::ListEvents,
        ActionName::CreateEvent,
        ActionName::UpdateEvent,
        ActionName::DeleteEvent,
    ];

    /// Name the model uses in `function_call.name`
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::CheckShipping => "check_shipping",
            ActionName::ChangeShippingAddress => "change_shipping_address",
            ActionName::ListEvents => "list_events",
            ActionName::CreateEvent => "create_event",
            ActionName::UpdateEvent => "update_event",
            ActionName::DeleteEvent => "delete_event",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            ActionName::CheckShipping | ActionName::ChangeShippingAddress => Domain::Orders,
            ActionName::ListEvents
            | ActionName::CreateEvent
            | ActionName::UpdateEvent
            | ActionName::DeleteEvent => Domain::Calendar,
        }
    }

    /// Reads that may be retried once when they time out
    pub fn is_idempotent_read(&self) -> bool {
        matches!(self, ActionName::CheckShipping | ActionName::ListEvents)
    }

    /// Argument contract for this action
    pub fn contract(&self) -> &'static ActionContract {
        match self {
            ActionName::CheckShipping => &CHECK_SHIPPING,
            ActionName::ChangeShippingAddress => &CHANGE_SHIPPING_ADDRESS,
            ActionName::ListEvents => &LIST_EVENTS,
            ActionName::CreateEvent => &CREATE_EVENT,
            ActionName::UpdateEvent => &UPDATE_EVENT,
            ActionName::DeleteEvent => &DELETE_EVENT,
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Expected shape of an argument value. Only presence is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Opaque identifier
    Id,
    /// RFC 3339 timestamp
    Timestamp,
    /// Human text
    FreeText,
}

impl ArgKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ArgKind::Id => "identifier",
            ArgKind::Timestamp => "RFC 3339 timestamp",
            ArgKind::FreeText => "text",
        }
    }
}

/// One argument in a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub key: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub description: &'static str,
}

impl ArgSpec {
    pub const fn required(key: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            key,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(key: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            key,
            kind,
            required: false,
            description,
        }
    }
}

/// Argument contract of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContract {
    pub action: ActionName,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
}

impl ActionContract {
    /// Keys that must be present and non-blank
    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.args.iter().filter(|a| a.required).map(|a| a.key)
    }

    pub fn arg(&self, key: &str) -> Option<&'static ArgSpec> {
        self.args.iter().find(|a| a.key == key)
    }
}

static CHECK_SHIPPING: ActionContract = ActionContract {
    action: ActionName::CheckShipping,
    description: "Look up the shipping status and address of an order",
    args: &[ArgSpec::required("order_id", ArgKind::Id, "order number")],
};

static CHANGE_SHIPPING_ADDRESS: ActionContract = ActionContract {
    action: ActionName::ChangeShippingAddress,
    description: "Change the delivery address of an order",
    args: &[
        ArgSpec::required("order_id", ArgKind::Id, "order number"),
        ArgSpec::required("new_address", ArgKind::FreeText, "full new address"),
    ],
};

static LIST_EVENTS: ActionContract = ActionContract {
    action: ActionName::ListEvents,
    description: "List upcoming events of a calendar",
    args: &[ArgSpec::required("calendar_id", ArgKind::Id, "calendar identifier")],
};

static CREATE_EVENT: ActionContract = ActionContract {
    action: ActionName::CreateEvent,
    description: "Create a calendar event",
    args: &[
        ArgSpec::required("calendar_id", ArgKind::Id, "calendar identifier"),
        ArgSpec::required("start_time", ArgKind::Timestamp, "event start"),
        ArgSpec::required("end_time", ArgKind::Timestamp, "event end"),
        ArgSpec::required("summary", ArgKind::FreeText, "event title"),
        ArgSpec::optional("description", ArgKind::FreeText, "event details"),
        ArgSpec::optional("location", ArgKind::FreeText, "where the event happens"),
    ],
};

static UPDATE_EVENT: ActionContract = ActionContract {
    action: ActionName::UpdateEvent,
    description: "Update fields of an existing calendar event",
    args: &[
        ArgSpec::required("calendar_id", ArgKind::Id, "calendar identifier"),
        ArgSpec::required("event_id", ArgKind::Id, "event identifier"),
        ArgSpec::required("summary", ArgKind::FreeText, "event title"),
        ArgSpec::optional("description", ArgKind::FreeText, "event details"),
        ArgSpec::optional("start_time", ArgKind::Timestamp, "new start"),
        ArgSpec::optional("end_time", ArgKind::Timestamp, "new end"),
        ArgSpec::optional("location", ArgKind::FreeText, "where the event happens"),
    ],
};

static DELETE_EVENT: ActionContract = ActionContract {
    action: ActionName::DeleteEvent,
    description: "Delete a calendar event",
    args: &[
        ArgSpec::required("calendar_id", ArgKind::Id, "calendar identifier"),
        ArgSpec::required("event_id", ArgKind::Id, "event identifier"),
    ],
};

/// A call recovered from model output, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCall {
    pub name: String,
    pub arguments: Arguments,
}

impl StructuredCall {
    pub fn new<K, V>(name: impl Into<String>, arguments: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Argument value, if present and not blank
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A call that resolved to a known, enabled action and satisfied its contract.
///
/// Only the validator constructs these, so a handler can never see a call
/// that skipped validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCall {
    action: ActionName,
    arguments: Arguments,
}

impl ValidatedCall {
    pub(crate) fn new(action: ActionName, arguments: Arguments) -> Self {
        Self { action, arguments }
    }

    pub fn action(&self) -> ActionName {
        self.action
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Value of a required argument.
    pub fn value(&self, key: &str) -> &str {
        self.arguments.get(key).map(|v| v.trim()).unwrap_or("")
    }

    /// Value of an optional argument, if present and not blank.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Success payloads, one shape per action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Shipping { status: String, address: String },
    AddressChanged { new_address: String },
    Events { events: Vec<serde_json::Value> },
    EventCreated { event_id: serde_json::Value },
    EventUpdated { updated_event: serde_json::Value },
    EventDeleted { deleted_event_id: String },
}

impl ActionPayload {
    fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        match self {
            ActionPayload::Shipping { status, address } => {
                map.serialize_entry("status", status)?;
                map.serialize_entry("address", address)
            }
            ActionPayload::AddressChanged { new_address } => {
                map.serialize_entry("new_address", new_address)
            }
            ActionPayload::Events { events } => map.serialize_entry("events", events),
            ActionPayload::EventCreated { event_id } => map.serialize_entry("eventId", event_id),
            ActionPayload::EventUpdated { updated_event } => {
                map.serialize_entry("updatedEvent", updated_event)
            }
            ActionPayload::EventDeleted { deleted_event_id } => {
                map.serialize_entry("deletedEventId", deleted_event_id)
            }
        }
    }
}

/// Outcome of a handler. Serialises as `{success:true, ...payload}` or
/// `{success:false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Success(ActionPayload),
    Failure { error: String },
}

impl ActionResult {
    pub fn success(payload: ActionPayload) -> Self {
        ActionResult::Success(payload)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ActionResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }

    pub fn payload(&self) -> Option<&ActionPayload> {
        match self {
            ActionResult::Success(payload) => Some(payload),
            ActionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionResult::Success(_) => None,
            ActionResult::Failure { error } => Some(error),
        }
    }
}

impl Serialize for ActionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            ActionResult::Success(payload) => {
                map.serialize_entry("success", &true)?;
                payload.serialize_fields(&mut map)?;
            }
            ActionResult::Failure { error } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_table_is_consistent() {
        for action in ActionName::ALL {
            let contract = action.contract();
            assert_eq!(contract.action, action);
            assert!(contract.required_keys().count() > 0, "{} has no required keys", action);
            assert!(Domain::ALL.contains(&action.domain()));
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for action in ActionName::ALL {
            assert_eq!(action.as_str().parse::<ActionName>(), Ok(action));
        }
        assert!("launch_rocket".parse::<ActionName>().is_err());
        assert!("Check_Shipping".parse::<ActionName>().is_err());
    }

    #[test]
    fn test_required_keys() {
        let keys: Vec<_> = ActionName::CreateEvent.contract().required_keys().collect();
        assert_eq!(keys, vec!["calendar_id", "start_time", "end_time", "summary"]);

        let keys: Vec<_> = ActionName::UpdateEvent.contract().required_keys().collect();
        assert_eq!(keys, vec!["calendar_id", "event_id", "summary"]);
    }

    #[test]
    fn test_idempotent_reads() {
        assert!(ActionName::CheckShipping.is_idempotent_read());
        assert!(ActionName::ListEvents.is_idempotent_read());
        assert!(!ActionName::CreateEvent.is_idempotent_read());
        assert!(!ActionName::ChangeShippingAddress.is_idempotent_read());
    }

    #[test]
    fn test_domain_actions() {
        let orders: Vec<_> = Domain::Orders.actions().collect();
        assert_eq!(
            orders,
            vec![ActionName::CheckShipping, ActionName::ChangeShippingAddress]
        );
        assert_eq!(Domain::Calendar.actions().count(), 4);
    }

    #[test]
    fn test_result_serialization() {
        let ok = ActionResult::success(ActionPayload::Shipping {
            status: "Shipped".into(),
            address: "123 Main St".into(),
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"success": true, "status": "Shipped", "address": "123 Main St"})
        );

        let created = ActionResult::success(ActionPayload::EventCreated {
            event_id: json!("evt-1"),
        });
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"success": true, "eventId": "evt-1"})
        );

        let failed = ActionResult::failure("Order not found");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"success": false, "error": "Order not found"})
        );
        assert_eq!(failed.error(), Some("Order not found"));
        assert!(failed.payload().is_none());
    }

    #[test]
    fn test_call_arg_ignores_blank_values() {
        let call = StructuredCall::new("check_shipping", [("order_id", "  "), ("note", " x ")]);
        assert_eq!(call.arg("order_id"), None);
        assert_eq!(call.arg("note"), Some("x"));
        assert_eq!(call.arg("missing"), None);
    }
}
