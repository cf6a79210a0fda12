//! Call Validator for pre-execution checks.
//!
//! Resolves the call's action against the registry and checks every
//! required argument is present and non-blank. The output is a
//! [`ValidatedCall`], the only input the registry will dispatch.

use crate::action::{ActionRegistry, Arguments, StructuredCall, ValidatedCall};
use crate::{Result, ValidationError};

/// Checks structured calls against their action contracts
pub struct CallValidator<'a> {
    registry: &'a ActionRegistry,
    defaults: Arguments,
}

impl<'a> CallValidator<'a> {
    pub fn new(registry: &'a ActionRegistry) -> Self {
        Self {
            registry,
            defaults: Arguments::new(),
        }
    }

    /// Values used for contract keys the call left out or left blank.
    ///
    /// Only keys the resolved action's contract declares are filled, so a
    /// `calendar_id` default never leaks into an order action.
    pub fn with_defaults(mut self, defaults: Arguments) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validate `call`.
    ///
    /// # Errors
    ///
    /// * `DispatchError::UnsupportedAction` if the name is unknown or its
    ///   domain is disabled, whatever the arguments look like
    /// * `DispatchError::Validation` naming the first missing required key
    pub fn validate(&self, call: StructuredCall) -> Result<ValidatedCall> {
        let action = self.registry.resolve(&call.name)?;
        let contract = action.contract();
        let mut arguments = call.arguments;

        for (key, value) in &self.defaults {
            if contract.arg(key).is_none() || value.trim().is_empty() {
                continue;
            }
            let missing = arguments
                .get(key)
                .map_or(true, |current| current.trim().is_empty());
            if missing {
                tracing::debug!(
                    action = %action,
                    key = %key,
                    "Filling argument from request default"
                );
                arguments.insert(key.clone(), value.clone());
            }
        }

        for key in contract.required_keys() {
            let present = arguments
                .get(key)
                .is_some_and(|value| !value.trim().is_empty());
            if !present {
                return Err(ValidationError::MissingArgument {
                    name: key.to_string(),
                    action: action.as_str().to_string(),
                }
                .into());
            }
        }

        Ok(ValidatedCall::new(action, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionHandler, ActionName, ActionResult, Domain};
    use crate::DispatchError;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl ActionHandler for Noop {
        async fn handle(&self, _call: &ValidatedCall) -> ActionResult {
            ActionResult::failure("noop")
        }
    }

    fn registry() -> ActionRegistry {
        ActionRegistry::new()
            .with_domain(Domain::Orders, Arc::new(Noop))
            .with_domain(Domain::Calendar, Arc::new(Noop))
    }

    #[test]
    fn test_valid_call() {
        let registry = registry();
        let call = StructuredCall::new(
            "change_shipping_address",
            [("order_id", "456"), ("new_address", "789 Oak St")],
        );

        let validated = CallValidator::new(&registry).validate(call).unwrap();
        assert_eq!(validated.action(), ActionName::ChangeShippingAddress);
        assert_eq!(validated.value("new_address"), "789 Oak St");
    }

    #[test]
    fn test_missing_argument() {
        let registry = registry();
        let call = StructuredCall::new(
            "create_event",
            [
                ("calendar_id", "primary"),
                ("start_time", "2025-03-01T10:00:00Z"),
                ("end_time", "2025-03-01T11:00:00Z"),
            ],
        );

        let err = CallValidator::new(&registry).validate(call).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Validation(ValidationError::MissingArgument { ref name, ref action })
                if name == "summary" && action == "create_event"
        ));
    }

    #[test]
    fn test_blank_argument_counts_as_missing() {
        let registry = registry();
        let call = StructuredCall::new("check_shipping", [("order_id", "   ")]);

        assert!(matches!(
            CallValidator::new(&registry).validate(call),
            Err(DispatchError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_action_wins_over_argument_shape() {
        let registry = registry();
        for args in [vec![], vec![("order_id", "1")], vec![("x", "")]] {
            let call = StructuredCall::new("refund_everything", args);
            assert!(matches!(
                CallValidator::new(&registry).validate(call),
                Err(DispatchError::UnsupportedAction(ref name)) if name == "refund_everything"
            ));
        }
    }

    #[test]
    fn test_defaults_fill_only_declared_keys() {
        let registry = registry();
        let mut defaults = Arguments::new();
        defaults.insert("calendar_id".into(), "team@example.com".into());

        let validator = CallValidator::new(&registry).with_defaults(defaults);

        let listed = validator
            .validate(StructuredCall::new("list_events", Vec::<(String, String)>::new()))
            .unwrap();
        assert_eq!(listed.value("calendar_id"), "team@example.com");

        let shipped = validator
            .validate(StructuredCall::new("check_shipping", [("order_id", "1")]))
            .unwrap();
        assert!(shipped.arguments().get("calendar_id").is_none());
    }

    #[test]
    fn test_model_value_beats_default() {
        let registry = registry();
        let mut defaults = Arguments::new();
        defaults.insert("calendar_id".into(), "fallback".into());

        let validated = CallValidator::new(&registry)
            .with_defaults(defaults)
            .validate(StructuredCall::new("list_events", [("calendar_id", "primary")]))
            .unwrap();
        assert_eq!(validated.value("calendar_id"), "primary");
    }
}
