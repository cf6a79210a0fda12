//! Prompt text sent to the model.
//!
//! The intent prompt is generated from the contracts of the enabled actions,
//! so the action names and argument keys the model is told about are exactly
//! the ones the validator checks.

use crate::action::{ActionRegistry, Domain};
use serde_json::json;
use std::fmt::Write;

/// One worked example per domain: what the user says, and the call it maps to.
fn example(domain: Domain) -> (&'static str, serde_json::Value) {
    match domain {
        Domain::Orders => (
            "查订单 123 状态",
            json!({"function_call": {"name": "check_shipping", "arguments": {"order_id": "123"}}}),
        ),
        Domain::Calendar => (
            "查看今天的日程",
            json!({"function_call": {"name": "list_events", "arguments": {"calendar_id": "primary"}}}),
        ),
    }
}

/// System turn for the intent conversation
pub fn system_prompt(registry: &ActionRegistry) -> String {
    let mut prompt = String::from(
        "You turn user requests into function calls.\n\
         Reply with exactly one JSON object and no other text, in this format:\n\
         {\"function_call\": {\"name\": \"<action>\", \"arguments\": {\"<key>\": \"<value>\"}}}\n\n\
         Actions:\n",
    );

    for contract in registry.contracts() {
        let _ = writeln!(prompt, "- {}: {}", contract.action, contract.description);
        for arg in contract.args {
            let _ = writeln!(
                prompt,
                "    {} ({}, {}): {}",
                arg.key,
                if arg.required { "required" } else { "optional" },
                arg.kind.describe(),
                arg.description
            );
        }
    }

    prompt.push_str(
        "\nAll argument values are strings. Timestamps use RFC 3339 in UTC, \
         e.g. 2025-03-16T14:00:00Z.\n\
         If the request matches none of the actions, reply {\"message\": \"<short question asking for details>\"}.\n\n\
         Examples:\n",
    );

    for domain in registry.enabled_domains() {
        let (utterance, reply) = example(domain);
        let _ = writeln!(prompt, "User: {}\nReply: {}", utterance, reply);
    }

    prompt
}

/// Reply used when the model found no actionable intent
pub fn clarification_message(registry: &ActionRegistry) -> String {
    let samples: Vec<String> = registry
        .enabled_domains()
        .into_iter()
        .map(|domain| format!("'{}'", example(domain).0))
        .collect();

    if samples.is_empty() {
        return "Please describe what you would like to do.".to_string();
    }
    format!(
        "Please be more specific about what you need, for example: {}",
        samples.join(" or ")
    )
}

/// System turn for the one-off summary conversation
pub const RENDER_SYSTEM_PROMPT: &str = "You are a friendly assistant. Using the user's question \
and the system result, answer the user in natural conversational language, in the language \
the user wrote in. Do not reply with JSON.";

/// User turn for the summary conversation
pub fn render_user_prompt(original_prompt: &str, result_json: &str) -> String {
    format!(
        "User question: {}\nSystem result: {}",
        original_prompt, result_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionHandler, ActionResult, ValidatedCall};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl ActionHandler for Noop {
        async fn handle(&self, _call: &ValidatedCall) -> ActionResult {
            ActionResult::failure("noop")
        }
    }

    #[test]
    fn test_prompt_lists_only_enabled_actions() {
        let registry = ActionRegistry::new().with_domain(Domain::Orders, Arc::new(Noop));
        let prompt = system_prompt(&registry);

        assert!(prompt.contains("- check_shipping:"));
        assert!(prompt.contains("- change_shipping_address:"));
        assert!(prompt.contains("new_address (required, text)"));
        assert!(!prompt.contains("create_event"));
        assert!(prompt.contains("查订单 123 状态"));
        assert!(!prompt.contains("查看今天的日程"));
    }

    #[test]
    fn test_prompt_marks_optional_arguments() {
        let registry = ActionRegistry::new().with_domain(Domain::Calendar, Arc::new(Noop));
        let prompt = system_prompt(&registry);

        assert!(prompt.contains("- create_event:"));
        assert!(prompt.contains("location (optional, text)"));
        assert!(prompt.contains("start_time (required, RFC 3339 timestamp)"));
    }

    #[test]
    fn test_examples_are_valid_calls() {
        for domain in Domain::ALL {
            let (_, reply) = example(domain);
            let name = reply["function_call"]["name"].as_str().unwrap();
            let action: crate::action::ActionName = name.parse().unwrap();
            assert_eq!(action.domain(), domain);
        }
    }

    #[test]
    fn test_clarification_message() {
        let registry = ActionRegistry::new()
            .with_domain(Domain::Orders, Arc::new(Noop))
            .with_domain(Domain::Calendar, Arc::new(Noop));
        let message = clarification_message(&registry);
        assert!(message.contains("'查订单 123 状态' or '查看今天的日程'"));

        assert_eq!(
            clarification_message(&ActionRegistry::new()),
            "Please describe what you would like to do."
        );
    }

    #[test]
    fn test_render_user_prompt() {
        assert_eq!(
            render_user_prompt("查订单 123 状态", r#"{"success":true}"#),
            "User question: 查订单 123 状态\nSystem result: {\"success\":true}"
        );
    }
}
