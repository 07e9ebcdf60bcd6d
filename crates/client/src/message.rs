//! Push-message envelope parsing.
//!
//! The push channel delivers `{ [alias]: { node, operation } }` envelopes,
//! one node and one operation per alias. Shape violations are fatal
//! `MalformedMessage` errors; partial application of a malformed envelope
//! would corrupt consistency invariants.

use plexus_core::{Error, Result};
use serde_json::Map;

/// The operation kind of a push notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Create" => Some(Action::Create),
            "Update" => Some(Action::Update),
            "Delete" => Some(Action::Delete),
            _ => None,
        }
    }

    /// Returns true for Create and Update.
    #[inline]
    pub fn is_upsert(self) -> bool {
        !matches!(self, Action::Delete)
    }
}

/// The operation half of a push notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub action: Action,
    /// The affected node id (the operation's `path`).
    pub id: String,
}

/// One per-alias push notification.
#[derive(Clone, Debug)]
pub struct SubscriptionMessage {
    pub alias: String,
    /// The pushed node record. Required for upserts; deletes may omit it.
    pub node: Option<Map<String, serde_json::Value>>,
    pub operation: Operation,
}

impl SubscriptionMessage {
    /// Parses a push envelope into its per-alias messages.
    pub fn from_json(raw: &serde_json::Value) -> Result<Vec<SubscriptionMessage>> {
        let envelope = raw
            .as_object()
            .ok_or_else(|| Error::malformed_message("push envelope is not an object"))?;

        let mut messages = Vec::with_capacity(envelope.len());
        for (alias, body) in envelope {
            let body = body.as_object().ok_or_else(|| {
                Error::malformed_message(format!("push body for {} is not an object", alias))
            })?;

            let operation = body.get("operation").and_then(|v| v.as_object()).ok_or_else(|| {
                Error::malformed_message(format!("push for {} carries no operation", alias))
            })?;
            let action = operation
                .get("action")
                .and_then(|v| v.as_str())
                .and_then(Action::parse)
                .ok_or_else(|| {
                    Error::malformed_message(format!("push for {} has an unknown action", alias))
                })?;
            let id = operation
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    Error::malformed_message(format!("push for {} carries no path", alias))
                })?
                .to_string();

            let node = match body.get("node") {
                Some(serde_json::Value::Object(map)) => Some(map.clone()),
                Some(serde_json::Value::Null) | None => None,
                Some(_) => {
                    return Err(Error::malformed_message(format!(
                        "push node for {} is not an object",
                        alias
                    )));
                }
            };
            if node.is_none() && action.is_upsert() {
                return Err(Error::malformed_message(format!(
                    "{:?} push for {} carries no node",
                    action, alias
                )));
            }

            messages.push(SubscriptionMessage {
                alias: alias.clone(),
                node,
                operation: Operation { action, id },
            });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_upsert_envelope() {
        let messages = SubscriptionMessage::from_json(&json!({
            "todos": {
                "node": { "id": "t-1", "version": 2, "type": "todo" },
                "operation": { "action": "Update", "path": "t-1" }
            }
        }))
        .unwrap();

        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.alias, "todos");
        assert_eq!(message.operation.action, Action::Update);
        assert_eq!(message.operation.id, "t-1");
        assert!(message.node.is_some());
    }

    #[test]
    fn test_parse_delete_without_node() {
        let messages = SubscriptionMessage::from_json(&json!({
            "todos": {
                "operation": { "action": "Delete", "path": "t-9" }
            }
        }))
        .unwrap();

        assert_eq!(messages[0].operation.action, Action::Delete);
        assert!(messages[0].node.is_none());
    }

    #[test]
    fn test_upsert_without_node_is_malformed() {
        let err = SubscriptionMessage::from_json(&json!({
            "todos": {
                "operation": { "action": "Create", "path": "t-1" }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }

    #[test]
    fn test_unknown_action_is_malformed() {
        let err = SubscriptionMessage::from_json(&json!({
            "todos": {
                "node": { "id": "t-1" },
                "operation": { "action": "Upsert", "path": "t-1" }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }

    #[test]
    fn test_missing_operation_is_malformed() {
        let err = SubscriptionMessage::from_json(&json!({
            "todos": { "node": { "id": "t-1" } }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }
}
