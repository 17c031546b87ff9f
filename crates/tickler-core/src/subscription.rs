//! Push subscription records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// A broadcast subscription that reminders are pushed to.
///
/// Identity is the `endpoint`; `keys` is carried through to the push
/// transport untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Delivery endpoint URL, unique per subscription.
    pub endpoint: String,

    /// Opaque key material supplied by the subscriber.
    #[serde(default)]
    pub keys: Value,
}

impl Subscription {
    /// Create a new subscription record.
    pub fn new(endpoint: impl Into<String>, keys: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys,
        }
    }

    /// Build a subscription from an arbitrary JSON descriptor.
    ///
    /// The descriptor must carry a non-empty string `endpoint`. Everything
    /// else is optional; `keys` defaults to null.
    pub fn from_descriptor(descriptor: &Value) -> Result<Self, CoreError> {
        let endpoint = descriptor
            .get("endpoint")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CoreError::InvalidInput("subscription endpoint is required".into()))?;

        let keys = descriptor.get("keys").cloned().unwrap_or(Value::Null);

        Ok(Self::new(endpoint, keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_descriptor_requires_endpoint() {
        let err = Subscription::from_descriptor(&json!({"keys": {"auth": "x"}})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let err = Subscription::from_descriptor(&json!({"endpoint": "  "})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_from_descriptor_keeps_keys() {
        let sub = Subscription::from_descriptor(&json!({
            "endpoint": "https://push.example/abc",
            "keys": {"p256dh": "k", "auth": "a"}
        }))
        .unwrap();

        assert_eq!(sub.endpoint, "https://push.example/abc");
        assert_eq!(sub.keys["auth"], "a");
    }
}
