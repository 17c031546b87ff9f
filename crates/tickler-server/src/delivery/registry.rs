//! Push subscription registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use tickler_core::{CoreError, Subscription};

/// Set of push subscriptions keyed by endpoint.
///
/// Readers take a cloned snapshot so a fan-out in progress never observes
/// registrations or removals made while it runs.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription from a client-supplied descriptor.
    ///
    /// Returns `Ok(true)` if the endpoint was new and `Ok(false)` if it was
    /// already registered; a duplicate leaves the existing record untouched.
    pub fn register(&self, descriptor: &Value) -> Result<bool, CoreError> {
        let subscription = Subscription::from_descriptor(descriptor)?;
        Ok(self.insert(subscription))
    }

    /// Insert an already validated subscription.
    pub fn insert(&self, subscription: Subscription) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if subscriptions.contains_key(&subscription.endpoint) {
            debug!(endpoint = %subscription.endpoint, "Subscription already registered");
            return false;
        }

        info!(endpoint = %subscription.endpoint, "Subscription registered");
        subscriptions.insert(subscription.endpoint.clone(), subscription);
        true
    }

    /// Remove a subscription. Returns true if it was present.
    pub fn remove(&self, endpoint: &str) -> bool {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint)
            .is_some()
    }

    /// Copy of the current subscriptions, ordered by endpoint.
    pub fn snapshot(&self) -> Vec<Subscription> {
        let mut snapshot: Vec<Subscription> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        snapshot.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
