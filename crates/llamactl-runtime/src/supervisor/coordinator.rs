//! Single-flight launch coordination.
//!
//! A `LaunchRequest` is a shareable readiness future. The first `launch` for a
//! key creates it; every concurrent `launch` for the same key joins it and
//! observes the same outcome. The process driver holds the matching
//! `LaunchResolver` and settles the request exactly once.

use llamactl_core::{ModelKey, SupervisorError};
use std::collections::HashMap;
use tokio::sync::watch;

/// Outcome delivered to every caller joined on a launch.
pub type LaunchOutcome = Result<(), SupervisorError>;

/// Joinable handle on an in-flight launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    generation: u64,
    rx: watch::Receiver<Option<LaunchOutcome>>,
}

impl LaunchRequest {
    /// Create a request and the resolver that settles it.
    pub fn channel(generation: u64) -> (LaunchResolver, Self) {
        let (tx, rx) = watch::channel(None);
        (LaunchResolver { tx }, Self { generation, rx })
    }

    /// Wait for the launch to settle.
    ///
    /// If the resolver is dropped without settling (the driver died), the
    /// launch is reported as having exited before readiness.
    pub async fn wait(mut self, model_key: &ModelKey) -> LaunchOutcome {
        let settled = self
            .rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());

        settled.unwrap_or_else(|| {
            Err(SupervisorError::ProcessExitedBeforeReady {
                model_key: model_key.to_string(),
                exit_code: None,
            })
        })
    }
}

/// Settles a `LaunchRequest`. Only the first outcome is kept.
#[derive(Debug)]
pub struct LaunchResolver {
    tx: watch::Sender<Option<LaunchOutcome>>,
}

impl LaunchResolver {
    /// Settle the request. Returns false if it was already settled.
    pub fn resolve(&self, outcome: LaunchOutcome) -> bool {
        let mut outcome = Some(outcome);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = outcome.take();
            true
        })
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Pending launch requests, at most one per key.
#[derive(Debug, Default)]
pub struct LaunchCoordinator {
    pending: HashMap<ModelKey, LaunchRequest>,
}

impl LaunchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight launch for `model_key`, if any.
    pub fn join(&self, model_key: &ModelKey) -> Option<LaunchRequest> {
        self.pending.get(model_key).cloned()
    }

    /// Register a new in-flight launch.
    ///
    /// Callers must `join` first; a key never has two pending requests.
    pub fn register(&mut self, model_key: ModelKey, request: LaunchRequest) {
        debug_assert!(!self.pending.contains_key(&model_key));
        self.pending.insert(model_key, request);
    }

    /// Forget the pending request for `model_key` regardless of round.
    pub fn remove(&mut self, model_key: &ModelKey) -> bool {
        self.pending.remove(model_key).is_some()
    }

    /// Forget the pending request only if it belongs to `generation`.
    pub fn remove_generation(&mut self, model_key: &ModelKey, generation: u64) -> bool {
        if self
            .pending
            .get(model_key)
            .is_some_and(|r| r.generation == generation)
        {
            self.pending.remove(model_key);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, model_key: &ModelKey) -> bool {
        self.pending.contains_key(model_key)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ModelKey {
        ModelKey::new("/models/x.gguf").unwrap()
    }

    #[tokio::test]
    async fn test_all_joiners_observe_same_outcome() {
        let (resolver, request) = LaunchRequest::channel(1);
        let mut coordinator = LaunchCoordinator::new();
        coordinator.register(key(), request);

        let a = coordinator.join(&key()).unwrap();
        let b = coordinator.join(&key()).unwrap();
        let wa = tokio::spawn(async move { a.wait(&key()).await });
        let wb = tokio::spawn(async move { b.wait(&key()).await });

        assert!(resolver.resolve(Ok(())));
        assert_eq!(wa.await.unwrap(), Ok(()));
        assert_eq!(wb.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_first_outcome_wins() {
        let (resolver, request) = LaunchRequest::channel(1);
        assert!(resolver.resolve(Err(SupervisorError::ProcessExitedBeforeReady {
            model_key: key().to_string(),
            exit_code: Some(1),
        })));
        assert!(!resolver.resolve(Ok(())));
        assert!(resolver.is_settled());

        let outcome = request.wait(&key()).await;
        assert!(matches!(
            outcome,
            Err(SupervisorError::ProcessExitedBeforeReady { exit_code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_resolver_rejects() {
        let (resolver, request) = LaunchRequest::channel(1);
        drop(resolver);
        assert!(matches!(
            request.wait(&key()).await,
            Err(SupervisorError::ProcessExitedBeforeReady { exit_code: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_settled_then_dropped_keeps_outcome() {
        let (resolver, request) = LaunchRequest::channel(1);
        resolver.resolve(Ok(()));
        drop(resolver);
        assert_eq!(request.wait(&key()).await, Ok(()));
    }

    #[test]
    fn test_remove_generation() {
        let mut coordinator = LaunchCoordinator::new();
        let (_resolver, request) = LaunchRequest::channel(7);
        coordinator.register(key(), request);

        assert!(!coordinator.remove_generation(&key(), 6));
        assert!(coordinator.contains(&key()));
        assert!(coordinator.remove_generation(&key(), 7));
        assert!(coordinator.is_empty());
        assert!(!coordinator.remove(&key()));
    }
}
