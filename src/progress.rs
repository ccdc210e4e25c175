//! Progress reporting for long-running operations
//!
//! Discovery passes report through an [`OperationTracker`]; anything holding a
//! receiver from [`OperationTracker::subscribe`] sees every transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast};

/// Lifecycle state of a tracked operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Latest known status of an operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub id: u64,
    pub kind: String,
    pub state: OperationState,
    /// Fraction in `[0, 1]`
    pub progress: f64,
    pub message: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Broadcast on every transition
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    Started {
        id: u64,
        kind: String,
    },
    Progress {
        id: u64,
        fraction: f64,
        message: String,
    },
    Completed {
        id: u64,
        result: serde_json::Value,
        message: String,
    },
    Failed {
        id: u64,
        error: String,
        message: String,
    },
}

/// Tracks operation status and fans out events
pub struct OperationTracker {
    next_id: AtomicU64,
    operations: RwLock<HashMap<u64, OperationStatus>>,
    event_tx: broadcast::Sender<OperationEvent>,
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTracker {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            operations: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Subscribe to operation events
    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.event_tx.subscribe()
    }

    /// Register a new pending operation and return its id
    pub async fn create_operation(&self, kind: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let status = OperationStatus {
            id,
            kind: kind.to_string(),
            state: OperationState::Pending,
            progress: 0.0,
            message: String::new(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.operations.write().await.insert(id, status);
        id
    }

    pub async fn start(&self, id: u64) {
        let kind = self
            .transition(id, |status| {
                status.state = OperationState::Running;
            })
            .await;

        if let Some(kind) = kind {
            let _ = self.event_tx.send(OperationEvent::Started { id, kind });
        }
    }

    pub async fn update(&self, id: u64, fraction: f64, message: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        let updated = self
            .transition(id, |status| {
                status.state = OperationState::Running;
                status.progress = fraction;
                status.message = message.to_string();
            })
            .await;

        if updated.is_some() {
            let _ = self.event_tx.send(OperationEvent::Progress {
                id,
                fraction,
                message: message.to_string(),
            });
        }
    }

    pub async fn complete(&self, id: u64, result: serde_json::Value, message: &str) {
        let updated = self
            .transition(id, |status| {
                status.state = OperationState::Completed;
                status.progress = 1.0;
                status.message = message.to_string();
                status.result = Some(result.clone());
            })
            .await;

        if updated.is_some() {
            tracing::debug!(operation_id = id, message = %message, "Operation completed");
            let _ = self.event_tx.send(OperationEvent::Completed {
                id,
                result,
                message: message.to_string(),
            });
        }
    }

    pub async fn fail(&self, id: u64, error: &str, message: &str) {
        let updated = self
            .transition(id, |status| {
                status.state = OperationState::Failed;
                status.message = message.to_string();
                status.error = Some(error.to_string());
            })
            .await;

        if updated.is_some() {
            tracing::warn!(operation_id = id, error = %error, message = %message, "Operation failed");
            let _ = self.event_tx.send(OperationEvent::Failed {
                id,
                error: error.to_string(),
                message: message.to_string(),
            });
        }
    }

    pub async fn status(&self, id: u64) -> Option<OperationStatus> {
        self.operations.read().await.get(&id).cloned()
    }

    /// Apply `f` to a non-terminal operation; returns its kind when applied
    async fn transition<F>(&self, id: u64, f: F) -> Option<String>
    where
        F: FnOnce(&mut OperationStatus),
    {
        let mut operations = self.operations.write().await;
        let Some(status) = operations.get_mut(&id) else {
            tracing::warn!(operation_id = id, "Progress reported for unknown operation");
            return None;
        };

        if status.state.is_terminal() {
            tracing::debug!(operation_id = id, "Ignoring progress after terminal state");
            return None;
        }

        f(status);
        status.updated_at = Utc::now();
        Some(status.kind.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operation_lifecycle() {
        let tracker = OperationTracker::new();
        let id = tracker.create_operation("discovery").await;

        let status = tracker.status(id).await.unwrap();
        assert_eq!(status.state, OperationState::Pending);
        assert_eq!(status.kind, "discovery");

        tracker.start(id).await;
        tracker.update(id, 0.5, "halfway").await;
        let status = tracker.status(id).await.unwrap();
        assert_eq!(status.state, OperationState::Running);
        assert_eq!(status.progress, 0.5);
        assert_eq!(status.message, "halfway");

        tracker.complete(id, serde_json::json!(3), "done").await;
        let status = tracker.status(id).await.unwrap();
        assert_eq!(status.state, OperationState::Completed);
        assert_eq!(status.progress, 1.0);
        assert_eq!(status.result, Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn test_events_are_broadcast_in_order() {
        let tracker = OperationTracker::new();
        let mut rx = tracker.subscribe();

        let id = tracker.create_operation("discovery").await;
        tracker.start(id).await;
        tracker.update(id, 2.0, "clamped").await;
        tracker.fail(id, "boom", "Discovery failed").await;

        assert_eq!(
            rx.recv().await.unwrap(),
            OperationEvent::Started {
                id,
                kind: "discovery".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            OperationEvent::Progress {
                id,
                fraction: 1.0,
                message: "clamped".to_string()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            OperationEvent::Failed { error, .. } if error == "boom"
        ));
    }

    #[tokio::test]
    async fn test_terminal_operations_ignore_updates() {
        let tracker = OperationTracker::new();
        let id = tracker.create_operation("discovery").await;
        tracker.complete(id, serde_json::json!(0), "done").await;
        tracker.update(id, 0.1, "late").await;

        let status = tracker.status(id).await.unwrap();
        assert_eq!(status.state, OperationState::Completed);
        assert_eq!(status.message, "done");
    }

    #[tokio::test]
    async fn test_unknown_operation_is_ignored() {
        let tracker = OperationTracker::new();
        tracker.update(42, 0.3, "nobody").await;
        assert!(tracker.status(42).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let tracker = OperationTracker::new();
        let a = tracker.create_operation("a").await;
        let b = tracker.create_operation("b").await;
        assert_ne!(a, b);
    }
}
