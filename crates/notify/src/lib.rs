//! Best-effort notification fan-out: push notifications to a provider's
//! device, and realtime channel pushes to a user or the admin pool. Neither
//! path participates in the booking/offer transaction — a notification
//! failure never rolls back a dispatch or an accept.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[async_trait]
pub trait PushSender: Send + Sync {
    /// Sends a push notification to a provider's registered device. Failures
    /// are logged by the implementation and never propagated: the booking
    /// has already been persisted by the time this runs.
    async fn send_to_provider(&self, provider_id: Uuid, title: &str, body: &str, data: Value);
}

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value);
    async fn broadcast_to_admins(&self, event: &str, payload: Value);
}

/// Logs every call at `info` level instead of contacting a real push
/// provider or websocket hub. Reasonable default until those integrations
/// are wired up; matches spec section 2's note that notification delivery
/// itself is out of scope.
pub struct LoggingNotifier;

#[async_trait]
impl PushSender for LoggingNotifier {
    async fn send_to_provider(&self, provider_id: Uuid, title: &str, body: &str, data: Value) {
        tracing::info!(%provider_id, title, body, %data, "push notification (logged only)");
    }
}

#[async_trait]
impl RealtimeChannel for LoggingNotifier {
    async fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value) {
        tracing::info!(%user_id, event, %payload, "realtime event to user (logged only)");
    }

    async fn broadcast_to_admins(&self, event: &str, payload: Value) {
        tracing::info!(event, %payload, "realtime event to admins (logged only)");
    }
}

/// Captures every call in memory instead of sending or logging anything.
/// Used by tests that assert on dispatcher/arbitration notification
/// side-effects without touching a real transport.
#[derive(Default)]
pub struct RecordingNotifier {
    pub provider_pushes: tokio::sync::Mutex<Vec<(Uuid, String, String, Value)>>,
    pub user_events: tokio::sync::Mutex<Vec<(Uuid, String, Value)>>,
    pub admin_events: tokio::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushSender for RecordingNotifier {
    async fn send_to_provider(&self, provider_id: Uuid, title: &str, body: &str, data: Value) {
        self.provider_pushes.lock().await.push((
            provider_id,
            title.to_string(),
            body.to_string(),
            data,
        ));
    }
}

#[async_trait]
impl RealtimeChannel for RecordingNotifier {
    async fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value) {
        self.user_events
            .lock()
            .await
            .push((user_id, event.to_string(), payload));
    }

    async fn broadcast_to_admins(&self, event: &str, payload: Value) {
        self.admin_events.lock().await.push((event.to_string(), payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recording_notifier_captures_provider_pushes() {
        let notifier = RecordingNotifier::new();
        let provider_id = Uuid::new_v4();
        notifier
            .send_to_provider(provider_id, "New job", "A booking is waiting", json!({"k": "v"}))
            .await;
        let pushes = notifier.provider_pushes.lock().await;
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, provider_id);
    }
}
