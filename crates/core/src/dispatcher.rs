//! C2: offer dispatch orchestration. Ranks candidates via C1, then asks the
//! store to atomically create the top-N offers (idempotent: a no-op if a
//! pending offer already exists for the booking).

use std::sync::Arc;

use dispatch_notify::PushSender;
use dispatch_storage::{DispatchOutcome, Store};
use serde_json::json;
use uuid::Uuid;

use crate::candidate::rank_candidates;
use crate::config::DispatchConfig;
use crate::error::Result;

pub struct Dispatcher {
    store: Arc<dyn Store>,
    notifier: Arc<dyn PushSender>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn PushSender>, config: DispatchConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Dispatches offers for `booking_id`. Safe to call repeatedly: a
    /// booking that already has a pending offer, is cancelled, or is already
    /// assigned is left untouched.
    pub async fn dispatch(&self, booking_id: Uuid) -> Result<DispatchOutcome> {
        let booking = self.store.get_booking(booking_id).await?;
        let candidates = rank_candidates(self.store.as_ref(), &booking, &self.config).await?;

        let outcome = self
            .store
            .dispatch_offers(booking_id, &candidates, self.config.top_n, self.config.offer_ttl_secs)
            .await?;

        match &outcome {
            DispatchOutcome::NoCandidates => {
                dispatch_metrics::DISPATCH_METRICS.bookings_unfulfilled.inc();
                tracing::info!(%booking_id, "dispatch found no eligible candidates");
            }
            DispatchOutcome::AlreadyPending => {
                tracing::debug!(%booking_id, "dispatch skipped, pending offer or assignment already exists");
            }
            DispatchOutcome::Dispatched { provider_ids } => {
                dispatch_metrics::DISPATCH_METRICS
                    .offers_created
                    .inc_by(provider_ids.len() as u64);
                for provider_id in provider_ids {
                    self.notify_offer(*provider_id, booking_id).await;
                }
                tracing::info!(%booking_id, count = provider_ids.len(), "dispatched offers");
            }
        }

        Ok(outcome)
    }

    async fn notify_offer(&self, provider_id: Uuid, booking_id: Uuid) {
        self.notifier
            .send_to_provider(
                provider_id,
                "New job available",
                "A booking is waiting for your response",
                json!({
                    "type": "new_assignment",
                    "booking_id": booking_id,
                }),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dispatch_notify::RecordingNotifier;
    use dispatch_storage::MockStore;
    use dispatch_types::{NewBooking, NewProvider};

    async fn seeded_store() -> (Arc<MockStore>, Uuid, Uuid) {
        let store = Arc::new(MockStore::new());
        let category = store
            .create_service_category("Cleaning".to_string(), None)
            .await
            .unwrap();
        let service = store
            .create_service(category.id, "Deep clean".to_string(), None, Some(50.0))
            .await
            .unwrap();
        let provider = store
            .create_provider(NewProvider {
                user_id: Uuid::new_v4(),
                business_name: "Spotless".to_string(),
                latitude: Some(12.9716),
                longitude: Some(77.5946),
                pincode: None,
                experience_years: Some(3),
            })
            .await
            .unwrap();
        store
            .link_provider_service(provider.id, service.id, None)
            .await
            .unwrap();
        (store, service.id, provider.id)
    }

    #[tokio::test]
    async fn dispatch_creates_offer_for_single_linked_provider() {
        let (store, service_id, provider_id) = seeded_store().await;
        let booking = store
            .create_booking(NewBooking {
                user_id: Uuid::new_v4(),
                service_id,
                service_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                service_time: "10:00".to_string(),
                location: "downtown".to_string(),
                latitude: Some(12.9716),
                longitude: Some(77.5946),
                pincode: None,
                special_instructions: None,
                estimated_price: Some(50.0),
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), DispatchConfig::default());
        let outcome = dispatcher.dispatch(booking.id).await.unwrap();

        match outcome {
            DispatchOutcome::Dispatched { provider_ids } => {
                assert_eq!(provider_ids, vec![provider_id]);
            }
            other => panic!("expected Dispatched, got {other:?}"),
        }

        let updated = store.get_booking(booking.id).await.unwrap();
        assert_eq!(updated.status, dispatch_types::BookingStatus::AwaitingProvider);
        assert_eq!(notifier.provider_pushes.lock().await.len(), 1);
        assert!(updated.invariant_holds(), "I6: awaiting_provider booking must have no assigned provider");
    }

    #[tokio::test]
    async fn dispatch_is_idempotent_when_offer_already_pending() {
        let (store, service_id, _provider_id) = seeded_store().await;
        let booking = store
            .create_booking(NewBooking {
                user_id: Uuid::new_v4(),
                service_id,
                service_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                service_time: "10:00".to_string(),
                location: "downtown".to_string(),
                latitude: None,
                longitude: None,
                pincode: None,
                special_instructions: None,
                estimated_price: None,
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), DispatchConfig::default());
        dispatcher.dispatch(booking.id).await.unwrap();
        let second = dispatcher.dispatch(booking.id).await.unwrap();
        assert!(matches!(second, DispatchOutcome::AlreadyPending));
        assert_eq!(notifier.provider_pushes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_with_no_candidates_sets_booking_pending() {
        let store = Arc::new(MockStore::new());
        let category = store
            .create_service_category("Plumbing".to_string(), None)
            .await
            .unwrap();
        let service = store
            .create_service(category.id, "Leak fix".to_string(), None, None)
            .await
            .unwrap();
        let booking = store
            .create_booking(NewBooking {
                user_id: Uuid::new_v4(),
                service_id: service.id,
                service_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                service_time: "10:00".to_string(),
                location: "downtown".to_string(),
                latitude: None,
                longitude: None,
                pincode: None,
                special_instructions: None,
                estimated_price: None,
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Dispatcher::new(store.clone(), notifier, DispatchConfig::default());
        let outcome = dispatcher.dispatch(booking.id).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NoCandidates));

        let updated = store.get_booking(booking.id).await.unwrap();
        assert_eq!(updated.status, dispatch_types::BookingStatus::Pending);
    }
}
