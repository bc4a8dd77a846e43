//! C3: provider-facing accept/decline/list-pending orchestration. Wraps the
//! store's atomic operations and fires best-effort notifications outside
//! any lock.

use std::sync::Arc;

use chrono::Utc;
use dispatch_notify::RealtimeChannel;
use dispatch_storage::{OfferActionError, Store};
use dispatch_types::{Booking, Offer};
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;

pub struct ArbitrationEngine {
    store: Arc<dyn Store>,
    realtime: Arc<dyn RealtimeChannel>,
}

impl ArbitrationEngine {
    pub fn new(store: Arc<dyn Store>, realtime: Arc<dyn RealtimeChannel>) -> Self {
        Self { store, realtime }
    }

    pub async fn list_pending(&self, provider_id: Uuid) -> Result<Vec<Offer>> {
        let now = Utc::now();
        Ok(self.store.list_pending_offers_for_provider(provider_id, now).await?)
    }

    pub async fn accept(
        &self,
        offer_id: Uuid,
        provider_id: Uuid,
    ) -> Result<std::result::Result<Booking, OfferActionError>> {
        let now = Utc::now();
        let outcome = self.store.accept_offer(offer_id, provider_id, now).await?;

        if let Ok(booking) = &outcome {
            dispatch_metrics::DISPATCH_METRICS.offers_accepted.inc();
            dispatch_metrics::DISPATCH_METRICS.bookings_confirmed.inc();
            self.realtime
                .send_to_user(
                    booking.user_id,
                    "booking_confirmed",
                    json!({
                        "booking_id": booking.id,
                        "provider_id": provider_id,
                    }),
                )
                .await;
        }

        Ok(outcome)
    }

    pub async fn decline(
        &self,
        offer_id: Uuid,
        provider_id: Uuid,
    ) -> Result<std::result::Result<(), OfferActionError>> {
        let now = Utc::now();
        let outcome = self.store.decline_offer(offer_id, provider_id, now).await?;

        if outcome.is_ok() {
            dispatch_metrics::DISPATCH_METRICS.offers_declined.inc();
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dispatch_notify::RecordingNotifier;
    use dispatch_storage::{DispatchOutcome, MockStore};
    use dispatch_types::{NewBooking, NewProvider};

    async fn two_offers_for_one_booking() -> (Arc<MockStore>, Uuid, [Uuid; 2]) {
        let store = Arc::new(MockStore::new());
        let category = store.create_service_category("Cleaning".into(), None).await.unwrap();
        let service = store
            .create_service(category.id, "Deep clean".into(), None, None)
            .await
            .unwrap();

        let mut provider_ids = [Uuid::nil(); 2];
        for (i, slot) in provider_ids.iter_mut().enumerate() {
            let provider = store
                .create_provider(NewProvider {
                    user_id: Uuid::new_v4(),
                    business_name: format!("Provider {i}"),
                    latitude: None,
                    longitude: None,
                    pincode: None,
                    experience_years: None,
                })
                .await
                .unwrap();
            store.link_provider_service(provider.id, service.id, None).await.unwrap();
            *slot = provider.id;
        }

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

        let candidates: Vec<_> = provider_ids
            .iter()
            .map(|id| dispatch_types::ScoredCandidate {
                provider_id: *id,
                score: 50.0,
                distance_km: None,
            })
            .collect();
        let outcome = store.dispatch_offers(booking.id, &candidates, 2, 300).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));

        (store, booking.id, provider_ids)
    }

    #[tokio::test]
    async fn first_acceptor_wins_second_sees_already_assigned() {
        let (store, booking_id, provider_ids) = two_offers_for_one_booking().await;
        let pending = store.list_pending_offers_for_provider(provider_ids[0], Utc::now()).await.unwrap();
        let offer_a = pending[0].id;
        let pending_b = store.list_pending_offers_for_provider(provider_ids[1], Utc::now()).await.unwrap();
        let offer_b = pending_b[0].id;

        let realtime = Arc::new(RecordingNotifier::new());
        let engine = ArbitrationEngine::new(store.clone(), realtime);

        let first = engine.accept(offer_a, provider_ids[0]).await.unwrap();
        assert!(first.is_ok());

        let second = engine.accept(offer_b, provider_ids[1]).await.unwrap();
        assert_eq!(second.unwrap_err(), OfferActionError::NotPending);

        let booking = store.get_booking(booking_id).await.unwrap();
        assert_eq!(booking.provider_id, Some(provider_ids[0]));
        assert_eq!(booking.status, dispatch_types::BookingStatus::Confirmed);
        assert!(booking.invariant_holds(), "I5: confirmed booking must carry a provider");
    }

    #[tokio::test]
    async fn decline_sets_searching_message_when_no_pending_remain() {
        let (store, booking_id, provider_ids) = two_offers_for_one_booking().await;
        let realtime = Arc::new(RecordingNotifier::new());
        let engine = ArbitrationEngine::new(store.clone(), realtime);

        for provider_id in provider_ids {
            let pending = store.list_pending_offers_for_provider(provider_id, Utc::now()).await.unwrap();
            let offer_id = pending[0].id;
            let result = engine.decline(offer_id, provider_id).await.unwrap();
            assert!(result.is_ok());
        }

        let booking = store.get_booking(booking_id).await.unwrap();
        assert_eq!(booking.provider_distance.as_deref(), Some("Searching for more providers..."));
        assert!(booking.provider_id.is_none());
    }
}
