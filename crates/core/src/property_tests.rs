//! Property-based tests against the in-memory store, following the pack's
//! `proptest! { #[test] fn name(...) { rt.block_on(async { ... }) } }`
//! pattern for driving async code from synchronous property tests.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use dispatch_storage::{DispatchOutcome, MockStore, Store};
use dispatch_types::{NewBooking, NewProvider, ScoredCandidate};

use crate::arbitration::ArbitrationEngine;

async fn booking_with_n_offers(store: &Arc<MockStore>, n: usize) -> (Uuid, Vec<Uuid>) {
    let category = store.create_service_category("Cleaning".into(), None).await.unwrap();
    let service = store.create_service(category.id, "Deep clean".into(), None, None).await.unwrap();

    let mut provider_ids = Vec::with_capacity(n);
    for i in 0..n {
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
        provider_ids.push(provider.id);
    }

    let booking = store
        .create_booking(NewBooking {
            user_id: Uuid::new_v4(),
            service_id: service.id,
            service_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            service_time: "10:00".into(),
            location: "downtown".into(),
            latitude: None,
            longitude: None,
            pincode: None,
            special_instructions: None,
            estimated_price: None,
        })
        .await
        .unwrap();

    let candidates: Vec<ScoredCandidate> = provider_ids
        .iter()
        .map(|id| ScoredCandidate {
            provider_id: *id,
            score: 50.0,
            distance_km: None,
        })
        .collect();
    let outcome = store.dispatch_offers(booking.id, &candidates, n, 300).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));

    (booking.id, provider_ids)
}

proptest! {
    /// P1: across arbitrary interleavings of accept calls by multiple
    /// providers on the same booking, exactly one offer ends accepted and
    /// the booking's assigned provider is exactly that winner.
    #[test]
    fn p1_exactly_one_winner_under_any_acceptance_order(
        provider_count in 2usize..6,
        order_seed in 0usize..6,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(async {
            let store = Arc::new(MockStore::new());
            let (booking_id, mut provider_ids) = booking_with_n_offers(&store, provider_count).await;

            // Deterministic pseudo-shuffle from the seed, not true randomness,
            // so the test stays reproducible across runs.
            provider_ids.rotate_left(order_seed % provider_ids.len().max(1));

            let realtime = Arc::new(dispatch_notify::RecordingNotifier::new());
            let engine = ArbitrationEngine::new(store.clone(), realtime);

            let mut accepted_count = 0;
            let mut winner = None;
            for provider_id in &provider_ids {
                let pending = store.list_pending_offers_for_provider(*provider_id, chrono::Utc::now()).await.unwrap();
                if pending.is_empty() {
                    continue;
                }
                let offer_id = pending[0].id;
                let result = engine.accept(offer_id, *provider_id).await.unwrap();
                if result.is_ok() {
                    accepted_count += 1;
                    winner = Some(*provider_id);
                }
            }

            let booking = store.get_booking(booking_id).await.unwrap();
            (accepted_count, winner, booking.provider_id)
        });

        let (accepted_count, winner, booking_provider_id) = result;
        prop_assert_eq!(accepted_count, 1);
        prop_assert_eq!(booking_provider_id, winner);
    }

    /// P3: no offer has expires_at <= created_at.
    #[test]
    fn p3_offer_expiry_strictly_after_creation(ttl_secs in 1i64..10_000) {
        let _ = ttl_secs;
        let rt = tokio::runtime::Runtime::new().unwrap();
        // booking_with_n_offers dispatches with a fixed TTL; this checks the
        // invariant on the resulting offer regardless of the sampled ttl_secs.
        let invariant_holds = rt.block_on(async {
            let store = Arc::new(MockStore::new());
            let (_booking_id, provider_ids) = booking_with_n_offers(&store, 1).await;
            let pending = store.list_pending_offers_for_provider(provider_ids[0], chrono::Utc::now()).await.unwrap();
            pending.len() == 1 && pending[0].invariant_holds()
        });
        prop_assert!(invariant_holds);
    }

    /// P5: cancelling a booking leaves no pending offers.
    #[test]
    fn p5_cancel_leaves_no_pending_offers(provider_count in 1usize..5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let all_empty = rt.block_on(async {
            let store = Arc::new(MockStore::new());
            let (booking_id, provider_ids) = booking_with_n_offers(&store, provider_count).await;

            store.cancel_booking(booking_id).await.unwrap();

            let mut all_empty = true;
            for provider_id in &provider_ids {
                let pending = store.list_pending_offers_for_provider(*provider_id, chrono::Utc::now()).await.unwrap();
                all_empty &= pending.is_empty();
            }
            all_empty
        });
        prop_assert!(all_empty);
    }
}

#[tokio::test]
async fn p4_expired_offer_cannot_be_accepted() {
    let store = Arc::new(MockStore::new());
    let (booking_id, provider_ids) = booking_with_n_offers(&store, 1).await;

    let pending = store
        .list_pending_offers_for_provider(provider_ids[0], chrono::Utc::now())
        .await
        .unwrap();
    let offer_id = pending[0].id;

    // Simulate sleeping past the TTL by asking with a "now" far in the future.
    let far_future = chrono::Utc::now() + chrono::Duration::seconds(3600);
    let realtime = Arc::new(dispatch_notify::RecordingNotifier::new());
    let engine = ArbitrationEngine::new(store.clone(), realtime);
    let result = store.accept_offer(offer_id, provider_ids[0], far_future).await.unwrap();
    assert_eq!(result.unwrap_err(), dispatch_storage::OfferActionError::Expired);

    let booking = store.get_booking(booking_id).await.unwrap();
    assert!(booking.provider_id.is_none());
    let _ = engine;
}

#[tokio::test]
async fn p6_provider_rating_equals_mean_of_completed_bookings() {
    let store = Arc::new(MockStore::new());
    let (booking_id, provider_ids) = booking_with_n_offers(&store, 1).await;
    let provider_id = provider_ids[0];

    let pending = store
        .list_pending_offers_for_provider(provider_id, chrono::Utc::now())
        .await
        .unwrap();
    store
        .accept_offer(pending[0].id, provider_id, chrono::Utc::now())
        .await
        .unwrap()
        .unwrap();
    store
        .update_booking_status(booking_id, dispatch_types::BookingStatus::InProgress)
        .await
        .unwrap();
    store
        .update_booking_status(booking_id, dispatch_types::BookingStatus::Completed)
        .await
        .unwrap();
    store.rate_booking(booking_id, 4.0, None).await.unwrap();

    let provider = store.get_provider(provider_id).await.unwrap();
    assert_eq!(provider.rating, Some(4.0));
}
