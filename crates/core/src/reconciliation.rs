//! C4: reconciliation sweeps. Each sweep is idempotent and safe to run
//! concurrently with user traffic; a single booking's failure (e.g. a
//! transient store error while re-dispatching) must not stall the sweep for
//! the rest of the batch.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use dispatch_notify::PushSender;
use dispatch_storage::Store;
use serde_json::json;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::error::Result;

fn observe_sweep_duration(sweep: &str, started: Instant) {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    dispatch_metrics::DISPATCH_METRICS
        .sweep_duration
        .with_label_values(&[sweep])
        .observe(elapsed_ms);
}

/// Upper bound on how many drifted bookings a single Sweep B/D tick will
/// re-dispatch, to bound contention on a noisy tick.
const REDISPATCH_BATCH_LIMIT: i64 = 200;

/// Window (in days) Sweep D looks ahead for scheduled bookings that still
/// need a live offer.
const SCHEDULED_LOOKAHEAD_DAYS: i64 = 1;

pub struct ReconciliationLoop {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn PushSender>,
}

impl ReconciliationLoop {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<Dispatcher>, notifier: Arc<dyn PushSender>) -> Self {
        Self {
            store,
            dispatcher,
            notifier,
        }
    }

    /// Sweep A: expire any pending offer past its TTL.
    pub async fn expire_stale_offers(&self) -> Result<u64> {
        let started = Instant::now();
        let now = Utc::now();
        let count = self.store.expire_stale_offers(now).await?;
        if count > 0 {
            dispatch_metrics::DISPATCH_METRICS.offers_expired.inc_by(count);
            tracing::info!(count, "sweep A expired stale offers");
        }
        observe_sweep_duration("expire_stale_offers", started);
        Ok(count)
    }

    /// Sweep B: re-dispatch bookings with no live offer and no assigned
    /// provider.
    pub async fn redispatch_drifted_bookings(&self) -> Result<usize> {
        self.redispatch("redispatch_drifted_bookings", None).await
    }

    /// Sweep D: same as Sweep B, scoped to bookings whose service date
    /// falls within the scheduled lookahead window.
    pub async fn redispatch_scheduled_bookings(&self) -> Result<usize> {
        let cutoff = Utc::now().date_naive() + chrono::Duration::days(SCHEDULED_LOOKAHEAD_DAYS);
        self.redispatch("redispatch_scheduled_bookings", Some(cutoff)).await
    }

    async fn redispatch(&self, sweep: &str, service_date_within: Option<NaiveDate>) -> Result<usize> {
        let started = Instant::now();
        let bookings = self
            .store
            .bookings_needing_redispatch(service_date_within, REDISPATCH_BATCH_LIMIT)
            .await?;

        let mut redispatched = 0;
        for booking in &bookings {
            match self.dispatcher.dispatch(booking.id).await {
                Ok(_) => redispatched += 1,
                Err(err) => {
                    tracing::warn!(booking_id = %booking.id, error = %err, "sweep failed to re-dispatch booking, continuing");
                }
            }
        }

        if redispatched > 0 {
            tracing::info!(count = redispatched, "sweep re-dispatched drifted bookings");
        }
        observe_sweep_duration(sweep, started);
        Ok(redispatched)
    }

    /// Sweep C: re-fire the notification for every pending offer on a
    /// booking still awaiting a provider. Never mutates state.
    pub async fn refresh_notifications(&self) -> Result<usize> {
        let started = Instant::now();
        let pairs = self.store.bookings_awaiting_with_pending_offers().await?;
        let mut refreshed = 0;
        for (booking, offers) in pairs {
            for offer in offers {
                self.notifier
                    .send_to_provider(
                        offer.provider_id,
                        "Reminder: job waiting",
                        "A booking is still waiting for your response",
                        json!({
                            "type": "new_assignment",
                            "booking_id": booking.id,
                            "offer_id": offer.id,
                        }),
                    )
                    .await;
                refreshed += 1;
            }
        }
        observe_sweep_duration("refresh_notifications", started);
        Ok(refreshed)
    }

    /// Runs Sweeps A, B, and C once. Intended to be called on a ~1 minute
    /// cadence by the scheduler binary.
    pub async fn run_fast_sweeps(&self) -> Result<()> {
        self.expire_stale_offers().await?;
        self.redispatch_drifted_bookings().await?;
        self.refresh_notifications().await?;
        Ok(())
    }

    /// Runs Sweep D once. Intended to be called on a ~1 hour cadence.
    pub async fn run_scheduled_sweep(&self) -> Result<()> {
        self.redispatch_scheduled_bookings().await?;
        Ok(())
    }
}

/// Dispatches a brand-new booking. Exposed separately from the sweeps so
/// the API layer can trigger the initial C2 pass on booking creation
/// without waiting for the next tick.
pub async fn dispatch_new_booking(dispatcher: &Dispatcher, booking_id: Uuid) -> Result<()> {
    dispatcher.dispatch(booking_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate as ChronoNaiveDate;
    use dispatch_notify::RecordingNotifier;
    use dispatch_storage::{DispatchOutcome, MockStore};
    use dispatch_types::{NewBooking, NewProvider};

    use crate::config::DispatchConfig;

    #[tokio::test]
    async fn sweep_b_redispatches_booking_whose_offers_all_expired() {
        let store = Arc::new(MockStore::new());
        let category = store.create_service_category("Cleaning".into(), None).await.unwrap();
        let service = store.create_service(category.id, "Deep clean".into(), None, None).await.unwrap();
        let provider = store
            .create_provider(NewProvider {
                user_id: Uuid::new_v4(),
                business_name: "Spotless".into(),
                latitude: None,
                longitude: None,
                pincode: None,
                experience_years: None,
            })
            .await
            .unwrap();
        store.link_provider_service(provider.id, service.id, None).await.unwrap();

        let booking = store
            .create_booking(NewBooking {
                user_id: Uuid::new_v4(),
                service_id: service.id,
                service_date: ChronoNaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
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

        // Dispatch with an already-expired TTL so the offer starts stale.
        let candidates = vec![dispatch_types::ScoredCandidate {
            provider_id: provider.id,
            score: 50.0,
            distance_km: None,
        }];
        let outcome = store.dispatch_offers(booking.id, &candidates, 1, -10).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));

        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(crate::dispatcher::Dispatcher::new(
            store.clone(),
            notifier.clone(),
            DispatchConfig::default(),
        ));
        let reconciliation = ReconciliationLoop::new(store.clone(), dispatcher, notifier);

        let expired = reconciliation.expire_stale_offers().await.unwrap();
        assert_eq!(expired, 1);

        let redispatched = reconciliation.redispatch_drifted_bookings().await.unwrap();
        assert_eq!(redispatched, 1);

        let updated = store.get_booking(booking.id).await.unwrap();
        assert_eq!(updated.status, dispatch_types::BookingStatus::AwaitingProvider);
    }
}
