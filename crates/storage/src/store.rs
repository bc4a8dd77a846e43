use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dispatch_types::{
    Booking, BookingStatus, NewBooking, NewProvider, Offer, Provider, ProviderUpdate,
    ScoredCandidate, Service, ServiceCategory,
};
use uuid::Uuid;

use crate::error::Result;
use crate::outcomes::{AcceptOutcome, DeclineOutcome, DispatchOutcome};

/// Aggregate counts for the admin dashboard (spec section 6, "overall counters").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AdminCounters {
    pub bookings_by_status: HashMap<String, i64>,
    pub providers_total: i64,
    pub providers_available: i64,
}

/// The persistence contract the dispatch core runs against. Implemented by
/// [`crate::pg::PgStore`] (Postgres, production) and [`crate::mock::MockStore`]
/// (in-memory, tests). Modeled on the teacher's `RpcBackend` trait: a single
/// `Send + Sync` capability interface behind an `Arc`, so handlers never hold
/// a lock across network I/O.
#[async_trait]
pub trait Store: Send + Sync {
    // -- bookings ---------------------------------------------------------
    async fn create_booking(&self, new: NewBooking) -> Result<Booking>;
    async fn get_booking(&self, id: Uuid) -> Result<Booking>;
    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Booking>>;
    async fn list_bookings_for_provider(&self, provider_id: Uuid) -> Result<Vec<Booking>>;
    async fn update_booking_status(&self, booking_id: Uuid, status: BookingStatus)
        -> Result<Booking>;
    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking>;
    async fn rate_booking(&self, booking_id: Uuid, rating: f64, review: Option<String>) -> Result<()>;

    // -- providers ----------------------------------------------------------
    async fn create_provider(&self, new: NewProvider) -> Result<Provider>;
    async fn get_provider(&self, id: Uuid) -> Result<Provider>;
    async fn provider_for_user(&self, user_id: Uuid) -> Result<Provider>;
    async fn update_provider(&self, id: Uuid, update: ProviderUpdate) -> Result<Provider>;

    /// Providers linked to `service_id` via the provider-service set, filtered
    /// to `is_available`. Step 1 of C1's eligibility filter.
    async fn providers_linked_to_service(&self, service_id: Uuid) -> Result<Vec<Provider>>;
    /// All available providers, regardless of service linkage. Used by C1's
    /// fallback rule and by sweeps.
    async fn available_providers(&self) -> Result<Vec<Provider>>;
    /// Batched active-booking count per provider (one query, not N), per
    /// spec section 9's design note on avoiding per-provider roundtrips.
    async fn active_booking_counts(&self, provider_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;

    // -- services -------------------------------------------------------
    async fn create_service_category(&self, name: String, description: Option<String>)
        -> Result<ServiceCategory>;
    async fn create_service(
        &self,
        category_id: Uuid,
        name: String,
        description: Option<String>,
        base_price: Option<f64>,
    ) -> Result<Service>;
    async fn get_service(&self, id: Uuid) -> Result<Service>;
    async fn list_services(&self) -> Result<Vec<Service>>;
    async fn link_provider_service(
        &self,
        provider_id: Uuid,
        service_id: Uuid,
        custom_price: Option<f64>,
    ) -> Result<()>;
    async fn unlink_provider_service(&self, provider_id: Uuid, service_id: Uuid) -> Result<()>;

    // -- offers / dispatch ------------------------------------------------
    /// C2: idempotent offer dispatch. Must no-op if a pending offer already
    /// exists for the booking (I1), and must refuse cancelled bookings.
    async fn dispatch_offers(
        &self,
        booking_id: Uuid,
        candidates: &[ScoredCandidate],
        top_n: usize,
        ttl_secs: i64,
    ) -> Result<DispatchOutcome>;

    async fn get_offer(&self, id: Uuid) -> Result<Offer>;

    /// Lazy expiry + listing, per C3's "list pending" contract.
    async fn list_pending_offers_for_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>>;

    /// C3 accept: serializable with respect to other accepts on the same
    /// booking (row lock or compare-and-set on `provider_id IS NULL`).
    async fn accept_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome>;

    async fn decline_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DeclineOutcome>;

    // -- reconciliation (C4) ------------------------------------------------
    /// Sweep A: mark pending-but-past-expiry offers as expired. Returns the
    /// count affected.
    async fn expire_stale_offers(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Sweep B (and D, with `service_date_within` set): bookings in
    /// `{awaiting_provider, pending}` with no assigned provider and no
    /// pending offer.
    async fn bookings_needing_redispatch(
        &self,
        service_date_within: Option<NaiveDate>,
        batch_limit: i64,
    ) -> Result<Vec<Booking>>;

    /// Sweep C: awaiting_provider bookings with at least one pending offer,
    /// paired with those offers for the notification re-fire.
    async fn bookings_awaiting_with_pending_offers(&self) -> Result<Vec<(Booking, Vec<Offer>)>>;

    // -- admin ------------------------------------------------------------
    async fn admin_counters(&self) -> Result<AdminCounters>;
}
