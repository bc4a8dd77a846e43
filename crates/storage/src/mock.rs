//! In-memory [`Store`] implementation for fast, deterministic tests.
//!
//! Mirrors the teacher's `MeshCoordinator` style (plain `HashMap`s behind a
//! single lock) rather than `sqlx`, since tests need no real database. All
//! the invariants the Postgres store enforces with SQL (I1-I6) are enforced
//! here with the same logic, just expressed over `HashMap`s under one mutex
//! instead of row locks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dispatch_types::{
    generate_booking_number, Booking, BookingStatus, NewBooking, NewProvider, Offer, OfferStatus,
    Provider, ProviderUpdate, ScoredCandidate, Service, ServiceCategory,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::outcomes::{DispatchOutcome, OfferActionError};
use crate::store::{AdminCounters, Store};

#[derive(Default)]
struct Inner {
    bookings: HashMap<Uuid, Booking>,
    providers: HashMap<Uuid, Provider>,
    provider_by_user: HashMap<Uuid, Uuid>,
    offers: HashMap<Uuid, Offer>,
    categories: HashMap<Uuid, ServiceCategory>,
    services: HashMap<Uuid, Service>,
    /// (provider_id, service_id) -> custom_price
    provider_services: HashMap<(Uuid, Uuid), Option<f64>>,
}

pub struct MockStore {
    inner: Mutex<Inner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking> {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let booking = Booking {
            id,
            booking_number: generate_booking_number(id),
            user_id: new.user_id,
            service_id: new.service_id,
            service_date: new.service_date,
            service_time: new.service_time,
            location: new.location,
            latitude: new.latitude,
            longitude: new.longitude,
            pincode: new.pincode,
            special_instructions: new.special_instructions,
            estimated_price: new.estimated_price,
            final_price: None,
            rating: None,
            review: None,
            status: BookingStatus::Pending,
            provider_id: None,
            provider_distance: None,
            estimated_arrival: None,
            created_at: now,
            updated_at: now,
        };
        inner.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        let inner = self.inner.lock().await;
        inner
            .bookings
            .get(&id)
            .cloned()
            .ok_or(StorageError::BookingNotFound(id))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .filter(|b| status.map(|s| s == b.status).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.created_at);
        out.reverse();
        Ok(out
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_bookings_for_provider(&self, provider_id: Uuid) -> Result<Vec<Booking>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .values()
            .filter(|b| b.provider_id == Some(provider_id))
            .cloned()
            .collect())
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking> {
        let mut inner = self.inner.lock().await;
        let booking = inner
            .bookings
            .get_mut(&booking_id)
            .ok_or(StorageError::BookingNotFound(booking_id))?;
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking> {
        let mut inner = self.inner.lock().await;
        {
            let booking = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or(StorageError::BookingNotFound(booking_id))?;
            booking.status = BookingStatus::Cancelled;
            booking.updated_at = Utc::now();
        }
        // Any still-pending offers for a cancelled booking become declined.
        let now = Utc::now();
        for offer in inner.offers.values_mut() {
            if offer.booking_id == booking_id && offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Declined;
                offer.responded_at = Some(now);
            }
        }
        Ok(inner.bookings.get(&booking_id).unwrap().clone())
    }

    async fn rate_booking(
        &self,
        booking_id: Uuid,
        rating: f64,
        review: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let provider_id = {
            let booking = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or(StorageError::BookingNotFound(booking_id))?;
            booking.rating = Some(rating);
            booking.review = review;
            booking.updated_at = Utc::now();
            booking.provider_id
        };

        if let Some(provider_id) = provider_id {
            let mean = {
                let ratings: Vec<f64> = inner
                    .bookings
                    .values()
                    .filter(|b| b.provider_id == Some(provider_id))
                    .filter_map(|b| b.rating)
                    .collect();
                if ratings.is_empty() {
                    None
                } else {
                    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
                }
            };
            if let Some(mean) = mean {
                if let Some(provider) = inner.providers.get_mut(&provider_id) {
                    provider.rating = Some(mean);
                }
            }
        }
        Ok(())
    }

    async fn create_provider(&self, new: NewProvider) -> Result<Provider> {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let provider = Provider {
            id,
            user_id: new.user_id,
            business_name: new.business_name,
            latitude: new.latitude,
            longitude: new.longitude,
            pincode: new.pincode,
            rating: None,
            experience_years: new.experience_years,
            is_available: true,
            created_at: now,
            updated_at: now,
        };
        inner.provider_by_user.insert(new.user_id, id);
        inner.providers.insert(id, provider.clone());
        Ok(provider)
    }

    async fn get_provider(&self, id: Uuid) -> Result<Provider> {
        let inner = self.inner.lock().await;
        inner
            .providers
            .get(&id)
            .cloned()
            .ok_or(StorageError::ProviderNotFound(id))
    }

    async fn provider_for_user(&self, user_id: Uuid) -> Result<Provider> {
        let inner = self.inner.lock().await;
        let provider_id = inner
            .provider_by_user
            .get(&user_id)
            .copied()
            .ok_or(StorageError::NoProviderForUser(user_id))?;
        Ok(inner.providers.get(&provider_id).unwrap().clone())
    }

    async fn update_provider(&self, id: Uuid, update: ProviderUpdate) -> Result<Provider> {
        let mut inner = self.inner.lock().await;
        let provider = inner
            .providers
            .get_mut(&id)
            .ok_or(StorageError::ProviderNotFound(id))?;
        if let Some(v) = update.business_name {
            provider.business_name = v;
        }
        if update.latitude.is_some() {
            provider.latitude = update.latitude;
        }
        if update.longitude.is_some() {
            provider.longitude = update.longitude;
        }
        if update.pincode.is_some() {
            provider.pincode = update.pincode;
        }
        if update.experience_years.is_some() {
            provider.experience_years = update.experience_years;
        }
        if let Some(v) = update.is_available {
            provider.is_available = v;
        }
        provider.updated_at = Utc::now();
        Ok(provider.clone())
    }

    async fn providers_linked_to_service(&self, service_id: Uuid) -> Result<Vec<Provider>> {
        let inner = self.inner.lock().await;
        let ids: Vec<Uuid> = inner
            .provider_services
            .keys()
            .filter(|(_, sid)| *sid == service_id)
            .map(|(pid, _)| *pid)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| inner.providers.get(&id).cloned())
            .filter(|p| p.is_available)
            .collect())
    }

    async fn available_providers(&self) -> Result<Vec<Provider>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .providers
            .values()
            .filter(|p| p.is_available)
            .cloned()
            .collect())
    }

    async fn active_booking_counts(
        &self,
        provider_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>> {
        let inner = self.inner.lock().await;
        let mut out = HashMap::new();
        for id in provider_ids {
            out.insert(*id, 0i64);
        }
        for booking in inner.bookings.values() {
            if let Some(pid) = booking.provider_id {
                if matches!(
                    booking.status,
                    BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::InProgress
                ) {
                    if let Some(count) = out.get_mut(&pid) {
                        *count += 1;
                    }
                }
            }
        }
        Ok(out)
    }

    async fn create_service_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<ServiceCategory> {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4();
        let category = ServiceCategory {
            id,
            name,
            description,
        };
        inner.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn create_service(
        &self,
        category_id: Uuid,
        name: String,
        description: Option<String>,
        base_price: Option<f64>,
    ) -> Result<Service> {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4();
        let service = Service {
            id,
            category_id,
            name,
            description,
            base_price,
        };
        inner.services.insert(id, service.clone());
        Ok(service)
    }

    async fn get_service(&self, id: Uuid) -> Result<Service> {
        let inner = self.inner.lock().await;
        inner
            .services
            .get(&id)
            .cloned()
            .ok_or(StorageError::ServiceNotFound(id))
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let inner = self.inner.lock().await;
        Ok(inner.services.values().cloned().collect())
    }

    async fn link_provider_service(
        &self,
        provider_id: Uuid,
        service_id: Uuid,
        custom_price: Option<f64>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .provider_services
            .insert((provider_id, service_id), custom_price);
        Ok(())
    }

    async fn unlink_provider_service(&self, provider_id: Uuid, service_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.provider_services.remove(&(provider_id, service_id));
        Ok(())
    }

    async fn dispatch_offers(
        &self,
        booking_id: Uuid,
        candidates: &[ScoredCandidate],
        top_n: usize,
        ttl_secs: i64,
    ) -> Result<DispatchOutcome> {
        let mut inner = self.inner.lock().await;

        let already_pending = inner
            .offers
            .values()
            .any(|o| o.booking_id == booking_id && o.status == OfferStatus::Pending);
        if already_pending {
            return Ok(DispatchOutcome::AlreadyPending);
        }

        let booking = inner
            .bookings
            .get(&booking_id)
            .ok_or(StorageError::BookingNotFound(booking_id))?;
        if booking.status == BookingStatus::Cancelled || booking.provider_id.is_some() {
            return Ok(DispatchOutcome::AlreadyPending);
        }

        if candidates.is_empty() {
            let booking = inner.bookings.get_mut(&booking_id).unwrap();
            booking.status = BookingStatus::Pending;
            booking.provider_distance = Some("No providers available".to_string());
            booking.updated_at = Utc::now();
            return Ok(DispatchOutcome::NoCandidates);
        }

        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_secs);
        let mut provider_ids = Vec::new();
        for candidate in candidates.iter().take(top_n) {
            let offer_id = Uuid::new_v4();
            inner.offers.insert(
                offer_id,
                Offer {
                    id: offer_id,
                    booking_id,
                    provider_id: candidate.provider_id,
                    status: OfferStatus::Pending,
                    score: candidate.score,
                    notified_at: now,
                    expires_at,
                    responded_at: None,
                    created_at: now,
                },
            );
            provider_ids.push(candidate.provider_id);
        }

        let booking = inner.bookings.get_mut(&booking_id).unwrap();
        booking.status = BookingStatus::AwaitingProvider;
        booking.provider_distance = Some("Finding providers...".to_string());
        booking.updated_at = now;

        Ok(DispatchOutcome::Dispatched { provider_ids })
    }

    async fn get_offer(&self, id: Uuid) -> Result<Offer> {
        let inner = self.inner.lock().await;
        inner
            .offers
            .get(&id)
            .cloned()
            .ok_or(StorageError::OfferNotFound(id))
    }

    async fn list_pending_offers_for_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>> {
        let mut inner = self.inner.lock().await;
        for offer in inner.offers.values_mut() {
            if offer.status == OfferStatus::Pending && offer.is_expired(now) {
                offer.status = OfferStatus::Expired;
            }
        }
        Ok(inner
            .offers
            .values()
            .filter(|o| o.provider_id == provider_id && o.status == OfferStatus::Pending)
            .cloned()
            .collect())
    }

    async fn accept_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<crate::outcomes::AcceptOutcome> {
        let mut inner = self.inner.lock().await;

        let (booking_id, score) = {
            let offer = match inner.offers.get(&offer_id) {
                Some(o) => o,
                None => return Ok(Err(OfferActionError::OfferNotFound)),
            };
            if offer.provider_id != caller_provider_id {
                return Ok(Err(OfferActionError::NotOwner));
            }
            if offer.status != OfferStatus::Pending {
                return Ok(Err(OfferActionError::NotPending));
            }
            if offer.is_expired(now) {
                inner.offers.get_mut(&offer_id).unwrap().status = OfferStatus::Expired;
                return Ok(Err(OfferActionError::Expired));
            }
            (offer.booking_id, offer.score)
        };

        // Row-lock equivalent: single critical section under the one mutex,
        // compare-and-set on provider_id.
        let booking_exists = inner.bookings.contains_key(&booking_id);
        if !booking_exists {
            return Ok(Err(OfferActionError::BookingNotFound));
        }
        if inner.bookings.get(&booking_id).unwrap().provider_id.is_some() {
            return Ok(Err(OfferActionError::BookingAlreadyAssigned));
        }

        // Winner: accept this offer, decline all pending siblings (I3).
        for offer in inner.offers.values_mut() {
            if offer.booking_id != booking_id {
                continue;
            }
            if offer.id == offer_id {
                offer.status = OfferStatus::Accepted;
                offer.responded_at = Some(now);
            } else if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Declined;
                offer.responded_at = Some(now);
            }
        }

        let distance_km = 1.0 + (score.max(0.0) % 14.0);
        let arrival_minutes = 30 + ((score.max(0.0) as i64) % 90);

        let booking = inner.bookings.get_mut(&booking_id).unwrap();
        booking.provider_id = Some(caller_provider_id);
        booking.status = BookingStatus::Confirmed;
        booking.provider_distance = Some(format!("{distance_km:.1} km"));
        booking.estimated_arrival = Some(format!("{arrival_minutes} minutes"));
        booking.updated_at = now;

        Ok(Ok(booking.clone()))
    }

    async fn decline_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<crate::outcomes::DeclineOutcome> {
        let mut inner = self.inner.lock().await;

        let booking_id = {
            let offer = match inner.offers.get_mut(&offer_id) {
                Some(o) => o,
                None => return Ok(Err(OfferActionError::OfferNotFound)),
            };
            if offer.provider_id != caller_provider_id {
                return Ok(Err(OfferActionError::NotOwner));
            }
            if offer.status != OfferStatus::Pending {
                return Ok(Err(OfferActionError::NotPending));
            }
            offer.status = OfferStatus::Declined;
            offer.responded_at = Some(now);
            offer.booking_id
        };

        let remaining_pending = inner
            .offers
            .values()
            .any(|o| o.booking_id == booking_id && o.status == OfferStatus::Pending);

        if !remaining_pending {
            if let Some(booking) = inner.bookings.get_mut(&booking_id) {
                if booking.provider_id.is_none() {
                    booking.provider_distance = Some("Searching for more providers...".to_string());
                    booking.updated_at = now;
                }
            }
        }

        Ok(Ok(()))
    }

    async fn expire_stale_offers(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut count = 0u64;
        for offer in inner.offers.values_mut() {
            if offer.status == OfferStatus::Pending && offer.is_expired(now) {
                offer.status = OfferStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn bookings_needing_redispatch(
        &self,
        service_date_within: Option<NaiveDate>,
        batch_limit: i64,
    ) -> Result<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| {
                matches!(
                    b.status,
                    BookingStatus::AwaitingProvider | BookingStatus::Pending
                )
            })
            .filter(|b| b.provider_id.is_none())
            .filter(|b| {
                !inner
                    .offers
                    .values()
                    .any(|o| o.booking_id == b.id && o.status == OfferStatus::Pending)
            })
            .filter(|b| match service_date_within {
                Some(cutoff) => b.service_date <= cutoff,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by_key(|b| b.id);
        out.truncate(batch_limit.max(0) as usize);
        Ok(out)
    }

    async fn bookings_awaiting_with_pending_offers(&self) -> Result<Vec<(Booking, Vec<Offer>)>> {
        let inner = self.inner.lock().await;
        let mut out = Vec::new();
        for booking in inner.bookings.values() {
            if booking.status != BookingStatus::AwaitingProvider {
                continue;
            }
            let offers: Vec<Offer> = inner
                .offers
                .values()
                .filter(|o| o.booking_id == booking.id && o.status == OfferStatus::Pending)
                .cloned()
                .collect();
            if !offers.is_empty() {
                out.push((booking.clone(), offers));
            }
        }
        Ok(out)
    }

    async fn admin_counters(&self) -> Result<AdminCounters> {
        let inner = self.inner.lock().await;
        let mut bookings_by_status: HashMap<String, i64> = HashMap::new();
        for booking in inner.bookings.values() {
            *bookings_by_status
                .entry(booking.status.to_string())
                .or_insert(0) += 1;
        }
        let providers_total = inner.providers.len() as i64;
        let providers_available = inner.providers.values().filter(|p| p.is_available).count() as i64;
        Ok(AdminCounters {
            bookings_by_status,
            providers_total,
            providers_available,
        })
    }
}
