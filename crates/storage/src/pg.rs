//! Postgres-backed [`Store`]. Query style follows the teacher's `sqlx`
//! relational layer grounding (`query_as::<_, Self>(...).fetch_one(pool)`),
//! with transactions wherever more than one statement must commit together.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dispatch_types::{
    generate_booking_number, Booking, BookingStatus, NewBooking, NewProvider, Offer, OfferStatus,
    Provider, ProviderUpdate, ScoredCandidate, Service, ServiceCategory,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::outcomes::{AcceptOutcome, DeclineOutcome, DispatchOutcome, OfferActionError};
use crate::store::{AdminCounters, Store};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking> {
        let id = Uuid::new_v4();
        let booking_number = generate_booking_number(id);
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, booking_number, user_id, service_id, service_date, service_time,
                location, latitude, longitude, pincode, special_instructions,
                estimated_price, final_price, rating, review, status,
                provider_id, provider_distance, estimated_arrival, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NULL, NULL, NULL,
                'pending', NULL, NULL, NULL, now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(booking_number)
        .bind(new.user_id)
        .bind(new.service_id)
        .bind(new.service_date)
        .bind(new.service_time)
        .bind(new.location)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.pincode)
        .bind(new.special_instructions)
        .bind(new.estimated_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::BookingNotFound(id))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.to_string()))
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_bookings_for_provider(&self, provider_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE provider_id = $1 ORDER BY created_at DESC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(booking_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::BookingNotFound(booking_id))?;
        Ok(booking)
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = 'cancelled', updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::BookingNotFound(booking_id))?;

        sqlx::query(
            "UPDATE offers SET status = 'declined', responded_at = now() \
             WHERE booking_id = $1 AND status = 'pending'",
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn rate_booking(
        &self,
        booking_id: Uuid,
        rating: f64,
        review: Option<String>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let provider_id: Option<Uuid> = sqlx::query(
            "UPDATE bookings SET rating = $2, review = $3, updated_at = now() \
             WHERE id = $1 RETURNING provider_id",
        )
        .bind(booking_id)
        .bind(rating)
        .bind(review)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.get("provider_id"))
        .ok_or(StorageError::BookingNotFound(booking_id))?;

        if let Some(provider_id) = provider_id {
            sqlx::query(
                r#"
                UPDATE providers SET rating = (
                    SELECT AVG(rating) FROM bookings
                    WHERE provider_id = $1 AND rating IS NOT NULL
                )
                WHERE id = $1
                "#,
            )
            .bind(provider_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_provider(&self, new: NewProvider) -> Result<Provider> {
        let provider = sqlx::query_as::<_, Provider>(
            r#"
            INSERT INTO providers (
                id, user_id, business_name, latitude, longitude, pincode,
                rating, experience_years, is_available, created_at, updated_at
            )
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, NULL, $6, true, now(), now())
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.business_name)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.pincode)
        .bind(new.experience_years)
        .fetch_one(&self.pool)
        .await?;
        Ok(provider)
    }

    async fn get_provider(&self, id: Uuid) -> Result<Provider> {
        sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::ProviderNotFound(id))
    }

    async fn provider_for_user(&self, user_id: Uuid) -> Result<Provider> {
        sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NoProviderForUser(user_id))
    }

    async fn update_provider(&self, id: Uuid, update: ProviderUpdate) -> Result<Provider> {
        let provider = sqlx::query_as::<_, Provider>(
            r#"
            UPDATE providers SET
                business_name = COALESCE($2, business_name),
                latitude = COALESCE($3, latitude),
                longitude = COALESCE($4, longitude),
                pincode = COALESCE($5, pincode),
                experience_years = COALESCE($6, experience_years),
                is_available = COALESCE($7, is_available),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.business_name)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.pincode)
        .bind(update.experience_years)
        .bind(update.is_available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::ProviderNotFound(id))?;
        Ok(provider)
    }

    async fn providers_linked_to_service(&self, service_id: Uuid) -> Result<Vec<Provider>> {
        let rows = sqlx::query_as::<_, Provider>(
            r#"
            SELECT p.* FROM providers p
            JOIN provider_services ps ON ps.provider_id = p.id
            WHERE ps.service_id = $1 AND p.is_available
            "#,
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn available_providers(&self) -> Result<Vec<Provider>> {
        let rows = sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE is_available")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn active_booking_counts(&self, provider_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let mut out: HashMap<Uuid, i64> = provider_ids.iter().map(|id| (*id, 0)).collect();
        let rows = sqlx::query(
            r#"
            SELECT provider_id, COUNT(*) AS active_count
            FROM bookings
            WHERE provider_id = ANY($1)
              AND status IN ('pending', 'confirmed', 'in_progress')
            GROUP BY provider_id
            "#,
        )
        .bind(provider_ids)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let provider_id: Uuid = row.get("provider_id");
            let count: i64 = row.get("active_count");
            out.insert(provider_id, count);
        }
        Ok(out)
    }

    async fn create_service_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<ServiceCategory> {
        let category = sqlx::query_as::<_, ServiceCategory>(
            "INSERT INTO service_categories (id, name, description) \
             VALUES (gen_random_uuid(), $1, $2) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_service(
        &self,
        category_id: Uuid,
        name: String,
        description: Option<String>,
        base_price: Option<f64>,
    ) -> Result<Service> {
        let service = sqlx::query_as::<_, Service>(
            "INSERT INTO services (id, category_id, name, description, base_price) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4) RETURNING *",
        )
        .bind(category_id)
        .bind(name)
        .bind(description)
        .bind(base_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(service)
    }

    async fn get_service(&self, id: Uuid) -> Result<Service> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::ServiceNotFound(id))
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let rows = sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn link_provider_service(
        &self,
        provider_id: Uuid,
        service_id: Uuid,
        custom_price: Option<f64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_services (provider_id, service_id, custom_price)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider_id, service_id) DO UPDATE SET custom_price = EXCLUDED.custom_price
            "#,
        )
        .bind(provider_id)
        .bind(service_id)
        .bind(custom_price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unlink_provider_service(&self, provider_id: Uuid, service_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM provider_services WHERE provider_id = $1 AND service_id = $2")
            .bind(provider_id)
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dispatch_offers(
        &self,
        booking_id: Uuid,
        candidates: &[ScoredCandidate],
        top_n: usize,
        ttl_secs: i64,
    ) -> Result<DispatchOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the booking so a concurrent dispatch pass for the same
        // booking can't race this one (I1).
        let booking_row = sqlx::query(
            "SELECT status, provider_id FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::BookingNotFound(booking_id))?;

        let status: String = booking_row.get("status");
        let provider_id: Option<Uuid> = booking_row.get("provider_id");
        if status == "cancelled" || provider_id.is_some() {
            tx.commit().await?;
            return Ok(DispatchOutcome::AlreadyPending);
        }

        let already_pending: bool = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM offers WHERE booking_id = $1 AND status = 'pending')",
        )
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_pending {
            tx.commit().await?;
            return Ok(DispatchOutcome::AlreadyPending);
        }

        if candidates.is_empty() {
            sqlx::query(
                "UPDATE bookings SET status = 'pending', provider_distance = 'No providers available', \
                 updated_at = now() WHERE id = $1",
            )
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(DispatchOutcome::NoCandidates);
        }

        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_secs);
        let mut provider_ids = Vec::new();
        for candidate in candidates.iter().take(top_n) {
            sqlx::query(
                r#"
                INSERT INTO offers (id, booking_id, provider_id, status, score, notified_at, expires_at, responded_at, created_at)
                VALUES (gen_random_uuid(), $1, $2, 'pending', $3, $4, $5, NULL, $4)
                "#,
            )
            .bind(booking_id)
            .bind(candidate.provider_id)
            .bind(candidate.score)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
            provider_ids.push(candidate.provider_id);
        }

        sqlx::query(
            "UPDATE bookings SET status = 'awaiting_provider', provider_distance = 'Finding providers...', \
             updated_at = now() WHERE id = $1",
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DispatchOutcome::Dispatched { provider_ids })
    }

    async fn get_offer(&self, id: Uuid) -> Result<Offer> {
        sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::OfferNotFound(id))
    }

    async fn list_pending_offers_for_provider(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>> {
        sqlx::query(
            "UPDATE offers SET status = 'expired' WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, Offer>(
            "SELECT * FROM offers WHERE provider_id = $1 AND status = 'pending' ORDER BY notified_at",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn accept_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome> {
        let mut tx = self.pool.begin().await?;

        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1 FOR UPDATE")
            .bind(offer_id)
            .fetch_optional(&mut *tx)
            .await?;
        let offer = match offer {
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
            sqlx::query("UPDATE offers SET status = 'expired' WHERE id = $1")
                .bind(offer_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(Err(OfferActionError::Expired));
        }

        // Row lock on the booking is the exclusivity boundary: two concurrent
        // accepts on sibling offers for the same booking serialize here, and
        // the loser's compare-and-set (provider_id IS NULL) fails.
        let booking_row = sqlx::query("SELECT provider_id FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(offer.booking_id)
            .fetch_optional(&mut *tx)
            .await?;
        let booking_row = match booking_row {
            Some(r) => r,
            None => return Ok(Err(OfferActionError::BookingNotFound)),
        };
        let existing_provider: Option<Uuid> = booking_row.get("provider_id");
        if existing_provider.is_some() {
            return Ok(Err(OfferActionError::BookingAlreadyAssigned));
        }

        let distance_km = 1.0 + (offer.score.max(0.0) % 14.0);
        let arrival_minutes = 30 + (offer.score.max(0.0) as i64 % 90);

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET
                provider_id = $2,
                status = 'confirmed',
                provider_distance = $3,
                estimated_arrival = $4,
                updated_at = now()
            WHERE id = $1 AND provider_id IS NULL
            RETURNING *
            "#,
        )
        .bind(offer.booking_id)
        .bind(caller_provider_id)
        .bind(format!("{distance_km:.1} km"))
        .bind(format!("{arrival_minutes} minutes"))
        .fetch_optional(&mut *tx)
        .await?;

        let booking = match booking {
            Some(b) => b,
            None => return Ok(Err(OfferActionError::BookingAlreadyAssigned)),
        };

        sqlx::query("UPDATE offers SET status = 'accepted', responded_at = $2 WHERE id = $1")
            .bind(offer_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE offers SET status = 'declined', responded_at = $2 \
             WHERE booking_id = $1 AND status = 'pending' AND id != $3",
        )
        .bind(offer.booking_id)
        .bind(now)
        .bind(offer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Ok(booking))
    }

    async fn decline_offer(
        &self,
        offer_id: Uuid,
        caller_provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DeclineOutcome> {
        let mut tx = self.pool.begin().await?;

        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1 FOR UPDATE")
            .bind(offer_id)
            .fetch_optional(&mut *tx)
            .await?;
        let offer = match offer {
            Some(o) => o,
            None => return Ok(Err(OfferActionError::OfferNotFound)),
        };
        if offer.provider_id != caller_provider_id {
            return Ok(Err(OfferActionError::NotOwner));
        }
        if offer.status != OfferStatus::Pending {
            return Ok(Err(OfferActionError::NotPending));
        }

        sqlx::query("UPDATE offers SET status = 'declined', responded_at = $2 WHERE id = $1")
            .bind(offer_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let remaining_pending: bool = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM offers WHERE booking_id = $1 AND status = 'pending')",
        )
        .bind(offer.booking_id)
        .fetch_one(&mut *tx)
        .await?;

        if !remaining_pending {
            sqlx::query(
                "UPDATE bookings SET provider_distance = 'Searching for more providers...', \
                 updated_at = now() WHERE id = $1 AND provider_id IS NULL",
            )
            .bind(offer.booking_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Ok(()))
    }

    async fn expire_stale_offers(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE offers SET status = 'expired' WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn bookings_needing_redispatch(
        &self,
        service_date_within: Option<NaiveDate>,
        batch_limit: i64,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT b.* FROM bookings b
            WHERE b.status IN ('pending', 'awaiting_provider')
              AND b.provider_id IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM offers o WHERE o.booking_id = b.id AND o.status = 'pending'
              )
              AND ($1::date IS NULL OR b.service_date <= $1)
            ORDER BY b.id
            LIMIT $2
            "#,
        )
        .bind(service_date_within)
        .bind(batch_limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn bookings_awaiting_with_pending_offers(&self) -> Result<Vec<(Booking, Vec<Offer>)>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT DISTINCT b.* FROM bookings b
            JOIN offers o ON o.booking_id = b.id AND o.status = 'pending'
            WHERE b.status = 'awaiting_provider'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let offers = sqlx::query_as::<_, Offer>(
                "SELECT * FROM offers WHERE booking_id = $1 AND status = 'pending'",
            )
            .bind(booking.id)
            .fetch_all(&self.pool)
            .await?;
            out.push((booking, offers));
        }
        Ok(out)
    }

    async fn admin_counters(&self) -> Result<AdminCounters> {
        let status_rows = sqlx::query("SELECT status, COUNT(*) AS n FROM bookings GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut bookings_by_status = HashMap::new();
        for row in status_rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            bookings_by_status.insert(status, n);
        }

        let providers_total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM providers").fetch_one(&self.pool).await?;
        let providers_available: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM providers WHERE is_available")
                .fetch_one(&self.pool)
                .await?;

        Ok(AdminCounters {
            bookings_by_status,
            providers_total,
            providers_available,
        })
    }
}
