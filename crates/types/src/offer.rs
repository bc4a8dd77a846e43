use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::OfferStatus;

/// A time-bounded invitation to one provider for one booking. Also known
/// as an assignment queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Offer {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub status: OfferStatus,
    pub score: f64,
    pub notified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// I4: expires_at is strictly after created_at.
    pub fn invariant_holds(&self) -> bool {
        self.expires_at > self.created_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A scored candidate produced by the candidate selector (C1), prior to
/// becoming an offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub provider_id: Uuid,
    pub score: f64,
    pub distance_km: Option<f64>,
}
