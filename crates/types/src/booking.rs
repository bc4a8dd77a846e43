use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::BookingStatus;

/// A customer's request for a service at a place and time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub service_date: NaiveDate,
    /// Free-form, passed through from the client. See spec section 9: no
    /// timezone or slot-overlap logic is built on top of this.
    pub service_time: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pincode: Option<String>,
    pub special_instructions: Option<String>,
    pub estimated_price: Option<f64>,
    pub final_price: Option<f64>,
    pub rating: Option<f64>,
    pub review: Option<String>,

    pub status: BookingStatus,
    pub provider_id: Option<Uuid>,
    pub provider_distance: Option<String>,
    pub estimated_arrival: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// I5: confirmed/in_progress/completed bookings must carry a provider.
    /// I6: awaiting_provider bookings must not.
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            BookingStatus::Confirmed | BookingStatus::InProgress | BookingStatus::Completed => {
                self.provider_id.is_some()
            }
            BookingStatus::AwaitingProvider => self.provider_id.is_none(),
            BookingStatus::Pending | BookingStatus::Cancelled => true,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Fields a customer supplies when creating a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub service_date: NaiveDate,
    pub service_time: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pincode: Option<String>,
    pub special_instructions: Option<String>,
    pub estimated_price: Option<f64>,
}

/// Generates a human-readable booking number, e.g. `BK-7F3C2A1E`.
pub fn generate_booking_number(id: Uuid) -> String {
    let short = id.simple().to_string();
    format!("BK-{}", short[..8].to_uppercase())
}
